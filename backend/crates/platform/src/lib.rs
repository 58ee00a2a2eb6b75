//! Platform crate: technical building blocks shared by the bounded contexts.
//!
//! - Password hashing (Argon2id with tunable cost)
//! - Random secret material
//! - HTTP header helpers (bearer tokens, client address, user agent)
//! - Bounded retry with exponential backoff

pub mod bearer;
pub mod client;
pub mod crypto;
pub mod password;
pub mod retry;
