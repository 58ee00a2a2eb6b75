//! Infrastructure Layer
//!
//! Storage backends and the router that picks between them.

#[cfg(test)]
pub mod memory;
pub mod mongo;
pub mod postgres;
pub mod router;

pub use mongo::MongoIdentityBackend;
pub use postgres::PgIdentityBackend;
pub use router::{BackendStatus, RouterStatus, StorageRouter};

/// Production wiring: Postgres first, MongoDB as fallback
pub type IdentityRouter = StorageRouter<PgIdentityBackend, MongoIdentityBackend>;
