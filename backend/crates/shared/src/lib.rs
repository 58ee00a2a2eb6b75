//! Shared kernel
//!
//! Vocabulary that every crate in the workspace agrees on:
//! - the unified [`error::app_error::AppError`] and its [`error::kind::ErrorKind`]
//! - typed identifiers ([`id::Id`])
//!
//! Only things whose meaning is stable across all bounded contexts belong here.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;
