//! `warden-core` — shared building blocks for the access-control crates.
//!
//! This crate contains the error taxonomy and identifiers only (no IO).

pub mod error;
pub mod id;

pub use error::{AccessError, AccessResult};
pub use id::UserId;
