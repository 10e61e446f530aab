//! `warden-client`
//!
//! **Responsibility:** client-side access control against the permission backend.
//!
//! This crate provides:
//! - The [`PermissionBackend`] contract with REST and in-memory implementations
//! - A session-scoped [`PermissionCache`] (lazy, coalesced, fail-closed)
//! - [`Guard`]s that gate UI and routes on the cached snapshot
//! - [`AdminOperations`] for role and grant management
//!
//! The backend stays the authority: the client never computes effective
//! permissions itself, it only caches what the backend returns.

pub mod admin;
pub mod backend;
pub mod cache;
pub mod config;
pub mod dto;
pub mod guard;
pub mod http;
pub mod memory;
pub mod reference;
pub mod resolver;

pub use admin::AdminOperations;
pub use backend::PermissionBackend;
pub use cache::{CacheState, PermissionCache};
pub use config::{ClientConfig, ConfigError};
pub use guard::{DenyBehavior, Guard, GuardState, GuardWatch, Render};
pub use http::HttpBackend;
pub use memory::InMemoryBackend;
pub use reference::{Reference, ReferenceData, ReferenceState};
