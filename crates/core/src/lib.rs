//! Core types and shared functionality for precache.
//!
//! This crate provides:
//! - Versioned resource manifests and the stored manifest record
//! - Named storage regions with SQLite and in-memory backends
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod manifest;
pub mod storage;

pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use manifest::{AppManifest, CoreResourceSet, ROOT_KEY, ResourceManifest};
pub use storage::{CachedResponse, MemoryStorage, Region, SqliteStorage, StorageBackend};
