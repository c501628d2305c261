//! # Catalog
//!
//! Keeps a service catalog in sync with descriptor files that live in
//! source repositories, usable both as a standalone binary and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! catalog = { version = "0.0.1", default-features = false, features = ["testing"] }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use catalog::catalog::SchemaValidator;
//! use catalog::platform::MemoryPlatform;
//! use catalog::store::{SqliteStore, Store};
//! use catalog::sync::Engine;
//!
//! let store = SqliteStore::open_in_memory().unwrap();
//! store.initialize().unwrap();
//!
//! let engine = Engine::new(
//!     Arc::new(store),
//!     Arc::new(MemoryPlatform::new()),
//!     Arc::new(SchemaValidator::bundled().unwrap()),
//! );
//! let reports = engine.refresh_everything().unwrap();
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes CLI module. Disable with `default-features = false`.
//! - `testing`: Exposes [`platform::MemoryPlatform`], an in-memory platform for tests.

pub mod catalog;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod platform;
pub mod store;
pub mod sync;
pub mod tasks;
pub mod types;
