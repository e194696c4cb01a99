//! fitlog-core - Core library for FitLog
//!
//! This crate contains the offline-first reconciliation layer shared by
//! all FitLog interfaces: the change log and sync metadata stores, the
//! conflict resolver, the per-domain synchronization engine, and the
//! integrity checker with its deep-recovery path.

pub mod changelog;
pub mod engine;
pub mod error;
pub mod events;
pub mod integrity;
pub mod metadata;
pub mod models;
pub mod resolver;
pub mod snapshot;
pub mod store;
pub mod util;

pub use error::{Error, Result};
pub use models::{Domain, DomainRecord};
