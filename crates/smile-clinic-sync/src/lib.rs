//! Remote mirror for the clinic dataset.
//!
//! The local database is authoritative for the device; the server at
//! `<base_url>/sync` holds a best-effort copy. This crate provides the
//! debounced push and on-demand pull that keep the two in step, plus the
//! `clinic-sync` command line tool.

pub mod cli;
pub mod config;
pub mod logging;
pub mod service;
pub mod synced;
pub mod transport;

pub use config::{ConfigError, SyncConfig};
pub use service::{StatusEvent, Subscription, SyncService, SyncStatus};
pub use synced::{attach, force_pull, force_push, sync_report, SyncObserver, SyncReport};
pub use transport::{HttpTransport, SyncError, SyncResult, SyncTransport};
