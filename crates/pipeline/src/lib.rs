//! Registry synchronisation pipeline.
//!
//! Fetches the regulator's files, reconciles them into product rows, detects
//! status changes and hands them to the notification fan-out. The
//! [`SyncOrchestrator`] wraps one pass in a single audited sync run.

pub mod config;
pub mod orchestrator;
pub mod reconciler;
pub mod source;
pub mod summary;

pub use config::{SourceConfig, SyncConfig};
pub use orchestrator::{SyncError, SyncOrchestrator};
pub use source::{
    DirectoryRegistrySource, FetchedFile, HttpRegistrySource, RegistrySource, SnapshotStore,
    SourceError,
};
pub use summary::SyncSummary;
