//! Run-level services.

pub mod geo;
pub mod merge;
pub mod sync;

pub use merge::{merge_artifacts, MergeOutcome};
pub use sync::{SyncReport, SyncService};
