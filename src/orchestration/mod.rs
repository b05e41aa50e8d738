//! Batch orchestration
//!
//! Wires one [`SourceFile`](crate::node::SourceFile) per file in a source
//! directory to one [`CopyFile`](crate::node::CopyFile) per target directory,
//! runs every copy concurrently and reports progress while they run.

pub mod batch;

pub use batch::{run_batch, BatchPlan, BatchStatus, BatchSummary, ProgressReporter, SilentProgress};
