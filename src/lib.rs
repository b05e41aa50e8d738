//! Replica - concurrent file copy engine
//!
//! Materializes copies of source files while capping memory use and
//! concurrent disk operations. Every file is read at most once per batch:
//! nodes cache their metadata and bytes for all consumers and free them
//! as soon as the last consumer disconnects.

pub mod cli;
pub mod config;
pub mod error;
pub mod node;
pub mod orchestration;
pub mod resources;
pub mod ui;

pub use error::{ReplicaError, ReplicaResult};
pub use node::{CopyFile, Node, ReadInfo, SourceFile, StatInfo, Worker};
pub use resources::{Buffer, ResourceManager};
