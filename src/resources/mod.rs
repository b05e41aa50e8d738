//! Global admission control for disk operations and memory
//!
//! A single [`ResourceManager`] is created per process and handed to every
//! node. It gates three kinds of disk operation behind one shared cap and
//! charges every [`Buffer`] it hands out against a memory budget.
//!
//! # Admission rules
//!
//! | Operation | Blocks while |
//! |-----------|--------------|
//! | `stat_path` | disk ops in flight >= cap |
//! | `write_path` | disk ops in flight >= cap |
//! | `read_path` | disk ops in flight >= cap, or the read would overrun the memory cap and another task can still free memory |
//!
//! A read issued by the last task still making progress, or issued while
//! no memory is charged at all, is admitted even if it overruns the memory
//! cap. Nothing could ever release memory for it, so waiting would hang
//! the whole batch.

mod buffer;
mod manager;

pub use buffer::Buffer;
pub use manager::{DiskTotals, DiskUsage, ResourceManager, ResourceTask};
