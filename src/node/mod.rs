//! Cacheable nodes
//!
//! A [`Node`] memoizes the metadata and bytes of one file for every consumer
//! connected to it. [`SourceFile`] is backed directly by the filesystem;
//! [`CopyFile`] derives its file from another node and is driven to
//! completion by its [`Worker::work`] entry point.
//!
//! # Lifecycle
//!
//! Consumers `connect` before use and `disconnect` when finished. Once the
//! driver calls `mark_no_more_connections`, the node frees its cached state
//! as soon as the connection count drops to zero.

mod copy_file;
mod promise;
mod source_file;

pub use copy_file::CopyFile;
pub use source_file::SourceFile;

use crate::error::{ReplicaError, ReplicaResult};
use crate::resources::Buffer;
use async_trait::async_trait;
use std::fs::Metadata;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Snapshot of a file's metadata, or the error that prevented it
#[derive(Debug, Clone)]
pub struct StatInfo {
    modified: SystemTime,
    size: u64,
    error: Option<ReplicaError>,
}

impl StatInfo {
    pub fn new(modified: SystemTime, size: u64) -> Self {
        Self {
            modified,
            size,
            error: None,
        }
    }

    /// A failed stat: zero time, zero size
    pub fn failed(error: ReplicaError) -> Self {
        Self {
            modified: UNIX_EPOCH,
            size: 0,
            error: Some(error),
        }
    }

    pub(crate) fn from_metadata(metadata: &Metadata) -> ReplicaResult<Self> {
        let modified = metadata
            .modified()
            .map_err(|e| ReplicaError::io("reading modification time", e))?;
        Ok(Self::new(modified, metadata.len()))
    }

    pub(crate) fn from_result(result: ReplicaResult<Metadata>) -> Self {
        match result.and_then(|metadata| Self::from_metadata(&metadata)) {
            Ok(stat) => stat,
            Err(e) => Self::failed(e),
        }
    }

    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn error(&self) -> Option<&ReplicaError> {
        self.error.as_ref()
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// A reference to a node's cached bytes, or the error that prevented them
///
/// Cloning acquires another buffer reference; dropping releases it.
#[derive(Debug, Clone, Default)]
pub struct ReadInfo {
    buffer: Option<Buffer>,
    error: Option<ReplicaError>,
}

impl ReadInfo {
    pub fn loaded(buffer: Buffer) -> Self {
        Self {
            buffer: Some(buffer),
            error: None,
        }
    }

    pub fn failed(error: ReplicaError) -> Self {
        Self {
            buffer: None,
            error: Some(error),
        }
    }

    pub(crate) fn from_result(result: ReplicaResult<Buffer>) -> Self {
        match result {
            Ok(buffer) => Self::loaded(buffer),
            Err(e) => Self::failed(e),
        }
    }

    pub fn buffer(&self) -> Option<&Buffer> {
        self.buffer.as_ref()
    }

    pub fn error(&self) -> Option<&ReplicaError> {
        self.error.as_ref()
    }

    /// Take the buffer reference, turning a missing buffer into an error
    pub fn into_result(self) -> ReplicaResult<Buffer> {
        match (self.buffer, self.error) {
            (_, Some(e)) => Err(e),
            (Some(buffer), None) => Ok(buffer),
            (None, None) => Err(ReplicaError::Internal(
                "read returned neither bytes nor an error".to_string(),
            )),
        }
    }
}

/// A cacheable file consumed by other nodes
#[async_trait]
pub trait Node: Send + Sync {
    /// A consumer starts using this node
    fn connect(&self);

    /// A consumer is finished with this node
    fn disconnect(&self);

    /// No more consumers will connect
    fn mark_no_more_connections(&self);

    /// Metadata, computed once and cached
    async fn stat(&self) -> StatInfo;

    /// Bytes, computed once and cached; each call acquires its own reference
    async fn read(&self) -> ReadInfo;
}

/// A unit of work driven by the orchestrator in its own task
#[async_trait]
pub trait Worker: Send + Sync {
    async fn work(&self) -> ReplicaResult<()>;
}

/// Connection bookkeeping shared by every node kind
#[derive(Debug, Default)]
pub(crate) struct Connections {
    count: usize,
    closed: bool,
}

impl Connections {
    pub(crate) fn connect(&mut self) {
        self.count += 1;
    }

    pub(crate) fn disconnect(&mut self, node: &std::path::Path) {
        match self.count.checked_sub(1) {
            Some(count) => self.count = count,
            None => warn!("Disconnect without matching connect on {}", node.display()),
        }
    }

    pub(crate) fn close(&mut self) {
        self.closed = true;
    }

    pub(crate) fn count(&self) -> usize {
        self.count
    }

    /// Closed for new consumers and none outstanding
    pub(crate) fn is_released(&self) -> bool {
        self.closed && self.count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn failed_stat_is_zeroed() {
        let stat = StatInfo::failed(ReplicaError::NotFound("x".into()));
        assert_eq!(stat.size(), 0);
        assert_eq!(stat.modified(), UNIX_EPOCH);
        assert!(!stat.is_ok());
    }

    #[test]
    fn unmaterialized_read_is_not_a_result() {
        let err = ReadInfo::default().into_result().unwrap_err();
        assert!(matches!(err, ReplicaError::Internal(_)));

        let err = ReadInfo::failed(ReplicaError::NotFound("y".into()))
            .into_result()
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn connections_never_go_negative() {
        let mut conns = Connections::default();
        conns.disconnect(Path::new("n"));
        assert_eq!(conns.count(), 0);

        conns.connect();
        conns.connect();
        conns.disconnect(Path::new("n"));
        assert_eq!(conns.count(), 1);
        assert!(!conns.is_released());

        conns.close();
        assert!(!conns.is_released());
        conns.disconnect(Path::new("n"));
        assert!(conns.is_released());
    }
}
