//! Derived node: a copy of another node kept up to date on disk

use super::promise::Promise;
use super::{Connections, Node, ReadInfo, StatInfo, Worker};
use crate::error::{ReplicaError, ReplicaResult};
use crate::resources::ResourceManager;
use async_trait::async_trait;
use parking_lot::{Mutex, MutexGuard};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Result of one `work` run, shared by every consumer
#[derive(Debug)]
struct Outcome {
    stat: StatInfo,
    /// Empty while an up-to-date destination has not been read yet
    read: OnceCell<ReadInfo>,
}

impl Outcome {
    fn failed(error: ReplicaError) -> Self {
        Self {
            stat: StatInfo::failed(error.clone()),
            read: OnceCell::new_with(Some(ReadInfo::failed(error))),
        }
    }
}

#[derive(Debug, Default)]
struct CopyState {
    connections: Connections,
    started: bool,
    cleaned: bool,
}

/// A destination file copied from a source node when out of date
///
/// Construction connects to the source so it stays cached until `work`
/// has finished with it. `stat` and `read` wait for `work` to publish.
pub struct CopyFile {
    res: ResourceManager,
    source: Mutex<Option<Arc<dyn Node>>>,
    path: PathBuf,
    state: Mutex<CopyState>,
    outcome: Promise<Arc<Outcome>>,
}

impl CopyFile {
    pub fn new(res: ResourceManager, source: Arc<dyn Node>, path: impl Into<PathBuf>) -> Self {
        source.connect();
        Self {
            res,
            source: Mutex::new(Some(source)),
            path: path.into(),
            state: Mutex::new(CopyState::default()),
            outcome: Promise::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Outstanding connections
    pub fn connections(&self) -> usize {
        self.state().connections.count()
    }

    fn state(&self) -> MutexGuard<'_, CopyState> {
        self.state.lock()
    }

    fn source(&self) -> Option<Arc<dyn Node>> {
        self.source.lock().clone()
    }

    /// Bring the destination up to date and describe the result
    async fn copy_from(&self, source: &dyn Node) -> ReplicaResult<Outcome> {
        let source_stat = source.stat().await;
        if let Some(e) = source_stat.error() {
            return Err(e.clone());
        }

        let existing = match self.res.stat_path(&self.path).await {
            Ok(metadata) => Some(StatInfo::from_metadata(&metadata)?),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };

        if let Some(existing) = existing {
            let out_of_date = existing.size() != source_stat.size()
                || existing.modified() < source_stat.modified();
            if !out_of_date {
                debug!("Up to date: {}", self.path.display());
                return Ok(Outcome {
                    stat: existing,
                    read: OnceCell::new(),
                });
            }
        }

        let buffer = source.read().await.into_result()?;
        self.res.write_path(&self.path, &buffer).await?;
        info!("Copied {} ({} bytes)", self.path.display(), buffer.len());

        Ok(Outcome {
            stat: StatInfo::new(SystemTime::now(), buffer.len() as u64),
            read: OnceCell::new_with(Some(ReadInfo::loaded(buffer))),
        })
    }

    /// Read an up-to-date destination that `work` did not need to touch
    async fn materialize(&self, size: u64) -> ReadInfo {
        debug!("Reading unchanged copy {}", self.path.display());
        ReadInfo::from_result(self.res.read_path(&self.path, size).await)
    }

    /// Free the published result once no consumer can still need it
    pub(crate) fn cleanup(&self) {
        {
            let mut state = self.state();
            if state.cleaned || !state.connections.is_released() || !self.outcome.is_fulfilled() {
                return;
            }
            state.cleaned = true;
        }

        let source = self.source.lock().take();
        let outcome = self.outcome.take();
        debug!("Released cached copy {}", self.path.display());
        drop((source, outcome));
    }
}

#[async_trait]
impl Node for CopyFile {
    fn connect(&self) {
        self.state().connections.connect();
    }

    fn disconnect(&self) {
        self.state().connections.disconnect(&self.path);
        self.cleanup();
    }

    fn mark_no_more_connections(&self) {
        self.state().connections.close();
        self.cleanup();
    }

    async fn stat(&self) -> StatInfo {
        self.outcome.wait().await.stat.clone()
    }

    async fn read(&self) -> ReadInfo {
        let outcome = self.outcome.wait().await;
        // Two callers can both find no cached bytes here. Rather than let each
        // read the destination, duplicate reads are deliberately collapsed:
        // the first caller fetches and the rest wait on the cell.
        outcome
            .read
            .get_or_init(|| self.materialize(outcome.stat.size()))
            .await
            .clone()
    }
}

#[async_trait]
impl Worker for CopyFile {
    async fn work(&self) -> ReplicaResult<()> {
        {
            let mut state = self.state();
            if state.started {
                return Err(ReplicaError::Internal(format!(
                    "copy to {} was already run",
                    self.path.display()
                )));
            }
            state.started = true;
        }

        let task = self.res.begin_task();
        let source = self
            .source()
            .ok_or_else(|| ReplicaError::Internal("copy has no source".to_string()))?;

        let outcome = match self.copy_from(source.as_ref()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Copy to {} failed: {}", self.path.display(), e);
                Outcome::failed(e)
            }
        };
        let error = outcome.stat.error().cloned();
        self.outcome.fulfill(Arc::new(outcome));

        source.disconnect();
        drop(source);
        drop(task);
        self.cleanup();

        match error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for CopyFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopyFile")
            .field("path", &self.path)
            .field("state", &*self.state())
            .field("published", &self.outcome.is_fulfilled())
            .finish()
    }
}
