//! Leaf node backed directly by a file on disk

use super::{Connections, Node, ReadInfo, StatInfo};
use crate::resources::ResourceManager;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Values cached for one generation of a source file
#[derive(Debug, Default)]
struct Generation {
    stat: OnceCell<StatInfo>,
    read: OnceCell<ReadInfo>,
}

impl Generation {
    fn is_empty(&self) -> bool {
        !self.stat.initialized() && !self.read.initialized()
    }
}

/// A file read straight from the filesystem
///
/// The first `stat` / `read` fetches through the resource manager; later
/// calls get the cached values. After cleanup the next call fetches again.
#[derive(Debug)]
pub struct SourceFile {
    res: ResourceManager,
    path: PathBuf,
    connections: Mutex<Connections>,
    generation: Mutex<Arc<Generation>>,
}

impl SourceFile {
    pub fn new(res: ResourceManager, path: impl Into<PathBuf>) -> Self {
        Self {
            res,
            path: path.into(),
            connections: Mutex::new(Connections::default()),
            generation: Mutex::new(Arc::new(Generation::default())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Outstanding connections
    pub fn connections(&self) -> usize {
        self.connections.lock().count()
    }

    fn current(&self) -> Arc<Generation> {
        Arc::clone(&*self.generation.lock())
    }

    async fn cached_stat(&self, generation: &Generation) -> StatInfo {
        generation
            .stat
            .get_or_init(|| async {
                debug!("Stat source {}", self.path.display());
                StatInfo::from_result(self.res.stat_path(&self.path).await)
            })
            .await
            .clone()
    }

    /// Drop the cached generation once no consumer can still need it
    ///
    /// Safe to call any number of times: an empty generation is left alone,
    /// and a dropped generation releases its buffer reference exactly once.
    pub(crate) fn cleanup(&self) {
        if !self.connections.lock().is_released() {
            return;
        }

        let stale = {
            let mut generation = self.generation.lock();
            if generation.is_empty() {
                return;
            }
            std::mem::take(&mut *generation)
        };

        debug!("Released cached source {}", self.path.display());
        drop(stale);
    }
}

#[async_trait]
impl Node for SourceFile {
    fn connect(&self) {
        self.connections.lock().connect();
    }

    fn disconnect(&self) {
        self.connections.lock().disconnect(&self.path);
        self.cleanup();
    }

    fn mark_no_more_connections(&self) {
        self.connections.lock().close();
        self.cleanup();
    }

    async fn stat(&self) -> StatInfo {
        let generation = self.current();
        self.cached_stat(&generation).await
    }

    async fn read(&self) -> ReadInfo {
        let generation = self.current();
        generation
            .read
            .get_or_init(|| async {
                let stat = self.cached_stat(&generation).await;
                if let Some(e) = stat.error() {
                    return ReadInfo::failed(e.clone());
                }
                debug!("Read source {} ({} bytes)", self.path.display(), stat.size());
                ReadInfo::from_result(self.res.read_path(&self.path, stat.size()).await)
            })
            .await
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;
    use tempfile::TempDir;

    fn fixture(content: &[u8]) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("source");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn source_file_path() {
        let res = ResourceManager::new(3, 5).unwrap();
        let source = SourceFile::new(res, "foo");
        assert_eq!(source.path(), Path::new("foo"));
    }

    #[tokio::test]
    async fn source_file_exists() {
        let (_dir, path) = fixture(b"foo");
        let res = ResourceManager::new(3, 5).unwrap();
        let source = SourceFile::new(res.clone(), &path);
        source.connect();

        let stat = source.stat().await;
        assert!(stat.is_ok());
        assert_eq!(stat.size(), 3);
        assert_ne!(stat.modified(), UNIX_EPOCH);

        let again = source.stat().await;
        assert_eq!(again.modified(), stat.modified());
        assert_eq!(res.disk_totals().stats, 1);

        let read = source.read().await;
        let buffer = read.buffer().unwrap();
        assert_eq!(buffer.data().as_ref(), b"foo");
        // One reference cached, one handed out
        assert_eq!(buffer.ref_count(), 2);

        let second = source.read().await;
        assert!(second.buffer().unwrap().ptr_eq(buffer));
        assert_eq!(buffer.ref_count(), 3);
        assert_eq!(res.disk_totals().reads, 1);

        drop(second);
        drop(read);
        source.disconnect();
        source.mark_no_more_connections();
        assert_eq!(res.memory().0, 0);
    }

    #[tokio::test]
    async fn source_file_does_not_exist() {
        let dir = TempDir::new().unwrap();
        let res = ResourceManager::new(3, 5).unwrap();
        let source = SourceFile::new(res.clone(), dir.path().join("missing"));
        source.connect();

        let stat = source.stat().await;
        assert!(stat.error().unwrap().is_not_found());
        assert_eq!(stat.size(), 0);
        assert_eq!(stat.modified(), UNIX_EPOCH);

        let read = source.read().await;
        assert!(read.buffer().is_none());
        assert!(read.error().unwrap().is_not_found());
        // The cached stat error is reused instead of attempting a read
        assert_eq!(res.disk_totals().reads, 0);
        assert_eq!(res.disk_totals().stats, 1);

        source.disconnect();
        source.mark_no_more_connections();
    }

    #[tokio::test]
    async fn cleanup_waits_for_close_and_zero_connections() {
        let (_dir, path) = fixture(b"abcd");
        let res = ResourceManager::new(64, 2).unwrap();
        let source = SourceFile::new(res.clone(), &path);
        source.connect();
        source.connect();

        drop(source.read().await);
        assert_eq!(res.memory().0, 4);

        source.disconnect();
        source.disconnect();
        // Not closed yet: more consumers may still arrive
        assert_eq!(res.memory().0, 4);

        source.mark_no_more_connections();
        assert_eq!(res.memory().0, 0);
        assert_eq!(source.connections(), 0);
    }

    #[tokio::test]
    async fn repeated_cleanup_releases_once() {
        let (_dir, path) = fixture(b"xyz");
        let res = ResourceManager::new(64, 2).unwrap();
        let source = SourceFile::new(res.clone(), &path);
        source.connect();

        let held = source.read().await;
        let buffer = held.buffer().unwrap();
        assert_eq!(buffer.ref_count(), 2);

        source.disconnect();
        source.mark_no_more_connections();
        assert_eq!(buffer.ref_count(), 1);

        source.cleanup();
        source.cleanup();
        source.disconnect();
        assert_eq!(buffer.ref_count(), 1);
        assert_eq!(res.memory().0, 3);

        drop(held);
        assert_eq!(res.memory().0, 0);
    }

    #[tokio::test]
    async fn refetches_after_cleanup() {
        let (_dir, path) = fixture(b"one");
        let res = ResourceManager::new(64, 2).unwrap();
        let source = SourceFile::new(res.clone(), &path);
        source.mark_no_more_connections();

        assert_eq!(source.stat().await.size(), 3);
        source.cleanup();

        std::fs::write(&path, b"three").unwrap();
        assert_eq!(source.stat().await.size(), 5);
        assert_eq!(res.disk_totals().stats, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_readers_share_one_fetch() {
        let (_dir, path) = fixture(b"shared bytes");
        let res = ResourceManager::new(1024, 1).unwrap();
        let source = Arc::new(SourceFile::new(res.clone(), &path));

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let source = Arc::clone(&source);
                tokio::spawn(async move { source.read().await })
            })
            .collect();

        let mut reads = Vec::new();
        for reader in readers {
            reads.push(reader.await.unwrap());
        }

        let first = reads[0].buffer().unwrap();
        for read in &reads {
            assert!(read.buffer().unwrap().ptr_eq(first));
        }
        assert_eq!(first.ref_count(), 9);
        assert_eq!(res.disk_totals().reads, 1);
        assert_eq!(res.disk_totals().stats, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_stat_callers_share_one_lookup() {
        let (_dir, path) = fixture(b"stat me");
        let res = ResourceManager::new(1024, 1).unwrap();
        let source = Arc::new(SourceFile::new(res.clone(), &path));

        let callers: Vec<_> = (0..8)
            .map(|_| {
                let source = Arc::clone(&source);
                tokio::spawn(async move { source.stat().await })
            })
            .collect();

        let mut stats = Vec::new();
        for caller in callers {
            stats.push(caller.await.unwrap());
        }

        let expected = std::fs::metadata(&path).unwrap().modified().unwrap();
        for stat in &stats {
            assert!(stat.is_ok());
            assert_eq!(stat.modified(), expected);
            assert_eq!(stat.size(), 7);
        }
        assert_eq!(res.disk_totals().stats, 1);
    }
}
