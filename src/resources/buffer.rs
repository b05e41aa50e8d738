//! Reference-counted byte buffers charged against the memory budget

use super::manager::Shared;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct BufferInner {
    shared: Arc<Shared>,
    refs: AtomicUsize,
    len: usize,
    data: Mutex<Option<Arc<[u8]>>>,
}

/// One reference to an immutable block of bytes
///
/// Every `Buffer` value is a counted reference: cloning acquires, dropping
/// releases. When the last reference goes away the bytes are freed and
/// their length is returned to the owning manager's memory budget.
pub struct Buffer {
    inner: Arc<BufferInner>,
}

impl Buffer {
    /// Wrap freshly read bytes; the caller already charged them
    pub(super) fn new(shared: Arc<Shared>, data: Vec<u8>) -> Self {
        let len = data.len();
        Self {
            inner: Arc::new(BufferInner {
                shared,
                refs: AtomicUsize::new(1),
                len,
                data: Mutex::new(Some(Arc::from(data))),
            }),
        }
    }

    /// Acquire another reference to the same bytes
    ///
    /// # Panics
    ///
    /// Panics if the buffer was already freed. A live handle keeps the count
    /// above zero, so this only fires on a broken reference count.
    pub fn acquire(&self) -> Buffer {
        let previous = self.inner.refs.fetch_add(1, Ordering::AcqRel);
        assert!(previous > 0, "buffer acquired after its last reference was released");
        Buffer {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Number of live references
    pub fn ref_count(&self) -> usize {
        self.inner.refs.load(Ordering::Acquire)
    }

    /// Current bytes
    pub fn data(&self) -> Arc<[u8]> {
        self.inner
            .data
            .lock()
            .as_ref()
            .map(Arc::clone)
            .unwrap_or_else(|| Arc::from(Vec::<u8>::new()))
    }

    /// Length charged against the memory budget
    pub fn len(&self) -> usize {
        self.inner.len
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    /// True when both handles refer to the same underlying block
    #[cfg(test)]
    pub(crate) fn ptr_eq(&self, other: &Buffer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Clone for Buffer {
    fn clone(&self) -> Self {
        self.acquire()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if self.inner.refs.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }

        let freed = self.inner.data.lock().take();
        if let Some(bytes) = freed {
            self.inner.shared.discharge(bytes.len() as u64);
        }
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.inner.len)
            .field("refs", &self.ref_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::resources::ResourceManager;
    use tempfile::TempDir;

    #[tokio::test]
    async fn release_frees_only_after_last_reference() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data");
        std::fs::write(&path, b"0123456789").unwrap();
        let res = ResourceManager::new(1024, 1).unwrap();

        let first = res.read_path(&path, 10).await.unwrap();
        let second = first.acquire();
        assert_eq!(first.ref_count(), 2);
        assert!(first.ptr_eq(&second));
        assert_eq!(res.memory().0, 10);

        drop(first);
        assert_eq!(second.ref_count(), 1);
        assert_eq!(res.memory().0, 10);
        assert_eq!(second.data().as_ref(), b"0123456789");

        drop(second);
        assert_eq!(res.memory().0, 0);
    }

    #[tokio::test]
    async fn clone_acquires() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data");
        std::fs::write(&path, b"abc").unwrap();
        let res = ResourceManager::new(1024, 1).unwrap();

        let buf = res.read_path(&path, 3).await.unwrap();
        let copies: Vec<_> = (0..4).map(|_| buf.clone()).collect();
        assert_eq!(buf.ref_count(), 5);

        drop(copies);
        assert_eq!(buf.ref_count(), 1);
        assert_eq!(res.memory().0, 3);
        assert_eq!(buf.len(), 3);
        assert!(!buf.is_empty());
    }

    #[tokio::test]
    async fn empty_file_buffer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty");
        std::fs::write(&path, b"").unwrap();
        let res = ResourceManager::new(8, 1).unwrap();

        let buf = res.read_path(&path, 0).await.unwrap();
        assert!(buf.is_empty());
        assert!(buf.data().is_empty());
        drop(buf);
        assert_eq!(res.memory().0, 0);
    }
}
