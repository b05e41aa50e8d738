//! Resource manager: disk-op and memory admission

use super::buffer::Buffer;
use crate::error::{ReplicaError, ReplicaResult};
use parking_lot::{Mutex, MutexGuard};
use std::fs::Metadata;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Notify;
use tracing::trace;

/// Disk operations currently in flight, plus the shared cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    pub stats: usize,
    pub reads: usize,
    pub writes: usize,
    pub max: usize,
}

impl DiskUsage {
    /// Total operations in flight across all three kinds
    pub fn in_flight(&self) -> usize {
        self.stats + self.reads + self.writes
    }
}

/// Disk operations admitted since the manager was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskTotals {
    pub stats: u64,
    pub reads: u64,
    pub writes: u64,
    /// Highest number of operations ever in flight at once
    pub peak_in_flight: usize,
}

#[derive(Debug, Clone, Copy)]
enum DiskOp {
    Stat,
    Read,
    Write,
}

#[derive(Debug)]
struct Counters {
    memory_used: u64,
    memory_max: u64,
    disk_stats: usize,
    disk_reads: usize,
    disk_writes: usize,
    disk_max: usize,
    tasks_waiting: usize,
    tasks_active: usize,
    totals: DiskTotals,
}

impl Counters {
    fn disk_in_flight(&self) -> usize {
        self.disk_stats + self.disk_reads + self.disk_writes
    }

    fn disk_full(&self) -> bool {
        self.disk_in_flight() >= self.disk_max
    }

    /// True when every other active task is parked waiting for memory
    fn is_last_task(&self) -> bool {
        self.tasks_active <= self.tasks_waiting + 1
    }

    /// Whether a read that does not fit may still be admitted
    ///
    /// Only while some other task could still release memory is it worth
    /// waiting: with nothing charged, waiting can never make room.
    fn may_overcommit(&self) -> bool {
        self.is_last_task() || self.memory_used == 0
    }

    fn start(&mut self, op: DiskOp) {
        match op {
            DiskOp::Stat => {
                self.disk_stats += 1;
                self.totals.stats += 1;
            }
            DiskOp::Read => {
                self.disk_reads += 1;
                self.totals.reads += 1;
            }
            DiskOp::Write => {
                self.disk_writes += 1;
                self.totals.writes += 1;
            }
        }
        self.totals.peak_in_flight = self.totals.peak_in_flight.max(self.disk_in_flight());
    }

    fn finish(&mut self, op: DiskOp) {
        let slot = match op {
            DiskOp::Stat => &mut self.disk_stats,
            DiskOp::Read => &mut self.disk_reads,
            DiskOp::Write => &mut self.disk_writes,
        };
        *slot = slot.saturating_sub(1);
    }
}

/// State shared between the manager handle and every buffer it created
#[derive(Debug)]
pub(super) struct Shared {
    counters: Mutex<Counters>,
    changed: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock()
    }

    fn broadcast(&self) {
        self.changed.notify_waiters();
    }

    /// Return `bytes` to the memory budget and wake every waiter
    pub(super) fn discharge(&self, bytes: u64) {
        {
            let mut counters = self.lock();
            counters.memory_used = counters.memory_used.saturating_sub(bytes);
        }
        self.broadcast();
    }
}

/// Process-wide admission controller
///
/// Cloning is cheap and yields another handle to the same counters.
#[derive(Debug, Clone)]
pub struct ResourceManager {
    shared: Arc<Shared>,
}

impl ResourceManager {
    /// Create a manager with a memory budget in bytes and a cap on
    /// concurrent disk operations
    pub fn new(memory_max: u64, disk_max: usize) -> ReplicaResult<Self> {
        if memory_max == 0 {
            return Err(ReplicaError::InvalidLimit {
                name: "memory",
                reason: "memory cap must be at least one byte".to_string(),
            });
        }
        if disk_max == 0 {
            return Err(ReplicaError::InvalidLimit {
                name: "disk_ops",
                reason: "at least one disk operation must be allowed".to_string(),
            });
        }

        Ok(Self {
            shared: Arc::new(Shared {
                counters: Mutex::new(Counters {
                    memory_used: 0,
                    memory_max,
                    disk_stats: 0,
                    disk_reads: 0,
                    disk_writes: 0,
                    disk_max,
                    tasks_waiting: 0,
                    tasks_active: 0,
                    totals: DiskTotals::default(),
                }),
                changed: Notify::new(),
            }),
        })
    }

    /// Register one unit of work. The task ends when the guard is dropped.
    pub fn begin_task(&self) -> ResourceTask {
        self.shared.lock().tasks_active += 1;
        ResourceTask {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Cancellation hook for admitted work.
    ///
    /// Does nothing: once a task is admitted it runs to completion or
    /// returns an error. Kept so callers have a stable entry point.
    pub fn cancel(&self) {
        trace!("cancel requested; in-flight work is not interruptible");
    }

    /// Look up metadata for `path` once a disk slot is free
    pub async fn stat_path(&self, path: &Path) -> ReplicaResult<Metadata> {
        let _slot = self.acquire_disk(DiskOp::Stat).await;
        fs::metadata(path)
            .await
            .map_err(|e| ReplicaError::from_io("stat", path, e))
    }

    /// Read `path` into a new buffer charged against the memory budget
    ///
    /// `expected_size` is reserved up front and corrected to the real length
    /// once the read completes.
    ///
    /// A read that does not fit under the memory cap waits for memory to be
    /// released, with two exceptions where it is admitted over the cap:
    /// the caller is the last task not parked on memory, or nothing is
    /// charged at all. The second case covers tasks blocked on a sibling's
    /// pending read, which are active but not counted as waiting. Two copies
    /// of one source larger than the cap would otherwise never start.
    /// The disk-op cap has no exception.
    pub async fn read_path(&self, path: &Path, expected_size: u64) -> ReplicaResult<Buffer> {
        let slot = self.admit_read(expected_size).await;

        match fs::read(path).await {
            Ok(data) => Ok(slot.settle(data)),
            Err(e) => Err(ReplicaError::from_io("reading", path, e)),
        }
    }

    /// Write the buffer's bytes to `path` once a disk slot is free
    pub async fn write_path(&self, path: &Path, buffer: &Buffer) -> ReplicaResult<()> {
        let _slot = self.acquire_disk(DiskOp::Write).await;
        fs::write(path, buffer.data().as_ref())
            .await
            .map_err(|e| ReplicaError::from_io("writing", path, e))
    }

    /// Memory used and memory cap, in bytes
    pub fn memory(&self) -> (u64, u64) {
        let counters = self.shared.lock();
        (counters.memory_used, counters.memory_max)
    }

    /// Disk operations in flight by kind, with the shared cap
    pub fn disk(&self) -> DiskUsage {
        let counters = self.shared.lock();
        DiskUsage {
            stats: counters.disk_stats,
            reads: counters.disk_reads,
            writes: counters.disk_writes,
            max: counters.disk_max,
        }
    }

    /// Disk operations admitted so far
    pub fn disk_totals(&self) -> DiskTotals {
        self.shared.lock().totals
    }

    /// Tasks waiting for memory and tasks active
    pub fn tasks(&self) -> (usize, usize) {
        let counters = self.shared.lock();
        (counters.tasks_waiting, counters.tasks_active)
    }

    async fn acquire_disk(&self, op: DiskOp) -> DiskSlot<'_> {
        loop {
            let notified = self.shared.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut counters = self.shared.lock();
                if !counters.disk_full() {
                    counters.start(op);
                    trace!(?op, in_flight = counters.disk_in_flight(), "disk slot admitted");
                    return DiskSlot {
                        shared: &self.shared,
                        op,
                        reserved: 0,
                    };
                }
            }

            notified.await;
        }
    }

    async fn admit_read(&self, expected_size: u64) -> DiskSlot<'_> {
        let mut waiting = WaitingMark {
            shared: &self.shared,
            active: false,
        };

        loop {
            let notified = self.shared.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut counters = self.shared.lock();
                waiting.clear(&mut counters);

                if !counters.disk_full() {
                    let fits = counters.memory_used.saturating_add(expected_size)
                        <= counters.memory_max;
                    if fits || counters.may_overcommit() {
                        if !fits {
                            trace!(
                                expected_size,
                                memory_used = counters.memory_used,
                                "read admitted over memory cap"
                            );
                        }
                        counters.memory_used += expected_size;
                        counters.start(DiskOp::Read);
                        return DiskSlot {
                            shared: &self.shared,
                            op: DiskOp::Read,
                            reserved: expected_size,
                        };
                    }
                    waiting.set(&mut counters);
                }
            }

            notified.await;
        }
    }
}

/// Guard for one registered task; ending it wakes every waiter
#[derive(Debug)]
pub struct ResourceTask {
    shared: Arc<Shared>,
}

impl Drop for ResourceTask {
    fn drop(&mut self) {
        {
            let mut counters = self.shared.lock();
            counters.tasks_active = counters.tasks_active.saturating_sub(1);
        }
        self.shared.broadcast();
    }
}

/// One admitted disk operation, released on drop along with any memory
/// still reserved for it
struct DiskSlot<'a> {
    shared: &'a Arc<Shared>,
    op: DiskOp,
    reserved: u64,
}

impl DiskSlot<'_> {
    /// Swap the reservation for a buffer charged with the real length
    fn settle(mut self, data: Vec<u8>) -> Buffer {
        let actual = data.len() as u64;
        {
            let mut counters = self.shared.lock();
            counters.memory_used = counters.memory_used - self.reserved + actual;
        }
        self.reserved = 0;
        Buffer::new(Arc::clone(self.shared), data)
    }
}

impl Drop for DiskSlot<'_> {
    fn drop(&mut self) {
        {
            let mut counters = self.shared.lock();
            counters.finish(self.op);
            counters.memory_used = counters.memory_used.saturating_sub(self.reserved);
        }
        self.shared.broadcast();
    }
}

/// Marks the calling task as parked on memory while set
struct WaitingMark<'a> {
    shared: &'a Shared,
    active: bool,
}

impl WaitingMark<'_> {
    fn set(&mut self, counters: &mut Counters) {
        counters.tasks_waiting += 1;
        self.active = true;
    }

    fn clear(&mut self, counters: &mut Counters) {
        if self.active {
            counters.tasks_waiting -= 1;
            self.active = false;
        }
    }
}

impl Drop for WaitingMark<'_> {
    fn drop(&mut self) {
        if self.active {
            let mut counters = self.shared.lock();
            counters.tasks_waiting = counters.tasks_waiting.saturating_sub(1);
        }
    }
}
