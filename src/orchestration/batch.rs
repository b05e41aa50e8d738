//! Copy batch: discover, wire, run, report

use crate::error::{ReplicaError, ReplicaResult};
use crate::node::{CopyFile, Node, SourceFile, Worker};
use crate::resources::{DiskUsage, ResourceManager};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Which directory to copy from and where to
#[derive(Debug, Clone)]
pub struct BatchPlan {
    pub source_dir: PathBuf,
    pub target_dirs: Vec<PathBuf>,
}

/// Outcome of a completed batch
#[derive(Debug, Clone, Copy)]
pub struct BatchSummary {
    /// Source files found
    pub files: usize,
    /// Copy tasks run
    pub works: usize,
    pub elapsed: Duration,
}

/// Point-in-time view of a running batch
#[derive(Debug, Clone)]
pub struct BatchStatus {
    pub done: usize,
    pub total: usize,
    pub memory_used: u64,
    pub memory_max: u64,
    pub disk: DiskUsage,
    pub tasks_waiting: usize,
    pub tasks_active: usize,
    pub elapsed: Duration,
}

impl BatchStatus {
    pub fn capture(res: &ResourceManager, done: usize, total: usize, elapsed: Duration) -> Self {
        let (memory_used, memory_max) = res.memory();
        let (tasks_waiting, tasks_active) = res.tasks();
        Self {
            done,
            total,
            memory_used,
            memory_max,
            disk: res.disk(),
            tasks_waiting,
            tasks_active,
            elapsed,
        }
    }

    pub fn percent_done(&self) -> f64 {
        percent(self.done as f64, self.total as f64)
    }

    pub fn memory_percent(&self) -> f64 {
        percent(self.memory_used as f64, self.memory_max as f64)
    }

    pub fn disk_percent(&self) -> f64 {
        percent(self.disk.in_flight() as f64, self.disk.max as f64)
    }

    /// Projected total run time, extrapolated from the completed share
    pub fn estimated_total(&self) -> Option<Duration> {
        if self.done == 0 {
            return None;
        }
        let total = self.elapsed.as_secs_f64() * self.total as f64 / self.done as f64;
        Some(Duration::from_secs_f64(total))
    }
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        part * 100.0 / whole
    }
}

/// Receives batch status while copies run
pub trait ProgressReporter: Send {
    /// Periodic refresh
    fn update(&mut self, status: &BatchStatus);

    /// The batch finished successfully
    fn finish(&mut self, status: &BatchStatus);

    /// The batch is being abandoned; remove any partial output
    fn clear(&mut self);
}

/// Reporter that discards everything
#[derive(Debug, Default)]
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn update(&mut self, _status: &BatchStatus) {}
    fn finish(&mut self, _status: &BatchStatus) {}
    fn clear(&mut self) {}
}

/// Regular files directly inside `dir`, sorted by name
async fn list_sources(dir: &Path) -> ReplicaResult<Vec<OsString>> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| ReplicaError::from_io("listing", dir, e))?;

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ReplicaError::from_io("listing", dir, e))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| ReplicaError::from_io("inspecting", &entry.path(), e))?;
        if file_type.is_file() {
            names.push(entry.file_name());
        }
    }

    names.sort();
    Ok(names)
}

/// Copy every file of `plan.source_dir` into each target directory
///
/// The first failing copy aborts the batch; its error is returned and the
/// remaining copies are cancelled.
pub async fn run_batch(
    res: &ResourceManager,
    plan: &BatchPlan,
    reporter: &mut dyn ProgressReporter,
    interval: Duration,
) -> ReplicaResult<BatchSummary> {
    let start = Instant::now();

    let names = list_sources(&plan.source_dir).await?;
    for dir in &plan.target_dirs {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| ReplicaError::from_io("creating", dir, e))?;
    }
    debug!(
        "Found {} files in {}",
        names.len(),
        plan.source_dir.display()
    );

    let mut nodes: Vec<Arc<dyn Node>> = Vec::with_capacity(names.len() * (plan.target_dirs.len() + 1));
    let mut works = JoinSet::new();

    for name in &names {
        let source: Arc<dyn Node> = Arc::new(SourceFile::new(res.clone(), plan.source_dir.join(name)));
        for dir in &plan.target_dirs {
            let copy = Arc::new(CopyFile::new(res.clone(), Arc::clone(&source), dir.join(name)));
            let worker = Arc::clone(&copy);
            works.spawn(async move { worker.work().await });
            nodes.push(copy);
        }
        nodes.push(source);
    }

    for node in &nodes {
        node.mark_no_more_connections();
    }

    let total = works.len();
    let mut done = 0;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            joined = works.join_next() => {
                let result = match joined {
                    None => break,
                    Some(Ok(result)) => result,
                    Some(Err(e)) => Err(ReplicaError::Internal(format!("copy task failed: {}", e))),
                };
                if let Err(e) = result {
                    reporter.clear();
                    works.shutdown().await;
                    return Err(e);
                }
                done += 1;
            }
            _ = ticker.tick() => {
                reporter.update(&BatchStatus::capture(res, done, total, start.elapsed()));
            }
        }
    }

    let elapsed = start.elapsed();
    reporter.finish(&BatchStatus::capture(res, done, total, elapsed));
    info!("Copied {} files to {} targets in {:?}", names.len(), plan.target_dirs.len(), elapsed);

    Ok(BatchSummary {
        files: names.len(),
        works: total,
        elapsed,
    })
}
