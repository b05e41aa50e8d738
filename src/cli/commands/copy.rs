//! Copy command - copy a source directory into target directories

use crate::cli::args::CopyArgs;
use crate::config::Config;
use crate::error::ReplicaResult;
use crate::orchestration::{run_batch, BatchPlan};
use crate::ui::{self, BatchProgress, UiContext};
use std::time::Duration;
use tracing::debug;

/// Execute the copy command
pub async fn execute(args: CopyArgs, config: &Config) -> ReplicaResult<()> {
    let ctx = UiContext::detect();

    let mut limits = config.limits.clone();
    if let Some(memory) = args.memory {
        limits.memory_bytes = memory;
    }
    if let Some(disk_ops) = args.disk_ops {
        limits.disk_ops = disk_ops;
    }
    let res = limits.resource_manager()?;
    debug!(
        "Limits: {} bytes memory, {} disk ops",
        limits.memory_bytes, limits.disk_ops
    );

    let plan = BatchPlan {
        source_dir: args.source,
        target_dirs: args.targets,
    };
    let mut progress = BatchProgress::new(&ctx, config.progress.enabled && !args.no_progress);
    let interval = Duration::from_millis(config.progress.interval_ms.max(1));

    let summary = run_batch(&res, &plan, &mut progress, interval).await?;

    ui::step_ok_detail(
        &ctx,
        &format!(
            "Copied {} files into {} targets",
            summary.files,
            plan.target_dirs.len()
        ),
        &format!("({:.2}s)", summary.elapsed.as_secs_f64()),
    );

    Ok(())
}
