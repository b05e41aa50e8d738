//! UI module for consistent CLI output
//!
//! Uses `indicatif` for the live progress bar in interactive terminals,
//! with automatic fallback to plain lines in CI/non-interactive environments.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{key_value, step_ok, step_ok_detail, step_warn_hint};
pub use progress::{format_bytes, status_line, BatchProgress};
