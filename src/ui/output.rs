//! Output functions for consistent CLI formatting

use super::context::UiContext;
use console::style;

/// Display a success step
pub fn step_ok(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        println!("{} {}", style("✓").green(), message);
    } else {
        println!("{} {}", style("[OK]").green(), message);
    }
}

/// Display a success step with a dimmed detail
pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    step_ok(ctx, &format!("{} {}", message, style(detail).dim()));
}

/// Display a warning step with a hint line
pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    if ctx.use_fancy_output() {
        println!("{} {}", style("!").yellow(), message);
    } else {
        println!("{} {}", style("[WARN]").yellow(), message);
    }
    println!("  {}", style(hint).dim());
}

/// Display an aligned key/value pair
pub fn key_value(key: &str, value: &str) {
    println!("  {:<12} {}", style(key).bold(), value);
}
