//! CLI command implementations

pub mod config;
pub mod copy;

pub use config::execute as config;
pub use copy::execute as copy;
