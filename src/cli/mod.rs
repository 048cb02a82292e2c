//! Command-line interface for lexacquire.

mod commands;
pub mod progress;

pub use commands::{is_verbose, run};
pub use progress::progress_println;
