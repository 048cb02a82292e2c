//! Services shared by all drivers.

pub mod download;

pub use download::{DocumentTarget, Downloader, SaveOutcome};
