//! lexacquire - legal document acquisition from per-country law repositories.
//!
//! Each country driver walks a fixed, hand-inspected site structure, downloads
//! laws and codes as PDF/text files, and records one metadata entry per saved
//! document. The shared pieces (fetcher, markup extraction, filename
//! sanitizing, download-once policy and the metadata ledger) live here so the
//! drivers only supply selectors and termination rules.

pub mod cli;
pub mod config;
pub mod drivers;
pub mod error;
pub mod ledger;
pub mod models;
pub mod render;
pub mod scrapers;
pub mod services;
pub mod storage;

pub use error::ScrapeError;
pub use ledger::Ledger;
pub use models::{DocumentFormat, DocumentRecord};
