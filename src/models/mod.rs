//! Data models for acquired legal documents.

mod format;
mod record;

pub use format::DocumentFormat;
pub use record::{DocumentRecord, ExtraFields, SCHEMA_VERSION};
