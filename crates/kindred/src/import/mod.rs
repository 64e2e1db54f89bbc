//! CSV import of family exports: people first, then parent links and
//! partnerships resolved through the export's own references.

mod parser;
pub mod router;
pub mod service;

use crate::records::RecordServiceError;

pub use router::import_router;
pub use service::{FamilyImporter, ImportSummary, SkippedEntry};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read family export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid family CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("could not apply family export: {0}")]
    Records(#[from] RecordServiceError),
}
