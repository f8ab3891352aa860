//! Ingestion adapters
//!
//! Three thin call sites that turn external shapes into
//! `Vec<DesiredAssignment>` and hand them to the reconciliation engine.
//! None of them contain merge logic of their own.

pub mod bulk_entry;
pub mod extraction_approval;
pub mod forecast_import;

pub use bulk_entry::BulkEntryRequest;
pub use extraction_approval::{ApprovalRequest, TranscriptExtraction};
pub use forecast_import::{ForecastImportRequest, ImportSummary};
