//! Document ingestion: upload local files, register a data source, and wait for indexing.

pub mod clock;
pub mod discover;
mod driver;

pub use clock::{Clock, TokioClock};
pub use discover::{ALLOWED_EXTENSIONS, DOCUMENT_PREFIX, DocumentFile, discover_documents};
pub use driver::{
    DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT, IngestError, IngestionDriver, IngestionOutcome,
    IngestionReport, IngestionSettings, PLACEHOLDER_ROLE_ARN,
};
