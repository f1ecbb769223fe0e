// Ingestion coordination between the range fetcher and the feature store
mod coordinator;

pub use coordinator::{IngestError, IngestReport, IngestionCoordinator, QueryError};
