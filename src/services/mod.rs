pub mod file_materializer;
pub mod ingestion;
pub mod receiver_resolver;
pub mod revocation_matcher;
pub mod shadow_store;

pub use file_materializer::{FileMaterializer, Materialized};
pub use ingestion::{IngestOutcome, IngestionPipeline, STALE_MESSAGE_WINDOW};
pub use receiver_resolver::ReceiverResolver;
pub use revocation_matcher::{RevocationMatcher, RevocationOutcome, reconstruction_text};
pub use shadow_store::{SeenSet, ShadowStore};
