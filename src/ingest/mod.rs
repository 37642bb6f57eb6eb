//! Chat ingestion
//!
//! Finds the chat container in the host page, watches it for appended
//! message nodes and turns them into deduplicated `MessageRecord`s.

pub mod dedup;
pub mod extractor;
pub mod locator;
pub mod observer;

pub use extractor::MessageRecord;
pub use observer::{IngestState, MutationIngestor, RecordSink};
