pub mod connection;
pub mod store;

pub use connection::open_database;
pub use store::VectorStore;

use serde_json::Value;

/// One indexed unit: a fragment of a document plus its embedding.
///
/// Ids are caller-assigned and globally unique; the ingestion pipeline is
/// expected to derive them from its own chunk identities. Records are
/// immutable once inserted; updates are delete + reinsert.
#[derive(Debug, Clone)]
pub struct Record {
    pub id: String,
    pub embedding: Vec<f32>,
    pub content: String,
    pub metadata: Value,
}

impl Record {
    pub fn new(id: impl Into<String>, embedding: Vec<f32>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            embedding,
            content: content.into(),
            metadata: Value::Object(Default::default()),
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} dims, {} bytes)", self.id, self.embedding.len(), self.content.len())
    }
}
