//! In-memory artifact store, mainly for tests and dry runs.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{sanitize_name, ArtifactStore, StoredArtifact};

/// A stored artifact body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Raw bytes.
    pub data: Vec<u8>,
    /// MIME type given at save time.
    pub content_type: String,
}

/// Keeps artifacts in a map keyed by name. Locations are `memory://<name>`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    blobs: RwLock<HashMap<String, StoredBlob>>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a stored artifact by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<StoredBlob> {
        self.blobs.read().get(name).cloned()
    }

    /// Names of all stored artifacts, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.blobs.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of stored artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    fn put(&self, data: Vec<u8>, name: &str, content_type: &str) -> StoredArtifact {
        let Some(key) = sanitize_name(name) else {
            return StoredArtifact::failed(format!("invalid artifact name `{name}`"));
        };
        let location = format!("memory://{key}");
        self.blobs.write().insert(
            key,
            StoredBlob {
                data,
                content_type: content_type.to_string(),
            },
        );
        StoredArtifact::stored(location)
    }
}

#[async_trait]
impl ArtifactStore for InMemoryStore {
    async fn save_binary(&self, data: &[u8], name: &str, content_type: &str) -> StoredArtifact {
        self.put(data.to_vec(), name, content_type)
    }

    async fn save_text(&self, content: &str, name: &str, content_type: &str) -> StoredArtifact {
        if content.is_empty() {
            return StoredArtifact::failed("content is empty");
        }
        self.put(content.as_bytes().to_vec(), name, content_type)
    }
}
