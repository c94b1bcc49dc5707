//! Filesystem-backed artifact store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{sanitize_name, ArtifactStore, StoredArtifact};

/// Writes artifacts as files under a root directory, created on first use.
#[derive(Debug, Clone)]
pub struct LocalDirStore {
    root: PathBuf,
}

impl LocalDirStore {
    /// Store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn write(&self, bytes: &[u8], name: &str) -> StoredArtifact {
        let Some(file_name) = sanitize_name(name) else {
            return StoredArtifact::failed(format!("invalid artifact name `{name}`"));
        };
        if let Err(e) = tokio::fs::create_dir_all(&self.root).await {
            warn!(root = %self.root.display(), error = %e, "cannot create artifact directory");
            return StoredArtifact::failed(e.to_string());
        }
        let path = self.root.join(file_name);
        match tokio::fs::write(&path, bytes).await {
            Ok(()) => {
                debug!(path = %path.display(), bytes = bytes.len(), "artifact stored");
                StoredArtifact::stored(path.display().to_string())
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "artifact write failed");
                StoredArtifact::failed(e.to_string())
            }
        }
    }
}

#[async_trait]
impl ArtifactStore for LocalDirStore {
    async fn save_binary(&self, data: &[u8], name: &str, _content_type: &str) -> StoredArtifact {
        self.write(data, name).await
    }

    async fn save_text(&self, content: &str, name: &str, _content_type: &str) -> StoredArtifact {
        if content.is_empty() {
            return StoredArtifact::failed("content is empty");
        }
        self.write(content.as_bytes(), name).await
    }
}
