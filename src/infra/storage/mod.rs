//! Artifact storage backends.
//!
//! Stores are best-effort collaborators: every failure is reported inside the
//! returned [`StoredArtifact`] instead of as an error, and callers never let a
//! storage outcome change a task's result.

pub mod local;
pub mod memory;

pub use local::LocalDirStore;
pub use memory::InMemoryStore;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outcome of a save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArtifact {
    /// Whether the artifact was stored.
    pub success: bool,
    /// URL or local path of the stored artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StoredArtifact {
    /// Successful save at `location`.
    pub fn stored(location: impl Into<String>) -> Self {
        Self {
            success: true,
            location: Some(location.into()),
            error: None,
        }
    }

    /// Failed save.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            location: None,
            error: Some(error.into()),
        }
    }
}

/// Destination for screenshots and page snapshots.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store raw bytes under `name`.
    async fn save_binary(&self, data: &[u8], name: &str, content_type: &str) -> StoredArtifact;

    /// Store text under `name`.
    async fn save_text(&self, content: &str, name: &str, content_type: &str) -> StoredArtifact;

    /// Upload an existing local file under `name`.
    async fn save_file(&self, path: &Path, name: &str, content_type: &str) -> StoredArtifact {
        match tokio::fs::read(path).await {
            Ok(bytes) => self.save_binary(&bytes, name, content_type).await,
            Err(e) => StoredArtifact::failed(format!("cannot read {}: {e}", path.display())),
        }
    }
}

/// Reduce an artifact name to a single safe path component.
pub(crate) fn sanitize_name(name: &str) -> Option<String> {
    let base = Path::new(name).file_name()?.to_str()?;
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }
    Some(base.to_string())
}
