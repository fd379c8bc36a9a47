use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-side processing status of an uploaded asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    Processing,
    Active,
    Failed,
    #[default]
    #[serde(other)]
    StateUnspecified,
}

/// Handle to a file held by the hosted inference service.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFile {
    pub name: String,
    pub uri: String,
    pub mime_type: String,
    pub state: FileState,
    pub error: Option<String>,
    pub expiration_time: Option<DateTime<Utc>>,
}

impl RemoteFile {
    pub fn is_ready(&self) -> bool {
        self.state == FileState::Active
    }
}

/// The two file operations consumed from the hosted service.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Uploads a local file and returns its handle.
    async fn upload_file(&self, path: &Path, mime_type: &str) -> Result<RemoteFile>;

    /// Re-reads a handle by name to observe its current state.
    async fn get_file(&self, name: &str) -> Result<RemoteFile>;
}
