use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

use crate::error::GatewayError;

/// Write-once storage for attachment bytes.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn write_file(&self, name: &str, bytes: &[u8]) -> Result<(), GatewayError>;

    /// Drop a file whose message was never recorded.
    async fn remove_file(&self, name: &str) -> Result<(), GatewayError>;
}

/// Stored name for an upload: `<unix millis>-<random hex>.<extension>`.
///
/// The extension is whatever follows the last `.` of the original name (the
/// whole name if it has none), reduced to ASCII alphanumerics, or `bin` when
/// nothing is left. The random part keeps uploads landing in the same
/// millisecond apart.
pub fn stored_filename(original: &str, now: DateTime<Utc>) -> String {
    let ext: String = original
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    let ext = if ext.is_empty() { "bin".to_string() } else { ext };
    format!("{}-{}.{}", now.timestamp_millis(), Uuid::new_v4().simple(), ext)
}

/// Decode the base64 part of a `<meta>,<base64>` data URL.
pub fn decode_data_url(data: &str) -> Result<Vec<u8>, GatewayError> {
    let (_, encoded) = data
        .split_once(',')
        .ok_or_else(|| GatewayError::malformed("file data is not a data URL"))?;
    B64.decode(encoded.trim())
        .map_err(|e| GatewayError::malformed(format!("file data: {}", e)))
}

/// Uploads stored as flat files under one directory.
pub struct DiskFileStore {
    dir: PathBuf,
}

impl DiskFileStore {
    pub async fn new(dir: PathBuf) -> io::Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Upload directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn checked_path(&self, name: &str) -> io::Result<PathBuf> {
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "bad upload name"));
        }
        Ok(self.file_path(name))
    }
}

#[async_trait]
impl FileStore for DiskFileStore {
    async fn write_file(&self, name: &str, bytes: &[u8]) -> Result<(), GatewayError> {
        let path = self.checked_path(name)?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        info!("File saved: {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    async fn remove_file(&self, name: &str) -> Result<(), GatewayError> {
        let path = self.checked_path(name)?;
        fs::remove_file(&path).await?;
        info!("File removed: {}", path.display());
        Ok(())
    }
}
