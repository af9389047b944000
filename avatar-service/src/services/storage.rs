//! Local storage for generated avatars.

use chrono::{DateTime, Local};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// URL prefix under which the output directory is served.
pub const OUTPUT_URL_PREFIX: &str = "/outputs";
pub const OUTPUT_MIME_TYPE: &str = "image/png";

const FILE_PREFIX: &str = "notion_avatar_";
const MAX_NAME_ATTEMPTS: u32 = 1000;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Output storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No free output file name for {0}")]
    NamesExhausted(String),
}

/// Where a stored avatar can be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredOutput {
    pub file_name: String,
    pub file_path: String,
    pub mime_type: &'static str,
}

/// Flat directory of generated PNGs. Files are never removed.
#[derive(Debug, Clone)]
pub struct OutputStore {
    base_path: PathBuf,
}

impl OutputStore {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Writes `png` as `notion_avatar_<YYYYMMDD_HHMMSS>.png`.
    pub async fn save_png(&self, png: &[u8]) -> Result<StoredOutput, StorageError> {
        self.save_png_at(Local::now(), png).await
    }

    /// Files are created exclusively; a name already taken within the same
    /// second gets a `_1`, `_2`, ... suffix instead of being overwritten.
    pub async fn save_png_at(
        &self,
        now: DateTime<Local>,
        png: &[u8],
    ) -> Result<StoredOutput, StorageError> {
        let timestamp = now.format("%Y%m%d_%H%M%S").to_string();

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let file_name = output_file_name(&timestamp, attempt);
            let path = self.base_path.join(&file_name);

            let mut file = match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };

            let written = async {
                file.write_all(png).await?;
                file.flush().await
            }
            .await;

            if let Err(e) = written {
                let _ = fs::remove_file(&path).await;
                return Err(e.into());
            }

            tracing::info!(file_name = %file_name, bytes = png.len(), "Saved generated image");
            return Ok(StoredOutput {
                file_path: format!("{}/{}", OUTPUT_URL_PREFIX, file_name),
                file_name,
                mime_type: OUTPUT_MIME_TYPE,
            });
        }

        Err(StorageError::NamesExhausted(timestamp))
    }
}

fn output_file_name(timestamp: &str, attempt: u32) -> String {
    if attempt == 0 {
        format!("{}{}.png", FILE_PREFIX, timestamp)
    } else {
        format!("{}{}_{}.png", FILE_PREFIX, timestamp, attempt)
    }
}
