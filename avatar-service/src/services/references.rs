//! Style reference images, loaded once at startup and shared read-only.

use super::image_codec::normalize_to_rgb_png;
use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ReferenceImage {
    pub name: String,
    /// RGB PNG bytes.
    pub png: Bytes,
}

/// Ordered, immutable set of style exemplars. Cloning shares the images.
#[derive(Debug, Clone)]
pub struct ReferenceSet {
    images: Arc<[ReferenceImage]>,
}

impl ReferenceSet {
    pub fn new(images: Vec<ReferenceImage>) -> Self {
        Self {
            images: images.into(),
        }
    }

    /// Loads `files` from `dir` in order.
    ///
    /// Missing or unreadable files are logged and skipped; the service still
    /// starts with whatever subset loaded.
    pub async fn load(dir: &Path, files: &[String]) -> Self {
        let mut images = Vec::with_capacity(files.len());

        for name in files {
            let path = dir.join(name);
            let raw = match tokio::fs::read(&path).await {
                Ok(raw) => raw,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::warn!(path = %path.display(), "Reference image not found");
                    continue;
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Error reading reference image");
                    continue;
                }
            };

            match tokio::task::spawn_blocking(move || normalize_to_rgb_png(&raw)).await {
                Ok(Ok(png)) => {
                    tracing::info!(name = %name, "Loaded reference image");
                    images.push(ReferenceImage {
                        name: name.clone(),
                        png: Bytes::from(png),
                    });
                }
                Ok(Err(e)) => {
                    tracing::error!(path = %path.display(), error = %e, "Error loading reference image");
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Reference decode task failed");
                }
            }
        }

        tracing::info!(count = images.len(), "Loaded reference images");
        Self::new(images)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReferenceImage> {
        self.images.iter()
    }
}
