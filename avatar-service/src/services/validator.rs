//! Upload validation.
//!
//! Name checks run before the body is read; the size check runs while the
//! multipart field is streamed so oversized uploads are never fully buffered.

use service_core::error::AppError;
use thiserror::Error;

/// Extensions accepted for uploads, compared case-insensitively.
pub const ALLOWED_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "bmp", "webp"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("No image file uploaded")]
    NoFileProvided,

    #[error("No file selected")]
    NoFileSelected,

    #[error("Invalid file type. Please upload PNG, JPG, JPEG, GIF, BMP, or WebP")]
    InvalidFileType,

    #[error("File too large. Maximum size is {}MB", .max_bytes / (1024 * 1024))]
    FileTooLarge { max_bytes: usize },

    #[error("Uploaded file is not a readable image")]
    InvalidImageData,
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        AppError::bad_request(err.to_string())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ImageValidator {
    max_bytes: usize,
}

impl ImageValidator {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn validate_name(&self, file_name: Option<&str>) -> Result<(), UploadError> {
        let name = file_name.ok_or(UploadError::NoFileProvided)?;
        if name.is_empty() {
            return Err(UploadError::NoFileSelected);
        }
        if !has_allowed_extension(name) {
            return Err(UploadError::InvalidFileType);
        }
        Ok(())
    }

    pub fn validate_size(&self, size: usize) -> Result<(), UploadError> {
        if size > self.max_bytes {
            return Err(UploadError::FileTooLarge {
                max_bytes: self.max_bytes,
            });
        }
        Ok(())
    }
}

fn has_allowed_extension(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_UPLOAD_BYTES;

    fn validator() -> ImageValidator {
        ImageValidator::new(DEFAULT_MAX_UPLOAD_BYTES)
    }

    #[test]
    fn accepts_every_allowed_extension_in_any_case() {
        for name in [
            "me.png", "me.JPG", "me.jpeg", "me.Gif", "me.bmp", "me.WEBP", "a.b.c.png",
        ] {
            assert_eq!(validator().validate_name(Some(name)), Ok(()), "{}", name);
        }
    }

    #[test]
    fn rejects_names_without_allowed_extension() {
        for name in ["photo", "photo.tiff", "photo.png.exe", "png", "photo."] {
            assert_eq!(
                validator().validate_name(Some(name)),
                Err(UploadError::InvalidFileType),
                "{}",
                name
            );
        }
    }

    #[test]
    fn missing_and_empty_names() {
        assert_eq!(
            validator().validate_name(None),
            Err(UploadError::NoFileProvided)
        );
        assert_eq!(
            validator().validate_name(Some("")),
            Err(UploadError::NoFileSelected)
        );
    }

    #[test]
    fn size_limit_is_inclusive() {
        let v = validator();
        assert_eq!(v.validate_size(DEFAULT_MAX_UPLOAD_BYTES), Ok(()));
        assert_eq!(
            v.validate_size(DEFAULT_MAX_UPLOAD_BYTES + 1),
            Err(UploadError::FileTooLarge {
                max_bytes: DEFAULT_MAX_UPLOAD_BYTES
            })
        );
    }

    #[test]
    fn too_large_message_names_limit() {
        let err = validator()
            .validate_size(15 * 1024 * 1024)
            .unwrap_err();
        assert_eq!(err.to_string(), "File too large. Maximum size is 10MB");
    }
}
