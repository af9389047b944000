pub mod converter;
pub mod image_codec;
pub mod metrics;
pub mod providers;
pub mod references;
pub mod storage;
pub mod validator;

pub use converter::{ConvertError, GeneratedImage, StyleConverter};
pub use references::{ReferenceImage, ReferenceSet};
pub use storage::{OutputStore, StoredOutput};
pub use validator::{ImageValidator, UploadError};
