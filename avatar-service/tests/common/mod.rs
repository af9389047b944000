#![allow(dead_code)]

use avatar_service::config::{
    AssetConfig, AvatarConfig, GoogleConfig, ModelConfig, UploadLimits, DEFAULT_MAX_UPLOAD_BYTES,
};
use avatar_service::services::providers::{ImageProvider, InlinePayload, ResponsePart};
use avatar_service::services::{
    ImageValidator, OutputStore, ReferenceImage, ReferenceSet, StyleConverter,
};
use avatar_service::startup::{build_router, AppState};
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use secrecy::Secret;
use service_core::config::Config as CoreConfig;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const BOUNDARY: &str = "avatar-test-boundary";

/// Router plus the directories it writes to.
pub struct TestApp {
    pub router: Router,
    pub root: PathBuf,
    pub output_dir: PathBuf,
}

impl TestApp {
    /// Router with three in-memory references and the given provider.
    pub async fn with_provider(provider: Option<Arc<dyn ImageProvider>>) -> Self {
        let root = PathBuf::from(format!("target/test-avatar-{}", Uuid::new_v4()));
        let output_dir = root.join("outputs");
        let store = OutputStore::new(&output_dir)
            .await
            .expect("Failed to create output store");

        let references = ReferenceSet::new(
            (0..3u8)
                .map(|i| ReferenceImage {
                    name: format!("reference-{}.png", i),
                    png: Bytes::from(png_bytes(4, 4, i * 40)),
                })
                .collect(),
        );

        let state = AppState {
            converter: Arc::new(StyleConverter::new(provider, references)),
            store,
            validator: ImageValidator::new(DEFAULT_MAX_UPLOAD_BYTES),
            public_dir: root.clone(),
            api_key_configured: true,
        };

        TestApp {
            router: build_router(state),
            root,
            output_dir,
        }
    }

    /// POST a multipart body to `/convert` and return status and JSON body.
    pub async fn convert(&self, content_type: &str, body: Vec<u8>) -> (StatusCode, serde_json::Value) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/convert")
                    .header("content-type", content_type)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).expect("response body is not JSON");
        (status, json)
    }

    /// POST a single `image` file field.
    pub async fn upload(&self, file_name: &str, data: &[u8]) -> (StatusCode, serde_json::Value) {
        let (content_type, body) = multipart_body(&[("image", Some(file_name), data)]);
        self.convert(&content_type, body).await
    }

    pub fn cleanup(&self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

/// Config pointing at a fresh temp tree, listening on a random port.
pub fn test_config(api_key: Option<&str>) -> AvatarConfig {
    let root = PathBuf::from(format!("target/test-avatar-{}", Uuid::new_v4()));
    AvatarConfig {
        common: CoreConfig { port: 0 },
        google: GoogleConfig {
            api_key: api_key.map(|k| Secret::new(k.to_string())),
        },
        models: ModelConfig {
            image_model: "gemini-2.5-flash-image-preview".to_string(),
            api_base: "http://127.0.0.1:9".to_string(),
            request_timeout_secs: 5,
        },
        assets: AssetConfig {
            output_dir: root.join("outputs"),
            public_dir: root,
            reference_files: vec!["reference-avatar-2.png".to_string()],
        },
        limits: UploadLimits {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        },
    }
}

/// Builds a `multipart/form-data` body; `None` file name means a plain field.
pub fn multipart_body(fields: &[(&str, Option<&str>, &[u8])]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for (name, file_name, data) in fields {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match file_name {
            Some(file_name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n",
                    name, file_name
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

pub fn png_bytes(width: u32, height: u32, shade: u8) -> Vec<u8> {
    encode(
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb([shade, 255 - shade, 128]))),
        ImageFormat::Png,
    )
}

/// A small photo-like JPEG (a gradient, a couple of KB).
pub fn jpeg_bytes() -> Vec<u8> {
    let img = ImageBuffer::from_fn(48, 48, |x, y| Rgb([(x * 5) as u8, (y * 5) as u8, ((x + y) * 2) as u8]));
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg)
}

fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

pub fn base64_image_part(data: &[u8]) -> ResponsePart {
    ResponsePart::InlineImage {
        mime_type: "image/png".to_string(),
        payload: InlinePayload::Base64(BASE64.encode(data)),
    }
}

pub fn binary_image_part(data: &[u8]) -> ResponsePart {
    ResponsePart::InlineImage {
        mime_type: "image/png".to_string(),
        payload: InlinePayload::Binary(Bytes::copy_from_slice(data)),
    }
}
