use crate::dtos::ConvertResponse;
use crate::services::image_codec::normalize_to_rgb_png;
use crate::services::metrics::record_conversion;
use crate::services::{ConvertError, ImageValidator, UploadError};
use crate::startup::AppState;
use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use bytes::{Bytes, BytesMut};
use service_core::error::AppError;

/// Multipart field carrying the photo.
pub const IMAGE_FIELD: &str = "image";

const CLIENT_NOT_INITIALIZED: &str = "GenAI client not initialized";
const GENERATION_FAILED: &str = "Failed to generate avatar";
const UPSTREAM_FAILED: &str = "Avatar generation service error";

struct Upload {
    file_name: String,
    data: Bytes,
}

/// POST /convert - turn the uploaded photo into a Notion-style avatar.
pub async fn convert_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ConvertResponse>, AppError> {
    if !state.converter.is_initialized() {
        record_conversion("not_initialized");
        return Err(AppError::ServerError(CLIENT_NOT_INITIALIZED.to_string()));
    }

    let upload = match multipart {
        Ok(mut multipart) => read_upload(&mut multipart, &state.validator).await,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Request is not a multipart upload");
            Err(UploadError::NoFileProvided)
        }
    }
    .map_err(|e| {
        tracing::warn!(reason = %e, "Rejected upload");
        record_conversion("rejected");
        AppError::from(e)
    })?;

    tracing::info!(
        file_name = %upload.file_name,
        size = upload.data.len(),
        "Processing image"
    );

    let data = upload.data;
    let user_png = match tokio::task::spawn_blocking(move || normalize_to_rgb_png(&data)).await {
        Ok(Ok(png)) => Bytes::from(png),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, file_name = %upload.file_name, "Upload is not a readable image");
            record_conversion("rejected");
            return Err(UploadError::InvalidImageData.into());
        }
        Err(e) => {
            record_conversion("internal_error");
            return Err(AppError::InternalError(anyhow::anyhow!(
                "image decode task failed: {}",
                e
            )));
        }
    };

    let generated = match state.converter.convert(user_png).await {
        Ok(Some(image)) => image,
        Ok(None) => {
            record_conversion("no_image");
            return Err(AppError::ServerError(GENERATION_FAILED.to_string()));
        }
        Err(ConvertError::ClientNotInitialized) => {
            record_conversion("not_initialized");
            return Err(AppError::ServerError(CLIENT_NOT_INITIALIZED.to_string()));
        }
        Err(ConvertError::Upstream(_)) => {
            record_conversion("upstream_error");
            return Err(AppError::ServerError(UPSTREAM_FAILED.to_string()));
        }
    };

    let stored = state.store.save_png(&generated.png).await.map_err(|e| {
        record_conversion("internal_error");
        AppError::InternalError(anyhow::Error::new(e).context("saving generated avatar"))
    })?;

    record_conversion("success");
    Ok(Json(ConvertResponse::converted(stored)))
}

/// Finds the `image` file field, validates its name, then reads it with the
/// size cap applied chunk by chunk.
async fn read_upload(
    multipart: &mut Multipart,
    validator: &ImageValidator,
) -> Result<Upload, UploadError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(UploadError::NoFileProvided),
            Err(e) => return Err(multipart_error(e, validator)),
        };

        // A part without a filename is a plain form value, not a file.
        if field.name() != Some(IMAGE_FIELD) || field.file_name().is_none() {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        validator.validate_name(Some(&file_name))?;

        let data = read_capped(field, validator).await?;
        return Ok(Upload { file_name, data });
    }
}

async fn read_capped(mut field: Field<'_>, validator: &ImageValidator) -> Result<Bytes, UploadError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e, validator))?
    {
        validator.validate_size(buf.len() + chunk.len())?;
        buf.extend_from_slice(&chunk);
    }
    validator.validate_size(buf.len())?;
    Ok(buf.freeze())
}

fn multipart_error(err: MultipartError, validator: &ImageValidator) -> UploadError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return UploadError::FileTooLarge {
            max_bytes: validator.max_bytes(),
        };
    }
    tracing::warn!(error = %err.body_text(), "Malformed multipart body");
    UploadError::NoFileProvided
}
