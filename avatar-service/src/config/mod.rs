use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Uploads above this size are rejected (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Style exemplars, in the order they are shown to the model.
pub const DEFAULT_REFERENCE_FILES: [&str; 3] = [
    "reference-avatar-2.png",
    "reference-avatar-3.png",
    "reference-image-6.png",
];

const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";
const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct AvatarConfig {
    pub common: core_config::Config,
    pub google: GoogleConfig,
    pub models: ModelConfig,
    pub assets: AssetConfig,
    pub limits: UploadLimits,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// `None` when `GEMINI_API_KEY` is unset or empty.
    pub api_key: Option<Secret<String>>,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub image_model: String,
    pub api_base: String,
    /// Upstream request timeout; `0` waits forever.
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AssetConfig {
    /// Landing page, static assets and reference images.
    pub public_dir: PathBuf,
    /// Generated avatars, served under `/outputs`.
    pub output_dir: PathBuf,
    pub reference_files: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub max_upload_bytes: usize,
}

impl AvatarConfig {
    pub fn load() -> Result<Self, AppError> {
        // Loads .env as a side effect.
        let common = core_config::Config::load()?;

        let public_dir = PathBuf::from(get_env("PUBLIC_DIR", "public"));
        let output_dir = env::var("OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| public_dir.join("outputs"));

        Ok(AvatarConfig {
            common,
            google: GoogleConfig {
                api_key: env::var("GEMINI_API_KEY")
                    .ok()
                    .filter(|key| !key.trim().is_empty())
                    .map(Secret::new),
            },
            models: ModelConfig {
                image_model: get_env("GENAI_IMAGE_MODEL", DEFAULT_IMAGE_MODEL),
                api_base: get_env("GENAI_API_BASE", DEFAULT_API_BASE),
                request_timeout_secs: get_env_parsed(
                    "GENAI_REQUEST_TIMEOUT_SECS",
                    DEFAULT_REQUEST_TIMEOUT_SECS,
                )?,
            },
            assets: AssetConfig {
                public_dir,
                output_dir,
                reference_files: DEFAULT_REFERENCE_FILES.iter().map(|s| s.to_string()).collect(),
            },
            limits: UploadLimits {
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            },
        })
    }

    pub fn api_key_configured(&self) -> bool {
        self.google.api_key.is_some()
    }
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn get_env_parsed<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| {
            AppError::ConfigError(anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e))
        }),
        Err(_) => Ok(default),
    }
}
