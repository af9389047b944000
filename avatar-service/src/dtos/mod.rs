pub mod convert;
pub mod health;

pub use convert::{ConversionResult, ConvertResponse};
pub use health::HealthResponse;
