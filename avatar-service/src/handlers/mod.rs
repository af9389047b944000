//! HTTP handlers for the avatar service.

pub mod convert;
pub mod health;
pub mod metrics;

pub use convert::convert_image;
pub use health::health_check;
pub use metrics::metrics;
