//! service-core: error type, base config, logging and HTTP middleware shared
//! by the avatar service binary and its tests.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
