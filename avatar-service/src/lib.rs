//! avatar-service: turns user photos into Notion-style avatars with a
//! generative image model.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod services;
pub mod startup;
