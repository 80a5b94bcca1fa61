//! Data models and configuration.

pub mod config;
pub mod emission;
pub mod invoice;
