//! Configuration module for full-text indexing
//!
//! This module provides the `FtsConfig` struct and its type-safe builder
//! with validation and sensible defaults.

// Sub-modules
pub mod builder;
pub mod getters;
pub mod methods;
pub mod types;

// Re-exports for public API
pub use builder::{FtsConfigBuilder, WithDataDir};
pub use types::{FtsConfig, ShardFilter};
