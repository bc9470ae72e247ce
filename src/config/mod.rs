//! Configuration management for farm-limits
//!
//! This module provides two config systems:
//! - **document**: the tractor limits file being edited, plus its load policy
//! - **settings**: this tool's own settings (paths, endpoint, reload command)

pub mod document;
pub mod settings;

// Re-export commonly used types
pub use document::{ConfigStore, LimitsDocument};
pub use settings::Settings;
