//! Editor configuration.
//!
//! Settings can come from the environment or be built programmatically.

use std::path::{Path, PathBuf};

/// Pixels per PDF point used when rendering pages for editing.
pub const DEFAULT_DISPLAY_SCALE: f32 = 1.5;

pub const ENV_DISPLAY_SCALE: &str = "PDF_ANNOTATOR_DISPLAY_SCALE";
pub const ENV_DATA_DIR: &str = "PDF_ANNOTATOR_DATA_DIR";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {0}")]
    InvalidValue(String),
    #[error("display scale must be a positive finite number, got {0}")]
    InvalidScale(f32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditorConfig {
    /// Single scale shared by every page surface, overlay and export.
    pub display_scale: f32,
    /// Where annotation sets are persisted. `None` uses the platform data dir.
    pub data_dir: Option<PathBuf>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self { display_scale: DEFAULT_DISPLAY_SCALE, data_dir: None }
    }
}

impl EditorConfig {
    pub fn with_display_scale(mut self, scale: f32) -> Self {
        self.display_scale = scale;
        self
    }

    pub fn with_data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Loads configuration from environment variables.
    ///
    /// - `PDF_ANNOTATOR_DISPLAY_SCALE`: pixels per point (default 1.5)
    /// - `PDF_ANNOTATOR_DATA_DIR`: annotation storage directory
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_DISPLAY_SCALE) {
            config.display_scale = value
                .trim()
                .parse::<f32>()
                .map_err(|_| ConfigError::InvalidValue(ENV_DISPLAY_SCALE.to_string()))?;
        }

        if let Some(value) = lookup(ENV_DATA_DIR) {
            if !value.is_empty() {
                config.data_dir = Some(PathBuf::from(value));
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.display_scale.is_finite() || self.display_scale <= 0.0 {
            return Err(ConfigError::InvalidScale(self.display_scale));
        }
        Ok(())
    }
}
