//! Rendering configuration.
//!
//! Configuration is loaded from `~/.config/parlance/config.toml`. Every key
//! is optional; a missing file yields the defaults.
//!
//! ## Example Configuration
//!
//! ```toml
//! # Tools whose answer arrives as the text part after the call.
//! text_streaming_tools = ["genie", "sql_answer"]
//!
//! # Bound on nested JSON decoding when looking for chart specs.
//! max_decode_depth = 5
//!
//! # Drop chart code fences from prose when a tool already rendered a chart.
//! hide_duplicate_chart_fences = true
//! chart_fence_languages = ["vega-lite", "vega", "json"]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest accepted `max_decode_depth`.
pub const MAX_DECODE_DEPTH_LIMIT: usize = 32;

/// Settings shared by the segmenter, the classifier and the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Substrings identifying text-streaming tools (default: `["genie"]`).
    ///
    /// Matched case-insensitively against the tool name. Any tool whose
    /// name happens to contain a keyword is treated as text-streaming.
    pub text_streaming_tools: Vec<String>,

    /// Maximum nested decode/unwrap steps in the classifier (default: 5)
    pub max_decode_depth: usize,

    /// Hide chart code fences in prose when the message already shows a
    /// chart from tool output (default: true)
    pub hide_duplicate_chart_fences: bool,

    /// Code fence languages checked for embedded chart specs
    pub chart_fence_languages: Vec<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            text_streaming_tools: vec!["genie".to_string()],
            max_decode_depth: default_max_decode_depth(),
            hide_duplicate_chart_fences: true,
            chart_fence_languages: vec![
                "vega-lite".to_string(),
                "vega".to_string(),
                "json".to_string(),
            ],
        }
    }
}

const fn default_max_decode_depth() -> usize {
    5
}

impl RenderConfig {
    /// Loads configuration from the default location.
    ///
    /// Reads `~/.config/parlance/config.toml`, falling back to defaults if
    /// the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config directory cannot be determined
    /// - The file exists but cannot be read or parsed
    /// - Validation fails
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Loads and validates configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or validation fails.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the default configuration file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined.
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Failed to determine config directory".to_string()))?
            .join("parlance");

        Ok(config_dir.join("config.toml"))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `max_decode_depth` is zero or above [`MAX_DECODE_DEPTH_LIMIT`]
    /// - A text-streaming keyword is blank
    pub fn validate(&self) -> Result<()> {
        if self.max_decode_depth == 0 || self.max_decode_depth > MAX_DECODE_DEPTH_LIMIT {
            return Err(Error::Config(format!(
                "max_decode_depth must be between 1 and {MAX_DECODE_DEPTH_LIMIT}, got {}",
                self.max_decode_depth
            )));
        }

        if let Some(pos) = self
            .text_streaming_tools
            .iter()
            .position(|k| k.trim().is_empty())
        {
            return Err(Error::Config(format!(
                "text_streaming_tools[{pos}] must not be blank"
            )));
        }

        Ok(())
    }

    /// Adds a text-streaming keyword unless it is already present.
    pub fn add_streaming_tool(&mut self, keyword: impl Into<String>) {
        let keyword = keyword.into();
        if !self
            .text_streaming_tools
            .iter()
            .any(|k| k.eq_ignore_ascii_case(&keyword))
        {
            self.text_streaming_tools.push(keyword);
        }
    }
}
