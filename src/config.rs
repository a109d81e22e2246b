//! Configuration for a transcript session.

use crate::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the transcript home directory
pub const HOME_ENV: &str = "KERNEL_TRANSCRIPT_HOME";

/// Session defaults supplied by the host
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Initial font size
    pub font_size: Option<f64>,

    /// Initial working directory shown to the user
    pub cwd: Option<String>,

    /// Prefix for the first line of echoed input (e.g. `">>> "`)
    pub prompt_label: Option<String>,

    /// Prefix for following lines of echoed input (e.g. `"... "`)
    pub continue_label: Option<String>,

    /// Whether this viewer correlates kernel messages with the requests it issued.
    /// When off, no kernel message is ever applied.
    pub correlate_responses: bool,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            font_size: None,
            cwd: None,
            prompt_label: None,
            continue_label: None,
            correlate_responses: true,
        }
    }
}

impl TranscriptConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn with_font_size(mut self, font_size: f64) -> Self {
        self.font_size = Some(font_size);
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_prompt_label(mut self, label: impl Into<String>) -> Self {
        self.prompt_label = Some(label.into());
        self
    }

    pub fn with_continue_label(mut self, label: impl Into<String>) -> Self {
        self.continue_label = Some(label.into());
        self
    }

    pub fn with_correlation(mut self, enabled: bool) -> Self {
        self.correlate_responses = enabled;
        self
    }
}

/// Resolve the transcript home directory
pub fn transcript_home() -> anyhow::Result<PathBuf> {
    if let Ok(home) = std::env::var(HOME_ENV) {
        return Ok(PathBuf::from(home));
    }

    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
    Ok(home.join(".kernel-transcript"))
}
