use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

/// Which artifacts an export writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown tree with index files.
    #[default]
    Markdown,
    /// JSON page and attachment rows only.
    Tabular,
    Both,
}

impl OutputFormat {
    pub fn writes_markdown(self) -> bool {
        matches!(self, OutputFormat::Markdown | OutputFormat::Both)
    }

    pub fn writes_tabular(self) -> bool {
        matches!(self, OutputFormat::Tabular | OutputFormat::Both)
    }
}

fn default_concurrency() -> usize {
    4
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Spaces are written to `<output_dir>/<space key>/`.
    pub output_dir: PathBuf,
    /// Confluence base URL, e.g. `https://example.atlassian.net/wiki`.
    pub base_url: String,
    pub spaces: Vec<String>,
    #[serde(default)]
    pub format: OutputFormat,
    /// Attachment downloads in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("base_url must not be empty")]
    MissingBaseUrl,
    #[error("no spaces configured")]
    NoSpaces,
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("space key {0:?} is empty or contains path separators")]
    InvalidSpaceKey(String),
}

impl ExportConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::MissingBaseUrl);
        }
        if self.spaces.is_empty() {
            return Err(ConfigError::NoSpaces);
        }
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if let Some(bad) = self
            .spaces
            .iter()
            .find(|key| key.trim().is_empty() || key.contains(['/', '\\']) || key.as_str() == "..")
        {
            return Err(ConfigError::InvalidSpaceKey(bad.clone()));
        }
        Ok(())
    }

    pub fn trace_loaded(&self) {
        info!(
            output_dir = %self.output_dir.display(),
            base_url = %self.base_url,
            spaces_count = self.spaces.len(),
            format = ?self.format,
            concurrency = self.concurrency,
            "Loaded ExportConfig"
        );
        debug!(?self, "ExportConfig loaded (full debug)");
    }
}
