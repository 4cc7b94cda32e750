/// `load_config` module: reads the static YAML config and injects secrets from the environment.
///
/// This is the only place where untrusted YAML is parsed. The YAML side is a thin schema
/// (`confluence` + `export` sections); it is mapped onto the core [`ExportConfig`] plus the
/// credentials the REST client needs.
///
/// # Environment
/// - `CONFLUENCE_API_EMAIL`, `CONFLUENCE_API_TOKEN`: basic-auth credentials (required)
/// - `CONFLUENCE_PAGE_LIMIT`: optional cap on pages listed per space
///
/// # Errors
/// All errors use `anyhow::Error` with context and are surfaced at the CLI boundary.
use anyhow::{anyhow, Context, Result};
use confluence_export_core::config::{ExportConfig, OutputFormat};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::client::Credentials;

pub const EMAIL_VAR: &str = "CONFLUENCE_API_EMAIL";
pub const TOKEN_VAR: &str = "CONFLUENCE_API_TOKEN";
pub const PAGE_LIMIT_VAR: &str = "CONFLUENCE_PAGE_LIMIT";

#[derive(Debug)]
pub struct CliConfig {
    pub export: ExportConfig,
    pub credentials: Credentials,
    pub page_limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    confluence: ConfluenceSection,
    #[serde(default)]
    export: ExportSection,
}

#[derive(Debug, Deserialize)]
struct ConfluenceSection {
    base_url: String,
    #[serde(default)]
    spaces: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ExportSection {
    #[serde(default = "default_output_dir")]
    output_dir: PathBuf,
    #[serde(default)]
    format: OutputFormat,
    #[serde(default = "default_concurrency")]
    concurrency: usize,
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            format: OutputFormat::default(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./confluence_export")
}

fn default_concurrency() -> usize {
    4
}

fn required_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => {
            error!(variable = name, "Required environment variable is missing");
            Err(anyhow!("environment variable {name} must be set"))
        }
    }
}

fn page_limit_from_env() -> Option<usize> {
    let raw = std::env::var(PAGE_LIMIT_VAR).ok()?;
    match raw.trim().parse::<usize>() {
        Ok(limit) => Some(limit),
        Err(e) => {
            warn!(variable = PAGE_LIMIT_VAR, value = %raw, error = %e, "Ignoring unparsable page limit");
            None
        }
    }
}

/// Load the YAML config at `path` and merge in credentials from the environment.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let content = fs::read_to_string(path_ref)
        .inspect_err(|e| error!(error = ?e, config_path = ?path_ref, "Failed to read config file"))
        .with_context(|| format!("Failed to read config file {}", path_ref.display()))?;

    let raw: RawConfig = serde_yaml::from_str(&content)
        .inspect_err(|e| error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML"))
        .context("Failed to parse config YAML")?;
    info!(config_path = ?path_ref, "Parsed config YAML successfully");

    let credentials = Credentials {
        email: required_env(EMAIL_VAR)?,
        token: required_env(TOKEN_VAR)?,
    };

    let export = ExportConfig {
        output_dir: raw.export.output_dir,
        base_url: raw.confluence.base_url.trim_end_matches('/').to_string(),
        spaces: raw.confluence.spaces,
        format: raw.export.format,
        concurrency: raw.export.concurrency,
    };
    export.trace_loaded();

    Ok(CliConfig {
        export,
        credentials,
        page_limit: page_limit_from_env(),
    })
}
