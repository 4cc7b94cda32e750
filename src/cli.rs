use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use confluence_export_core::export::SpaceExporter;
use confluence_export_core::restructure;

use crate::client::ConfluenceClient;
use crate::load_config::load_config;

/// CLI for confluence-export: turn Confluence spaces into portable Markdown.
#[derive(Parser)]
#[clap(
    name = "confluence-export",
    version,
    about = "Export Confluence spaces to Markdown with local attachments"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export the configured spaces
    Export {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Export this space instead of the configured list (repeatable)
        #[clap(long = "space")]
        spaces: Vec<String>,
    },
    /// List the spaces the configured account can read
    Spaces {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Flatten a finished space export into pages/ and attachments/
    Flatten {
        /// Space directory produced by `export`
        #[clap(long)]
        input: PathBuf,
        /// Destination directory
        #[clap(long)]
        output: PathBuf,
    },
}

/// Abort flag set on the first Ctrl-C. Downloads already in flight still complete.
fn abort_on_ctrl_c() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handle = flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight work");
            handle.store(true, Ordering::Relaxed);
        }
    });
    flag
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Export { config, spaces } => {
            let mut config = load_config(config)?;
            if !spaces.is_empty() {
                info!(spaces = ?spaces, "Overriding configured spaces from command line");
                config.export.spaces = spaces;
            }
            config.export.validate().context("Invalid export configuration")?;

            let client = ConfluenceClient::new(&config.export.base_url, config.credentials)
                .with_page_limit(config.page_limit);
            let exporter = SpaceExporter::new(&client, &client, &config.export)
                .with_abort_flag(abort_on_ctrl_c());

            println!("Export starting...");
            let results = exporter.export_all(&config.export.spaces).await;
            let mut failed = 0;
            for (space_key, result) in &results {
                match result {
                    Ok(report) => println!(
                        "{space_key}: {} pages, {} attachments ({} unresolved) -> {}{}",
                        report.pages_written,
                        report.attachments_resolved,
                        report.attachments_unresolved,
                        report.output_dir.display(),
                        if report.aborted { " [aborted]" } else { "" }
                    ),
                    Err(e) => {
                        failed += 1;
                        eprintln!("[ERROR] {space_key}: {e}");
                    }
                }
            }
            if failed > 0 {
                error!(failed, total = results.len(), "Some spaces failed to export");
                return Err(anyhow!("{failed} of {} spaces failed to export", results.len()));
            }
            println!("Export complete.");
            Ok(())
        }
        Commands::Spaces { config } => {
            let config = load_config(config)?;
            let client = ConfluenceClient::new(&config.export.base_url, config.credentials);
            let spaces = client
                .list_spaces()
                .await
                .context("Failed to list spaces")?;
            println!("{:<15} NAME", "KEY");
            for space in spaces {
                println!("{:<15} {}", space.key, space.name);
            }
            Ok(())
        }
        Commands::Flatten { input, output } => {
            if !input.is_dir() {
                return Err(anyhow!("input {} is not a directory", input.display()));
            }
            let report = restructure::flatten(&input, &output)
                .with_context(|| format!("Failed to flatten {}", input.display()))?;
            println!(
                "Flattened {} pages and {} attachments into {}",
                report.pages,
                report.attachments,
                output.display()
            );
            Ok(())
        }
    }
}
