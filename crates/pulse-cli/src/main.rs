//! # pulse
//!
//! CRM contact aggregation binary: walks the contact search, attaches related
//! objects, cached form submissions and email engagement, and prints a report.

#![deny(unsafe_code)]

mod report;

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pulse_crm::{CrmClient, CrmClientConfig};
use pulse_logging::{LoggingConfig, init_logging};
use pulse_pipeline::Pipeline;
use pulse_pipeline::submissions::cache;
use pulse_settings::{PulseSettings, load_settings_from_path, settings_path};

use crate::report::{TextReport, render_cache_stats, render_summary};

/// Environment variable holding the CRM private-app token.
const TOKEN_ENV: &str = "PULSE_ACCESS_TOKEN";

/// CRM contact aggregation.
#[derive(Parser, Debug)]
#[command(name = "pulse", about = "CRM contact aggregation report")]
struct Cli {
    /// Settings file (defaults to `~/.pulse/settings.json`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the aggregation and print the report.
    Run(RunArgs),
    /// Show what the form-submission cache holds.
    CacheStats,
}

#[derive(clap::Args, Debug, Default)]
struct RunArgs {
    /// Stop after this many contacts (overrides settings).
    #[arg(long)]
    max_contacts: Option<usize>,

    /// Skip email open/click counting.
    #[arg(long)]
    no_engagement: bool,

    /// Skip the form-submission cache.
    #[arg(long)]
    no_forms: bool,

    /// Ignore the cache and refetch every form.
    #[arg(long)]
    full_refresh: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

impl RunArgs {
    fn apply(&self, settings: &mut PulseSettings) {
        if let Some(max) = self.max_contacts {
            settings.contacts.max_contacts = Some(max);
        }
        if self.no_engagement {
            settings.features.engagement = false;
        }
        if self.no_forms {
            settings.features.form_submissions = false;
        }
        if self.json_logs {
            settings.logging.json = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli.config.clone().unwrap_or_else(settings_path);
    let mut settings = load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;

    match cli.command {
        Command::Run(args) => {
            args.apply(&mut settings);
            let _ = init_logging(&LoggingConfig::from_settings(&settings.logging));
            run(&settings, args.full_refresh).await
        }
        Command::CacheStats => cache_stats(&settings),
    }
}

async fn run(settings: &PulseSettings, full_refresh: bool) -> Result<()> {
    let token = std::env::var(TOKEN_ENV).unwrap_or_default();
    let client = CrmClient::new(
        CrmClientConfig::new(token)
            .with_base_url(settings.api.base_url.clone())
            .with_timeout(settings.api.timeout()),
    )
    .with_context(|| format!("Failed to create CRM client (is {TOKEN_ENV} set?)"))?;

    tracing::info!(base_url = %settings.api.base_url, full_refresh, "starting run");
    let mut sink = TextReport::new(io::stdout().lock());
    let summary = Pipeline::new(&client, settings)
        .with_full_refresh(full_refresh)
        .run(&mut sink)
        .await
        .context("Aggregation run failed")?;
    if sink.failed_writes() > 0 {
        tracing::warn!(pages = sink.failed_writes(), "some pages could not be written");
    }

    print!("{}", render_summary(&summary));
    tracing::info!(contacts = summary.contacts, pages = summary.pages, "run complete");
    Ok(())
}

fn cache_stats(settings: &PulseSettings) -> Result<()> {
    let path = settings.submissions.resolved_cache_path();
    let loaded = cache::load(&path)
        .with_context(|| format!("Failed to read submission cache {}", path.display()))?;
    print!(
        "{}",
        render_cache_stats(&path.display().to_string(), loaded.as_ref())
    );
    Ok(())
}
