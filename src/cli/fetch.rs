//! `revq fetch`: harvest one URL.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Settings;
use crate::harvest::{HarvestError, Harvester, RunLimits};
use crate::output::write_records;

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Product page URL
    pub url: String,

    /// Maximum API pages to fetch
    #[arg(long)]
    pub max_pages: Option<u32>,

    /// Maximum records to keep
    #[arg(long)]
    pub max_records: Option<usize>,

    /// Output file (default from config: reviews.json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Stop after this many seconds and keep what was collected
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

impl FetchArgs {
    fn limits(&self, settings: &Settings) -> RunLimits {
        RunLimits {
            max_pages: self.max_pages.unwrap_or(settings.limits.max_pages),
            max_records: self.max_records.unwrap_or(settings.limits.max_records),
        }
    }
}

/// Cancel `token` on Ctrl-C or after `deadline`.
fn spawn_cancellers(token: &CancellationToken, deadline: Option<Duration>) {
    let on_signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted; finishing with collected reviews");
            on_signal.cancel();
        }
    });

    if let Some(deadline) = deadline {
        let on_deadline = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            info!("Deadline of {:?} reached", deadline);
            on_deadline.cancel();
        });
    }
}

pub async fn cmd_fetch(settings: &Settings, args: FetchArgs) -> anyhow::Result<()> {
    let limits = args.limits(settings);
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| settings.output_path.clone());

    let cancel = CancellationToken::new();
    spawn_cancellers(&cancel, args.timeout.map(Duration::from_secs));

    let pb = ProgressBar::new_spinner();
    if let Ok(spinner) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(spinner);
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message(format!("Harvesting reviews from {}...", args.url));

    let harvester = Harvester::from_settings(settings);
    let result = harvester.harvest(&args.url, limits, cancel.clone()).await;
    pb.finish_and_clear();
    cancel.cancel();

    let report = match result {
        Ok(report) => report,
        Err(e @ HarvestError::UnsupportedSource(_)) => {
            write_records(&output, &[])
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
            return Err(e).context("No extraction strategy for this site; wrote an empty result");
        }
        Err(e) => return Err(e.into()),
    };

    write_records(&output, &report.records)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let channels: Vec<&str> = report.channels_tried.iter().map(|c| c.as_str()).collect();
    println!(
        "{} {} reviews from {} via {} ({})",
        style("✓").green(),
        report.records.len(),
        report.site,
        channels.join(" → "),
        report.stop
    );
    if report.fell_back {
        println!("  {} structured API failed; used rendered page", style("!").yellow());
    }
    if let Some(ref error) = report.session_error {
        println!("  {} browser session: {}", style("!").yellow(), error);
    }
    println!("  Written to {}", style(output.display()).cyan());

    Ok(())
}
