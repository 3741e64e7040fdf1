//! `repo-health`: analyze a repository's dependency health from the command line.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]).
//! 2. Load config ([`repo_health::config::load_config`]) and apply CLI overrides.
//! 3. Run the engine ([`repo_health::HealthAnalyzer`]) against live registries,
//!    cancelling on Ctrl-C or `--deadline`.
//! 4. Render the requested report ([`report`]).
//! 5. Exit `2` (root inaccessible), `1` (below `--fail-under`) or `0`.

mod cli;
mod report;

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use cli::{Cli, ReportFormat};
use repo_health::config::{load_config, parse_seconds};
use repo_health::registry::HttpRegistry;
use repo_health::{Ecosystem, HealthAnalyzer};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Resolve project path
    let path = cli
        .path
        .canonicalize()
        .unwrap_or_else(|_| cli.path.clone());

    let mut config = load_config(&path, cli.config.as_deref())?;
    if let Some(concurrency) = cli.concurrency {
        config.resolver.concurrency = concurrency;
    }
    if let Some(timeout) = cli.timeout {
        config.resolver.timeout_secs = timeout;
    }
    config.resolver.validate()?;
    let deadline = cli
        .deadline
        .map(parse_seconds)
        .transpose()
        .context("--deadline")?;

    let excluded: Vec<Ecosystem> = cli.exclude_lang.iter().map(Into::into).collect();
    let registry = HttpRegistry::new(config.registries.clone(), config.resolver.timeout())?;

    let mut analyzer = HealthAnalyzer::new(registry, config).exclude(excluded);
    if !cli.quiet {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )?
                .progress_chars("#>-"),
        );
        pb.set_message("resolving");
        analyzer = analyzer.with_progress(pb);
    }

    let report = match analyzer.analyze_until(&path, cancellation(tokio::signal::ctrl_c(), deadline)).await {
        Ok(report) => report,
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            std::process::exit(2);
        }
    };

    match cli.report {
        ReportFormat::Terminal => {
            report::terminal::render(&report, &path, cli.verbose, cli.quiet)?;
        }
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    if let Some(threshold) = cli.fail_under {
        if report.health_score < threshold {
            if !cli.quiet {
                eprintln!(
                    "Health score {:.2} is below the required {:.2}",
                    report.health_score, threshold
                );
            }
            std::process::exit(1);
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "repo_health=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Completes once `interrupt` fires or `deadline` has elapsed.
async fn cancellation<I>(interrupt: I, deadline: Option<Duration>)
where
    I: Future<Output = std::io::Result<()>>,
{
    let deadline = async {
        match deadline {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };

    let interrupted = async {
        match interrupt.await {
            Ok(()) => {}
            // No handler could be installed; only the deadline can cancel.
            Err(err) => {
                tracing::warn!(error = %err, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await
            }
        }
    };

    tokio::select! {
        _ = interrupted => {
            tracing::warn!("interrupted, reporting partial results");
        }
        _ = deadline => {
            tracing::warn!("deadline reached, reporting partial results");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_interrupt_cancels() {
        let cancel = cancellation(async { Ok(()) }, None);
        assert!(tokio::time::timeout(Duration::from_secs(1), cancel).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_signal_setup_does_not_cancel() {
        let broken = async { Err(std::io::Error::other("no signal handler")) };
        let cancel = cancellation(broken, None);
        assert!(tokio::time::timeout(Duration::from_millis(50), cancel).await.is_err());

        let broken = async { Err(std::io::Error::other("no signal handler")) };
        let cancel = cancellation(broken, Some(Duration::from_millis(10)));
        assert!(tokio::time::timeout(Duration::from_secs(1), cancel).await.is_ok());
    }
}
