use std::path::Path;

use anyhow::Result;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use repo_health::models::{AnalysisReport, DependencyRecord, DependencyStatus};
use repo_health::scorer::HealthGrade;

/// Render a colored terminal report.
pub fn render(report: &AnalysisReport, path: &Path, verbose: bool, quiet: bool) -> Result<()> {
    if quiet {
        println!("{}", summary_line(report));
        return Ok(());
    }

    println!("\n {} v{}", "repo-health".bold(), env!("CARGO_PKG_VERSION"));
    println!(" Analyzing: {}\n", path.display());

    let summary = &report.summary;
    let grade = HealthGrade::from_score(report.health_score);
    let score = format!("{:.2} ({})", report.health_score, grade);
    let score = match grade {
        HealthGrade::A | HealthGrade::B => score.green(),
        HealthGrade::C | HealthGrade::D => score.yellow(),
        HealthGrade::F => score.red(),
    };

    println!(" ┌────────────────────────────────────────────────────┐");
    println!(" │  {:<48} │", "SUMMARY".bold());
    println!(" │  {:<48} │", format!("Health score       : {}", score));
    println!(" │  {:<48} │", format!("Total dependencies : {}", summary.total_packages));
    println!(
        " │  {:<48} │",
        format!("{}  Outdated        : {:>4}", "↑".yellow(), summary.outdated_count)
    );
    println!(
        " │  {:<48} │",
        format!("{}  Vulnerable      : {:>4}", "✗".red(), summary.vulnerable_count)
    );
    println!(
        " │  {:<48} │",
        format!("{}  Unresolvable    : {:>4}", "?".dimmed(), summary.unresolvable_count)
    );
    println!(" └────────────────────────────────────────────────────┘\n");

    if report.cancelled {
        println!(
            " {} Analysis was cancelled; unresolved lookups are reported as unresolvable.\n",
            "[CANCELLED]".yellow().bold()
        );
    }

    let attention: Vec<&DependencyRecord> = report
        .dependencies
        .iter()
        .filter(|d| d.status != Some(DependencyStatus::Current))
        .collect();
    if !attention.is_empty() {
        println!(" {} Dependencies requiring attention:\n", "[ATTENTION]".red().bold());
        render_table(&attention);
        println!();
    }

    if verbose {
        let current: Vec<&DependencyRecord> = report
            .dependencies
            .iter()
            .filter(|d| d.status == Some(DependencyStatus::Current))
            .collect();
        if !current.is_empty() {
            println!(" {} Current dependencies:\n", "[CURRENT]".green().bold());
            render_table(&current);
            println!();
        }
    }

    if !report.partial_failures.is_empty() {
        println!(" {} Partial failures:\n", "[WARN]".yellow().bold());
        for failure in &report.partial_failures {
            println!(
                "   {} {:<10} {}: {}",
                "•".yellow(),
                failure.kind.to_string(),
                failure.subject,
                failure.reason
            );
        }
        println!();
    }

    Ok(())
}

/// One-line summary printed in quiet mode.
pub fn summary_line(report: &AnalysisReport) -> String {
    let summary = &report.summary;
    let mut line = format!(
        "Score: {:.2} ({})  Total: {}  Outdated: {}  Vulnerable: {}  Unresolvable: {}",
        report.health_score,
        HealthGrade::from_score(report.health_score),
        summary.total_packages,
        summary.outdated_count,
        summary.vulnerable_count,
        summary.unresolvable_count,
    );
    if report.cancelled {
        line.push_str("  (cancelled)");
    }
    line
}

fn render_table(deps: &[&DependencyRecord]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Requested").add_attribute(Attribute::Bold),
            Cell::new("Latest").add_attribute(Attribute::Bold),
            Cell::new("Ecosystem").add_attribute(Attribute::Bold),
            Cell::new("Manifest").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
            Cell::new("Advisories").add_attribute(Attribute::Bold),
        ]);

    for dep in deps {
        let (status_str, status_color) = match dep.status {
            Some(DependencyStatus::Current) => ("✓ current", Color::Green),
            Some(DependencyStatus::Outdated) => ("↑ outdated", Color::Yellow),
            Some(DependencyStatus::Vulnerable) => ("✗ vulnerable", Color::Red),
            Some(DependencyStatus::Unresolvable) | None => ("? unresolvable", Color::DarkGrey),
        };
        let advisories: Vec<&str> = dep.advisory_ids.iter().map(String::as_str).collect();

        table.add_row(vec![
            Cell::new(&dep.name),
            Cell::new(&dep.requested_constraint),
            Cell::new(dep.resolved_latest.as_deref().unwrap_or("-")),
            Cell::new(dep.ecosystem.to_string()),
            Cell::new(&dep.manifest),
            Cell::new(status_str)
                .fg(status_color)
                .set_alignment(CellAlignment::Center),
            Cell::new(advisories.join(", ")).fg(Color::Red),
        ]);
    }

    println!("{}", table);
}
