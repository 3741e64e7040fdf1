use std::path::PathBuf;

use clap::Parser;

use repo_health::Ecosystem;

#[derive(Parser, Debug)]
#[command(
    name = "repo-health",
    about = "Analyze the dependency health of a repository",
    version
)]
pub struct Cli {
    /// Repository path to analyze
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Config file [default: ./.repo-health/config.toml, fallback ~/.config/repo-health/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Report format
    #[arg(long, default_value = "terminal", value_name = "FORMAT")]
    pub report: ReportFormat,

    /// Exclude an ecosystem from analysis (repeatable)
    #[arg(long = "exclude-lang", value_name = "LANG")]
    pub exclude_lang: Vec<EcosystemArg>,

    /// Maximum number of registry lookups in flight
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Per-lookup timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<f64>,

    /// Stop resolving after this many seconds and report what is known
    #[arg(long, value_name = "SECS")]
    pub deadline: Option<f64>,

    /// Exit with status 1 when the health score is below this value
    #[arg(long, value_name = "SCORE")]
    pub fail_under: Option<f64>,

    /// Show all dependencies and debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only print summary line
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ReportFormat {
    Terminal,
    Json,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum EcosystemArg {
    Rust,
    Python,
    Java,
    Node,
}

impl From<&EcosystemArg> for Ecosystem {
    fn from(arg: &EcosystemArg) -> Self {
        match arg {
            EcosystemArg::Rust => Ecosystem::Rust,
            EcosystemArg::Python => Ecosystem::Python,
            EcosystemArg::Java => Ecosystem::Java,
            EcosystemArg::Node => Ecosystem::Node,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["repo-health"]);
        assert_eq!(cli.path, PathBuf::from("."));
        assert!(matches!(cli.report, ReportFormat::Terminal));
        assert!(cli.exclude_lang.is_empty());
        assert!(cli.fail_under.is_none());
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::parse_from([
            "repo-health",
            "repo",
            "--report",
            "json",
            "--exclude-lang",
            "node",
            "--exclude-lang",
            "java",
            "--concurrency",
            "4",
            "--timeout",
            "2.5",
            "--fail-under",
            "80",
        ]);
        assert!(matches!(cli.report, ReportFormat::Json));
        let excluded: Vec<Ecosystem> = cli.exclude_lang.iter().map(Into::into).collect();
        assert_eq!(excluded, vec![Ecosystem::Node, Ecosystem::Java]);
        assert_eq!(cli.concurrency, Some(4));
        assert_eq!(cli.timeout, Some(2.5));
        assert_eq!(cli.fail_under, Some(80.0));
    }
}
