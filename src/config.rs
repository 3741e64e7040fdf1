use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::scorer::ScoreWeights;

/// Root configuration structure, deserialized from `.repo-health/config.toml`.
///
/// Every section is optional; missing keys fall back to the built-in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub locator: LocatorConfig,
    pub resolver: ResolverConfig,
    pub scoring: ScoreWeights,
    pub registries: RegistryConfig,
}

/// Controls the manifest walk.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Directory names never descended into.
    pub skip_dirs: Vec<String>,
    pub max_depth: usize,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        let skip_dirs = [
            ".git",
            "node_modules",
            "target",
            "vendor",
            ".venv",
            "venv",
            "__pycache__",
            "build",
            "dist",
        ];
        Self {
            skip_dirs: skip_dirs.iter().map(|s| s.to_string()).collect(),
            max_depth: 12,
        }
    }
}

/// Outbound lookup limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Maximum number of registry lookups in flight.
    pub concurrency: usize,
    /// Deadline for a single dependency lookup, in seconds.
    pub timeout_secs: f64,
}

impl ResolverConfig {
    /// Per-lookup timeout. Values past what [`Duration`] can hold saturate;
    /// [`ResolverConfig::validate`] rejects them up front.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs.max(0.0)).unwrap_or(Duration::MAX)
    }

    pub fn validate(&self) -> Result<()> {
        parse_seconds(self.timeout_secs).context("resolver timeout")?;
        Ok(())
    }
}

/// Convert a user supplied number of seconds into a [`Duration`].
///
/// Negative, non-finite and out of range values are errors.
pub fn parse_seconds(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|err| anyhow::anyhow!("invalid duration of {} seconds: {}", secs, err))
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            timeout_secs: 5.0,
        }
    }
}

/// Registry endpoints. Overridable for mirrors and tests.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub crates_io: String,
    pub npm: String,
    pub pypi: String,
    pub maven: String,
    pub osv: String,
    /// Query OSV.dev for advisories.
    pub advisories: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            crates_io: "https://crates.io".to_string(),
            npm: "https://registry.npmjs.org".to_string(),
            pypi: "https://pypi.org".to_string(),
            maven: "https://search.maven.org".to_string(),
            osv: "https://api.osv.dev".to_string(),
            advisories: true,
        }
    }
}

/// Load the configuration, searching in order:
///
/// 1. `config_override`: path passed via `--config`
/// 2. `<project_path>/.repo-health/config.toml`
/// 3. `~/.config/repo-health/config.toml`
/// 4. Built-in [`Config::default`]
pub fn load_config(project_path: &Path, config_override: Option<&Path>) -> Result<Config> {
    if let Some(path) = config_override {
        return read_config(path);
    }

    let project_config = project_path.join(".repo-health").join("config.toml");
    if project_config.exists() {
        return read_config(&project_config);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home.join(".config").join("repo-health").join("config.toml");
        if home_config.exists() {
            return read_config(&home_config);
        }
    }

    Ok(Config::default())
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: Config =
        toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))?;
    config
        .resolver
        .validate()
        .with_context(|| format!("parsing config {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}
