//! Report Assembler: drives locate → parse → resolve → score for one tree.

use std::future::Future;
use std::path::Path;

use indicatif::ProgressBar;

use crate::analyzer::parse_manifest;
use crate::config::Config;
use crate::error::{FatalError, ParseError};
use crate::locator::{locate_manifests, LocatedManifest};
use crate::models::{AnalysisReport, DependencyRecord, Ecosystem, FailureKind, PartialFailure};
use crate::registry::PackageRegistry;
use crate::resolver::Resolver;
use crate::scorer::{health_score, summarize};

/// Analyzes repository trees against a registry.
///
/// Holds no per-run state: every call owns its own records, so one analyzer
/// can serve concurrent analyses of different trees.
pub struct HealthAnalyzer<R> {
    registry: R,
    config: Config,
    excluded: Vec<Ecosystem>,
    progress: Option<ProgressBar>,
}

impl<R: PackageRegistry> HealthAnalyzer<R> {
    pub fn new(registry: R, config: Config) -> Self {
        Self {
            registry,
            config,
            excluded: Vec::new(),
            progress: None,
        }
    }

    /// Ignore manifests belonging to these ecosystems.
    pub fn exclude(mut self, ecosystems: Vec<Ecosystem>) -> Self {
        self.excluded = ecosystems;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub async fn analyze(&self, root: &Path) -> Result<AnalysisReport, FatalError> {
        self.analyze_until(root, std::future::pending()).await
    }

    /// Analyze `root`, abandoning outstanding registry lookups once `cancel`
    /// completes. A cancelled run still returns a report.
    pub async fn analyze_until<C>(&self, root: &Path, cancel: C) -> Result<AnalysisReport, FatalError>
    where
        C: Future<Output = ()>,
    {
        let root = accessible_root(root)?;
        tracing::info!(root = %root.display(), "analyzing repository");

        let manifests: Vec<LocatedManifest> = locate_manifests(&root, &self.config.locator)
            .into_iter()
            .filter(|m| !self.excluded.contains(&m.ecosystem()))
            .collect();

        let mut partial_failures = Vec::new();
        let mut dependencies: Vec<DependencyRecord> = Vec::new();

        for manifest in &manifests {
            match read_and_parse(manifest) {
                Ok(deps) => {
                    tracing::debug!(manifest = %manifest.relative, count = deps.len(), "parsed manifest");
                    dependencies.extend(deps);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "skipping manifest");
                    partial_failures.push(PartialFailure {
                        subject: err.manifest_path,
                        kind: FailureKind::Parse,
                        reason: err.reason,
                    });
                }
            }
        }

        let outcome = Resolver::new(&self.registry, &self.config.resolver)
            .with_progress(self.progress.clone())
            .resolve_all(&mut dependencies, cancel)
            .await;
        partial_failures.extend(outcome.failures);

        if let Some(pb) = &self.progress {
            pb.finish_and_clear();
        }

        let summary = summarize(&dependencies);
        let score = health_score(&summary, &self.config.scoring);
        tracing::info!(
            manifests = manifests.len(),
            total = summary.total_packages,
            outdated = summary.outdated_count,
            vulnerable = summary.vulnerable_count,
            unresolvable = summary.unresolvable_count,
            health_score = score,
            "analysis complete"
        );

        Ok(AnalysisReport {
            summary,
            health_score: score,
            dependencies,
            partial_failures,
            cancelled: outcome.cancelled,
        })
    }
}

fn accessible_root(root: &Path) -> Result<std::path::PathBuf, FatalError> {
    let inaccessible = |reason: String| FatalError::RootInaccessible {
        path: root.to_path_buf(),
        reason,
    };

    let canonical = root.canonicalize().map_err(|e| inaccessible(e.to_string()))?;
    if !canonical.is_dir() {
        return Err(inaccessible("not a directory".to_string()));
    }
    std::fs::read_dir(&canonical).map_err(|e| inaccessible(e.to_string()))?;
    Ok(canonical)
}

fn read_and_parse(manifest: &LocatedManifest) -> Result<Vec<DependencyRecord>, ParseError> {
    let bytes = std::fs::read(&manifest.path)
        .map_err(|err| ParseError::new(manifest.relative.as_str(), format!("unreadable: {}", err)))?;
    parse_manifest(manifest.kind, &manifest.relative, &bytes)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use super::*;
    use crate::models::DependencyStatus;
    use crate::registry::memory::StaticRegistry;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn registry() -> StaticRegistry {
        StaticRegistry::new()
            .with_package(Ecosystem::Node, "left-pad", "1.0.0")
            .with_package(Ecosystem::Node, "express", "5.0.0")
            .with_package(Ecosystem::Rust, "serde", "1.0.200")
            .with_package(Ecosystem::Python, "requests", "2.31.0")
            .with_advisory(Ecosystem::Python, "requests", "CVE-2023-32681", &["2.28.1"])
    }

    #[tokio::test]
    async fn test_missing_root_is_fatal() {
        let analyzer = HealthAnalyzer::new(registry(), Config::default());
        let err = analyzer
            .analyze(Path::new("/definitely/not/here"))
            .await
            .unwrap_err();
        assert!(matches!(err, FatalError::RootInaccessible { .. }));
    }

    #[tokio::test]
    async fn test_file_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "package.json", "{}");
        let analyzer = HealthAnalyzer::new(registry(), Config::default());
        assert!(analyzer.analyze(&dir.path().join("package.json")).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_tree_is_neutral() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = HealthAnalyzer::new(registry(), Config::default());
        let report = analyzer.analyze(dir.path()).await.unwrap();
        assert_eq!(report.summary.total_packages, 0);
        assert_eq!(report.health_score, 100.0);
        assert!(report.partial_failures.is_empty());
    }

    #[tokio::test]
    async fn test_full_analysis_with_partial_failures() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "web/package.json",
            r#"{"dependencies": {"left-pad": "^1.0.0", "express": "^4.18.2"}}"#,
        );
        write(dir.path(), "Cargo.toml", "[dependencies]\nserde = \"1.0\"\nmissing = \"0.1\"\n");
        write(dir.path(), "api/requirements.txt", "requests==2.28.1\n");
        write(dir.path(), "broken/pom.xml", "<project><dependencies></project>");

        let analyzer = HealthAnalyzer::new(registry(), Config::default());
        let report = analyzer.analyze(dir.path()).await.unwrap();

        let order: Vec<_> = report
            .dependencies
            .iter()
            .map(|d| (d.manifest.as_str(), d.name.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("Cargo.toml", "serde"),
                ("Cargo.toml", "missing"),
                ("api/requirements.txt", "requests"),
                ("web/package.json", "left-pad"),
                ("web/package.json", "express"),
            ]
        );

        assert_eq!(report.summary.total_packages, 5);
        assert_eq!(report.summary.outdated_count, 2);
        assert_eq!(report.summary.vulnerable_count, 1);
        assert_eq!(report.summary.unresolvable_count, 1);
        assert_eq!(report.health_score, 100.0 - 2.0 * 2.0 - 8.0 - 1.0);

        let requests = &report.dependencies[2];
        assert_eq!(requests.status, Some(DependencyStatus::Vulnerable));
        assert!(requests.outdated);

        let kinds: Vec<_> = report
            .partial_failures
            .iter()
            .map(|f| (f.kind, f.subject.as_str()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (FailureKind::Parse, "broken/pom.xml"),
                (FailureKind::Resolution, "Rust:missing"),
            ]
        );
    }

    #[tokio::test]
    async fn test_rerun_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "package.json", r#"{"dependencies": {"left-pad": "^1.0.0", "express": "^4.0.0"}}"#);
        write(dir.path(), "requirements.txt", "requests==2.28.1\nflask\n");

        let analyzer = HealthAnalyzer::new(registry(), Config::default());
        let first = serde_json::to_string(&analyzer.analyze(dir.path()).await.unwrap()).unwrap();
        let second = serde_json::to_string(&analyzer.analyze(dir.path()).await.unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_excluded_ecosystems_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "package.json", r#"{"dependencies": {"left-pad": "^1.0.0"}}"#);
        write(dir.path(), "Cargo.toml", "[dependencies]\nserde = \"1\"\n");

        let analyzer = HealthAnalyzer::new(registry(), Config::default()).exclude(vec![Ecosystem::Node]);
        let report = analyzer.analyze(dir.path()).await.unwrap();
        assert_eq!(report.summary.total_packages, 1);
        assert_eq!(report.dependencies[0].ecosystem, Ecosystem::Rust);
    }

    #[tokio::test]
    async fn test_cancelled_run_still_reports() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "package.json", r#"{"dependencies": {"left-pad": "^1.0.0", "express": "^5.0.0"}}"#);

        let registry = registry().with_delay(Ecosystem::Node, "express", Duration::from_secs(30));
        let analyzer = HealthAnalyzer::new(registry, Config::default());
        let report = analyzer
            .analyze_until(dir.path(), tokio::time::sleep(Duration::from_millis(100)))
            .await
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.summary.total_packages, 2);
        assert_eq!(report.summary.unresolvable_count, 1);
        assert_eq!(report.health_score, 99.0);
    }
}
