use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A package-manager universe: one family of manifest formats plus one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Rust,
    Node,
    Python,
    Java,
}

impl Ecosystem {
    /// Ecosystem identifier understood by OSV.dev.
    pub fn as_osv_str(&self) -> &'static str {
        match self {
            Ecosystem::Rust => "crates.io",
            Ecosystem::Node => "npm",
            Ecosystem::Python => "PyPI",
            Ecosystem::Java => "Maven",
        }
    }
}

impl std::fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ecosystem::Rust => write!(f, "Rust"),
            Ecosystem::Node => write!(f, "Node"),
            Ecosystem::Python => write!(f, "Python"),
            Ecosystem::Java => write!(f, "Java"),
        }
    }
}

/// Recognized manifest formats. Each belongs to exactly one [`Ecosystem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManifestKind {
    CargoToml,
    PackageJson,
    RequirementsTxt,
    PyprojectToml,
    PomXml,
    BuildGradle,
}

impl ManifestKind {
    /// Map a file name to the manifest format it denotes, if any.
    pub fn from_file_name(name: &str) -> Option<Self> {
        match name {
            "Cargo.toml" => Some(ManifestKind::CargoToml),
            "package.json" => Some(ManifestKind::PackageJson),
            "requirements.txt" => Some(ManifestKind::RequirementsTxt),
            "pyproject.toml" => Some(ManifestKind::PyprojectToml),
            "pom.xml" => Some(ManifestKind::PomXml),
            "build.gradle" | "build.gradle.kts" => Some(ManifestKind::BuildGradle),
            _ => None,
        }
    }

    pub fn ecosystem(&self) -> Ecosystem {
        match self {
            ManifestKind::CargoToml => Ecosystem::Rust,
            ManifestKind::PackageJson => Ecosystem::Node,
            ManifestKind::RequirementsTxt | ManifestKind::PyprojectToml => Ecosystem::Python,
            ManifestKind::PomXml | ManifestKind::BuildGradle => Ecosystem::Java,
        }
    }
}

/// Classification of a dependency once the resolver has looked at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyStatus {
    Current,
    Outdated,
    Vulnerable,
    Unresolvable,
}

impl std::fmt::Display for DependencyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DependencyStatus::Current => write!(f, "current"),
            DependencyStatus::Outdated => write!(f, "outdated"),
            DependencyStatus::Vulnerable => write!(f, "vulnerable"),
            DependencyStatus::Unresolvable => write!(f, "unresolvable"),
        }
    }
}

/// One declared dependency.
///
/// The parser fills in `name`, `ecosystem`, `requested_constraint` and
/// `manifest`; the resolver completes the record exactly once through
/// [`DependencyRecord::resolve`] or [`DependencyRecord::mark_unresolvable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub name: String,
    pub ecosystem: Ecosystem,
    pub requested_constraint: String,
    /// Manifest path relative to the analyzed root, `/` separated.
    pub manifest: String,
    pub resolved_latest: Option<String>,
    /// `None` until the resolver has classified the record.
    pub status: Option<DependencyStatus>,
    /// Latest is newer than anything the constraint admits. Kept even when
    /// `status` is [`DependencyStatus::Vulnerable`].
    #[serde(default)]
    pub outdated: bool,
    #[serde(default)]
    pub advisory_ids: BTreeSet<String>,
}

impl DependencyRecord {
    pub fn declared(
        name: impl Into<String>,
        ecosystem: Ecosystem,
        requested_constraint: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            ecosystem,
            requested_constraint: requested_constraint.into(),
            manifest: String::new(),
            resolved_latest: None,
            status: None,
            outdated: false,
            advisory_ids: BTreeSet::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.status.is_some()
    }

    pub fn is_vulnerable(&self) -> bool {
        !self.advisory_ids.is_empty()
    }

    /// Complete the record from a successful lookup. Vulnerability wins the
    /// displayed status; the outdated flag is retained independently.
    pub fn resolve(&mut self, latest: String, outdated: bool, advisory_ids: BTreeSet<String>) {
        debug_assert!(!self.is_resolved(), "record {} resolved twice", self.name);
        self.status = Some(if !advisory_ids.is_empty() {
            DependencyStatus::Vulnerable
        } else if outdated {
            DependencyStatus::Outdated
        } else {
            DependencyStatus::Current
        });
        self.resolved_latest = Some(latest);
        self.outdated = outdated;
        self.advisory_ids = advisory_ids;
    }

    pub fn mark_unresolvable(&mut self) {
        debug_assert!(!self.is_resolved(), "record {} resolved twice", self.name);
        self.status = Some(DependencyStatus::Unresolvable);
    }
}

/// Counts derived from the final record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub total_packages: usize,
    pub outdated_count: usize,
    pub vulnerable_count: usize,
    pub unresolvable_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Parse,
    Resolution,
    Advisory,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Parse => write!(f, "parse"),
            FailureKind::Resolution => write!(f, "resolution"),
            FailureKind::Advisory => write!(f, "advisory"),
        }
    }
}

/// A non-fatal problem recorded while producing the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialFailure {
    /// Manifest path or `ecosystem:name` of the dependency concerned.
    pub subject: String,
    pub kind: FailureKind,
    pub reason: String,
}

/// Root artifact returned for one analyzed tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub summary: Summary,
    pub health_score: f64,
    pub dependencies: Vec<DependencyRecord>,
    pub partial_failures: Vec<PartialFailure>,
    /// The run was cancelled before every lookup finished.
    #[serde(default)]
    pub cancelled: bool,
}
