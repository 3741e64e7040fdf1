//! Manifest parsers, one per ecosystem.
//!
//! Parsing is purely syntactic: manifests are read as text and nothing they
//! declare is executed or fetched.

use std::collections::HashSet;

use anyhow::Result;

use crate::error::ParseError;
use crate::models::{DependencyRecord, Ecosystem, ManifestKind};

pub mod java;
pub mod node;
pub mod python;
pub mod rust;

pub trait Analyzer {
    /// Extract declared dependencies from one manifest of this ecosystem.
    fn analyze(&self, kind: ManifestKind, content: &str) -> Result<Vec<DependencyRecord>>;
}

/// Parse one manifest into unresolved records tagged with `manifest_path`.
///
/// A name declared more than once in the same manifest is kept once, first
/// declaration wins.
pub fn parse_manifest(
    kind: ManifestKind,
    manifest_path: &str,
    bytes: &[u8],
) -> Result<Vec<DependencyRecord>, ParseError> {
    let content = std::str::from_utf8(bytes)
        .map_err(|err| ParseError::new(manifest_path, format!("not valid UTF-8: {}", err)))?;

    let parsed = match kind.ecosystem() {
        Ecosystem::Rust => rust::RustAnalyzer::new().analyze(kind, content),
        Ecosystem::Node => node::NodeAnalyzer::new().analyze(kind, content),
        Ecosystem::Python => python::PythonAnalyzer::new().analyze(kind, content),
        Ecosystem::Java => java::JavaAnalyzer::new().analyze(kind, content),
    }
    .map_err(|err| ParseError::new(manifest_path, format!("{:#}", err)))?;

    let mut seen: HashSet<String> = HashSet::new();
    let deps = parsed
        .into_iter()
        .filter(|d| seen.insert(dedup_key(d)))
        .map(|mut d| {
            d.manifest = manifest_path.to_string();
            d
        })
        .collect();

    Ok(deps)
}

/// Python names compare case-insensitively with `-`, `_` and `.` folded.
fn dedup_key(dep: &DependencyRecord) -> String {
    match dep.ecosystem {
        Ecosystem::Python => dep.name.to_lowercase().replace(['_', '.'], "-"),
        _ => dep.name.clone(),
    }
}
