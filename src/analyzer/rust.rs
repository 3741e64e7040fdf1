use anyhow::{bail, Result};
use toml::{Table, Value};

use crate::models::{DependencyRecord, Ecosystem, ManifestKind};

const SECTIONS: [&str; 3] = ["dependencies", "dev-dependencies", "build-dependencies"];

/// Analyzer for `Cargo.toml`.
///
/// Reads the regular, dev and build dependency tables, their
/// `[target.<cfg>]` variants and `[workspace.dependencies]`. Path and git
/// dependencies without a `version`, and `workspace = true` entries, are not
/// registry packages and are skipped.
pub struct RustAnalyzer;

impl RustAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl super::Analyzer for RustAnalyzer {
    fn analyze(&self, _kind: ManifestKind, content: &str) -> Result<Vec<DependencyRecord>> {
        let manifest: Table = toml::from_str(content)?;
        let mut deps = Vec::new();

        for section in SECTIONS {
            if let Some(table) = manifest.get(section).and_then(Value::as_table) {
                collect_table(table, &mut deps)?;
            }
        }

        if let Some(table) = manifest
            .get("workspace")
            .and_then(|w| w.get("dependencies"))
            .and_then(Value::as_table)
        {
            collect_table(table, &mut deps)?;
        }

        if let Some(targets) = manifest.get("target").and_then(Value::as_table) {
            for target in targets.values() {
                for section in SECTIONS {
                    if let Some(table) = target.get(section).and_then(Value::as_table) {
                        collect_table(table, &mut deps)?;
                    }
                }
            }
        }

        Ok(deps)
    }
}

fn collect_table(table: &Table, deps: &mut Vec<DependencyRecord>) -> Result<()> {
    for (name, spec) in table {
        match spec {
            Value::String(version) => {
                deps.push(DependencyRecord::declared(name, Ecosystem::Rust, version));
            }
            Value::Table(detail) => {
                if detail.get("workspace").and_then(Value::as_bool) == Some(true) {
                    continue;
                }
                let Some(version) = detail.get("version").and_then(Value::as_str) else {
                    tracing::debug!(dependency = %name, "skipping non-registry dependency");
                    continue;
                };
                let registry_name = detail
                    .get("package")
                    .and_then(Value::as_str)
                    .unwrap_or(name);
                deps.push(DependencyRecord::declared(
                    registry_name,
                    Ecosystem::Rust,
                    version,
                ));
            }
            other => bail!(
                "dependency `{}` must be a string or table, found {}",
                name,
                other.type_str()
            ),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;

    fn parse(content: &str) -> Result<Vec<DependencyRecord>> {
        RustAnalyzer::new().analyze(ManifestKind::CargoToml, content)
    }

    #[test]
    fn test_parse_cargo_toml() {
        let content = r#"
[package]
name = "my-app"
version = "0.1.0"

[dependencies]
serde = { version = "1.0", features = ["derive"] }
tokio = "1.25"
local = { path = "../local" }
from-git = { git = "https://example.com/repo.git" }
renamed = { package = "serde_json", version = "1" }

[dev-dependencies]
tempfile = "3"

[target.'cfg(unix)'.dependencies]
libc = "0.2"
"#;

        let deps = parse(content).unwrap();
        let names: Vec<_> = deps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["serde", "tokio", "serde_json", "tempfile", "libc"]);
        assert_eq!(deps[0].requested_constraint, "1.0");
        assert!(deps.iter().all(|d| d.ecosystem == Ecosystem::Rust));
    }

    #[test]
    fn test_workspace_dependencies() {
        let content = r#"
[workspace]
members = ["a"]

[workspace.dependencies]
anyhow = "1.0"

[dependencies]
anyhow = { workspace = true }
"#;
        let deps = parse(content).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "anyhow");
    }

    #[test]
    fn test_malformed_toml() {
        assert!(parse("[dependencies\nserde = ").is_err());
        assert!(parse("[dependencies]\nserde = 1\n").is_err());
    }
}
