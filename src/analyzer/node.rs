use anyhow::{bail, Result};
use serde_json::Value;

use crate::models::{DependencyRecord, Ecosystem, ManifestKind};

const SECTIONS: [&str; 4] = [
    "dependencies",
    "devDependencies",
    "peerDependencies",
    "optionalDependencies",
];

/// Analyzer for `package.json`.
pub struct NodeAnalyzer;

impl NodeAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl super::Analyzer for NodeAnalyzer {
    fn analyze(&self, _kind: ManifestKind, content: &str) -> Result<Vec<DependencyRecord>> {
        let json: Value = serde_json::from_str(content)?;
        let Some(root) = json.as_object() else {
            bail!("package.json must contain a JSON object");
        };

        let mut deps = Vec::new();
        for section in SECTIONS {
            let Some(entries) = root.get(section) else {
                continue;
            };
            let Some(entries) = entries.as_object() else {
                bail!("`{}` must be an object", section);
            };

            for (name, spec) in entries {
                let Some(spec) = spec.as_str() else {
                    bail!("`{}.{}` must be a string", section, name);
                };
                if let Some((registry_name, range)) = registry_spec(name, spec) {
                    deps.push(DependencyRecord::declared(registry_name, Ecosystem::Node, range));
                }
            }
        }

        Ok(deps)
    }
}

/// Split a dependency spec into the registry package and range it requests.
///
/// Returns `None` for local, workspace, git and tarball specs. `npm:` aliases
/// resolve to the aliased package.
fn registry_spec<'a>(name: &'a str, spec: &'a str) -> Option<(&'a str, &'a str)> {
    let spec = spec.trim();

    if let Some(alias) = spec.strip_prefix("npm:") {
        return match alias.rsplit_once('@') {
            Some((target, range)) if !target.is_empty() => Some((target, range)),
            _ => Some((alias, "")),
        };
    }

    let non_registry = ["file:", "link:", "workspace:", "portal:", "git", "http:", "https:", "github:"];
    if non_registry.iter().any(|p| spec.starts_with(p)) || spec.contains('/') {
        tracing::debug!(dependency = %name, spec = %spec, "skipping non-registry dependency");
        return None;
    }

    Some((name, spec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;

    fn parse(content: &str) -> Result<Vec<DependencyRecord>> {
        NodeAnalyzer::new().analyze(ManifestKind::PackageJson, content)
    }

    #[test]
    fn test_parse_package_json() {
        let json = r#"{
  "name": "my-app",
  "dependencies": {
    "express": "^4.18.2",
    "lodash": "^4.17.21",
    "local-lib": "file:../local-lib",
    "forked": "github:someone/forked"
  },
  "devDependencies": {
    "jest": "^29.0.0"
  },
  "peerDependencies": {
    "react": ">=17 <19"
  }
}"#;
        let deps = parse(json).unwrap();
        let names: Vec<_> = deps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["express", "lodash", "jest", "react"]);
        assert_eq!(deps[3].requested_constraint, ">=17 <19");
    }

    #[test]
    fn test_npm_alias_uses_target_package() {
        let deps = parse(r#"{"dependencies": {"old": "npm:@scope/new@^2.1.0"}}"#).unwrap();
        assert_eq!(deps[0].name, "@scope/new");
        assert_eq!(deps[0].requested_constraint, "^2.1.0");
    }

    #[test]
    fn test_rejects_malformed_sections() {
        assert!(parse("[]").is_err());
        assert!(parse(r#"{"dependencies": ["left-pad"]}"#).is_err());
        assert!(parse(r#"{"dependencies": {"left-pad": 1}}"#).is_err());
    }

    #[test]
    fn test_manifest_without_dependencies() {
        assert!(parse(r#"{"name": "empty"}"#).unwrap().is_empty());
    }
}
