use anyhow::{bail, Result};
use regex::Regex;
use serde::Deserialize;
use toml::Value;

use crate::models::{DependencyRecord, Ecosystem, ManifestKind};

/// Analyzer for Python projects.
///
/// Handles `requirements.txt` (PEP 508 lines) and `pyproject.toml`
/// (PEP 621 `[project]` tables and Poetry's `[tool.poetry]` tables).
pub struct PythonAnalyzer;

impl PythonAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl super::Analyzer for PythonAnalyzer {
    fn analyze(&self, kind: ManifestKind, content: &str) -> Result<Vec<DependencyRecord>> {
        match kind {
            ManifestKind::PyprojectToml => parse_pyproject_toml(content),
            _ => parse_requirements_txt(content),
        }
    }
}

fn make_dep(name: &str, constraint: &str) -> DependencyRecord {
    DependencyRecord::declared(name, Ecosystem::Python, constraint)
}

/// Split a PEP 508 requirement into name and version specifier.
///
/// Extras and environment markers are dropped. Returns `Ok(None)` for
/// direct URL references, which have no registry version.
fn parse_requirement(re: &Regex, line: &str) -> Result<Option<(String, String)>> {
    let requirement = line.split(';').next().unwrap_or(line).trim();
    if requirement.contains(" @ ") || requirement.contains("://") {
        return Ok(None);
    }

    let Some(caps) = re.captures(requirement) else {
        bail!("invalid requirement {:?}", line);
    };
    let name = caps[1].to_string();
    let spec: String = caps[2]
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    Ok(Some((name, spec)))
}

fn requirement_regex() -> Result<Regex> {
    Ok(Regex::new(
        r"^([A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(?:\[[^\]]*\])?\s*([(<>=!~^*0-9., )A-Za-z+-]*)$",
    )?)
}

/// Parse `requirements.txt`. Option lines (`-r`, `-e`, `--hash`, ...) and
/// URL requirements are skipped; anything else that is not a valid
/// requirement is an error.
fn parse_requirements_txt(content: &str) -> Result<Vec<DependencyRecord>> {
    let re = requirement_regex()?;
    let mut deps = Vec::new();

    let joined = content.replace("\\\r\n", " ").replace("\\\n", " ");
    for (idx, raw_line) in joined.lines().enumerate() {
        let line = match raw_line.find(" #") {
            Some(pos) => &raw_line[..pos],
            None => raw_line,
        };
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
            continue;
        }
        if line.starts_with("git+") || line.contains("://") {
            continue;
        }

        match parse_requirement(&re, line) {
            Ok(Some((name, spec))) => deps.push(make_dep(&name, &spec)),
            Ok(None) => {}
            Err(err) => bail!("line {}: {}", idx + 1, err),
        }
    }

    Ok(deps)
}

#[derive(Debug, Deserialize)]
struct Pyproject {
    project: Option<PyprojectProject>,
    tool: Option<PyprojectTool>,
}

#[derive(Debug, Deserialize)]
struct PyprojectProject {
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default, rename = "optional-dependencies")]
    optional_dependencies: toml::Table,
}

#[derive(Debug, Deserialize)]
struct PyprojectTool {
    poetry: Option<PoetrySection>,
}

#[derive(Debug, Deserialize)]
struct PoetrySection {
    #[serde(default)]
    dependencies: toml::Table,
    #[serde(default, rename = "dev-dependencies")]
    dev_dependencies: toml::Table,
    #[serde(default)]
    group: toml::Table,
}

fn parse_pyproject_toml(content: &str) -> Result<Vec<DependencyRecord>> {
    let pyproject: Pyproject = toml::from_str(content)?;
    let re = requirement_regex()?;
    let mut deps = Vec::new();

    if let Some(project) = pyproject.project {
        let optional = project
            .optional_dependencies
            .values()
            .filter_map(Value::as_array)
            .flatten()
            .filter_map(Value::as_str);
        let declared = project.dependencies.iter().map(String::as_str).chain(optional);

        for requirement in declared {
            if let Some((name, spec)) = parse_requirement(&re, requirement)? {
                deps.push(make_dep(&name, &spec));
            }
        }
    }

    if let Some(poetry) = pyproject.tool.and_then(|t| t.poetry) {
        collect_poetry_table(&poetry.dependencies, &mut deps)?;
        collect_poetry_table(&poetry.dev_dependencies, &mut deps)?;
        for group in poetry.group.values() {
            if let Some(table) = group.get("dependencies").and_then(Value::as_table) {
                collect_poetry_table(table, &mut deps)?;
            }
        }
    }

    Ok(deps)
}

fn collect_poetry_table(table: &toml::Table, deps: &mut Vec<DependencyRecord>) -> Result<()> {
    for (name, spec) in table {
        if name == "python" {
            continue;
        }
        match spec {
            Value::String(constraint) => deps.push(make_dep(name, constraint)),
            Value::Table(detail) => match detail.get("version").and_then(Value::as_str) {
                Some(constraint) => deps.push(make_dep(name, constraint)),
                None => tracing::debug!(dependency = %name, "skipping non-registry dependency"),
            },
            // Multiple-constraint arrays depend on markers; the first entry is used.
            Value::Array(alternatives) => {
                let first = alternatives
                    .first()
                    .and_then(|a| a.get("version"))
                    .and_then(Value::as_str);
                if let Some(constraint) = first {
                    deps.push(make_dep(name, constraint));
                }
            }
            other => bail!(
                "poetry dependency `{}` has unsupported type {}",
                name,
                other.type_str()
            ),
        }
    }
    Ok(())
}
