//! Version and constraint semantics for every supported ecosystem.
//!
//! All ecosystems are mapped onto [`semver`]: versions are coerced leniently
//! into [`Version`], and requested constraints become a [`Constraint`], a
//! disjunction of [`VersionReq`] alternatives with optional exclusions
//! (`!=` in PEP 440).

use semver::{BuildMetadata, Comparator, Op, Prerelease, Version, VersionReq};

use crate::error::ResolutionError;
use crate::models::Ecosystem;

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    raw: String,
    alternatives: Vec<Alternative>,
    excluded: Vec<Version>,
}

#[derive(Debug, Clone, PartialEq)]
struct Alternative {
    req: VersionReq,
    /// Set for exact PEP 440 and Maven pins. Those compare build metadata
    /// too, since it carries fourth and later release components and
    /// post-release tags.
    pinned_build: Option<BuildMetadata>,
}

impl Alternative {
    fn matches(&self, version: &Version) -> bool {
        self.req.matches(version)
            && self
                .pinned_build
                .as_ref()
                .map_or(true, |build| &version.build == build)
    }

    fn floor(&self) -> Option<Version> {
        let mut floor = req_floor(&self.req)?;
        if let Some(build) = &self.pinned_build {
            floor.build = build.clone();
        }
        Some(floor)
    }
}

/// A concrete version and the text it is published under.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVersion {
    pub version: Version,
    pub text: String,
}

impl Constraint {
    /// Parse `raw` using the requirement syntax of `ecosystem`.
    pub fn parse(ecosystem: Ecosystem, raw: &str) -> Result<Self, ResolutionError> {
        let trimmed = raw.trim();
        let mut excluded = Vec::new();

        let alternatives = match ecosystem {
            Ecosystem::Rust => vec![cargo_req(trimmed)],
            Ecosystem::Node => npm_reqs(trimmed),
            Ecosystem::Python => vec![pep440_req(trimmed, &mut excluded)?],
            Ecosystem::Java => maven_reqs(trimmed)?,
        };
        // Cargo and npm versions are native semver, where `=` ignores build
        // metadata.
        let pins_build = matches!(ecosystem, Ecosystem::Python | Ecosystem::Java);

        let alternatives = alternatives
            .into_iter()
            .map(|text| {
                let req = VersionReq::parse(&text).map_err(|err| {
                    ResolutionError::InvalidVersion(format!("constraint {:?}: {}", raw, err))
                })?;
                let pinned_build = if pins_build { exact_build(&text, &req) } else { None };
                Ok(Alternative { req, pinned_build })
            })
            .collect::<Result<Vec<_>, ResolutionError>>()?;

        Ok(Self {
            raw: raw.to_string(),
            alternatives,
            excluded,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|alt| alt.matches(version)) && !self.excluded.contains(version)
    }

    /// Smallest version the constraint admits, if it has a lower bound.
    pub fn floor(&self) -> Option<Version> {
        self.alternatives.iter().filter_map(Alternative::floor).min()
    }

    /// Highest entry of `published` the constraint admits, with its
    /// published text.
    pub fn highest_match(&self, published: &[String]) -> Option<ResolvedVersion> {
        published
            .iter()
            .filter_map(|text| parse_version(text).map(|version| (version, text)))
            .filter(|(version, _)| self.matches(version))
            .max_by(|a, b| a.0.cmp(&b.0))
            .map(|(version, text)| ResolvedVersion {
                version,
                text: text.trim().to_string(),
            })
    }

    /// The version a fresh install of this constraint would currently pick.
    ///
    /// Taken from the registry's published list when there is one. Without a
    /// list it is the constraint's floor, spelled as the pin was written when
    /// the constraint is an exact pin.
    pub fn resolvable_version(&self, published: &[String]) -> Option<ResolvedVersion> {
        if !published.is_empty() {
            return self.highest_match(published);
        }
        let version = self.floor()?;
        let text = self
            .pinned_text()
            .filter(|text| parse_version(text).as_ref() == Some(&version))
            .map(str::to_string)
            .unwrap_or_else(|| version.to_string());
        Some(ResolvedVersion { version, text })
    }

    /// Whether `latest` lies beyond everything this constraint admits.
    pub fn is_outdated(&self, latest: &Version, resolvable: Option<&Version>) -> bool {
        if self.matches(latest) {
            return false;
        }
        resolvable.map_or(true, |r| latest > r)
    }

    /// The version text of a single exact pin, operators stripped.
    fn pinned_text(&self) -> Option<&str> {
        let [alt] = self.alternatives.as_slice() else {
            return None;
        };
        alt.pinned_build.as_ref()?;
        let text = self
            .raw
            .trim()
            .trim_start_matches(['=', '['])
            .trim_end_matches(']')
            .trim();
        (!text.is_empty() && !text.contains([',', ' ', '|'])).then_some(text)
    }
}

/// Build metadata of a lone `=major.minor.patch` requirement.
fn exact_build(text: &str, req: &VersionReq) -> Option<BuildMetadata> {
    match req.comparators.as_slice() {
        [c] if c.op == Op::Exact && c.minor.is_some() && c.patch.is_some() => {
            parse_version(text.trim().trim_start_matches('=')).map(|v| v.build)
        }
        _ => None,
    }
}

/// Lowest bound of a single requirement (intersection of its comparators).
fn req_floor(req: &VersionReq) -> Option<Version> {
    req.comparators.iter().filter_map(comparator_floor).max()
}

fn comparator_floor(c: &Comparator) -> Option<Version> {
    match c.op {
        Op::Less | Op::LessEq => None,
        _ => Some(Version {
            major: c.major,
            minor: c.minor.unwrap_or(0),
            patch: c.patch.unwrap_or(0),
            pre: c.pre.clone(),
            build: BuildMetadata::EMPTY,
        }),
    }
}

/// Coerce a published or declared version string into a [`Version`].
///
/// Accepts `v` prefixes, one or two component versions, PEP 440 suffixes
/// (`rc1`, `.dev2`, `.post1`) and Maven qualifiers (`-jre`, `.Final`).
/// Fourth and later components and post-release tags go into build
/// metadata, so `1.2.3.4` is `1.2.3+4` and `2023.3.post1` is
/// `2023.3.0+post1`. Trailing zero components are dropped.
pub fn parse_version(raw: &str) -> Option<Version> {
    let s = raw.trim().trim_start_matches(['v', 'V', '=']).trim();
    if let Ok(v) = Version::parse(s) {
        return Some(v);
    }

    let mut parts = [0u64; 3];
    let mut extra: Vec<String> = Vec::new();
    let mut count = 0;
    let mut rest = s;
    loop {
        let end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if end == 0 {
            break;
        }
        let n: u64 = rest[..end].parse().ok()?;
        if count < parts.len() {
            parts[count] = n;
        } else {
            extra.push(n.to_string());
        }
        count += 1;
        rest = &rest[end..];
        match rest.strip_prefix('.') {
            Some(tail) if tail.starts_with(|c: char| c.is_ascii_digit()) => rest = tail,
            _ => break,
        }
    }
    if count == 0 {
        return None;
    }
    while extra.last().is_some_and(|e| e == "0") {
        extra.pop();
    }

    let (pre_part, build_part) = match rest.split_once('+') {
        Some((pre, build)) => (pre, build),
        None => (rest, ""),
    };
    let pre_part = pre_part.trim_start_matches(['-', '.', '_']);

    let (pre, tag) = if pre_part.to_ascii_lowercase().starts_with("post") {
        (String::new(), sanitize_identifiers(pre_part))
    } else {
        (sanitize_identifiers(pre_part), sanitize_identifiers(build_part))
    };
    if !tag.is_empty() {
        extra.push(tag);
    }
    let build = extra.join(".");

    Some(Version {
        major: parts[0],
        minor: parts[1],
        patch: parts[2],
        pre: Prerelease::new(&pre).unwrap_or(Prerelease::EMPTY),
        build: BuildMetadata::new(&build).unwrap_or(BuildMetadata::EMPTY),
    })
}

/// Rewrite arbitrary suffix text into dot separated semver identifiers.
fn sanitize_identifiers(suffix: &str) -> String {
    suffix
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|id| !id.is_empty())
        .map(|id| {
            if id.chars().all(|c| c.is_ascii_digit()) {
                let stripped = id.trim_start_matches('0');
                let kept = if stripped.is_empty() { "0" } else { stripped };
                kept.to_string()
            } else {
                id.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn is_any(raw: &str) -> bool {
    matches!(raw, "" | "*" | "x" | "X" | "latest")
}

fn cargo_req(raw: &str) -> String {
    if is_any(raw) {
        "*".to_string()
    } else {
        raw.to_string()
    }
}

/// npm ranges: `||` alternatives, hyphen ranges, and space separated
/// comparator sets. A bare version is an exact pin.
fn npm_reqs(raw: &str) -> Vec<String> {
    if is_any(raw) {
        return vec!["*".to_string()];
    }

    raw.split("||")
        .map(|part| {
            let tokens = merge_operator_tokens(part.split_whitespace().collect());
            if tokens.is_empty() {
                return "*".to_string();
            }
            if tokens.len() == 3 && tokens[1] == "-" {
                return format!(">={}, <={}", strip_v(&tokens[0]), strip_v(&tokens[2]));
            }
            tokens
                .iter()
                .map(|t| npm_comparator(t))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .collect()
}

/// Join `>= 1.2.0` into `>=1.2.0` so each token is one comparator.
fn merge_operator_tokens(tokens: Vec<&str>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in tokens {
        if matches!(token, "=" | ">" | ">=" | "<" | "<=" | "~" | "^") {
            pending_op = Some(token);
            continue;
        }
        match pending_op.take() {
            Some(op) => merged.push(format!("{}{}", op, token)),
            None => merged.push(token.to_string()),
        }
    }
    merged
}

fn strip_v(token: &str) -> &str {
    token.trim_start_matches(['v', 'V'])
}

fn npm_comparator(token: &str) -> String {
    let token = strip_v(token);
    if is_any(token) {
        return "*".to_string();
    }
    if token.starts_with(|c: char| c.is_ascii_digit())
        && !token.contains(['x', 'X', '*'])
    {
        format!("={}", token)
    } else {
        token.to_string()
    }
}

/// PEP 440 specifiers, plus Poetry's `^`/`~` shorthands. Bare versions pin.
fn pep440_req(raw: &str, excluded: &mut Vec<Version>) -> Result<String, ResolutionError> {
    if is_any(raw) {
        return Ok("*".to_string());
    }

    let mut comparators = Vec::new();
    for spec in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (op, version) = split_operator(spec);
        match op {
            "==" | "===" => {
                if let Some(prefix) = version.strip_suffix(".*") {
                    comparators.push(format!("={}", prefix));
                } else {
                    comparators.push(format!("={}", coerce(version)?));
                }
            }
            "!=" => {
                if !version.ends_with(".*") {
                    excluded.push(coerce(version)?);
                }
            }
            "~=" => {
                let floor = coerce(version)?;
                let components = version
                    .split('.')
                    .take_while(|c| c.starts_with(|ch: char| ch.is_ascii_digit()))
                    .count();
                let ceiling = if components >= 3 {
                    format!("{}.{}.0", floor.major, floor.minor + 1)
                } else {
                    format!("{}.0.0", floor.major + 1)
                };
                comparators.push(format!(">={}, <{}", floor, ceiling));
            }
            ">=" | "<=" | ">" | "<" => comparators.push(format!("{}{}", op, coerce(version)?)),
            "^" | "~" => comparators.push(format!("{}{}", op, version)),
            "" => comparators.push(format!("={}", coerce(version)?)),
            other => {
                return Err(ResolutionError::InvalidVersion(format!(
                    "unsupported specifier operator {:?} in {:?}",
                    other, raw
                )))
            }
        }
    }

    if comparators.is_empty() {
        Ok("*".to_string())
    } else {
        Ok(comparators.join(", "))
    }
}

fn split_operator(spec: &str) -> (&str, &str) {
    for op in ["===", "==", "!=", "~=", ">=", "<=", ">", "<", "^", "~"] {
        if let Some(rest) = spec.strip_prefix(op) {
            return (op, rest.trim());
        }
    }
    ("", spec.trim())
}

fn coerce(raw: &str) -> Result<Version, ResolutionError> {
    parse_version(raw).ok_or_else(|| ResolutionError::InvalidVersion(raw.to_string()))
}

/// Maven: a bare version is a soft pin; bracket ranges map to comparators.
/// Gradle dynamic versions (`1.+`, `latest.release`) become wildcards.
fn maven_reqs(raw: &str) -> Result<Vec<String>, ResolutionError> {
    if is_any(raw) || matches!(raw, "+" | "LATEST" | "RELEASE" | "latest.release" | "latest.integration") {
        return Ok(vec!["*".to_string()]);
    }
    if let Some(prefix) = raw.strip_suffix(".+") {
        let valid = !prefix.is_empty() && prefix.split('.').all(|p| p.parse::<u64>().is_ok());
        if !valid {
            return Err(ResolutionError::InvalidVersion(raw.to_string()));
        }
        return Ok(vec![format!("{}.*", prefix)]);
    }
    if !raw.starts_with(['[', '(']) {
        return Ok(vec![format!("={}", coerce(raw)?)]);
    }

    let mut reqs = Vec::new();
    let mut rest = raw;
    while let Some(start) = rest.find(['[', '(']) {
        let end = rest[start..]
            .find([']', ')'])
            .map(|i| start + i)
            .ok_or_else(|| ResolutionError::InvalidVersion(format!("unterminated range {:?}", raw)))?;
        let open = &rest[start..start + 1];
        let close = &rest[end..end + 1];
        let body = &rest[start + 1..end];

        let req = match body.split_once(',') {
            None => format!("={}", coerce(body)?),
            Some((lo, hi)) => {
                let mut parts = Vec::new();
                if !lo.trim().is_empty() {
                    let op = if open == "[" { ">=" } else { ">" };
                    parts.push(format!("{}{}", op, coerce(lo)?));
                }
                if !hi.trim().is_empty() {
                    let op = if close == "]" { "<=" } else { "<" };
                    parts.push(format!("{}{}", op, coerce(hi)?));
                }
                if parts.is_empty() {
                    "*".to_string()
                } else {
                    parts.join(", ")
                }
            }
        };
        reqs.push(req);
        rest = &rest[end + 1..];
    }
    Ok(reqs)
}
