use std::collections::HashSet;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::config::LocatorConfig;
use crate::models::{Ecosystem, ManifestKind};

/// A manifest found under the analyzed root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedManifest {
    pub kind: ManifestKind,
    /// Absolute, canonical path.
    pub path: PathBuf,
    /// Path relative to the root, `/` separated.
    pub relative: String,
}

impl LocatedManifest {
    pub fn ecosystem(&self) -> Ecosystem {
        self.kind.ecosystem()
    }
}

/// Walk `root` and collect every recognized manifest, in file-name order.
///
/// `root` must already be canonical. Symlinked directories are never
/// entered; a symlinked manifest is kept only when its target stays inside
/// `root`. Unreadable entries are skipped.
pub fn locate_manifests(root: &Path, config: &LocatorConfig) -> Vec<LocatedManifest> {
    let mut found = Vec::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .max_depth(config.max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e, &config.skip_dirs));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::debug!(error = %err, "skipping unreadable entry");
                continue;
            }
        };

        let Some(kind) = entry.file_name().to_str().and_then(ManifestKind::from_file_name) else {
            continue;
        };

        let path = if entry.file_type().is_file() {
            entry.path().to_path_buf()
        } else if entry.path_is_symlink() {
            match contained_target(root, entry.path()) {
                Some(target) => target,
                None => {
                    tracing::warn!(path = %entry.path().display(), "ignoring manifest symlink leaving the tree");
                    continue;
                }
            }
        } else {
            continue;
        };

        if !seen.insert(path.clone()) {
            continue;
        }

        let relative = relative_display(root, entry.path());
        tracing::debug!(manifest = %relative, ecosystem = %kind.ecosystem(), "found manifest");
        found.push(LocatedManifest {
            kind,
            path,
            relative,
        });
    }

    found
}

fn is_skipped_dir(entry: &DirEntry, skip_dirs: &[String]) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| skip_dirs.iter().any(|d| d == name))
}

/// Canonical target of a symlinked file, if it is a regular file inside `root`.
fn contained_target(root: &Path, link: &Path) -> Option<PathBuf> {
    let target = link.canonicalize().ok()?;
    if target.starts_with(root) && target.is_file() {
        Some(target)
    } else {
        None
    }
}

fn relative_display(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn canonical_tempdir() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        (dir, root)
    }

    #[test]
    fn test_empty_tree() {
        let (_dir, root) = canonical_tempdir();
        assert!(locate_manifests(&root, &LocatorConfig::default()).is_empty());
    }

    #[test]
    fn test_finds_nested_manifests_in_stable_order() {
        let (_dir, root) = canonical_tempdir();
        fs::create_dir_all(root.join("web")).unwrap();
        fs::create_dir_all(root.join("api")).unwrap();
        fs::write(root.join("web/package.json"), "{}").unwrap();
        fs::write(root.join("api/requirements.txt"), "").unwrap();
        fs::write(root.join("Cargo.toml"), "").unwrap();
        fs::write(root.join("README.md"), "").unwrap();

        let found = locate_manifests(&root, &LocatorConfig::default());
        let rel: Vec<_> = found.iter().map(|m| m.relative.as_str()).collect();
        assert_eq!(rel, vec!["Cargo.toml", "api/requirements.txt", "web/package.json"]);
        assert_eq!(found[0].ecosystem(), Ecosystem::Rust);
        assert_eq!(found[1].kind, ManifestKind::RequirementsTxt);
    }

    #[test]
    fn test_skips_vendored_directories() {
        let (_dir, root) = canonical_tempdir();
        fs::create_dir_all(root.join("node_modules/left-pad")).unwrap();
        fs::write(root.join("node_modules/left-pad/package.json"), "{}").unwrap();
        fs::write(root.join("package.json"), "{}").unwrap();

        let found = locate_manifests(&root, &LocatorConfig::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].relative, "package.json");
    }

    #[test]
    fn test_respects_max_depth() {
        let (_dir, root) = canonical_tempdir();
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::write(root.join("a/b/c/pom.xml"), "").unwrap();

        let config = LocatorConfig {
            max_depth: 2,
            ..LocatorConfig::default()
        };
        assert!(locate_manifests(&root, &config).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_outside_root_is_ignored() {
        let (_outside_dir, outside) = canonical_tempdir();
        fs::write(outside.join("package.json"), "{}").unwrap();
        fs::create_dir(outside.join("pkgs")).unwrap();
        fs::write(outside.join("pkgs/Cargo.toml"), "").unwrap();

        let (_dir, root) = canonical_tempdir();
        std::os::unix::fs::symlink(outside.join("package.json"), root.join("package.json")).unwrap();
        std::os::unix::fs::symlink(outside.join("pkgs"), root.join("linked")).unwrap();

        assert!(locate_manifests(&root, &LocatorConfig::default()).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_root_is_deduplicated() {
        let (_dir, root) = canonical_tempdir();
        fs::create_dir(root.join("app")).unwrap();
        fs::write(root.join("app/package.json"), "{}").unwrap();
        std::os::unix::fs::symlink(root.join("app/package.json"), root.join("package.json")).unwrap();

        let found = locate_manifests(&root, &LocatorConfig::default());
        assert_eq!(found.len(), 1);
    }
}
