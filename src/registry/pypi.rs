use reqwest::Client;

use super::{check_status, malformed, PackageVersions};
use crate::error::ResolutionError;

/// Fetch the published versions of a Python package from PyPI.
pub async fn fetch_versions(
    client: &Client,
    base: &str,
    name: &str,
) -> Result<PackageVersions, ResolutionError> {
    let url = format!("{}/pypi/{}/json", base.trim_end_matches('/'), name);

    let response = check_status(client.get(&url).send().await?)?;
    let data: serde_json::Value = response.json().await?;

    let latest = data
        .get("info")
        .and_then(|i| i.get("version"))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| malformed("missing info.version"))?
        .to_string();

    // A release whose every file is yanked is not installable.
    let versions = data
        .get("releases")
        .and_then(|r| r.as_object())
        .map(|releases| {
            releases
                .iter()
                .filter(|(_, files)| {
                    let files = files.as_array().map(Vec::as_slice).unwrap_or_default();
                    files.is_empty()
                        || files
                            .iter()
                            .any(|f| !f.get("yanked").and_then(|y| y.as_bool()).unwrap_or(false))
                })
                .map(|(version, _)| version.clone())
                .collect()
        })
        .unwrap_or_default();

    Ok(PackageVersions { latest, versions })
}
