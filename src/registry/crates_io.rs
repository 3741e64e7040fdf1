use reqwest::Client;

use super::{check_status, malformed, PackageVersions};
use crate::error::ResolutionError;

/// Fetch the published versions of a crate from crates.io.
pub async fn fetch_versions(
    client: &Client,
    base: &str,
    name: &str,
) -> Result<PackageVersions, ResolutionError> {
    let url = format!("{}/api/v1/crates/{}", base.trim_end_matches('/'), name);

    let response = check_status(client.get(&url).send().await?)?;
    let data: serde_json::Value = response.json().await?;

    let krate = data.get("crate").ok_or_else(|| malformed("missing `crate`"))?;
    let latest = ["max_stable_version", "max_version", "newest_version"]
        .iter()
        .find_map(|key| krate.get(*key).and_then(|v| v.as_str()))
        .ok_or_else(|| malformed("missing latest version"))?
        .to_string();

    let versions = data
        .get("versions")
        .and_then(|v| v.as_array())
        .map(|versions| {
            versions
                .iter()
                .filter(|v| !v.get("yanked").and_then(|y| y.as_bool()).unwrap_or(false))
                .filter_map(|v| v.get("num").and_then(|n| n.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(PackageVersions { latest, versions })
}
