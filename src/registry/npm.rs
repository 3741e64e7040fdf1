use reqwest::Client;

use super::{check_status, malformed, PackageVersions};
use crate::error::ResolutionError;

/// Fetch the published versions of an npm package.
///
/// Uses the abbreviated ("corgi") document, which omits readmes and
/// per-version manifests.
pub async fn fetch_versions(
    client: &Client,
    base: &str,
    name: &str,
) -> Result<PackageVersions, ResolutionError> {
    // Scoped packages keep the `@` but encode the slash: @scope/pkg → @scope%2Fpkg
    let encoded_name = name.replace('/', "%2F");
    let url = format!("{}/{}", base.trim_end_matches('/'), encoded_name);

    let response = client
        .get(&url)
        .header("Accept", "application/vnd.npm.install-v1+json")
        .send()
        .await?;
    let data: serde_json::Value = check_status(response)?.json().await?;

    let latest = data
        .get("dist-tags")
        .and_then(|d| d.get("latest"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| malformed("missing dist-tags.latest"))?
        .to_string();

    let versions = data
        .get("versions")
        .and_then(|v| v.as_object())
        .map(|versions| versions.keys().cloned().collect())
        .unwrap_or_default();

    Ok(PackageVersions { latest, versions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_scoped_package() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/@types%2Fnode"))
            .and(header("Accept", "application/vnd.npm.install-v1+json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "@types/node",
                "dist-tags": { "latest": "20.8.0" },
                "versions": { "20.7.0": {}, "20.8.0": {} }
            })))
            .mount(&server)
            .await;

        let found = fetch_versions(&Client::new(), &server.uri(), "@types/node").await.unwrap();
        assert_eq!(found.latest, "20.8.0");
        assert_eq!(found.versions.len(), 2);
    }

    #[tokio::test]
    async fn test_server_error_is_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = fetch_versions(&Client::new(), &server.uri(), "left-pad").await.unwrap_err();
        assert!(matches!(err, ResolutionError::RegistryUnreachable(_)));
    }
}
