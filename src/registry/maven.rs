use reqwest::Client;

use super::{check_status, malformed, PackageVersions};
use crate::error::ResolutionError;

/// Fetch the latest version of a Maven artifact from the Maven Central
/// search API.
///
/// The `name` is expected in `groupId:artifactId` format (as stored in our
/// records). The search API reports only the latest version.
pub async fn fetch_versions(
    client: &Client,
    base: &str,
    name: &str,
) -> Result<PackageVersions, ResolutionError> {
    let Some((group_id, artifact_id)) = name.split_once(':') else {
        return Err(ResolutionError::PackageNotFound);
    };

    let url = format!("{}/solrsearch/select", base.trim_end_matches('/'));
    let query = format!("g:\"{}\" AND a:\"{}\"", group_id, artifact_id);

    let response = client
        .get(&url)
        .query(&[("q", query.as_str()), ("rows", "1"), ("wt", "json")])
        .send()
        .await?;
    let data: serde_json::Value = check_status(response)?.json().await?;

    let docs = data
        .get("response")
        .and_then(|r| r.get("docs"))
        .and_then(|d| d.as_array())
        .ok_or_else(|| malformed("missing response.docs"))?;

    let Some(doc) = docs.first() else {
        return Err(ResolutionError::PackageNotFound);
    };

    let latest = doc
        .get("latestVersion")
        .or_else(|| doc.get("v"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| malformed("missing latestVersion"))?
        .to_string();

    Ok(PackageVersions {
        latest,
        versions: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_latest_version() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/solrsearch/select"))
            .and(query_param("q", "g:\"com.google.guava\" AND a:\"guava\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": { "numFound": 1, "docs": [{ "latestVersion": "32.1.2-jre" }] }
            })))
            .mount(&server)
            .await;

        let found = fetch_versions(&Client::new(), &server.uri(), "com.google.guava:guava")
            .await
            .unwrap();
        assert_eq!(found.latest, "32.1.2-jre");
    }

    #[tokio::test]
    async fn test_no_docs_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": { "numFound": 0, "docs": [] }
            })))
            .mount(&server)
            .await;

        let err = fetch_versions(&Client::new(), &server.uri(), "org.none:none")
            .await
            .unwrap_err();
        assert_eq!(err, ResolutionError::PackageNotFound);
    }

    #[tokio::test]
    async fn test_name_without_group() {
        let err = fetch_versions(&Client::new(), "http://127.0.0.1:9", "guava")
            .await
            .unwrap_err();
        assert_eq!(err, ResolutionError::PackageNotFound);
    }
}
