//! OSV.dev API client for advisory data.
//!
//! OSV (Open Source Vulnerabilities) answers "which advisories affect this
//! exact version" for every ecosystem we support, so one client covers them
//! all.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{check_status, Advisory};
use crate::error::ResolutionError;
use crate::models::Ecosystem;

#[derive(Debug, Serialize)]
struct OsvQueryRequest<'a> {
    package: OsvPackage<'a>,
    version: &'a str,
}

#[derive(Debug, Serialize)]
struct OsvPackage<'a> {
    name: &'a str,
    ecosystem: &'static str,
}

#[derive(Debug, Deserialize)]
struct OsvQueryResponse {
    #[serde(default)]
    vulns: Vec<OsvVulnerability>,
}

#[derive(Debug, Deserialize)]
struct OsvVulnerability {
    id: String,
    #[serde(default)]
    aliases: Vec<String>,
}

impl OsvVulnerability {
    /// Prefer the CVE alias when there is one.
    fn display_id(&self) -> String {
        self.aliases
            .iter()
            .find(|id| id.starts_with("CVE-"))
            .cloned()
            .unwrap_or_else(|| self.id.clone())
    }
}

/// Advisories affecting `name@version`. Every returned advisory lists
/// `version` as its affected version.
pub async fn query(
    client: &Client,
    base: &str,
    ecosystem: Ecosystem,
    name: &str,
    version: &str,
) -> Result<Vec<Advisory>, ResolutionError> {
    let url = format!("{}/v1/query", base.trim_end_matches('/'));
    let request = OsvQueryRequest {
        package: OsvPackage {
            name,
            ecosystem: ecosystem.as_osv_str(),
        },
        version,
    };

    let response = check_status(client.post(&url).json(&request).send().await?)?;
    let body: OsvQueryResponse = response.json().await?;

    let mut advisories: Vec<Advisory> = body
        .vulns
        .iter()
        .map(|v| Advisory {
            id: v.display_id(),
            affected: vec![version.to_string()],
        })
        .collect();
    advisories.sort_by(|a, b| a.id.cmp(&b.id));
    advisories.dedup_by(|a, b| a.id == b.id);

    tracing::debug!(package = %name, version = %version, count = advisories.len(), "osv query");
    Ok(advisories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_query_prefers_cve_alias() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/query"))
            .and(body_json(serde_json::json!({
                "package": { "name": "lodash", "ecosystem": "npm" },
                "version": "4.17.15"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "vulns": [
                    { "id": "GHSA-p6mc-m468-83gw", "aliases": ["CVE-2020-8203"] },
                    { "id": "GHSA-35jh-r3h4-6jhm" }
                ]
            })))
            .mount(&server)
            .await;

        let advisories = query(&Client::new(), &server.uri(), Ecosystem::Node, "lodash", "4.17.15")
            .await
            .unwrap();
        let ids: Vec<_> = advisories.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["CVE-2020-8203", "GHSA-35jh-r3h4-6jhm"]);
        assert_eq!(advisories[0].affected, vec!["4.17.15".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_response_means_no_advisories() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let advisories = query(&Client::new(), &server.uri(), Ecosystem::Rust, "serde", "1.0.0")
            .await
            .unwrap();
        assert!(advisories.is_empty());
    }
}
