//! Package registry and advisory lookups.
//!
//! [`PackageRegistry`] is the single capability the resolver needs. The
//! production implementation, [`HttpRegistry`], dispatches on the
//! [`Ecosystem`] to one client module per registry and asks OSV.dev for
//! advisories. [`memory::StaticRegistry`] answers from an in-memory table.

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

use crate::config::RegistryConfig;
use crate::error::ResolutionError;
use crate::models::Ecosystem;
use crate::version::{parse_version, Constraint};

pub mod crates_io;
pub mod maven;
pub mod memory;
pub mod npm;
pub mod osv;
pub mod pypi;

const USER_AGENT: &str = concat!(
    "repo-health/",
    env!("CARGO_PKG_VERSION"),
    " (dependency health analysis)"
);

/// Published versions of one package.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageVersions {
    pub latest: String,
    /// Every published, non-yanked version. May be empty.
    pub versions: Vec<String>,
}

/// A known vulnerability for a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub id: String,
    /// Exact versions (`1.0.0`) or semver requirements (`>=1.0.0, <1.2.3`).
    pub affected: Vec<String>,
}

impl Advisory {
    pub fn affects(&self, version: &Version) -> bool {
        self.affected.iter().any(|spec| {
            if let Some(exact) = parse_version(spec).filter(|_| !spec.contains([',', '<', '>', '^', '~', '*'])) {
                return &exact == version;
            }
            VersionReq::parse(spec).is_ok_and(|req| req.matches(version))
        })
    }
}

/// Everything the resolver needs to classify one dependency.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryInfo {
    pub latest_version: String,
    pub versions: Vec<String>,
    pub advisories: Vec<Advisory>,
    /// Advisory data could not be fetched; version data is still valid.
    pub advisory_error: Option<String>,
}

/// One registry/advisory query interface per supported ecosystem.
#[allow(async_fn_in_trait)]
pub trait PackageRegistry: Send + Sync {
    async fn resolve(
        &self,
        ecosystem: Ecosystem,
        name: &str,
        constraint: &str,
    ) -> Result<RegistryInfo, ResolutionError>;
}

/// Live registries over HTTPS.
pub struct HttpRegistry {
    client: Client,
    config: RegistryConfig,
}

impl HttpRegistry {
    pub fn new(config: RegistryConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, config })
    }

    async fn fetch_versions(
        &self,
        ecosystem: Ecosystem,
        name: &str,
    ) -> Result<PackageVersions, ResolutionError> {
        let client = &self.client;
        match ecosystem {
            Ecosystem::Rust => crates_io::fetch_versions(client, &self.config.crates_io, name).await,
            Ecosystem::Node => npm::fetch_versions(client, &self.config.npm, name).await,
            Ecosystem::Python => pypi::fetch_versions(client, &self.config.pypi, name).await,
            Ecosystem::Java => maven::fetch_versions(client, &self.config.maven, name).await,
        }
    }
}

impl PackageRegistry for HttpRegistry {
    async fn resolve(
        &self,
        ecosystem: Ecosystem,
        name: &str,
        constraint: &str,
    ) -> Result<RegistryInfo, ResolutionError> {
        let published = self.fetch_versions(ecosystem, name).await?;
        let mut info = RegistryInfo {
            latest_version: published.latest,
            versions: published.versions,
            ..RegistryInfo::default()
        };

        if !self.config.advisories {
            return Ok(info);
        }

        // Advisories are asked for the version the constraint installs today,
        // spelled the way the registry publishes it.
        let Ok(constraint) = Constraint::parse(ecosystem, constraint) else {
            return Ok(info);
        };
        let Some(version) = constraint
            .resolvable_version(&info.versions)
            .map(|resolved| resolved.text)
            .or_else(|| parse_version(&info.latest_version).map(|_| info.latest_version.clone()))
        else {
            return Ok(info);
        };

        match osv::query(&self.client, &self.config.osv, ecosystem, name, &version).await {
            Ok(advisories) => info.advisories = advisories,
            Err(err) => {
                tracing::warn!(package = %name, error = %err, "advisory lookup failed");
                info.advisory_error = Some(err.to_string());
            }
        }

        Ok(info)
    }
}

/// Map a registry response status onto the resolution taxonomy.
pub(crate) fn check_status(response: Response) -> Result<Response, ResolutionError> {
    match response.status() {
        s if s.is_success() => Ok(response),
        StatusCode::NOT_FOUND => Err(ResolutionError::PackageNotFound),
        s => Err(ResolutionError::RegistryUnreachable(format!("HTTP {}", s))),
    }
}

pub(crate) fn malformed(what: &str) -> ResolutionError {
    ResolutionError::RegistryUnreachable(format!("malformed registry response: {}", what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn local_registry(server: &MockServer, advisories: bool) -> HttpRegistry {
        let config = RegistryConfig {
            crates_io: server.uri(),
            npm: server.uri(),
            pypi: server.uri(),
            maven: server.uri(),
            osv: server.uri(),
            advisories,
        };
        HttpRegistry::new(config, Duration::from_secs(5)).unwrap()
    }

    async fn mount_pytz(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/pypi/pytz/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "info": { "version": "2024.1" },
                "releases": {
                    "2023.3": [{ "yanked": false }],
                    "2023.3.post1": [{ "yanked": false }],
                    "2024.1": [{ "yanked": false }]
                }
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_resolve_queries_osv_with_published_version() {
        let server = MockServer::start().await;
        mount_pytz(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/query"))
            .and(body_json(serde_json::json!({
                "package": { "name": "pytz", "ecosystem": "PyPI" },
                "version": "2023.3.post1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "vulns": [{ "id": "PYSEC-2024-1" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let info = local_registry(&server, true)
            .resolve(Ecosystem::Python, "pytz", "==2023.3.post1")
            .await
            .unwrap();
        assert_eq!(info.latest_version, "2024.1");
        assert_eq!(info.advisories.len(), 1);
        assert!(info.advisory_error.is_none());

        let classified = crate::resolver::classify(Ecosystem::Python, "==2023.3.post1", &info).unwrap();
        assert!(classified.advisory_ids.contains("PYSEC-2024-1"));
        assert!(classified.outdated);
    }

    #[tokio::test]
    async fn test_resolve_reports_osv_outage_separately() {
        let server = MockServer::start().await;
        mount_pytz(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/query"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let info = local_registry(&server, true)
            .resolve(Ecosystem::Python, "pytz", ">=2023")
            .await
            .unwrap();
        assert_eq!(info.latest_version, "2024.1");
        assert!(info.advisories.is_empty());
        assert!(info.advisory_error.as_deref().is_some_and(|e| e.contains("500")));
    }

    #[tokio::test]
    async fn test_resolve_skips_osv_when_advisories_disabled() {
        let server = MockServer::start().await;
        mount_pytz(&server).await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let info = local_registry(&server, false)
            .resolve(Ecosystem::Python, "pytz", "==2023.3")
            .await
            .unwrap();
        assert_eq!(info.versions.len(), 3);
        assert!(info.advisories.is_empty());
        assert!(info.advisory_error.is_none());
    }

    fn advisory(affected: &[&str]) -> Advisory {
        Advisory {
            id: "GHSA-test".to_string(),
            affected: affected.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_advisory_exact_version() {
        let a = advisory(&["1.0.0"]);
        assert!(a.affects(&Version::new(1, 0, 0)));
        assert!(!a.affects(&Version::new(1, 0, 1)));
    }

    #[test]
    fn test_advisory_range() {
        let a = advisory(&[">=1.0.0, <1.2.3"]);
        assert!(a.affects(&Version::new(1, 2, 2)));
        assert!(!a.affects(&Version::new(1, 2, 3)));
    }

    #[test]
    fn test_advisory_without_versions_affects_nothing() {
        assert!(!advisory(&[]).affects(&Version::new(1, 0, 0)));
    }
}
