use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{Advisory, PackageRegistry, RegistryInfo};
use crate::error::ResolutionError;
use crate::models::Ecosystem;

#[derive(Debug, Clone)]
struct Entry {
    outcome: Result<RegistryInfo, ResolutionError>,
    delay: Option<Duration>,
}

/// Registry answering from an in-memory table.
///
/// Unknown packages resolve to [`ResolutionError::PackageNotFound`]. A delay
/// can be attached to a package to simulate a slow registry.
#[derive(Debug, Default)]
pub struct StaticRegistry {
    entries: HashMap<(Ecosystem, String), Entry>,
    calls: AtomicUsize,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package(mut self, ecosystem: Ecosystem, name: &str, latest: &str) -> Self {
        let info = RegistryInfo {
            latest_version: latest.to_string(),
            ..RegistryInfo::default()
        };
        self.entries.insert(
            (ecosystem, name.to_string()),
            Entry {
                outcome: Ok(info),
                delay: None,
            },
        );
        self
    }

    /// Record the published version list of a package added with
    /// [`StaticRegistry::with_package`].
    pub fn with_versions(mut self, ecosystem: Ecosystem, name: &str, versions: &[&str]) -> Self {
        if let Some(Ok(info)) = self.outcome_mut(ecosystem, name) {
            info.versions = versions.iter().map(|v| v.to_string()).collect();
        }
        self
    }

    pub fn with_advisory(mut self, ecosystem: Ecosystem, name: &str, id: &str, affected: &[&str]) -> Self {
        if let Some(Ok(info)) = self.outcome_mut(ecosystem, name) {
            info.advisories.push(Advisory {
                id: id.to_string(),
                affected: affected.iter().map(|v| v.to_string()).collect(),
            });
        }
        self
    }

    /// Mark advisory data for a package as unavailable. Version data stays.
    pub fn with_advisory_error(mut self, ecosystem: Ecosystem, name: &str, reason: &str) -> Self {
        if let Some(Ok(info)) = self.outcome_mut(ecosystem, name) {
            info.advisory_error = Some(reason.to_string());
        }
        self
    }

    pub fn with_failure(mut self, ecosystem: Ecosystem, name: &str, error: ResolutionError) -> Self {
        self.entries.insert(
            (ecosystem, name.to_string()),
            Entry {
                outcome: Err(error),
                delay: None,
            },
        );
        self
    }

    pub fn with_delay(mut self, ecosystem: Ecosystem, name: &str, delay: Duration) -> Self {
        if let Some(entry) = self.entries.get_mut(&(ecosystem, name.to_string())) {
            entry.delay = Some(delay);
        }
        self
    }

    /// Number of `resolve` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn outcome_mut(
        &mut self,
        ecosystem: Ecosystem,
        name: &str,
    ) -> Option<&mut Result<RegistryInfo, ResolutionError>> {
        self.entries
            .get_mut(&(ecosystem, name.to_string()))
            .map(|e| &mut e.outcome)
    }
}

impl PackageRegistry for StaticRegistry {
    async fn resolve(
        &self,
        ecosystem: Ecosystem,
        name: &str,
        _constraint: &str,
    ) -> Result<RegistryInfo, ResolutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let Some(entry) = self.entries.get(&(ecosystem, name.to_string())) else {
            return Err(ResolutionError::PackageNotFound);
        };
        if let Some(delay) = entry.delay {
            tokio::time::sleep(delay).await;
        }
        entry.outcome.clone()
    }
}
