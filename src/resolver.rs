//! Version Resolver: classifies every declared dependency against its
//! registry.
//!
//! Identical `(ecosystem, name, constraint)` lookups are issued once. Lookups
//! run through `buffer_unordered` with a fixed cap, and each result is written
//! into the slot reserved for its lookup, so completion order never leaks
//! into the output.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;

use crate::config::ResolverConfig;
use crate::error::ResolutionError;
use crate::models::{DependencyRecord, Ecosystem, FailureKind, PartialFailure};
use crate::registry::{PackageRegistry, RegistryInfo};
use crate::version::{parse_version, Constraint};

/// Result of classifying one lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub latest: String,
    pub outdated: bool,
    pub advisory_ids: BTreeSet<String>,
    pub advisory_error: Option<String>,
}

/// Side results of a resolution pass.
#[derive(Debug, Default)]
pub struct ResolveOutcome {
    pub failures: Vec<PartialFailure>,
    /// The cancel signal fired before every lookup finished.
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LookupKey {
    ecosystem: Ecosystem,
    name: String,
    constraint: String,
}

impl LookupKey {
    fn subject(&self) -> String {
        format!("{}:{}", self.ecosystem, self.name)
    }
}

pub struct Resolver<'a, R> {
    registry: &'a R,
    concurrency: usize,
    timeout: Duration,
    progress: Option<ProgressBar>,
}

impl<'a, R: PackageRegistry> Resolver<'a, R> {
    pub fn new(registry: &'a R, config: &ResolverConfig) -> Self {
        Self {
            registry,
            concurrency: config.concurrency.max(1),
            timeout: config.timeout(),
            progress: None,
        }
    }

    /// Size `progress` to the number of distinct lookups and tick it once per
    /// finished lookup.
    pub fn with_progress(mut self, progress: Option<ProgressBar>) -> Self {
        self.progress = progress;
        self
    }

    /// Classify every record in place.
    ///
    /// Each record is completed exactly once. When `cancel` completes first,
    /// lookups still in flight are dropped and their records become
    /// `UNRESOLVABLE`; finished lookups are kept.
    pub async fn resolve_all<C>(&self, records: &mut [DependencyRecord], cancel: C) -> ResolveOutcome
    where
        C: Future<Output = ()>,
    {
        let mut keys: Vec<LookupKey> = Vec::new();
        let mut positions: HashMap<LookupKey, usize> = HashMap::new();
        let mut slot_of_record = Vec::with_capacity(records.len());

        for record in records.iter() {
            let key = LookupKey {
                ecosystem: record.ecosystem,
                name: record.name.clone(),
                constraint: record.requested_constraint.clone(),
            };
            let slot = *positions.entry(key.clone()).or_insert_with(|| {
                keys.push(key);
                keys.len() - 1
            });
            slot_of_record.push(slot);
        }

        tracing::info!(
            records = records.len(),
            lookups = keys.len(),
            concurrency = self.concurrency,
            "resolving dependencies"
        );

        if let Some(pb) = &self.progress {
            pb.set_length(keys.len() as u64);
        }

        let mut slots: Vec<Option<Result<Classification, ResolutionError>>> = vec![None; keys.len()];
        let mut cancelled = false;
        {
            let lookups = stream::iter(keys.iter().enumerate())
                .map(|(slot, key)| async move { (slot, self.lookup(key).await) })
                .buffer_unordered(self.concurrency);
            tokio::pin!(lookups);
            tokio::pin!(cancel);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut cancel => {
                        cancelled = slots.iter().any(Option::is_none);
                        if cancelled {
                            tracing::warn!("resolution cancelled, abandoning in-flight lookups");
                        }
                        break;
                    }
                    next = lookups.next() => match next {
                        Some((slot, outcome)) => {
                            slots[slot] = Some(outcome);
                            if let Some(pb) = &self.progress {
                                pb.inc(1);
                            }
                        }
                        None => break,
                    },
                }
            }
        }

        let mut failures = Vec::new();
        let mut reported = vec![false; keys.len()];
        for (record, slot) in records.iter_mut().zip(slot_of_record) {
            let first_for_key = !std::mem::replace(&mut reported[slot], true);
            let subject = keys[slot].subject();

            match &slots[slot] {
                Some(Ok(classification)) => {
                    record.resolve(
                        classification.latest.clone(),
                        classification.outdated,
                        classification.advisory_ids.clone(),
                    );
                    if let (Some(err), true) = (&classification.advisory_error, first_for_key) {
                        failures.push(PartialFailure {
                            subject,
                            kind: FailureKind::Advisory,
                            reason: err.clone(),
                        });
                    }
                }
                Some(Err(err)) => {
                    record.mark_unresolvable();
                    if first_for_key {
                        failures.push(PartialFailure {
                            subject,
                            kind: FailureKind::Resolution,
                            reason: err.to_string(),
                        });
                    }
                }
                None => {
                    record.mark_unresolvable();
                    if first_for_key {
                        failures.push(PartialFailure {
                            subject,
                            kind: FailureKind::Resolution,
                            reason: ResolutionError::Cancelled.to_string(),
                        });
                    }
                }
            }
        }

        ResolveOutcome { failures, cancelled }
    }

    async fn lookup(&self, key: &LookupKey) -> Result<Classification, ResolutionError> {
        let request = self
            .registry
            .resolve(key.ecosystem, &key.name, &key.constraint);
        let info = match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(ResolutionError::Timeout(self.timeout)),
        };

        let outcome = info.and_then(|info| classify(key.ecosystem, &key.constraint, &info));
        match &outcome {
            Ok(c) => tracing::debug!(
                package = %key.name,
                latest = %c.latest,
                outdated = c.outdated,
                advisories = c.advisory_ids.len(),
                "resolved"
            ),
            Err(err) => tracing::debug!(package = %key.name, error = %err, "unresolvable"),
        }
        outcome
    }
}

/// Classify a dependency from the registry's answer. Pure; no I/O.
pub fn classify(
    ecosystem: Ecosystem,
    constraint: &str,
    info: &RegistryInfo,
) -> Result<Classification, ResolutionError> {
    let latest = parse_version(&info.latest_version).ok_or_else(|| {
        ResolutionError::InvalidVersion(format!("latest version {:?}", info.latest_version))
    })?;
    let constraint = Constraint::parse(ecosystem, constraint)?;

    let resolvable = constraint
        .resolvable_version(&info.versions)
        .map(|resolved| resolved.version);
    let outdated = constraint.is_outdated(&latest, resolvable.as_ref());
    let installed = resolvable.unwrap_or(latest);

    let advisory_ids = info
        .advisories
        .iter()
        .filter(|a| a.affects(&installed))
        .map(|a| a.id.clone())
        .collect();

    Ok(Classification {
        latest: info.latest_version.clone(),
        outdated,
        advisory_ids,
        advisory_error: info.advisory_error.clone(),
    })
}
