//! Reduces classified dependencies into a [`Summary`] and a health score.
//!
//! The score is derived from counts rather than summed record by record, so
//! the order of the input never changes the result.

use serde::Deserialize;

use crate::models::{DependencyRecord, DependencyStatus, Summary};

/// Penalty subtracted from 100 for each affected record.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    #[serde(rename = "outdated_penalty")]
    pub outdated: f64,
    #[serde(rename = "vulnerable_penalty")]
    pub vulnerable: f64,
    #[serde(rename = "unresolvable_penalty")]
    pub unresolvable: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            outdated: 2.0,
            vulnerable: 8.0,
            unresolvable: 1.0,
        }
    }
}

pub fn summarize(deps: &[DependencyRecord]) -> Summary {
    Summary {
        total_packages: deps.len(),
        outdated_count: deps.iter().filter(|d| d.outdated).count(),
        vulnerable_count: deps.iter().filter(|d| d.is_vulnerable()).count(),
        unresolvable_count: deps
            .iter()
            .filter(|d| d.status == Some(DependencyStatus::Unresolvable))
            .count(),
    }
}

/// Score in `[0, 100]`, rounded to two decimals. An empty set scores 100.
pub fn health_score(summary: &Summary, weights: &ScoreWeights) -> f64 {
    let penalty = summary.outdated_count as f64 * weights.outdated
        + summary.vulnerable_count as f64 * weights.vulnerable
        + summary.unresolvable_count as f64 * weights.unresolvable;
    let score = (100.0 - penalty).clamp(0.0, 100.0);
    (score * 100.0).round() / 100.0
}

/// Letter grade for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthGrade {
    A,
    B,
    C,
    D,
    F,
}

impl HealthGrade {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 90.0 => HealthGrade::A,
            s if s >= 75.0 => HealthGrade::B,
            s if s >= 60.0 => HealthGrade::C,
            s if s >= 40.0 => HealthGrade::D,
            _ => HealthGrade::F,
        }
    }
}

impl std::fmt::Display for HealthGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let letter = match self {
            HealthGrade::A => "A",
            HealthGrade::B => "B",
            HealthGrade::C => "C",
            HealthGrade::D => "D",
            HealthGrade::F => "F",
        };
        write!(f, "{}", letter)
    }
}
