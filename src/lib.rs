//! `repo-health`: locate dependency manifests in a repository tree, resolve
//! each declared dependency against its registry, and score the tree's health.
//!
//! # Flow
//! 1. Find manifests under the root ([`locator::locate_manifests`]).
//! 2. Parse each into dependency records ([`analyzer::parse_manifest`]).
//! 3. Resolve records against registries and advisories ([`resolver`]).
//! 4. Score and assemble the report ([`scorer`], [`assembler::HealthAnalyzer`]).

pub mod analyzer;
pub mod assembler;
pub mod config;
pub mod error;
pub mod locator;
pub mod models;
pub mod registry;
pub mod resolver;
pub mod scorer;
pub mod version;

pub use assembler::HealthAnalyzer;
pub use error::{FatalError, ParseError, ResolutionError};
pub use models::{AnalysisReport, DependencyRecord, DependencyStatus, Ecosystem};
