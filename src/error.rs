use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Aborts the whole analysis run.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("repository root {path} is not accessible: {reason}")]
    RootInaccessible { path: PathBuf, reason: String },
}

/// A single manifest could not be parsed. Recovered by the assembler.
#[derive(Debug, Error)]
#[error("failed to parse {manifest_path}: {reason}")]
pub struct ParseError {
    pub manifest_path: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(manifest_path: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            reason: reason.to_string(),
        }
    }
}

/// A single dependency lookup failed. The record becomes `UNRESOLVABLE`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("registry unreachable: {0}")]
    RegistryUnreachable(String),
    #[error("package not found in registry")]
    PackageNotFound,
    #[error("registry lookup timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid version: {0}")]
    InvalidVersion(String),
    #[error("analysis cancelled before lookup completed")]
    Cancelled,
}

impl From<reqwest::Error> for ResolutionError {
    fn from(err: reqwest::Error) -> Self {
        ResolutionError::RegistryUnreachable(err.to_string())
    }
}
