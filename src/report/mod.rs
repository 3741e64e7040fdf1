//! Report renderers for analysis results.
//!
//! - [`terminal`]: colored summary box with score and grade, dependency
//!   table and partial failures; respects `--verbose` / `--quiet`.
//! - JSON output is the serialized [`repo_health::AnalysisReport`] itself.

pub mod terminal;
