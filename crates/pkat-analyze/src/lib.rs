//! # pkat-analyze
//!
//! Post-simulation analysis for population-PK output.
//!
//! This crate provides:
//! - Identifier reconciliation between dataset ids and run labels
//! - Output-column parsing (grid and chain naming conventions)
//! - Ensemble quantile bands and PK parameter extraction
//! - Residuals against observed data and tidy reshaping
//! - Variance-based sensitivity analysis (Sobol/Saltelli and eFAST)
//!
//! ## Architecture
//!
//! Numeric leaf modules (`pk`, `ensemble`, `residuals`) know nothing about
//! tables or identifiers; the `analyze` orchestrator composes them over
//! parsed output tables. Error and identifier types come from pkat-core.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Batch orchestration: ensemble and sensitivity analysis over run output.
pub mod analyze;
/// Splitting hierarchical chain output into per-level tables.
pub mod chains;
/// Output-column naming grammars.
pub mod columns;
/// Ensemble matrices, quantile bands, summary statistics.
pub mod ensemble;
/// Identifier maps between dataset ids and run labels.
pub mod hierarchy;
/// Non-compartmental PK parameter calculations.
pub mod pk;
/// Interpolation and relative residuals.
pub mod residuals;
/// Variance-based sensitivity analysis.
pub mod sensitivity;
/// Numeric tables with TSV input and output.
pub mod table;
/// Tidy (long-format) records and wide pivots.
pub mod tidy;

pub use analyze::{
    AnalysisContext, AnalysisResult, EnsembleAnalysis, ObservedSeries, RunOutput,
    SensitivityAnalysis, SensitivityResult,
};
pub use columns::ColumnGrammar;
pub use ensemble::{ConfidenceBands, EnsembleMatrix, DEFAULT_PROBS};
pub use hierarchy::IdentifierMap;
pub use pk::{PkParameterSet, DEFAULT_TAIL_POINTS};
pub use sensitivity::{SaMethod, SensitivityEngine, SensitivityProblem, PROBLEM_MARKER};
pub use table::DataTable;
pub use tidy::{TidyFrame, TidyRecord};
