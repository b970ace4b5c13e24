//! Global variance-based sensitivity analysis.
//!
//! Two-phase protocol: generate a design matrix of parameter draws for a
//! [`SensitivityProblem`], run the external simulation over those draws, then
//! decompose the variance of each per-draw scalar response (one PK parameter
//! at a time) into first-order, total-order, and pairwise-interaction
//! indices.
//!
//! Each sampling scheme is paired with exactly one compatible analysis
//! method; a mismatched pairing is a configuration error raised at setup,
//! before any simulation run.

mod fast;
mod sobol;

use pkat_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::table::DataTable;

/// Marker prefix for problem-specification lines embedded in a set-points
/// input file.
pub const PROBLEM_MARKER: &str = "#-SA-#";

/// Ordered model-parameter names and bounds for a sensitivity analysis.
///
/// Parsed as a strictly validated JSON payload; the payload shape is fixed,
/// so unknown fields are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensitivityProblem {
    /// Number of model parameters.
    pub num_vars: usize,
    /// Parameter names, in design-matrix column order.
    pub names: Vec<String>,
    /// Per-parameter `(min, max)` bounds.
    pub bounds: Vec<(f64, f64)>,
}

impl SensitivityProblem {
    /// Gather lines prefixed by `marker`, strip the marker, and parse the
    /// concatenation as a JSON problem payload.
    pub fn from_marked_lines(text: &str, marker: &str) -> Result<Self> {
        let payload: String = text
            .lines()
            .filter_map(|l| l.strip_prefix(marker))
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n");
        if payload.is_empty() {
            return Err(Error::Config(format!(
                "no problem specification found (marker {marker:?})"
            )));
        }
        let problem: SensitivityProblem = serde_json::from_str(&payload)?;
        problem.validate()?;
        Ok(problem)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.num_vars == 0 {
            return Err(Error::Validation("problem must have at least one parameter".to_string()));
        }
        if self.names.len() != self.num_vars || self.bounds.len() != self.num_vars {
            return Err(Error::Validation(format!(
                "num_vars = {} but {} names and {} bounds",
                self.num_vars,
                self.names.len(),
                self.bounds.len()
            )));
        }
        let mut sorted = self.names.clone();
        sorted.sort();
        if sorted.windows(2).any(|w| w[0] == w[1]) {
            return Err(Error::Validation("parameter names must be unique".to_string()));
        }
        for (name, &(lo, hi)) in self.names.iter().zip(self.bounds.iter()) {
            if !lo.is_finite() || !hi.is_finite() || lo >= hi {
                return Err(Error::Validation(format!(
                    "bounds for {name:?} must be finite with min < max, got ({lo}, {hi})"
                )));
            }
        }
        Ok(())
    }
}

/// Design-matrix sampling scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampler {
    /// Saltelli cross-sampling for Sobol index estimation.
    Saltelli,
    /// eFAST frequency-driven sampling.
    Fast,
}

/// Variance-decomposition analysis method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Analyzer {
    /// Sobol indices via the Saltelli estimators.
    Sobol,
    /// eFAST spectral indices.
    Fast,
}

/// A validated sampler/analyzer pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaMethod {
    /// Saltelli sampling + Sobol analysis: S1, ST, and pairwise S2.
    Sobol,
    /// eFAST sampling + analysis: S1 and ST only.
    Fast,
}

impl SaMethod {
    /// The sampler this method uses.
    pub fn sampler(self) -> Sampler {
        match self {
            SaMethod::Sobol => Sampler::Saltelli,
            SaMethod::Fast => Sampler::Fast,
        }
    }

    /// The analyzer this method uses.
    pub fn analyzer(self) -> Analyzer {
        match self {
            SaMethod::Sobol => Analyzer::Sobol,
            SaMethod::Fast => Analyzer::Fast,
        }
    }

    /// Resolve an explicit pairing, failing fast on a mismatch.
    pub fn from_pairing(sampler: Sampler, analyzer: Analyzer) -> Result<Self> {
        match (sampler, analyzer) {
            (Sampler::Saltelli, Analyzer::Sobol) => Ok(SaMethod::Sobol),
            (Sampler::Fast, Analyzer::Fast) => Ok(SaMethod::Fast),
            (s, a) => Err(Error::Config(format!(
                "sampler {s:?} is not compatible with analyzer {a:?}"
            ))),
        }
    }
}

/// One pairwise-interaction index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// First parameter index (`i < j`).
    pub i: usize,
    /// Second parameter index.
    pub j: usize,
    /// Second-order index value.
    pub value: f64,
}

/// Sensitivity indices for one scalar response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityIndices {
    /// First-order index per model parameter.
    pub s1: Vec<f64>,
    /// Total-order index per model parameter.
    pub st: Vec<f64>,
    /// Pairwise interactions in ascending `(i, j)` order; `None` for
    /// methods that do not estimate them.
    pub s2: Option<Vec<Interaction>>,
}

/// Tidy record for a main or total effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainEffectRecord {
    /// Index value.
    pub value: f64,
    /// `"S1"` or `"ST"`.
    pub sens_level: String,
    /// PK parameter the response was taken from.
    pub pk_param: String,
    /// Model parameter the index refers to.
    pub model_param: String,
}

/// Tidy record for a pairwise interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// Index value.
    pub value: f64,
    /// PK parameter the response was taken from.
    pub pk_param: String,
    /// First model parameter of the pair.
    pub model_param_1: String,
    /// Second model parameter of the pair.
    pub model_param_2: String,
}

/// Sampling + analysis engine for one problem and method.
#[derive(Debug, Clone)]
pub struct SensitivityEngine {
    problem: SensitivityProblem,
    method: SaMethod,
    n_samples: usize,
    seed: u64,
}

impl SensitivityEngine {
    /// Validate the problem and build an engine. Fails fast on an invalid
    /// problem or sample count.
    pub fn new(
        problem: SensitivityProblem,
        method: SaMethod,
        n_samples: usize,
        seed: u64,
    ) -> Result<Self> {
        problem.validate()?;
        if n_samples == 0 {
            return Err(Error::Validation("sample count must be positive".to_string()));
        }
        if method == SaMethod::Fast {
            fast::check_sample_count(n_samples)?;
        }
        Ok(Self { problem, method, n_samples, seed })
    }

    /// The problem this engine was built for.
    pub fn problem(&self) -> &SensitivityProblem {
        &self.problem
    }

    /// Exact design-matrix row count for this method: `n(2k+2)` for
    /// Saltelli, `n*k` for eFAST.
    pub fn expected_rows(&self) -> usize {
        let k = self.problem.num_vars;
        match self.method {
            SaMethod::Sobol => self.n_samples * (2 * k + 2),
            SaMethod::Fast => self.n_samples * k,
        }
    }

    /// Generate the design matrix of parameter draws.
    pub fn sample(&self) -> Result<Vec<Vec<f64>>> {
        let rows = match self.method {
            SaMethod::Sobol => sobol::sample(&self.problem, self.n_samples, self.seed),
            SaMethod::Fast => fast::sample(&self.problem, self.n_samples)?,
        };
        debug_assert_eq!(rows.len(), self.expected_rows());
        Ok(rows)
    }

    /// Design matrix as a table for the set-points input file: a 1-based
    /// draw-index column followed by one column per parameter.
    pub fn design_table(&self) -> Result<DataTable> {
        let samples = self.sample()?;
        let mut columns = vec!["iter".to_string()];
        columns.extend(self.problem.names.iter().cloned());
        let rows: Vec<Vec<f64>> = samples
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                let mut full = Vec::with_capacity(row.len() + 1);
                full.push((i + 1) as f64);
                full.extend(row);
                full
            })
            .collect();
        DataTable::new(columns, rows)
    }

    /// Decompose the variance of one response vector (one PK parameter) into
    /// sensitivity indices. `y` must have exactly [`Self::expected_rows`]
    /// entries, in design-matrix row order.
    pub fn analyze(&self, y: &[f64]) -> Result<SensitivityIndices> {
        if y.len() != self.expected_rows() {
            return Err(Error::Validation(format!(
                "response length {} does not match design size {}",
                y.len(),
                self.expected_rows()
            )));
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(Error::Computation("response contains non-finite values".to_string()));
        }
        match self.method {
            SaMethod::Sobol => sobol::analyze(&self.problem, y, self.n_samples),
            SaMethod::Fast => fast::analyze(&self.problem, y, self.n_samples),
        }
    }

    /// Flatten indices for one PK parameter into tidy records: main/total
    /// effects per model parameter, and `C(k,2)` interaction records with
    /// pairs in ascending `(i, j)` order.
    pub fn tidy(
        &self,
        pk_param: &str,
        indices: &SensitivityIndices,
    ) -> (Vec<MainEffectRecord>, Vec<InteractionRecord>) {
        let names = &self.problem.names;
        let mut main = Vec::with_capacity(2 * names.len());
        for (level, values) in [("S1", &indices.s1), ("ST", &indices.st)] {
            for (name, &value) in names.iter().zip(values.iter()) {
                main.push(MainEffectRecord {
                    value,
                    sens_level: level.to_string(),
                    pk_param: pk_param.to_string(),
                    model_param: name.clone(),
                });
            }
        }
        let interactions = indices
            .s2
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .map(|s2| InteractionRecord {
                value: s2.value,
                pk_param: pk_param.to_string(),
                model_param_1: names[s2.i].clone(),
                model_param_2: names[s2.j].clone(),
            })
            .collect();
        (main, interactions)
    }
}

/// All unordered index pairs `(i, j)`, `i < j`, in ascending order.
pub(crate) fn index_pairs(k: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..k).flat_map(move |i| (i + 1..k).map(move |j| (i, j)))
}

/// Scale a unit-hypercube coordinate into parameter bounds.
pub(crate) fn scale(u: f64, bounds: (f64, f64)) -> f64 {
    bounds.0 + u * (bounds.1 - bounds.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem() -> SensitivityProblem {
        SensitivityProblem {
            num_vars: 3,
            names: vec!["M_ka".into(), "M_ke".into(), "M_v".into()],
            bounds: vec![(0.1, 1.0), (0.01, 0.2), (5.0, 50.0)],
        }
    }

    #[test]
    fn marked_lines_parse_strictly() {
        let text = "SetPoints (...);\n\
                    #-SA-# {\"num_vars\": 2,\n\
                    #-SA-#  \"names\": [\"M_ka\", \"M_ke\"],\n\
                    #-SA-#  \"bounds\": [[0.1, 1.0], [0.01, 0.2]]}\n\
                    Simulation {...}\n";
        let p = SensitivityProblem::from_marked_lines(text, PROBLEM_MARKER).unwrap();
        assert_eq!(p.num_vars, 2);
        assert_eq!(p.names, vec!["M_ka".to_string(), "M_ke".to_string()]);
        assert_eq!(p.bounds[1], (0.01, 0.2));
    }

    #[test]
    fn missing_marker_is_config_error() {
        let err = SensitivityProblem::from_marked_lines("no marker here", PROBLEM_MARKER)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn unknown_fields_rejected() {
        let text = "#-SA-# {\"num_vars\": 1, \"names\": [\"a\"], \"bounds\": [[0.0, 1.0]], \"exec\": \"rm -rf\"}";
        assert!(SensitivityProblem::from_marked_lines(text, PROBLEM_MARKER).is_err());
    }

    #[test]
    fn inconsistent_problem_rejected() {
        let mut p = problem();
        p.num_vars = 2;
        assert!(p.validate().is_err());

        let mut p = problem();
        p.bounds[0] = (1.0, 0.1);
        assert!(p.validate().is_err());
    }

    #[test]
    fn mismatched_pairing_is_config_error() {
        assert!(matches!(
            SaMethod::from_pairing(Sampler::Saltelli, Analyzer::Fast),
            Err(Error::Config(_))
        ));
        assert_eq!(
            SaMethod::from_pairing(Sampler::Saltelli, Analyzer::Sobol).unwrap(),
            SaMethod::Sobol
        );
        assert_eq!(SaMethod::from_pairing(Sampler::Fast, Analyzer::Fast).unwrap(), SaMethod::Fast);
    }

    #[test]
    fn saltelli_row_count() {
        let engine = SensitivityEngine::new(problem(), SaMethod::Sobol, 16, 7).unwrap();
        let rows = engine.sample().unwrap();
        assert_eq!(rows.len(), 16 * (2 * 3 + 2));
        assert!(rows.iter().all(|r| r.len() == 3));
        // every coordinate inside its bounds
        for row in &rows {
            for (x, &(lo, hi)) in row.iter().zip(engine.problem().bounds.iter()) {
                assert!(*x >= lo && *x <= hi);
            }
        }
    }

    #[test]
    fn design_table_has_index_column() {
        let engine = SensitivityEngine::new(problem(), SaMethod::Sobol, 4, 7).unwrap();
        let table = engine.design_table().unwrap();
        assert_eq!(table.column_names()[0], "iter");
        assert_eq!(table.column("iter").unwrap()[0], 1.0);
        assert_eq!(table.n_rows(), engine.expected_rows());
    }

    #[test]
    fn interaction_pairs_ascending() {
        let pairs: Vec<(usize, usize)> = index_pairs(4).collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]);
        assert_eq!(pairs.len(), 6); // C(4,2)
    }

    #[test]
    fn tidy_emits_c_k_2_interactions() {
        let engine = SensitivityEngine::new(problem(), SaMethod::Sobol, 64, 11).unwrap();
        let rows = engine.sample().unwrap();
        let y: Vec<f64> = rows.iter().map(|r| r[0] + 2.0 * r[1] + 3.0 * r[2]).collect();
        let idx = engine.analyze(&y).unwrap();
        let (main, inter) = engine.tidy("AUC", &idx);
        assert_eq!(main.len(), 2 * 3);
        assert_eq!(inter.len(), 3); // C(3,2)
        assert_eq!(inter[0].model_param_1, "M_ka");
        assert_eq!(inter[0].model_param_2, "M_ke");
        assert_eq!(inter[2].model_param_1, "M_ke");
        assert_eq!(inter[2].model_param_2, "M_v");
        assert!(main.iter().all(|m| m.pk_param == "AUC"));
    }

    #[test]
    fn response_length_validated() {
        let engine = SensitivityEngine::new(problem(), SaMethod::Sobol, 8, 1).unwrap();
        assert!(engine.analyze(&[0.0; 10]).is_err());
    }
}
