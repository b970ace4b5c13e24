//! Batch analysis over labeled simulation output.
//!
//! [`EnsembleAnalysis`] ties the leaf components together: output columns
//! are recognized via the configured grammar, grouped per variable into
//! ensemble matrices, and reduced to confidence bands, per-draw PK
//! parameters with summaries, and residuals against observed data.
//!
//! All configuration travels in an explicit [`AnalysisContext`] passed to
//! the entry points; there is no process-wide state. Per-unit numeric
//! failures (too few positive points for the elimination fit, zero-variance
//! responses) skip that (identifier, variable) unit with a warning and the
//! batch continues; configuration and lookup failures abort.
//!
//! Units are independent, so they are processed with rayon and merged by
//! sorted composite key: output never depends on scheduling order.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use pkat_core::{Error, Result, POPULATION_KEYWORD};

use crate::columns::ColumnGrammar;
use crate::ensemble::{mean_sd, EnsembleMatrix, DEFAULT_PROBS};
use crate::pk::{PkParameterSet, DEFAULT_TAIL_POINTS};
use crate::residuals::relative_residuals;
use crate::sensitivity::{InteractionRecord, MainEffectRecord, SensitivityEngine};
use crate::table::DataTable;
use crate::tidy::TidyFrame;

/// Explicit configuration for one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    /// Column-name grammar of the output tables.
    pub grammar: ColumnGrammar,
    /// Quantile triple for confidence bands.
    pub probs: (f64, f64, f64),
    /// Output variable for which PK parameters are computed.
    pub pk_variable: String,
    /// Administered dose; enables clearance and volume of distribution.
    pub dose: Option<f64>,
    /// Terminal points for the log-linear elimination fit.
    pub n_tail_points: usize,
    /// Explicit independent-variable column, used as the time axis when no
    /// span is configured; its length must then match the variable's grid.
    pub time_column: String,
    /// Evenly spaced time span for grid output, where time is enumerated by
    /// column sub-index. Takes precedence over `time_column` when set.
    pub time_span: Option<(f64, f64)>,
    /// Duplicate every observed series under the population identifier, so
    /// population-level predictions are checked against all data.
    pub observed_under_population: bool,
}

impl AnalysisContext {
    /// Context with the customary defaults for the given grammar.
    pub fn new(grammar: ColumnGrammar) -> Self {
        Self {
            grammar,
            probs: DEFAULT_PROBS,
            pk_variable: "C_central".to_string(),
            dose: None,
            n_tail_points: DEFAULT_TAIL_POINTS,
            time_column: "Time".to_string(),
            time_span: None,
            observed_under_population: true,
        }
    }
}

/// One run's output table, labeled with its run identifier.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Run label (`pop`, `s01`, ...).
    pub run_label: String,
    /// Output table for this run (rows = draws).
    pub table: DataTable,
}

/// Observed concentration data for one (identifier, measure) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservedSeries {
    /// Run label the observations belong to.
    pub ident: String,
    /// Sampled output variable.
    pub measure: String,
    /// Sampling times.
    pub times: Vec<f64>,
    /// Sampled values.
    pub values: Vec<f64>,
}

/// Confidence-band point of one (identifier, measure) curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveBandRecord {
    /// Run label.
    pub ident: String,
    /// Output variable.
    pub measure: String,
    /// Time point.
    pub time: f64,
    /// Lower band value.
    pub lower: f64,
    /// Median value.
    pub median: f64,
    /// Upper band value.
    pub upper: f64,
}

/// One PK parameter value from one ensemble draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PkDrawRecord {
    /// Run label.
    pub ident: String,
    /// PK parameter name.
    pub param: String,
    /// Draw index within the ensemble.
    pub draw: usize,
    /// Parameter value.
    pub value: f64,
}

/// Ensemble mean and standard deviation of one PK parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PkSummaryRecord {
    /// Run label.
    pub ident: String,
    /// PK parameter name.
    pub param: String,
    /// Ensemble mean.
    pub mean: f64,
    /// Ensemble standard deviation (n-1 denominator).
    pub sd: f64,
}

/// Relative residual at one observed time point. `value` is `None` when the
/// observation was zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualRecord {
    /// Run label.
    pub ident: String,
    /// Output variable.
    pub measure: String,
    /// Observed time point.
    pub time: f64,
    /// Relative difference, `None` when undefined.
    pub value: Option<f64>,
}

/// A unit skipped over a recoverable numeric failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedUnit {
    /// Run label.
    pub ident: String,
    /// Output variable.
    pub measure: String,
    /// Human-readable failure description.
    pub reason: String,
}

/// Everything an ensemble analysis produces, sorted by composite key.
#[derive(Debug, Clone, Default)]
pub struct AnalysisResult {
    /// Band curves per (identifier, measure).
    pub curves: Vec<CurveBandRecord>,
    /// Per-draw PK parameters for the configured PK variable.
    pub pk_draws: Vec<PkDrawRecord>,
    /// Mean/sd summary of the PK parameter draws.
    pub pk_summary: Vec<PkSummaryRecord>,
    /// Residuals against observed data.
    pub residuals: Vec<ResidualRecord>,
    /// Units skipped over recoverable numeric failures.
    pub skipped: Vec<SkippedUnit>,
}

impl AnalysisResult {
    /// Median curves as tidy records for the plotting collaborator.
    pub fn median_curves_tidy(&self) -> Result<TidyFrame> {
        let mut frame = TidyFrame::new();
        for c in &self.curves {
            frame.push(crate::tidy::TidyRecord {
                ident: c.ident.clone(),
                measure: c.measure.clone(),
                time: c.time,
                value: c.median,
            })?;
        }
        Ok(frame)
    }
}

// One (identifier, variable) work unit.
struct Unit {
    ident: String,
    measure: String,
    times: Vec<f64>,
    matrix: EnsembleMatrix,
}

struct UnitOutcome {
    ident: String,
    measure: String,
    times: Vec<f64>,
    lower: Vec<f64>,
    median: Vec<f64>,
    upper: Vec<f64>,
    pk_draws: Vec<(usize, PkParameterSet)>,
    skipped_pk: Option<String>,
}

/// Ensemble (Monte Carlo / set-points) analysis over labeled run output.
#[derive(Debug, Clone)]
pub struct EnsembleAnalysis {
    ctx: AnalysisContext,
}

impl EnsembleAnalysis {
    /// Build an analysis for the given context.
    pub fn new(ctx: AnalysisContext) -> Self {
        Self { ctx }
    }

    /// Analyze all runs against the observed data.
    pub fn run(&self, runs: &[RunOutput], observed: &[ObservedSeries]) -> Result<AnalysisResult> {
        let mut units = Vec::new();
        for run in runs {
            units.extend(self.units_for_run(run)?);
        }

        let mut outcomes: Vec<UnitOutcome> = units
            .into_par_iter()
            .map(|u| self.process_unit(u))
            .collect::<Result<Vec<_>>>()?;
        // merge by composite key, not completion order
        outcomes.sort_by(|a, b| (&a.ident, &a.measure).cmp(&(&b.ident, &b.measure)));

        let mut result = AnalysisResult::default();
        for out in &outcomes {
            for (j, &t) in out.times.iter().enumerate() {
                result.curves.push(CurveBandRecord {
                    ident: out.ident.clone(),
                    measure: out.measure.clone(),
                    time: t,
                    lower: out.lower[j],
                    median: out.median[j],
                    upper: out.upper[j],
                });
            }
            for (draw, pk) in &out.pk_draws {
                for (param, value) in pk.entries() {
                    result.pk_draws.push(PkDrawRecord {
                        ident: out.ident.clone(),
                        param: param.to_string(),
                        draw: *draw,
                        value,
                    });
                }
            }
            if let Some(reason) = &out.skipped_pk {
                log::warn!(
                    "skipping PK parameters for ({}, {}): {}",
                    out.ident,
                    out.measure,
                    reason
                );
                result.skipped.push(SkippedUnit {
                    ident: out.ident.clone(),
                    measure: out.measure.clone(),
                    reason: reason.clone(),
                });
            }
        }

        result.pk_summary = summarize_pk_draws(&result.pk_draws);
        result.residuals = self.residuals(&outcomes, observed)?;
        Ok(result)
    }

    /// Group a run's output columns into per-variable ensemble units.
    fn units_for_run(&self, run: &RunOutput) -> Result<Vec<Unit>> {
        let table = &run.table;

        // variable name -> [(sub-index, column index)]
        let mut groups: std::collections::BTreeMap<String, Vec<(u64, usize)>> =
            std::collections::BTreeMap::new();
        for (idx, col) in table.column_names().iter().enumerate() {
            if let Some(var) = self.ctx.grammar.parse(col) {
                let sub = var
                    .level
                    .split('.')
                    .nth(1)
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(0);
                groups.entry(var.name).or_default().push((sub, idx));
            }
        }

        let explicit_time = table.column(&self.ctx.time_column).ok();
        let mut units = Vec::with_capacity(groups.len());
        for (name, mut cols) in groups {
            cols.sort();
            let columns: Vec<Vec<f64>> =
                cols.iter().map(|&(_, idx)| table.column_at(idx)).collect();
            let matrix = EnsembleMatrix::from_columns(columns)?;
            // The axis source is chosen by configuration, never by a length
            // coincidence: a configured span wins (grid tables carry per-draw
            // values in their time column, not the axis), otherwise the time
            // column is required and must match the variable's grid.
            let times = match self.ctx.time_span {
                Some((t0, t1)) => linspace(t0, t1, matrix.n_times()),
                None => match &explicit_time {
                    Some(t) if t.len() == matrix.n_times() => t.clone(),
                    Some(t) => {
                        return Err(Error::Validation(format!(
                            "time column {:?} has {} rows but variable {:?} has {} time points",
                            self.ctx.time_column,
                            t.len(),
                            name,
                            matrix.n_times()
                        )))
                    }
                    None => {
                        return Err(Error::Config(format!(
                            "no time column {:?} and no time span configured for run {:?}",
                            self.ctx.time_column, run.run_label
                        )))
                    }
                },
            };
            units.push(Unit { ident: run.run_label.clone(), measure: name, times, matrix });
        }
        Ok(units)
    }

    fn process_unit(&self, unit: Unit) -> Result<UnitOutcome> {
        let bands = unit.matrix.quantiles(self.ctx.probs)?;

        let mut pk_draws = Vec::new();
        let mut skipped_pk = None;
        if unit.measure == self.ctx.pk_variable {
            for draw in 0..unit.matrix.n_draws() {
                match PkParameterSet::compute(
                    &unit.times,
                    unit.matrix.draw(draw),
                    self.ctx.dose,
                    self.ctx.n_tail_points,
                ) {
                    Ok(pk) => pk_draws.push((draw, pk)),
                    Err(e) if e.is_recoverable() => {
                        skipped_pk = Some(e.to_string());
                        pk_draws.clear();
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(UnitOutcome {
            ident: unit.ident,
            measure: unit.measure,
            times: unit.times,
            lower: bands.lower,
            median: bands.median,
            upper: bands.upper,
            pk_draws,
            skipped_pk,
        })
    }

    /// Residuals of the median curves against observed series, joined by
    /// (identifier, measure).
    fn residuals(
        &self,
        outcomes: &[UnitOutcome],
        observed: &[ObservedSeries],
    ) -> Result<Vec<ResidualRecord>> {
        let mut expanded: Vec<(String, &ObservedSeries)> = Vec::new();
        for obs in observed {
            expanded.push((obs.ident.clone(), obs));
            if self.ctx.observed_under_population && obs.ident != POPULATION_KEYWORD {
                expanded.push((POPULATION_KEYWORD.to_string(), obs));
            }
        }
        expanded.sort_by(|a, b| (&a.0, &a.1.measure).cmp(&(&b.0, &b.1.measure)));

        let mut records = Vec::new();
        for (ident, obs) in expanded {
            let Some(out) = outcomes
                .iter()
                .find(|o| o.ident == ident && o.measure == obs.measure)
            else {
                continue;
            };
            let resid = relative_residuals(&obs.times, &obs.values, &out.times, &out.median)?;
            for r in resid {
                records.push(ResidualRecord {
                    ident: ident.clone(),
                    measure: obs.measure.clone(),
                    time: r.time,
                    value: r.value,
                });
            }
        }
        Ok(records)
    }
}

/// Sensitivity analysis over per-draw PK-parameter responses.
///
/// The engine's design matrix must already have been run through the
/// external simulation: `responses` maps each PK parameter to its scalar
/// response per design row. Zero-variance responses are skipped with a
/// warning, mirroring the per-unit recovery of the ensemble path.
pub struct SensitivityAnalysis<'a> {
    engine: &'a SensitivityEngine,
}

/// Tidy sensitivity output across all PK parameters.
#[derive(Debug, Clone, Default)]
pub struct SensitivityResult {
    /// Main and total effects, one record per (PK parameter, level, model
    /// parameter).
    pub main: Vec<MainEffectRecord>,
    /// Pairwise interactions in ascending `(i, j)` order per PK parameter.
    pub interactions: Vec<InteractionRecord>,
    /// PK parameters skipped over recoverable failures.
    pub skipped: Vec<(String, String)>,
}

impl<'a> SensitivityAnalysis<'a> {
    /// Build an analysis over a configured engine.
    pub fn new(engine: &'a SensitivityEngine) -> Self {
        Self { engine }
    }

    /// Compute indices for every PK-parameter response.
    pub fn run(&self, responses: &[(String, Vec<f64>)]) -> Result<SensitivityResult> {
        let mut result = SensitivityResult::default();
        for (pk_param, y) in responses {
            match self.engine.analyze(y) {
                Ok(indices) => {
                    let (main, inter) = self.engine.tidy(pk_param, &indices);
                    result.main.extend(main);
                    result.interactions.extend(inter);
                }
                Err(e) if e.is_recoverable() => {
                    log::warn!("skipping sensitivity for {pk_param}: {e}");
                    result.skipped.push((pk_param.clone(), e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(result)
    }
}

fn summarize_pk_draws(draws: &[PkDrawRecord]) -> Vec<PkSummaryRecord> {
    let mut grouped: std::collections::BTreeMap<(String, String), Vec<f64>> =
        std::collections::BTreeMap::new();
    for d in draws {
        grouped.entry((d.ident.clone(), d.param.clone())).or_default().push(d.value);
    }
    grouped
        .into_iter()
        .map(|((ident, param), values)| {
            let (mean, sd) = mean_sd(&values);
            PkSummaryRecord { ident, param, mean, sd }
        })
        .collect()
}

fn linspace(a: f64, b: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![a];
    }
    let step = (b - a) / (n - 1) as f64;
    (0..n).map(|i| a + step * i as f64).collect()
}
