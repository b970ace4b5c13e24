//! Ensemble statistics over repeated stochastic draws.
//!
//! An [`EnsembleMatrix`] holds the draws for one (variable, level) pair:
//! rows are draws, columns are time points. Confidence/prediction bands are
//! per-column quantiles across the draw dimension.

use pkat_core::{Error, Result};

/// Quantile triple for confidence bands: (lower, median, upper).
pub const DEFAULT_PROBS: (f64, f64, f64) = (0.025, 0.5, 0.975);

/// Draws-by-time-points matrix for one (variable, level) pair, row-major.
#[derive(Debug, Clone)]
pub struct EnsembleMatrix {
    n_draws: usize,
    n_times: usize,
    values: Vec<f64>,
}

/// Per-time-point quantile bands across the draw dimension.
#[derive(Debug, Clone)]
pub struct ConfidenceBands {
    /// Lower quantile per time point.
    pub lower: Vec<f64>,
    /// Median (or central quantile) per time point.
    pub median: Vec<f64>,
    /// Upper quantile per time point.
    pub upper: Vec<f64>,
}

impl EnsembleMatrix {
    /// Build from draw rows; all rows must have equal length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n_draws = rows.len();
        if n_draws == 0 {
            return Err(Error::Validation("ensemble must have at least one draw".to_string()));
        }
        let n_times = rows[0].len();
        if n_times == 0 {
            return Err(Error::Validation("ensemble rows must be non-empty".to_string()));
        }
        let mut values = Vec::with_capacity(n_draws * n_times);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n_times {
                return Err(Error::Validation(format!(
                    "draw {} has {} time points, expected {}",
                    i,
                    row.len(),
                    n_times
                )));
            }
            values.extend_from_slice(row);
        }
        Ok(Self { n_draws, n_times, values })
    }

    /// Build from time-point columns (e.g. table columns in sub-index order).
    pub fn from_columns(columns: Vec<Vec<f64>>) -> Result<Self> {
        let n_times = columns.len();
        if n_times == 0 {
            return Err(Error::Validation("ensemble must have at least one time point".to_string()));
        }
        let n_draws = columns[0].len();
        if n_draws == 0 {
            return Err(Error::Validation("ensemble must have at least one draw".to_string()));
        }
        if columns.iter().any(|c| c.len() != n_draws) {
            return Err(Error::Validation("ensemble columns have unequal lengths".to_string()));
        }
        let mut values = vec![0.0; n_draws * n_times];
        for (j, col) in columns.iter().enumerate() {
            for (i, &v) in col.iter().enumerate() {
                values[i * n_times + j] = v;
            }
        }
        Ok(Self { n_draws, n_times, values })
    }

    /// Number of draws (rows).
    pub fn n_draws(&self) -> usize {
        self.n_draws
    }

    /// Number of time points (columns).
    pub fn n_times(&self) -> usize {
        self.n_times
    }

    /// One draw as a slice.
    pub fn draw(&self, i: usize) -> &[f64] {
        &self.values[i * self.n_times..(i + 1) * self.n_times]
    }

    /// Per-time-point quantile bands across draws. A single-draw matrix is a
    /// valid degenerate case: all three bands equal that draw.
    pub fn quantiles(&self, probs: (f64, f64, f64)) -> Result<ConfidenceBands> {
        for p in [probs.0, probs.1, probs.2] {
            if !(0.0..=1.0).contains(&p) {
                return Err(Error::Validation(format!("quantile prob must be in [0,1], got {p}")));
            }
        }
        let mut lower = Vec::with_capacity(self.n_times);
        let mut median = Vec::with_capacity(self.n_times);
        let mut upper = Vec::with_capacity(self.n_times);
        let mut col = vec![0.0; self.n_draws];
        for j in 0..self.n_times {
            for i in 0..self.n_draws {
                col[i] = self.values[i * self.n_times + j];
            }
            col.sort_by(f64::total_cmp);
            lower.push(sorted_quantile(&col, probs.0));
            median.push(sorted_quantile(&col, probs.1));
            upper.push(sorted_quantile(&col, probs.2));
        }
        Ok(ConfidenceBands { lower, median, upper })
    }
}

// Linear-interpolation quantile of pre-sorted draws; a single draw is its
// own quantile at every probability.
fn sorted_quantile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = pos - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// Ensemble mean and sample standard deviation (n-1 denominator; zero for
/// fewer than two values).
pub fn mean_sd(xs: &[f64]) -> (f64, f64) {
    if xs.is_empty() {
        return (f64::NAN, 0.0);
    }
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    if xs.len() < 2 {
        return (mean, 0.0);
    }
    let var = xs.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantiles_per_time_point() {
        let m = EnsembleMatrix::from_rows(vec![
            vec![1.0, 10.0],
            vec![2.0, 20.0],
            vec![3.0, 30.0],
            vec![4.0, 40.0],
            vec![5.0, 50.0],
        ])
        .unwrap();
        let b = m.quantiles((0.0, 0.5, 1.0)).unwrap();
        assert_eq!(b.lower, vec![1.0, 10.0]);
        assert_eq!(b.median, vec![3.0, 30.0]);
        assert_eq!(b.upper, vec![5.0, 50.0]);
    }

    #[test]
    fn identical_rows_collapse_all_bands() {
        let row = vec![2.0, 4.0, 8.0];
        let m = EnsembleMatrix::from_rows(vec![row.clone(), row.clone(), row.clone()]).unwrap();
        let b = m.quantiles(DEFAULT_PROBS).unwrap();
        assert_eq!(b.lower, row);
        assert_eq!(b.median, row);
        assert_eq!(b.upper, row);
    }

    #[test]
    fn single_draw_is_valid() {
        let m = EnsembleMatrix::from_rows(vec![vec![1.0, 2.0, 3.0]]).unwrap();
        let b = m.quantiles(DEFAULT_PROBS).unwrap();
        assert_eq!(b.lower, vec![1.0, 2.0, 3.0]);
        assert_eq!(b.median, b.lower);
        assert_eq!(b.upper, b.lower);
    }

    #[test]
    fn columns_round_trip_to_rows() {
        let m = EnsembleMatrix::from_columns(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(m.n_draws(), 2);
        assert_eq!(m.draw(0), &[1.0, 3.0]);
        assert_eq!(m.draw(1), &[2.0, 4.0]);
    }

    #[test]
    fn mean_sd_basics() {
        let (m, s) = mean_sd(&[2.0, 4.0, 6.0]);
        assert!((m - 4.0).abs() < 1e-12);
        assert!((s - 2.0).abs() < 1e-12);
        let (m1, s1) = mean_sd(&[7.0]);
        assert_eq!(m1, 7.0);
        assert_eq!(s1, 0.0);
    }
}
