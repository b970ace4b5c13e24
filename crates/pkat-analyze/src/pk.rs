//! Pharmacokinetic parameter calculations.
//!
//! Pure functions over `(t, c)` concentration-time arrays, independent of any
//! table representation. The elimination rate constant comes from a
//! log-linear least-squares fit over the terminal points; AUC-derived
//! quantities follow non-compartmental analysis conventions:
//!
//! - `AUC`: trapezoidal integral of `c` over `t`
//! - `AUC_inf`: `AUC + c_last / kelim` (log-linear tail extrapolation)
//! - `MRT`: `AUMC / AUC`
//! - `t_half`: `ln 2 / kelim`
//! - `CL`: `dose / AUC_inf`; `Vd`: `CL / kelim` (dose-dependent)

use nalgebra::{DMatrix, DVector};
use pkat_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default number of terminal points for the log-linear elimination fit.
pub const DEFAULT_TAIL_POINTS: usize = 3;

fn validate_curve(t: &[f64], c: &[f64]) -> Result<()> {
    if t.is_empty() {
        return Err(Error::Validation("curve must be non-empty".to_string()));
    }
    if t.len() != c.len() {
        return Err(Error::Validation(format!(
            "t/c length mismatch: {} vs {}",
            t.len(),
            c.len()
        )));
    }
    if t.iter().any(|v| !v.is_finite()) || c.iter().any(|v| !v.is_finite()) {
        return Err(Error::Validation("t and c must be finite".to_string()));
    }
    if t.windows(2).any(|w| w[0] > w[1]) {
        return Err(Error::Validation("t must be non-decreasing".to_string()));
    }
    Ok(())
}

fn trapezoid(t: &[f64], y: &[f64]) -> f64 {
    t.windows(2)
        .zip(y.windows(2))
        .map(|(tw, yw)| 0.5 * (yw[0] + yw[1]) * (tw[1] - tw[0]))
        .sum()
}

/// Degree-1 least-squares fit, returning (slope, intercept).
fn linear_fit(x: &[f64], y: &[f64]) -> Result<(f64, f64)> {
    let n = x.len();
    let a = DMatrix::from_fn(n, 2, |i, j| if j == 0 { x[i] } else { 1.0 });
    let b = DVector::from_column_slice(y);
    let coef = a
        .svd(true, true)
        .solve(&b, 1e-12)
        .map_err(|e| Error::Computation(format!("linear fit failed: {e}")))?;
    Ok((coef[0], coef[1]))
}

/// Area under the concentration curve (trapezoidal).
pub fn auc(t: &[f64], c: &[f64]) -> Result<f64> {
    validate_curve(t, c)?;
    Ok(trapezoid(t, c))
}

/// AUC extrapolated to infinity: trapezoidal AUC plus the log-linear tail
/// contribution `c_last / kelim`.
pub fn auc_inf(t: &[f64], c: &[f64], n_tail_points: usize) -> Result<f64> {
    validate_curve(t, c)?;
    let ke = elimination_rate_constant(t, c, n_tail_points)?;
    let c_last = c[c.len() - 1];
    Ok(trapezoid(t, c) + c_last / ke)
}

/// Terminal elimination rate constant from a log-linear least-squares fit.
///
/// Non-positive concentrations cannot enter the log fit and are filtered
/// out first. If fewer than `n_tail_points` points remain, the fit window
/// would silently shrink, so this fails with
/// [`Error::InsufficientData`] instead; callers skip the unit and continue.
pub fn elimination_rate_constant(t: &[f64], c: &[f64], n_tail_points: usize) -> Result<f64> {
    validate_curve(t, c)?;
    if n_tail_points < 2 {
        return Err(Error::Validation("n_tail_points must be at least 2".to_string()));
    }
    let (tf, lnc): (Vec<f64>, Vec<f64>) = t
        .iter()
        .zip(c.iter())
        .filter(|(_, &ci)| ci > 0.0)
        .map(|(&ti, &ci)| (ti, ci.ln()))
        .unzip();
    if tf.len() < n_tail_points {
        return Err(Error::InsufficientData { needed: n_tail_points, available: tf.len() });
    }
    let start = tf.len() - n_tail_points;
    let (slope, _) = linear_fit(&tf[start..], &lnc[start..])?;
    Ok(-slope)
}

/// Mean residence time: AUMC / AUC, with AUMC the trapezoidal integral of
/// `c * t` over `t`.
pub fn mean_residence_time(t: &[f64], c: &[f64]) -> Result<f64> {
    validate_curve(t, c)?;
    let ct: Vec<f64> = t.iter().zip(c.iter()).map(|(&ti, &ci)| ci * ti).collect();
    let aumc = trapezoid(t, &ct);
    let auc = trapezoid(t, c);
    let mrt = aumc / auc;
    if !mrt.is_finite() {
        return Err(Error::Computation("MRT undefined: AUC is zero".to_string()));
    }
    Ok(mrt)
}

/// Time of the first occurrence of the maximum concentration.
pub fn time_of_max(t: &[f64], c: &[f64]) -> Result<f64> {
    validate_curve(t, c)?;
    Ok(t[argmax(c)])
}

/// Maximum concentration (first occurrence).
pub fn max_concentration(t: &[f64], c: &[f64]) -> Result<f64> {
    validate_curve(t, c)?;
    Ok(c[argmax(c)])
}

/// Elimination half-life: `ln 2 / kelim`.
pub fn half_life(t: &[f64], c: &[f64], n_tail_points: usize) -> Result<f64> {
    Ok(std::f64::consts::LN_2 / elimination_rate_constant(t, c, n_tail_points)?)
}

/// Clearance: `dose / AUC_inf`.
pub fn clearance(t: &[f64], c: &[f64], dose: f64, n_tail_points: usize) -> Result<f64> {
    if !dose.is_finite() || dose <= 0.0 {
        return Err(Error::Validation("dose must be finite and > 0".to_string()));
    }
    Ok(dose / auc_inf(t, c, n_tail_points)?)
}

/// Volume of distribution: `CL / kelim`.
pub fn volume_of_distribution(t: &[f64], c: &[f64], dose: f64, n_tail_points: usize) -> Result<f64> {
    let cl = clearance(t, c, dose, n_tail_points)?;
    Ok(cl / elimination_rate_constant(t, c, n_tail_points)?)
}

fn argmax(c: &[f64]) -> usize {
    let mut imax = 0;
    for (i, &v) in c.iter().enumerate() {
        // strict comparison keeps the first occurrence of the maximum
        if v > c[imax] {
            imax = i;
        }
    }
    imax
}

/// Scalar PK summary of one concentration-time curve. Clearance and volume
/// of distribution are present only when a dose was supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PkParameterSet {
    /// Area under the curve over the sampled window.
    pub auc: f64,
    /// AUC extrapolated to infinity.
    pub auc_inf: f64,
    /// Mean residence time.
    pub mrt: f64,
    /// Time of maximum concentration.
    pub tmax: f64,
    /// Maximum concentration.
    pub cmax: f64,
    /// Terminal elimination rate constant.
    pub kelim: f64,
    /// Elimination half-life.
    pub t_half: f64,
    /// Clearance (dose-dependent).
    pub clearance: Option<f64>,
    /// Volume of distribution (dose-dependent).
    pub volume_of_distribution: Option<f64>,
}

impl PkParameterSet {
    /// Compute the full parameter set for one curve.
    pub fn compute(t: &[f64], c: &[f64], dose: Option<f64>, n_tail_points: usize) -> Result<Self> {
        let kelim = elimination_rate_constant(t, c, n_tail_points)?;
        let auc_t = auc(t, c)?;
        let auc_i = auc_inf(t, c, n_tail_points)?;
        let (cl, vd) = match dose {
            Some(d) => {
                let cl = clearance(t, c, d, n_tail_points)?;
                (Some(cl), Some(cl / kelim))
            }
            None => (None, None),
        };
        Ok(Self {
            auc: auc_t,
            auc_inf: auc_i,
            mrt: mean_residence_time(t, c)?,
            tmax: time_of_max(t, c)?,
            cmax: max_concentration(t, c)?,
            kelim,
            t_half: std::f64::consts::LN_2 / kelim,
            clearance: cl,
            volume_of_distribution: vd,
        })
    }

    /// Named scalar entries in stable order; dose-dependent entries are
    /// included only when present.
    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        let mut out = vec![
            ("AUC", self.auc),
            ("AUC_inf", self.auc_inf),
            ("MRT", self.mrt),
            ("tmax", self.tmax),
            ("Cmax", self.cmax),
            ("kelim", self.kelim),
            ("t_half", self.t_half),
        ];
        if let Some(cl) = self.clearance {
            out.push(("clearance", cl));
        }
        if let Some(vd) = self.volume_of_distribution {
            out.push(("volume_of_distribution", vd));
        }
        out
    }
}
