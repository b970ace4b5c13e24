//! Residuals of simulated curves against observed data.
//!
//! Simulated series are interpolated onto the observed time points with
//! piecewise-linear interpolation; query points outside the simulated time
//! range clamp to the nearest boundary value (no extrapolation). The
//! relative difference is `(observed - interpolated) / observed`; a
//! zero-valued observation makes the residual undefined, which is recorded
//! explicitly rather than raised, so callers can filter before aggregation.

use pkat_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// One residual at an observed time point. `value` is `None` when the
/// observation was zero (undefined relative difference).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Residual {
    /// Observed time point.
    pub time: f64,
    /// Relative difference, or `None` when undefined.
    pub value: Option<f64>,
}

/// Piecewise-linear interpolation of `(xp, fp)` at the query points `xq`,
/// clamping outside the `xp` range. `xp` must be non-decreasing.
pub fn interp_linear(xq: &[f64], xp: &[f64], fp: &[f64]) -> Result<Vec<f64>> {
    if xp.is_empty() {
        return Err(Error::Validation("interpolation grid must be non-empty".to_string()));
    }
    if xp.len() != fp.len() {
        return Err(Error::Validation(format!(
            "xp/fp length mismatch: {} vs {}",
            xp.len(),
            fp.len()
        )));
    }
    if xp.windows(2).any(|w| w[0] > w[1]) {
        return Err(Error::Validation("interpolation grid must be non-decreasing".to_string()));
    }
    let out = xq
        .iter()
        .map(|&x| {
            if x <= xp[0] {
                return fp[0];
            }
            if x >= xp[xp.len() - 1] {
                return fp[fp.len() - 1];
            }
            let j = xp.partition_point(|&v| v < x);
            let (x0, x1) = (xp[j - 1], xp[j]);
            let (f0, f1) = (fp[j - 1], fp[j]);
            if x1 == x0 {
                return f0;
            }
            f0 + (f1 - f0) * (x - x0) / (x1 - x0)
        })
        .collect();
    Ok(out)
}

/// Relative residuals of a simulated series against an observed series.
pub fn relative_residuals(
    obs_t: &[f64],
    obs_v: &[f64],
    sim_t: &[f64],
    sim_v: &[f64],
) -> Result<Vec<Residual>> {
    if obs_t.len() != obs_v.len() {
        return Err(Error::Validation(format!(
            "observed time/value length mismatch: {} vs {}",
            obs_t.len(),
            obs_v.len()
        )));
    }
    let interp = interp_linear(obs_t, sim_t, sim_v)?;
    Ok(obs_t
        .iter()
        .zip(obs_v.iter())
        .zip(interp.iter())
        .map(|((&t, &obs), &sim)| Residual {
            time: t,
            value: if obs == 0.0 { None } else { Some((obs - sim) / obs) },
        })
        .collect())
}
