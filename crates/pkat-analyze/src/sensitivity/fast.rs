//! Extended FAST (Fourier amplitude sensitivity test).
//!
//! Sampling and analysis follow Saltelli, Tarantola & Chan (1999). Each
//! parameter takes a turn as the driver, assigned the high frequency
//! `omega_0 = (n - 1) / (2 M)` along the search curve while the remaining
//! parameters move at low frequencies; the variance fraction at the driver
//! frequency and its first `M` harmonics gives the first-order index, and
//! the low-frequency band below `omega_0 / 2` gives the complement of the
//! total-order index. The design has `n * k` rows (one block of `n` per
//! driver); no interaction indices are produced by this method.

use std::f64::consts::PI;

use pkat_core::{Error, Result};

use super::{scale, SensitivityIndices, SensitivityProblem};

/// Interference factor M.
const INTERFERENCE: usize = 4;

/// The spectral estimates need `n > 4 M^2` points per driver block.
pub(crate) fn check_sample_count(n: usize) -> Result<()> {
    let min = 4 * INTERFERENCE * INTERFERENCE + 1;
    if n < min {
        return Err(Error::Validation(format!(
            "eFAST requires at least {min} samples per parameter, got {n}"
        )));
    }
    Ok(())
}

fn frequencies(n: usize, k: usize) -> (usize, Vec<usize>) {
    let omega0 = (n - 1) / (2 * INTERFERENCE);
    let m = omega0 / (2 * INTERFERENCE);
    let others = if k <= 1 {
        Vec::new()
    } else if m >= k - 1 {
        // evenly spaced over [1, m]
        (0..k - 1)
            .map(|idx| {
                if k == 2 {
                    1
                } else {
                    (1.0 + (m as f64 - 1.0) * idx as f64 / (k - 2) as f64).floor() as usize
                }
            })
            .collect()
    } else {
        (0..k - 1).map(|idx| idx % m.max(1) + 1).collect()
    };
    (omega0, others)
}

/// Generate the eFAST design: `k` consecutive blocks of `n` rows, one block
/// per driver parameter.
pub(crate) fn sample(problem: &SensitivityProblem, n: usize) -> Result<Vec<Vec<f64>>> {
    check_sample_count(n)?;
    let k = problem.num_vars;
    let (omega0, others) = frequencies(n, k);

    let mut rows = Vec::with_capacity(n * k);
    for driver in 0..k {
        // frequency per parameter for this block
        let mut omega = vec![0usize; k];
        omega[driver] = omega0;
        let mut low = others.iter().copied();
        for (d, w) in omega.iter_mut().enumerate() {
            if d != driver {
                *w = low.next().unwrap_or(1);
            }
        }
        for j in 0..n {
            let s = 2.0 * PI * j as f64 / n as f64;
            let row: Vec<f64> = omega
                .iter()
                .zip(problem.bounds.iter())
                .map(|(&w, &b)| {
                    let u = 0.5 + (1.0 / PI) * (w as f64 * s).sin().asin();
                    scale(u, b)
                })
                .collect();
            rows.push(row);
        }
    }
    Ok(rows)
}

/// Power spectrum of one driver block at frequencies `1..=(n-1)/2`.
fn power_spectrum(y: &[f64]) -> Vec<f64> {
    let n = y.len();
    let nf = n as f64;
    (1..=(n - 1) / 2)
        .map(|w| {
            let mut re = 0.0;
            let mut im = 0.0;
            for (j, &v) in y.iter().enumerate() {
                let angle = 2.0 * PI * w as f64 * j as f64 / nf;
                re += v * angle.cos();
                im += v * angle.sin();
            }
            (re * re + im * im) / (nf * nf)
        })
        .collect()
}

/// Estimate S1 and ST per parameter from responses in design row order.
pub(crate) fn analyze(
    problem: &SensitivityProblem,
    y: &[f64],
    n: usize,
) -> Result<SensitivityIndices> {
    check_sample_count(n)?;
    let k = problem.num_vars;
    let (omega0, _) = frequencies(n, k);

    let mut s1 = Vec::with_capacity(k);
    let mut st = Vec::with_capacity(k);
    for driver in 0..k {
        let block = &y[driver * n..(driver + 1) * n];
        // A constant block must be caught in the time domain: its DFT leaves
        // float residue, so a threshold on the spectrum alone never fires.
        let mean = block.iter().sum::<f64>() / n as f64;
        let var = block.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64;
        if var <= f64::EPSILON * mean * mean {
            return Err(Error::Computation(
                "response has zero variance; sensitivity indices are undefined".to_string(),
            ));
        }
        let sp = power_spectrum(block);
        let total: f64 = 2.0 * sp.iter().sum::<f64>();
        // spectrum index w-1 holds frequency w
        let d1: f64 = 2.0
            * (1..=INTERFERENCE)
                .map(|p| sp.get(p * omega0 - 1).copied().unwrap_or(0.0))
                .sum::<f64>();
        let dt: f64 = 2.0 * sp[..omega0 / 2].iter().sum::<f64>();
        s1.push(d1 / total);
        st.push(1.0 - dt / total);
    }
    Ok(SensitivityIndices { s1, st, s2: None })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem(k: usize) -> SensitivityProblem {
        SensitivityProblem {
            num_vars: k,
            names: (0..k).map(|i| format!("p{i}")).collect(),
            bounds: vec![(0.0, 1.0); k],
        }
    }

    #[test]
    fn sample_count_gate() {
        assert!(check_sample_count(64).is_err());
        assert!(check_sample_count(65).is_ok());
    }

    #[test]
    fn design_has_n_times_k_rows_in_bounds() {
        let p = problem(3);
        let rows = sample(&p, 65).unwrap();
        assert_eq!(rows.len(), 65 * 3);
        for row in &rows {
            for &x in row {
                assert!((0.0..=1.0).contains(&x));
            }
        }
    }

    #[test]
    fn single_parameter_response_attributed_to_driver() {
        let p = problem(2);
        let n = 257;
        let rows = sample(&p, n).unwrap();
        let y: Vec<f64> = rows.iter().map(|r| r[0]).collect();
        let idx = analyze(&p, &y, n).unwrap();
        assert!(idx.s1[0] > 0.9, "S1[0] = {}", idx.s1[0]);
        assert!(idx.st[0] > 0.9, "ST[0] = {}", idx.st[0]);
        assert!(idx.s1[1] < 0.05, "S1[1] = {}", idx.s1[1]);
        assert!(idx.st[1] < 0.1, "ST[1] = {}", idx.st[1]);
        assert!(idx.s2.is_none());
    }

    #[test]
    fn constant_response_is_a_computation_error() {
        let p = problem(2);
        let n = 65;
        let y = vec![2.5; n * 2];
        assert!(matches!(analyze(&p, &y, n), Err(Error::Computation(_))));
    }
}
