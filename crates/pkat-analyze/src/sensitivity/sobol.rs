//! Saltelli sampling and Sobol index estimation.
//!
//! Estimators follow Saltelli et al. (2010), "Variance based sensitivity
//! analysis of model output":
//!
//! - `S1_i  = mean(B (AB_i - A)) / V`
//! - `ST_i  = mean((A - AB_i)^2) / (2 V)`
//! - `S2_ij = mean(BA_i AB_j - A B) / V - S1_i - S1_j`
//!
//! where A and B are independent base matrices, AB_i is A with column `i`
//! taken from B, and BA_i the converse. The design therefore has
//! `n (2k + 2)` rows.

use pkat_core::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{index_pairs, scale, Interaction, SensitivityIndices, SensitivityProblem};

/// Generate the Saltelli design: per base draw, the row order is
/// `A, AB_1..AB_k, BA_1..BA_k, B`.
pub(crate) fn sample(problem: &SensitivityProblem, n: usize, seed: u64) -> Vec<Vec<f64>> {
    let k = problem.num_vars;
    let mut rng = StdRng::seed_from_u64(seed);
    let unit = |rng: &mut StdRng| -> Vec<f64> { (0..k).map(|_| rng.gen::<f64>()).collect() };

    let mut rows = Vec::with_capacity(n * (2 * k + 2));
    for _ in 0..n {
        let a = unit(&mut rng);
        let b = unit(&mut rng);
        rows.push(scale_row(&a, problem));
        for i in 0..k {
            let mut ab = a.clone();
            ab[i] = b[i];
            rows.push(scale_row(&ab, problem));
        }
        for i in 0..k {
            let mut ba = b.clone();
            ba[i] = a[i];
            rows.push(scale_row(&ba, problem));
        }
        rows.push(scale_row(&b, problem));
    }
    rows
}

fn scale_row(unit: &[f64], problem: &SensitivityProblem) -> Vec<f64> {
    unit.iter().zip(problem.bounds.iter()).map(|(&u, &b)| scale(u, b)).collect()
}

/// Estimate S1, ST, and all pairwise S2 from responses in design row order.
pub(crate) fn analyze(
    problem: &SensitivityProblem,
    y: &[f64],
    n: usize,
) -> Result<SensitivityIndices> {
    let k = problem.num_vars;
    let block = 2 * k + 2;

    // Normalize the full response; the estimators are expressed on centered,
    // unit-variance values as in the reference implementation.
    let mean = y.iter().sum::<f64>() / y.len() as f64;
    let sd = (y.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / y.len() as f64).sqrt();
    if sd == 0.0 {
        return Err(Error::Computation(
            "response has zero variance; sensitivity indices are undefined".to_string(),
        ));
    }
    let z: Vec<f64> = y.iter().map(|v| (v - mean) / sd).collect();

    let ya: Vec<f64> = (0..n).map(|i| z[i * block]).collect();
    let yb: Vec<f64> = (0..n).map(|i| z[i * block + block - 1]).collect();
    let yab: Vec<Vec<f64>> =
        (0..k).map(|j| (0..n).map(|i| z[i * block + 1 + j]).collect()).collect();
    let yba: Vec<Vec<f64>> =
        (0..k).map(|j| (0..n).map(|i| z[i * block + 1 + k + j]).collect()).collect();

    let var = variance(&ya, &yb);
    if var <= 0.0 {
        return Err(Error::Computation(
            "base-sample variance is zero; sensitivity indices are undefined".to_string(),
        ));
    }

    let nf = n as f64;
    let s1: Vec<f64> = (0..k)
        .map(|j| {
            let num: f64 =
                (0..n).map(|i| yb[i] * (yab[j][i] - ya[i])).sum::<f64>() / nf;
            num / var
        })
        .collect();
    let st: Vec<f64> = (0..k)
        .map(|j| {
            let num: f64 = (0..n)
                .map(|i| {
                    let d = ya[i] - yab[j][i];
                    d * d
                })
                .sum::<f64>()
                / nf;
            num / (2.0 * var)
        })
        .collect();

    let s2 = index_pairs(k)
        .map(|(i, j)| {
            let closed: f64 = (0..n)
                .map(|m| yba[i][m] * yab[j][m] - ya[m] * yb[m])
                .sum::<f64>()
                / nf;
            Interaction { i, j, value: closed / var - s1[i] - s1[j] }
        })
        .collect();

    Ok(SensitivityIndices { s1, st, s2: Some(s2) })
}

fn variance(ya: &[f64], yb: &[f64]) -> f64 {
    let all: Vec<f64> = ya.iter().chain(yb.iter()).copied().collect();
    let mean = all.iter().sum::<f64>() / all.len() as f64;
    all.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / all.len() as f64
}
