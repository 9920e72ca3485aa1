//! Transformation of `u_l(x)` to Matsubara frequencies.
//!
//! ```text
//! T_nl = 1/sqrt(2) int_{-1}^{1} dx exp(i pi w_n (x + 1) / 2) u_l(x)
//! ```
//!
//! with `w_n = 2n + 1` for fermions and `w_n = 2n` for bosons. Each section
//! is integrated by Gauss-Legendre with enough nodes to resolve both the
//! polynomial and the phase swept over that section.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::f64::consts::{FRAC_1_SQRT_2, PI};

use nalgebra::{Complex, DMatrix};
use rayon::prelude::*;

use crate::domain::Statistics;
use crate::error::AppError;
use crate::math::Rule;
use crate::poly::PiecewisePolynomial;

/// Nodes added on top of the polynomial and oscillation requirements.
const EXTRA_NODES: usize = 12;
/// Phase swept by one quadrature piece; wider sections are split.
const MAX_SWEPT_PHASE: f64 = 200.0;
/// Largest `|n|` accepted by `transform`.
pub const MAX_MATSUBARA_INDEX: i64 = 1_000_000_000;

/// Dimensionless Matsubara frequency `w_n`, `None` on overflow.
pub fn matsubara_index(statistics: Statistics, n: i64) -> Option<i64> {
    let twice = n.checked_mul(2)?;
    match statistics {
        Statistics::Fermionic => twice.checked_add(1),
        Statistics::Bosonic => Some(twice),
    }
}

/// `T_nl` for the rows `n_vec` and all `functions`.
pub fn transform(
    statistics: Statistics,
    functions: &[PiecewisePolynomial],
    n_vec: &[i64],
) -> Result<DMatrix<Complex<f64>>, AppError> {
    if let Some(n) = n_vec
        .iter()
        .find(|n| !(-MAX_MATSUBARA_INDEX..=MAX_MATSUBARA_INDEX).contains(*n))
    {
        return Err(AppError::input(format!(
            "Matsubara index n={n} is out of range (|n| <= {MAX_MATSUBARA_INDEX})."
        )));
    }

    let rows: Vec<Vec<Complex<f64>>> = n_vec
        .par_iter()
        .map_init(HashMap::new, |rules, &n| {
            let w = matsubara_index(statistics, n)
                .ok_or_else(|| AppError::input(format!("Matsubara index n={n} overflows.")))?;
            let omega = 0.5 * PI * w as f64;
            functions
                .iter()
                .map(|f| integrate_oscillating(f, omega, rules))
                .collect::<Result<Vec<_>, AppError>>()
        })
        .collect::<Result<_, _>>()?;

    Ok(DMatrix::from_fn(n_vec.len(), functions.len(), |i, l| {
        rows[i][l]
    }))
}

/// `1/sqrt(2) int f(x) exp(i omega (x + 1)) dx`
fn integrate_oscillating(
    f: &PiecewisePolynomial,
    omega: f64,
    rules: &mut HashMap<usize, Rule<f64>>,
) -> Result<Complex<f64>, AppError> {
    let mut acc = Complex::new(0.0, 0.0);
    for s in 0..f.num_sections() {
        let (a, b) = (f.section_edge(s), f.section_edge(s + 1));
        let pieces = ((omega.abs() * (b - a) / MAX_SWEPT_PHASE).ceil() as usize).max(1);
        let width = (b - a) / pieces as f64;
        let m = node_count(f.order(), omega, width);
        let rule = match rules.entry(m) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(Rule::legendre(m)?),
        };
        for piece in 0..pieces {
            let lo = a + piece as f64 * width;
            let hi = if piece + 1 == pieces { b } else { lo + width };
            let scaled = rule.scaled(lo, hi);
            for (&x, &w) in scaled.nodes.iter().zip(scaled.weights.iter()) {
                let phase = omega * (x + 1.0);
                acc += Complex::new(phase.cos(), phase.sin()) * (w * f.value_in_section(x, s));
            }
        }
    }
    Ok(acc * FRAC_1_SQRT_2)
}

fn node_count(order: usize, omega: f64, width: f64) -> usize {
    let swept = (omega.abs() * width).ceil() as usize;
    (order + swept) / 2 + EXTRA_NODES
}
