//! Singular value expansion of a centrosymmetric kernel.
//!
//! Outline:
//!
//! 1. Split the kernel into even and odd parts on the quarter `[0, 1]^2`.
//! 2. Project each part onto orthonormal Legendre polynomials per section.
//! 3. SVD both matrices, merge the singular values, truncate.
//! 4. Bisect every section whose Legendre tail is still too large; repeat.
//! 5. Extend the half-interval functions to `[-1, 1]` by parity.
//!
//! The whole computation runs in the working precision `T`; only the final
//! piecewise polynomials are rounded to `f64`.

use std::cmp::Ordering;

use nalgebra::DMatrix;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::kernel::Kernel;
use crate::math::{Real, Rule, SvdResult, legendre_to_power, legendre_values, normalization};
use crate::poly::PiecewisePolynomial;

/// Refinement rounds before we give up and keep the last result.
const MAX_ROUNDS: usize = 40;
/// Rounds without improvement of the worst tail that count as a stall.
const STALL_ROUNDS: usize = 3;
/// Tails below `NOISE_FACTOR * eps * s_0 / s_l` are rounding noise.
const NOISE_FACTOR: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SveSettings {
    pub cutoff: f64,
    pub max_dim: usize,
    pub a_tol: f64,
    pub n_local_poly: usize,
    pub n_gl_node: usize,
    pub verbose: bool,
}

/// Singular values and functions on `[-1, 1]`.
#[derive(Debug, Clone)]
pub struct SveOutput {
    pub singular_values: Vec<f64>,
    pub u: Vec<PiecewisePolynomial>,
    pub v: Vec<PiecewisePolynomial>,
    /// Refinement rounds that were run.
    pub rounds: usize,
    pub converged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parity {
    Even,
    Odd,
}

impl Parity {
    fn sign(self) -> f64 {
        match self {
            Parity::Even => 1.0,
            Parity::Odd => -1.0,
        }
    }
}

/// One retained singular triplet: which parity it came from and its column there.
#[derive(Debug, Clone, Copy)]
struct Picked {
    parity: Parity,
    column: usize,
    s: f64,
}

/// Quadrature data for one section: nodes and `w_q phi_n(x_q)`.
struct SectionQuadrature<T: Real> {
    nodes: Vec<T>,
    /// `[n][q]`
    weighted: Vec<Vec<T>>,
}

/// Run the adaptive SVE for `kernel` in precision `T`.
pub fn compute_sve<T: Real, K: Kernel>(
    kernel: &K,
    settings: &SveSettings,
) -> Result<SveOutput, AppError> {
    let rule = Rule::<T>::legendre(settings.n_gl_node)?;
    let n_poly = settings.n_local_poly;

    let mut edges_x = vec![0.0, 1.0];
    let mut edges_y = vec![0.0, 1.0];
    let mut best_tail = f64::INFINITY;
    let mut stalled = 0;
    let mut round = 0;

    loop {
        round += 1;
        let quad_x = section_quadratures(&rule, &edges_x, n_poly);
        let quad_y = section_quadratures(&rule, &edges_y, n_poly);
        let (even, odd) = discretize(kernel, &quad_x, &quad_y, n_poly);

        let svd_even = T::svd(even)?;
        let svd_odd = T::svd(odd)?;
        let picked = select(&svd_even, &svd_odd, settings.cutoff, settings.max_dim)?;

        let s0 = picked[0].s;
        let mut split_x = vec![false; edges_x.len() - 1];
        let mut split_y = vec![false; edges_y.len() - 1];
        let mut worst = 0.0_f64;
        for p in &picked {
            let threshold = settings.a_tol.max(NOISE_FACTOR * T::epsilon() * s0 / p.s);
            let svd = match p.parity {
                Parity::Even => &svd_even,
                Parity::Odd => &svd_odd,
            };
            worst = worst.max(mark_sections(&svd.u, p.column, n_poly, threshold, &mut split_x));
            worst = worst.max(mark_sections(&svd.v, p.column, n_poly, threshold, &mut split_y));
        }

        let n_split_x = split_x.iter().filter(|&&b| b).count();
        let n_split_y = split_y.iter().filter(|&&b| b).count();
        let s_last = picked[picked.len() - 1].s;
        if settings.verbose {
            info!(
                round,
                sections_x = edges_x.len() - 1,
                sections_y = edges_y.len() - 1,
                dim = picked.len(),
                s_last = s_last / s0,
                split_x = n_split_x,
                split_y = n_split_y,
                "SVE refinement"
            );
        } else {
            debug!(
                round,
                sections_x = edges_x.len() - 1,
                sections_y = edges_y.len() - 1,
                dim = picked.len(),
                split_x = n_split_x,
                split_y = n_split_y,
                "SVE refinement"
            );
        }

        let converged = n_split_x == 0 && n_split_y == 0;
        if !converged {
            if worst < best_tail {
                best_tail = worst;
                stalled = 0;
            } else {
                stalled += 1;
            }
        }

        let give_up = if converged {
            false
        } else if stalled >= STALL_ROUNDS {
            warn!(
                round,
                tail_ratio = worst,
                "SVE refinement stalled at the precision floor; keeping the last result"
            );
            true
        } else if round >= MAX_ROUNDS {
            warn!(
                round,
                tail_ratio = worst,
                "SVE refinement hit the round limit; keeping the last result"
            );
            true
        } else {
            false
        };

        if converged || give_up {
            return finish(
                &picked, &svd_even, &svd_odd, &edges_x, &edges_y, n_poly, round, converged,
            );
        }

        edges_x = bisect(&edges_x, &split_x);
        edges_y = bisect(&edges_y, &split_y);
    }
}

fn section_quadratures<T: Real>(
    rule: &Rule<T>,
    edges: &[f64],
    n_poly: usize,
) -> Vec<SectionQuadrature<T>> {
    edges
        .windows(2)
        .map(|w| {
            let (a, b) = (T::from_f64(w[0]), T::from_f64(w[1]));
            let h = b - a;
            let scaled = rule.scaled(a, b);
            let norms: Vec<T> = (0..n_poly).map(|n| normalization(n, h)).collect();
            let mut weighted = vec![vec![T::zero(); scaled.len()]; n_poly];
            for (q, &w) in scaled.weights.iter().enumerate() {
                // local coordinate of the node is the reference node
                let p = legendre_values(n_poly - 1, rule.nodes[q]);
                for n in 0..n_poly {
                    weighted[n][q] = w * norms[n] * p[n];
                }
            }
            SectionQuadrature {
                nodes: scaled.nodes,
                weighted,
            }
        })
        .collect()
}

/// Galerkin matrices of the even and odd kernel parts.
///
/// Entry `(i * n_poly + n, j * n_poly + m)` is
/// `int int phi_{i,n}(x) K_pm(x, y) phi_{j,m}(y) dx dy`.
fn discretize<T: Real, K: Kernel>(
    kernel: &K,
    quad_x: &[SectionQuadrature<T>],
    quad_y: &[SectionQuadrature<T>],
    n_poly: usize,
) -> (DMatrix<T>, DMatrix<T>) {
    let nx = quad_x.len();
    let ny = quad_y.len();

    let blocks: Vec<(Vec<T>, Vec<T>)> = (0..nx * ny)
        .into_par_iter()
        .map(|idx| {
            let (i, j) = (idx / ny, idx % ny);
            block(kernel, &quad_x[i], &quad_y[j], n_poly)
        })
        .collect();

    let rows = nx * n_poly;
    let cols = ny * n_poly;
    let mut even = DMatrix::from_element(rows, cols, T::zero());
    let mut odd = DMatrix::from_element(rows, cols, T::zero());
    for (idx, (be, bo)) in blocks.into_iter().enumerate() {
        let (i, j) = (idx / ny, idx % ny);
        for n in 0..n_poly {
            for m in 0..n_poly {
                even[(i * n_poly + n, j * n_poly + m)] = be[n * n_poly + m];
                odd[(i * n_poly + n, j * n_poly + m)] = bo[n * n_poly + m];
            }
        }
    }
    (even, odd)
}

/// One `n_poly x n_poly` block of both parity matrices, row-major.
fn block<T: Real, K: Kernel>(
    kernel: &K,
    qx: &SectionQuadrature<T>,
    qy: &SectionQuadrature<T>,
    n_poly: usize,
) -> (Vec<T>, Vec<T>) {
    let n_qx = qx.nodes.len();
    let n_qy = qy.nodes.len();

    let mut k_even = vec![T::zero(); n_qx * n_qy];
    let mut k_odd = vec![T::zero(); n_qx * n_qy];
    for (q, &x) in qx.nodes.iter().enumerate() {
        for (r, &y) in qy.nodes.iter().enumerate() {
            let plus = kernel.value(x, y);
            let minus = kernel.value(x, -y);
            k_even[q * n_qy + r] = plus + minus;
            k_odd[q * n_qy + r] = plus - minus;
        }
    }

    let project = |kmat: &[T]| {
        // tmp[n][r] = sum_q W_x[n][q] K[q][r]
        let mut tmp = vec![T::zero(); n_poly * n_qy];
        for n in 0..n_poly {
            for q in 0..n_qx {
                let wx = qx.weighted[n][q];
                for r in 0..n_qy {
                    tmp[n * n_qy + r] += wx * kmat[q * n_qy + r];
                }
            }
        }
        let mut out = vec![T::zero(); n_poly * n_poly];
        for n in 0..n_poly {
            for m in 0..n_poly {
                let mut acc = T::zero();
                for r in 0..n_qy {
                    acc += tmp[n * n_qy + r] * qy.weighted[m][r];
                }
                out[n * n_poly + m] = acc;
            }
        }
        out
    };

    (project(&k_even), project(&k_odd))
}

/// Merge both parities in descending order and truncate.
fn select<T: Real>(
    even: &SvdResult<T>,
    odd: &SvdResult<T>,
    cutoff: f64,
    max_dim: usize,
) -> Result<Vec<Picked>, AppError> {
    let mut all: Vec<Picked> = even
        .s
        .iter()
        .enumerate()
        .map(|(column, s)| Picked {
            parity: Parity::Even,
            column,
            s: s.to_f64(),
        })
        .chain(odd.s.iter().enumerate().map(|(column, s)| Picked {
            parity: Parity::Odd,
            column,
            s: s.to_f64(),
        }))
        .collect();
    all.sort_by(|a, b| b.s.partial_cmp(&a.s).unwrap_or(Ordering::Equal));

    let s0 = all.first().map(|p| p.s).unwrap_or(0.0);
    if !(s0.is_finite() && s0 > 0.0) {
        return Err(AppError::numeric(format!(
            "Largest singular value is {s0}; the kernel matrix is degenerate."
        )));
    }

    let picked: Vec<Picked> = all
        .into_iter()
        .take_while(|p| p.s / s0 >= cutoff)
        .take(max_dim)
        .collect();
    if picked.is_empty() {
        return Err(AppError::input("max_dim must be >= 1."));
    }
    Ok(picked)
}

/// Flag sections of one singular vector whose Legendre tail exceeds
/// `threshold`. Returns the worst `tail / threshold` ratio.
fn mark_sections<T: Real>(
    vectors: &DMatrix<T>,
    column: usize,
    n_poly: usize,
    threshold: f64,
    split: &mut [bool],
) -> f64 {
    let mut worst = 0.0_f64;
    for (s, flag) in split.iter_mut().enumerate() {
        let last = vectors[(s * n_poly + n_poly - 1, column)].to_f64().abs();
        let prev = vectors[(s * n_poly + n_poly - 2, column)].to_f64().abs();
        let ratio = last.max(prev) / threshold;
        worst = worst.max(ratio);
        if ratio > 1.0 {
            *flag = true;
        }
    }
    worst
}

/// Insert the midpoint of every flagged section.
fn bisect(edges: &[f64], split: &[bool]) -> Vec<f64> {
    let mut out = Vec::with_capacity(edges.len() + split.len());
    out.push(edges[0]);
    for (s, w) in edges.windows(2).enumerate() {
        if split[s] {
            out.push(0.5 * (w[0] + w[1]));
        }
        out.push(w[1]);
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn finish<T: Real>(
    picked: &[Picked],
    svd_even: &SvdResult<T>,
    svd_odd: &SvdResult<T>,
    edges_x: &[f64],
    edges_y: &[f64],
    n_poly: usize,
    rounds: usize,
    converged: bool,
) -> Result<SveOutput, AppError> {
    let mut singular_values = Vec::with_capacity(picked.len());
    let mut u = Vec::with_capacity(picked.len());
    let mut v = Vec::with_capacity(picked.len());

    for p in picked {
        let svd = match p.parity {
            Parity::Even => svd_even,
            Parity::Odd => svd_odd,
        };
        let mut ul = extend_to_full_domain(&svd.u, p.column, edges_x, n_poly, p.parity)?;
        let mut vl = extend_to_full_domain(&svd.v, p.column, edges_y, n_poly, p.parity)?;

        let last = ul.num_sections() - 1;
        if ul.value_in_section(1.0, last) < 0.0 {
            ul = ul.scale(-1.0);
            vl = vl.scale(-1.0);
        }
        singular_values.push(p.s);
        u.push(ul);
        v.push(vl);
    }

    Ok(SveOutput {
        singular_values,
        u,
        v,
        rounds,
        converged,
    })
}

/// Turn a half-interval singular vector into a function on `[-1, 1]`.
///
/// On `[0, 1]` the function is the Legendre expansion scaled by `1/sqrt(2)`.
/// On the mirrored section `[-b, -a]` the local coordinate flips, so
/// coefficient `n` picks up `(-1)^n` on top of the parity sign.
fn extend_to_full_domain<T: Real>(
    vectors: &DMatrix<T>,
    column: usize,
    half_edges: &[f64],
    n_poly: usize,
    parity: Parity,
) -> Result<PiecewisePolynomial, AppError> {
    let n_half = half_edges.len() - 1;
    let mut edges: Vec<f64> = half_edges[1..].iter().rev().map(|&e| -e).collect();
    edges.extend_from_slice(half_edges);

    let inv_sqrt2 = T::one() / T::from_f64(2.0).sqrt();
    let parity_sign = T::from_f64(parity.sign());
    let mut coeff = DMatrix::zeros(2 * n_half, n_poly);

    for s in 0..n_half {
        let h = T::from_f64(half_edges[s + 1] - half_edges[s]);
        let legendre: Vec<T> = (0..n_poly)
            .map(|n| vectors[(s * n_poly + n, column)] * inv_sqrt2)
            .collect();
        let mirrored: Vec<T> = legendre
            .iter()
            .enumerate()
            .map(|(n, &c)| if n % 2 == 0 { c * parity_sign } else { -(c * parity_sign) })
            .collect();

        let right = legendre_to_power(&legendre, h);
        let left = legendre_to_power(&mirrored, h);
        for p in 0..n_poly {
            coeff[(n_half + s, p)] = right[p].to_f64();
            coeff[(n_half - 1 - s, p)] = left[p].to_f64();
        }
    }

    PiecewisePolynomial::from_coefficients(edges, coeff)
}
