//! Singular value decompositions used by the SVE.
//!
//! Two strategies, chosen by the working precision (see `Real::svd`):
//!
//! - `f64`: nalgebra's bidiagonalization SVD.
//! - extended precision: one-sided (Hestenes) Jacobi. It only needs `+ - * /`
//!   and `sqrt`, and it resolves small singular values to high *relative*
//!   accuracy, which is what a cutoff of `1e-10` relative to `s_0` needs.
//!   The `f64` SVD is used as a preconditioner, so only a few sweeps run in
//!   the working precision.
//!
//! Both return singular values sorted in descending order with matching
//! columns of `u` and `v`.

use nalgebra::DMatrix;
use tracing::debug;

use crate::error::AppError;
use crate::math::real::Real;

/// Maximum number of Jacobi sweeps before giving up.
const MAX_SWEEPS: usize = 80;

/// Thin SVD `a = u * diag(s) * v^T`.
#[derive(Debug, Clone)]
pub struct SvdResult<T: Real> {
    /// `m x r` left singular vectors.
    pub u: DMatrix<T>,
    /// `r` singular values, descending.
    pub s: Vec<T>,
    /// `n x r` right singular vectors.
    pub v: DMatrix<T>,
}

impl<T: Real> SvdResult<T> {
    pub fn rank(&self) -> usize {
        self.s.len()
    }
}

/// SVD in `f64` via nalgebra.
pub fn nalgebra_svd(a: DMatrix<f64>) -> Result<SvdResult<f64>, AppError> {
    let (m, n) = a.shape();
    if m == 0 || n == 0 {
        return Err(AppError::input("Cannot decompose an empty matrix."));
    }
    if a.iter().any(|v| !v.is_finite()) {
        return Err(AppError::numeric("Kernel matrix contains non-finite entries."));
    }

    let svd = a
        .try_svd(true, true, f64::EPSILON, 0)
        .ok_or_else(|| AppError::numeric("SVD failed to converge."))?;
    let u = svd
        .u
        .ok_or_else(|| AppError::numeric("SVD did not return left singular vectors."))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| AppError::numeric("SVD did not return right singular vectors."))?;
    let values = svd.singular_values;

    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&i, &j| {
        values[j]
            .partial_cmp(&values[i])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let r = order.len();
    Ok(SvdResult {
        u: DMatrix::from_fn(m, r, |i, c| u[(i, order[c])]),
        s: order.iter().map(|&c| values[c]).collect(),
        v: DMatrix::from_fn(n, r, |i, c| v_t[(order[c], i)]),
    })
}

/// One-sided Jacobi SVD, generic over the working precision.
pub fn jacobi_svd<T: Real>(a: DMatrix<T>) -> Result<SvdResult<T>, AppError> {
    let (m, n) = a.shape();
    if m == 0 || n == 0 {
        return Err(AppError::input("Cannot decompose an empty matrix."));
    }
    if m < n {
        let transposed = DMatrix::from_fn(n, m, |i, j| a[(j, i)]);
        let r = jacobi_svd(transposed)?;
        return Ok(SvdResult {
            u: r.v,
            s: r.s,
            v: r.u,
        });
    }

    let (mut cols, mut vcols) = precondition(&a)?;
    let sweeps = orthogonalize_columns(&mut cols, &mut vcols)?;
    debug!(rows = m, cols = n, sweeps, "Jacobi SVD");

    let norms: Vec<T> = cols.iter().map(|c| dot(c, c).sqrt()).collect();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| {
        norms[j]
            .partial_cmp(&norms[i])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let u = DMatrix::from_fn(m, n, |i, c| {
        let j = order[c];
        if norms[j] > T::zero() {
            cols[j][i] / norms[j]
        } else {
            T::zero()
        }
    });
    let v = DMatrix::from_fn(n, n, |i, c| vcols[order[c]][i]);
    let s = order.iter().map(|&j| norms[j]).collect();

    Ok(SvdResult { u, s, v })
}

/// Columns of `a * v0` and of `v0`, where `v0` holds the right singular
/// vectors of the `f64` rounding of `a`, re-orthonormalized in `T`.
///
/// The columns of `a * v0` are then orthogonal up to `f64` accuracy and the
/// Jacobi sweeps converge quadratically from the first one.
fn precondition<T: Real>(a: &DMatrix<T>) -> Result<(Vec<Vec<T>>, Vec<Vec<T>>), AppError> {
    let (m, n) = a.shape();
    let rough = nalgebra_svd(DMatrix::from_fn(m, n, |i, j| a[(i, j)].to_f64()))?;

    let mut vcols: Vec<Vec<T>> = (0..rough.rank())
        .map(|c| (0..n).map(|i| T::from_f64(rough.v[(i, c)])).collect())
        .collect();
    // Modified Gram-Schmidt, twice.
    for _ in 0..2 {
        for j in 0..vcols.len() {
            let (done, rest) = vcols.split_at_mut(j);
            let vj = &mut rest[0];
            for vk in done.iter() {
                let proj = dot(vk, vj);
                for (x, &y) in vj.iter_mut().zip(vk.iter()) {
                    *x -= proj * y;
                }
            }
            let norm = dot(vj, vj).sqrt();
            if norm == T::zero() {
                return Err(AppError::numeric("Jacobi preconditioner is rank deficient."));
            }
            for x in vj.iter_mut() {
                *x /= norm;
            }
        }
    }

    let cols = vcols
        .iter()
        .map(|v| {
            (0..m)
                .map(|i| (0..n).fold(T::zero(), |acc, k| acc + a[(i, k)] * v[k]))
                .collect()
        })
        .collect();
    Ok((cols, vcols))
}

/// One-sided Jacobi sweeps until all column pairs are orthogonal, applying
/// the same rotations to `vcols`. Returns the number of sweeps.
fn orthogonalize_columns<T: Real>(
    cols: &mut [Vec<T>],
    vcols: &mut [Vec<T>],
) -> Result<usize, AppError> {
    let n = cols.len();
    let m = cols.first().map(|c| c.len()).unwrap_or(0);
    let tol = T::from_f64(4.0 * T::epsilon() * m as f64);
    let two = T::from_f64(2.0);

    for sweep in 1..=MAX_SWEEPS {
        // squared column norms, updated by each rotation within the sweep
        let mut norms2: Vec<T> = cols.iter().map(|c| dot(c, c)).collect();
        let mut rotated = false;
        for i in 0..n {
            for j in (i + 1)..n {
                let alpha = norms2[i];
                let beta = norms2[j];
                if alpha == T::zero() || beta == T::zero() {
                    continue;
                }
                let gamma = dot(&cols[i], &cols[j]);
                if gamma.abs() <= tol * (alpha * beta).sqrt() {
                    continue;
                }
                rotated = true;

                let zeta = (beta - alpha) / (two * gamma);
                let root = (T::one() + zeta * zeta).sqrt();
                let t = if zeta < T::zero() {
                    -T::one() / (-zeta + root)
                } else {
                    T::one() / (zeta + root)
                };
                let c = T::one() / (T::one() + t * t).sqrt();
                let s = c * t;

                rotate(cols, i, j, c, s);
                rotate(vcols, i, j, c, s);
                norms2[i] = alpha - t * gamma;
                norms2[j] = beta + t * gamma;
            }
        }
        if !rotated {
            return Ok(sweep);
        }
    }

    Err(AppError::numeric(format!(
        "Jacobi SVD did not converge within {MAX_SWEEPS} sweeps ({m}x{n} matrix)."
    )))
}

fn dot<T: Real>(a: &[T], b: &[T]) -> T {
    a.iter()
        .zip(b.iter())
        .fold(T::zero(), |acc, (&x, &y)| acc + x * y)
}

/// Apply a plane rotation to columns `i < j`.
fn rotate<T: Real>(cols: &mut [Vec<T>], i: usize, j: usize, c: T, s: T) {
    let (left, right) = cols.split_at_mut(j);
    let ci = &mut left[i];
    let cj = &mut right[0];
    for (x, y) in ci.iter_mut().zip(cj.iter_mut()) {
        let xi = *x;
        let yj = *y;
        *x = c * xi - s * yj;
        *y = s * xi + c * yj;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::*;
    use rand::rngs::StdRng;
    use twofloat::TwoFloat;

    fn reconstruct(r: &SvdResult<f64>) -> DMatrix<f64> {
        let (m, n) = (r.u.nrows(), r.v.nrows());
        DMatrix::from_fn(m, n, |i, j| {
            (0..r.rank()).map(|l| r.u[(i, l)] * r.s[l] * r.v[(j, l)]).sum()
        })
    }

    fn sample_matrix() -> DMatrix<f64> {
        DMatrix::from_fn(5, 3, |i, j| 1.0 / (i as f64 + j as f64 + 1.0))
    }

    #[test]
    fn nalgebra_svd_sorts_and_reconstructs() {
        let a = sample_matrix();
        let r = nalgebra_svd(a.clone()).unwrap();
        assert_eq!(r.rank(), 3);
        assert!(r.s.windows(2).all(|w| w[0] >= w[1]));
        let back = reconstruct(&r);
        assert!((back - a).amax() < 1e-12);
    }

    #[test]
    fn jacobi_matches_nalgebra_singular_values() {
        let a = sample_matrix();
        let reference = nalgebra_svd(a.clone()).unwrap();
        let jac = jacobi_svd(a.clone()).unwrap();
        for (x, y) in jac.s.iter().zip(reference.s.iter()) {
            assert!((x - y).abs() < 1e-12 * reference.s[0]);
        }
        let back = reconstruct(&jac);
        assert!((back - a).amax() < 1e-12);
    }

    #[test]
    fn jacobi_handles_wide_matrices() {
        let a = DMatrix::from_fn(2, 4, |i, j| (i * 4 + j) as f64 + 1.0);
        let r = jacobi_svd(a.clone()).unwrap();
        assert_eq!(r.u.nrows(), 2);
        assert_eq!(r.v.nrows(), 4);
        let back = reconstruct(&r);
        assert!((back - a).amax() < 1e-12);
    }

    #[test]
    fn jacobi_twofloat_resolves_tiny_singular_values() {
        // Hilbert matrix: condition number ~ 1.5e7 for n = 6.
        let n = 6;
        let a = DMatrix::from_fn(n, n, |i, j| {
            TwoFloat::from(1.0) / TwoFloat::from((i + j + 1) as f64)
        });
        let r = jacobi_svd(a).unwrap();
        let reference = nalgebra_svd(DMatrix::from_fn(n, n, |i, j| 1.0 / (i + j + 1) as f64)).unwrap();
        let smallest = r.s[n - 1].to_f64();
        assert!(smallest > 1.0e-7 && smallest < 1.1e-7);
        assert!(((smallest - reference.s[n - 1]) / smallest).abs() < 1e-6);

        // Columns of v stay orthonormal in extended precision.
        for p in 0..n {
            for q in 0..n {
                let d: TwoFloat = (0..n).fold(TwoFloat::from(0.0), |acc, i| acc + r.v[(i, p)] * r.v[(i, q)]);
                let expected = if p == q { 1.0 } else { 0.0 };
                assert!((d.to_f64() - expected).abs() < 1e-28);
            }
        }
    }

    #[test]
    fn preconditioned_sweeps_converge_quickly() {
        // Hilbert matrix, condition number ~ 1.5e10 for n = 8.
        let n = 8;
        let a = DMatrix::from_fn(n, n, |i, j| {
            TwoFloat::from(1.0) / TwoFloat::from((i + j + 1) as f64)
        });
        let (mut cols, mut vcols) = precondition(&a).unwrap();
        let sweeps = orthogonalize_columns(&mut cols, &mut vcols).unwrap();
        assert!(sweeps <= 6, "sweeps={sweeps}");
    }

    #[test]
    fn jacobi_agrees_with_nalgebra_on_random_matrices() {
        let mut rng = StdRng::seed_from_u64(42);
        for &(m, n) in &[(7usize, 5usize), (4, 9), (12, 12)] {
            let a = DMatrix::from_fn(m, n, |_, _| rng.gen_range(-1.0..1.0));
            let reference = nalgebra_svd(a.clone()).unwrap();
            let jac = jacobi_svd(a.clone()).unwrap();
            for (x, y) in jac.s.iter().zip(reference.s.iter()) {
                assert!((x - y).abs() < 1e-12, "{m}x{n}: {x} vs {y}");
            }
            assert!((reconstruct(&jac) - a).amax() < 1e-12);
        }
    }

    #[test]
    fn empty_matrix_is_rejected() {
        let a = DMatrix::<f64>::zeros(0, 3);
        assert!(nalgebra_svd(a).is_err());
    }
}
