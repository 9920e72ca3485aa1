//! Legendre polynomial helpers for the per-section basis.
//!
//! Inside a section `[a, a + h]` we use the orthonormal functions
//!
//! ```text
//! phi_n(x) = sqrt((2n + 1) / h) * P_n(xi),    xi = 2 (x - a) / h - 1
//! ```
//!
//! The SVE works with coefficients in this basis; the stored basis functions
//! use plain powers of `(x - a)`, so we also need the change of basis.

use crate::math::real::Real;

/// `[P_0(xi), ..., P_{n_max}(xi)]`.
pub fn legendre_values<T: Real>(n_max: usize, xi: T) -> Vec<T> {
    let mut out = Vec::with_capacity(n_max + 1);
    out.push(T::one());
    if n_max == 0 {
        return out;
    }
    out.push(xi);
    for k in 2..=n_max {
        let p = (T::from_usize(2 * k - 1) * xi * out[k - 1] - T::from_usize(k - 1) * out[k - 2])
            / T::from_usize(k);
        out.push(p);
    }
    out
}

/// Normalization `sqrt((2n + 1) / h)` of `phi_n` on a section of width `h`.
pub fn normalization<T: Real>(n: usize, h: T) -> T {
    (T::from_usize(2 * n + 1) / h).sqrt()
}

/// Convert orthonormal-Legendre coefficients on a section of width `h` into
/// coefficients of `(x - a)^p`.
pub fn legendre_to_power<T: Real>(coeffs: &[T], h: T) -> Vec<T> {
    let k = coeffs.len();
    if k == 0 {
        return Vec::new();
    }

    // Monomial coefficients of each P_n in xi, accumulated with the weights.
    let mut in_xi = vec![T::zero(); k];
    let mut p_prev = vec![T::zero(); k];
    let mut p_cur = vec![T::zero(); k];
    p_cur[0] = T::one();
    for (n, &c) in coeffs.iter().enumerate() {
        if n == 1 {
            p_prev = p_cur.clone();
            p_cur = vec![T::zero(); k];
            p_cur[1] = T::one();
        } else if n >= 2 {
            let mut next = vec![T::zero(); k];
            let a = T::from_usize(2 * n - 1) / T::from_usize(n);
            let b = T::from_usize(n - 1) / T::from_usize(n);
            for j in 0..k {
                if j >= 1 {
                    next[j] += a * p_cur[j - 1];
                }
                next[j] -= b * p_prev[j];
            }
            p_prev = std::mem::replace(&mut p_cur, next);
        }

        let scale = c * normalization(n, h);
        for j in 0..=n {
            in_xi[j] += scale * p_cur[j];
        }
    }

    // Substitute xi = alpha t - 1 with t = x - a.
    let alpha = T::from_f64(2.0) / h;
    let binom = binomial_rows::<T>(k);
    let mut out = vec![T::zero(); k];
    for (j, &aj) in in_xi.iter().enumerate() {
        for p in 0..=j {
            let sign = if (j - p) % 2 == 0 { T::one() } else { -T::one() };
            out[p] += aj * binom[j][p] * sign;
        }
    }
    let mut alpha_p = T::one();
    for c in out.iter_mut() {
        *c *= alpha_p;
        alpha_p *= alpha;
    }
    out
}

fn binomial_rows<T: Real>(k: usize) -> Vec<Vec<T>> {
    let mut rows: Vec<Vec<T>> = Vec::with_capacity(k);
    for j in 0..k {
        let mut row = vec![T::one(); j + 1];
        for p in 1..j {
            row[p] = rows[j - 1][p - 1] + rows[j - 1][p];
        }
        rows.push(row);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_power(c: &[f64], t: f64) -> f64 {
        c.iter().rev().fold(0.0, |acc, &v| acc * t + v)
    }

    #[test]
    fn legendre_values_match_closed_forms() {
        let x = 0.3;
        let p = legendre_values(3, x);
        assert!((p[2] - 0.5 * (3.0 * x * x - 1.0)).abs() < 1e-15);
        assert!((p[3] - 0.5 * (5.0 * x * x * x - 3.0 * x)).abs() < 1e-15);
        assert_eq!(legendre_values(0, x), vec![1.0]);
    }

    #[test]
    fn power_conversion_reproduces_legendre_expansion() {
        let a = 0.25;
        let h = 0.5;
        let coeffs = [0.3, -1.2, 0.7, 0.05, -0.4, 0.9];
        let power = legendre_to_power(&coeffs, h);
        assert_eq!(power.len(), coeffs.len());

        for i in 0..=10 {
            let x = a + h * i as f64 / 10.0;
            let xi = 2.0 * (x - a) / h - 1.0;
            let p = legendre_values(coeffs.len() - 1, xi);
            let expected: f64 = coeffs
                .iter()
                .enumerate()
                .map(|(n, &c)| c * normalization(n, h) * p[n])
                .sum();
            let got = eval_power(&power, x - a);
            assert!((got - expected).abs() < 1e-12, "x={x}: {got} vs {expected}");
        }
    }

    #[test]
    fn orthonormal_functions_have_unit_norm() {
        // int phi_2^2 over a section of width h == 1, checked via the power form.
        let h = 0.125;
        let power = legendre_to_power(&[0.0, 0.0, 1.0], h);
        // square the polynomial and integrate term by term
        let mut integral = 0.0;
        for (p, &cp) in power.iter().enumerate() {
            for (q, &cq) in power.iter().enumerate() {
                let e = (p + q + 1) as i32;
                integral += cp * cq * h.powi(e) / e as f64;
            }
        }
        assert!((integral - 1.0).abs() < 1e-12);
    }
}
