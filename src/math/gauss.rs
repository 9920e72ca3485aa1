//! Gauss-Legendre quadrature.
//!
//! Nodes are refined by Newton iteration on `P_n` in the working precision,
//! starting from the usual cosine asymptotic guess.

use std::f64::consts::PI;

use crate::error::AppError;
use crate::math::real::Real;

const MAX_NEWTON_ITERS: usize = 100;

/// Quadrature rule: `int f(x) dx ~ sum_i w_i f(x_i)`.
#[derive(Debug, Clone)]
pub struct Rule<T: Real> {
    /// Nodes in ascending order.
    pub nodes: Vec<T>,
    pub weights: Vec<T>,
    pub a: T,
    pub b: T,
}

impl<T: Real> Rule<T> {
    /// `n`-point Gauss-Legendre rule on `[-1, 1]`.
    pub fn legendre(n: usize) -> Result<Self, AppError> {
        if n == 0 {
            return Err(AppError::input("Gauss-Legendre rule needs at least one node."));
        }

        let mut nodes = vec![T::zero(); n];
        let mut weights = vec![T::zero(); n];
        let tol = T::from_f64(8.0 * T::epsilon());
        let two = T::from_f64(2.0);

        for i in 0..n.div_ceil(2) {
            let guess = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
            let mut x = T::from_f64(guess);
            for _ in 0..MAX_NEWTON_ITERS {
                let (p, dp) = legendre_with_derivative(n, x);
                let dx = p / dp;
                x -= dx;
                if dx.abs() <= tol {
                    break;
                }
            }
            if 2 * i + 1 == n {
                x = T::zero();
            }

            let (_, dp) = legendre_with_derivative(n, x);
            let w = two / ((T::one() - x * x) * dp * dp);
            if !w.to_f64().is_finite() {
                return Err(AppError::numeric(format!(
                    "Gauss-Legendre weight is not finite (n={n}, node {i})."
                )));
            }

            nodes[n - 1 - i] = x;
            nodes[i] = -x;
            weights[n - 1 - i] = w;
            weights[i] = w;
        }

        Ok(Self {
            nodes,
            weights,
            a: -T::one(),
            b: T::one(),
        })
    }

    /// The same rule mapped affinely onto `[a, b]`.
    pub fn scaled(&self, a: T, b: T) -> Self {
        let half = (b - a) / (self.b - self.a);
        let nodes = self.nodes.iter().map(|&x| a + (x - self.a) * half).collect();
        let weights = self.weights.iter().map(|&w| w * half).collect();
        Self { nodes, weights, a, b }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// `(P_n(x), P_n'(x))` by the three-term recurrence.
fn legendre_with_derivative<T: Real>(n: usize, x: T) -> (T, T) {
    let mut p0 = T::one();
    let mut p1 = x;
    if n == 0 {
        return (p0, T::zero());
    }
    for k in 2..=n {
        let kf = T::from_usize(k);
        let p2 = (T::from_usize(2 * k - 1) * x * p1 - T::from_usize(k - 1) * p0) / kf;
        p0 = p1;
        p1 = p2;
    }
    let dp = T::from_usize(n) * (x * p1 - p0) / (x * x - T::one());
    (p1, dp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use twofloat::TwoFloat;

    #[test]
    fn weights_sum_to_interval_length() {
        for n in [1, 2, 5, 16, 24] {
            let rule = Rule::<f64>::legendre(n).unwrap();
            let total: f64 = rule.weights.iter().sum();
            assert!((total - 2.0).abs() < 1e-13, "n={n}: {total}");
            assert!(rule.nodes.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn integrates_polynomials_exactly() {
        // n nodes are exact up to degree 2n - 1.
        let rule = Rule::<f64>::legendre(4).unwrap().scaled(0.0, 2.0);
        let integral: f64 = rule
            .nodes
            .iter()
            .zip(rule.weights.iter())
            .map(|(&x, &w)| w * x.powi(7))
            .sum();
        assert!((integral - 2f64.powi(8) / 8.0).abs() < 1e-11);
    }

    #[test]
    fn twofloat_rule_is_accurate_beyond_double() {
        let rule = Rule::<TwoFloat>::legendre(10).unwrap();
        let mut integral = TwoFloat::from(0.0);
        for (&x, &w) in rule.nodes.iter().zip(rule.weights.iter()) {
            let x2 = x * x;
            integral += w * x2 * x2 * x2;
        }
        // int_{-1}^{1} x^6 dx = 2/7
        let err = integral - TwoFloat::from(2.0) / TwoFloat::from(7.0);
        assert!(err.to_f64().abs() < 1e-28);
    }

    #[test]
    fn zero_nodes_is_an_error() {
        assert!(Rule::<f64>::legendre(0).is_err());
    }
}
