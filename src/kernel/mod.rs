//! Analytic continuation kernels on `[-1, 1] x [-1, 1]`.
//!
//! With `x = 2 tau / beta - 1` and `y = omega / omega_max`:
//!
//! - fermionic: `K(x, y) = exp(-Lambda x y / 2) / (2 cosh(Lambda y / 2))`
//! - bosonic:   `K(x, y) = y exp(-Lambda x y / 2) / (2 sinh(Lambda y / 2))`
//!
//! Both satisfy `K(-x, -y) = K(x, y)`. We evaluate on the `y >= 0` half and
//! reflect, which lets every exponent stay non-positive.

use crate::domain::Statistics;
use crate::math::Real;

/// A kernel that can be evaluated in any working precision.
pub trait Kernel: Send + Sync {
    fn statistics(&self) -> Statistics;

    fn lambda(&self) -> f64;

    /// `K(x, y)` for `x, y` in `[-1, 1]`.
    fn value<T: Real>(&self, x: T, y: T) -> T;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FermionicKernel {
    lambda: f64,
}

impl FermionicKernel {
    pub fn new(lambda: f64) -> Self {
        Self { lambda }
    }
}

impl Kernel for FermionicKernel {
    fn statistics(&self) -> Statistics {
        Statistics::Fermionic
    }

    fn lambda(&self) -> f64 {
        self.lambda
    }

    fn value<T: Real>(&self, x: T, y: T) -> T {
        let (x, y) = reflect(x, y);
        let z = T::from_f64(self.lambda) * y;
        let half = T::from_f64(0.5);
        T::exp(-(half * z * (T::one() + x))) / (T::one() + T::exp(-z))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BosonicKernel {
    lambda: f64,
}

impl BosonicKernel {
    pub fn new(lambda: f64) -> Self {
        Self { lambda }
    }
}

impl Kernel for BosonicKernel {
    fn statistics(&self) -> Statistics {
        Statistics::Bosonic
    }

    fn lambda(&self) -> f64 {
        self.lambda
    }

    fn value<T: Real>(&self, x: T, y: T) -> T {
        let (x, y) = reflect(x, y);
        let lambda = T::from_f64(self.lambda);
        let z = lambda * y;
        let half = T::from_f64(0.5);
        // z / (1 - exp(-z)) -> 1 as z -> 0
        let ratio = if z == T::zero() {
            T::one()
        } else {
            z / -T::exp_m1(-z)
        };
        T::exp(-(half * z * (T::one() + x))) * ratio / lambda
    }
}

fn reflect<T: Real>(x: T, y: T) -> (T, T) {
    if y < T::zero() { (-x, -y) } else { (x, y) }
}
