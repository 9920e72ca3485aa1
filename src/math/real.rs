//! Scalar abstraction for the singular value expansion.
//!
//! The SVE is written once and instantiated for two working precisions:
//!
//! - `f64` for the `double` precision mode
//! - `TwoFloat` (double-double, 106-bit mantissa) for the `mp` mode
//!
//! Only plain arithmetic is required from `TwoFloat`; the transcendental
//! functions the kernels need (`exp`, `exp_m1`, `sqrt`) are implemented here
//! on top of it so that both scalars expose exactly the same operations.

use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use nalgebra::DMatrix;
use twofloat::TwoFloat;

use crate::error::AppError;
use crate::math::svd::{SvdResult, jacobi_svd, nalgebra_svd};

/// High part of `ln 2` as a double-double.
const LN_2_HI: f64 = 6.931_471_805_599_453e-1;
/// Low part of `ln 2` as a double-double.
const LN_2_LO: f64 = 2.319_046_813_846_299_6e-17;

/// Real scalar used by the kernel discretization and the SVD.
pub trait Real:
    Copy
    + Debug
    + PartialEq
    + PartialOrd
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
{
    /// Mantissa bits of the working precision.
    const MANTISSA_BITS: u32;

    fn from_f64(value: f64) -> Self;

    fn to_f64(self) -> f64;

    /// Unit roundoff of the working precision, as an `f64`.
    fn epsilon() -> f64;

    fn sqrt(self) -> Self;

    fn exp(self) -> Self;

    /// `exp(self) - 1` without cancellation for small arguments.
    fn exp_m1(self) -> Self;

    /// Singular value decomposition in this precision.
    fn svd(a: DMatrix<Self>) -> Result<SvdResult<Self>, AppError>;

    fn zero() -> Self {
        Self::from_f64(0.0)
    }

    fn one() -> Self {
        Self::from_f64(1.0)
    }

    fn from_usize(n: usize) -> Self {
        Self::from_f64(n as f64)
    }

    fn abs(self) -> Self {
        if self < Self::zero() { -self } else { self }
    }

    fn max(self, other: Self) -> Self {
        if other > self { other } else { self }
    }
}

impl Real for f64 {
    const MANTISSA_BITS: u32 = 53;

    fn from_f64(value: f64) -> Self {
        value
    }

    fn to_f64(self) -> f64 {
        self
    }

    fn epsilon() -> f64 {
        f64::EPSILON
    }

    fn sqrt(self) -> Self {
        f64::sqrt(self)
    }

    fn exp(self) -> Self {
        f64::exp(self)
    }

    fn exp_m1(self) -> Self {
        f64::exp_m1(self)
    }

    fn svd(a: DMatrix<Self>) -> Result<SvdResult<Self>, AppError> {
        nalgebra_svd(a)
    }
}

impl Real for TwoFloat {
    const MANTISSA_BITS: u32 = 106;

    fn from_f64(value: f64) -> Self {
        TwoFloat::from(value)
    }

    fn to_f64(self) -> f64 {
        self.hi() + self.lo()
    }

    fn epsilon() -> f64 {
        2f64.powi(-104)
    }

    fn sqrt(self) -> Self {
        let hi = self.hi();
        if hi <= 0.0 {
            return Self::zero();
        }
        // One Newton step from the f64 root doubles the number of correct bits.
        let y = TwoFloat::from(hi.sqrt());
        y + (self - y * y) / (y * TwoFloat::from(2.0))
    }

    fn exp(self) -> Self {
        let hi = self.hi();
        if hi < -745.0 {
            return Self::zero();
        }
        if hi > 709.0 {
            return TwoFloat::from(f64::INFINITY);
        }

        // exp(x) = 2^k * exp(r)^32 with |r| <= ln2 / 64.
        let k = (hi / LN_2_HI).round();
        let ln2 = TwoFloat::from(LN_2_HI) + TwoFloat::from(LN_2_LO);
        let r = (self - ln2 * TwoFloat::from(k)) / TwoFloat::from(32.0);

        let mut term = Self::one();
        let mut sum = Self::one();
        for n in 1..=40 {
            term = term * r / TwoFloat::from(n as f64);
            sum += term;
            if term.hi().abs() < 1e-34 {
                break;
            }
        }
        for _ in 0..5 {
            sum = sum * sum;
        }

        sum * TwoFloat::from(2f64.powi(k as i32))
    }

    fn exp_m1(self) -> Self {
        if self.hi().abs() >= 0.5 {
            return <Self as Real>::exp(self) - Self::one();
        }

        let mut term = self;
        let mut sum = self;
        for n in 2..=80 {
            term = term * self / TwoFloat::from(n as f64);
            sum += term;
            if term.hi().abs() <= sum.hi().abs() * 1e-34 {
                break;
            }
        }
        sum
    }

    fn svd(a: DMatrix<Self>) -> Result<SvdResult<Self>, AppError> {
        jacobi_svd(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel_err(a: TwoFloat, b: f64) -> f64 {
        ((a.to_f64() - b) / b).abs()
    }

    #[test]
    fn twofloat_exp_matches_f64() {
        for &x in &[-50.0, -3.5, -1.0, -1e-3, 0.0, 0.25, 2.0, 30.0] {
            let v = <TwoFloat as Real>::exp(TwoFloat::from(x));
            assert!(rel_err(v, x.exp()) < 1e-15, "exp({x}) = {v:?}");
        }
    }

    #[test]
    fn twofloat_exp_is_more_accurate_than_f64() {
        // exp(1) = 2.718281828459045 + 1.4456468917292502e-16
        let e = <TwoFloat as Real>::exp(TwoFloat::one());
        let diff = e - TwoFloat::from(std::f64::consts::E);
        assert!((diff.to_f64() - 1.445_646_891_729_250_2e-16).abs() < 1e-28);
    }

    #[test]
    fn twofloat_exp_m1_small_argument() {
        let x = 1e-20;
        let v = <TwoFloat as Real>::exp_m1(TwoFloat::from(x));
        assert!(rel_err(v, x) < 1e-15);

        let x = -0.3;
        let v = <TwoFloat as Real>::exp_m1(TwoFloat::from(x));
        assert!(rel_err(v, x.exp_m1()) < 1e-15);
    }

    #[test]
    fn twofloat_sqrt_squares_back() {
        let two = TwoFloat::from(2.0);
        let r = <TwoFloat as Real>::sqrt(two);
        let back = r * r - two;
        assert!(back.to_f64().abs() < 1e-30);
        assert_eq!(<TwoFloat as Real>::sqrt(TwoFloat::zero()), TwoFloat::zero());
    }

    #[test]
    fn abs_and_max_defaults() {
        assert_eq!(Real::abs(-2.5f64), 2.5);
        assert_eq!(Real::max(1.0f64, 3.0), 3.0);
        assert_eq!(<TwoFloat as Real>::abs(TwoFloat::from(-1.5)).to_f64(), 1.5);
    }
}
