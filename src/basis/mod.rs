//! Intermediate representation (IR) basis.
//!
//! `compute_basis` runs the singular value expansion of the fermionic or
//! bosonic kernel and returns an `IrBasis`:
//!
//! - singular values `s_l` in descending order
//! - `u_l(x)` on the imaginary-time side, `x = 2 tau / beta - 1`
//! - `v_l(y)` on the real-frequency side, `y = omega / omega_max`
//!
//! The basis functions are stored as `f64` piecewise polynomials whatever the
//! working precision of the expansion was.

use nalgebra::{Complex, DMatrix};
use tracing::info;

use crate::domain::{BasisConfig, BasisSummary, PrecisionMode, Statistics};
use crate::error::AppError;
use crate::kernel::{BosonicKernel, FermionicKernel, Kernel};
use crate::math::Real;
use crate::poly::PiecewisePolynomial;

pub mod matsubara;
pub mod sve;

pub use matsubara::matsubara_index;
pub use sve::{SveOutput, SveSettings, compute_sve};

#[derive(Debug, Clone)]
pub struct IrBasis {
    statistics: Statistics,
    lambda: f64,
    precision_bits: u32,
    singular_values: Vec<f64>,
    u: Vec<PiecewisePolynomial>,
    v: Vec<PiecewisePolynomial>,
}

impl IrBasis {
    /// Assemble a basis from already computed parts (used when loading files).
    pub fn from_parts(
        statistics: Statistics,
        lambda: f64,
        precision_bits: u32,
        singular_values: Vec<f64>,
        u: Vec<PiecewisePolynomial>,
        v: Vec<PiecewisePolynomial>,
    ) -> Result<Self, AppError> {
        if u.len() != singular_values.len() || v.len() != singular_values.len() {
            return Err(AppError::input(format!(
                "Basis has {} singular values but {} u and {} v functions.",
                singular_values.len(),
                u.len(),
                v.len()
            )));
        }
        if !(lambda.is_finite() && lambda > 0.0) {
            return Err(AppError::input(format!("Invalid Lambda: {lambda}.")));
        }
        if singular_values.windows(2).any(|w| w[0] < w[1]) {
            return Err(AppError::input("Singular values must be in descending order."));
        }
        for (name, functions) in [("u", &u), ("v", &v)] {
            if let Some(l) = functions.iter().position(|f| f.domain() != (-1.0, 1.0)) {
                return Err(AppError::input(format!(
                    "{name}_{l} is not defined on [-1, 1]."
                )));
            }
        }
        Ok(Self {
            statistics,
            lambda,
            precision_bits,
            singular_values,
            u,
            v,
        })
    }

    /// Fermionic basis in double precision with the default discretization.
    pub fn fermionic(lambda: f64, max_dim: usize, cutoff: f64) -> Result<Self, AppError> {
        compute_basis(&Self::quick_config(Statistics::Fermionic, lambda, max_dim, cutoff))
    }

    /// Bosonic basis in double precision with the default discretization.
    pub fn bosonic(lambda: f64, max_dim: usize, cutoff: f64) -> Result<Self, AppError> {
        compute_basis(&Self::quick_config(Statistics::Bosonic, lambda, max_dim, cutoff))
    }

    fn quick_config(statistics: Statistics, lambda: f64, max_dim: usize, cutoff: f64) -> BasisConfig {
        BasisConfig {
            max_dim,
            cutoff,
            precision: PrecisionMode::Double,
            a_tol: 1e-10,
            n_local_poly: 12,
            n_gl_node: 16,
            verbose: false,
            ..BasisConfig::new(statistics, lambda)
        }
    }

    pub fn dim(&self) -> usize {
        self.singular_values.len()
    }

    pub fn statistics(&self) -> Statistics {
        self.statistics
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Mantissa bits of the precision the expansion was computed in.
    pub fn precision_bits(&self) -> u32 {
        self.precision_bits
    }

    pub fn singular_values(&self) -> &[f64] {
        &self.singular_values
    }

    /// # Panics
    /// Panics if `l >= dim()`.
    pub fn sl(&self, l: usize) -> f64 {
        self.singular_values[l]
    }

    /// # Panics
    /// Panics if `l >= dim()`.
    pub fn ul(&self, l: usize) -> &PiecewisePolynomial {
        &self.u[l]
    }

    /// # Panics
    /// Panics if `l >= dim()`.
    pub fn vl(&self, l: usize) -> &PiecewisePolynomial {
        &self.v[l]
    }

    /// `u_l(x)`.
    pub fn value(&self, x: f64, l: usize) -> Result<f64, AppError> {
        if l >= self.dim() {
            return Err(AppError::input(format!(
                "Invalid index of basis function: l={l} (dim={}).",
                self.dim()
            )));
        }
        check_x(x)?;
        self.u[l].value(x)
    }

    /// `[u_0(x), ..., u_{dim-1}(x)]`.
    pub fn values(&self, x: f64) -> Result<Vec<f64>, AppError> {
        check_x(x)?;
        self.u.iter().map(|f| f.value(x)).collect()
    }

    /// Transformation matrix to Matsubara frequencies, rows following `n_vec`.
    pub fn compute_tnl(&self, n_vec: &[i64]) -> Result<DMatrix<Complex<f64>>, AppError> {
        matsubara::transform(self.statistics, &self.u, n_vec)
    }

    /// `compute_tnl` for `n_min..=n_max`.
    pub fn compute_tnl_range(
        &self,
        n_min: i64,
        n_max: i64,
    ) -> Result<DMatrix<Complex<f64>>, AppError> {
        if n_min > n_max {
            return Err(AppError::input(format!(
                "Invalid Matsubara range: n_min={n_min} > n_max={n_max}."
            )));
        }
        if n_min < -matsubara::MAX_MATSUBARA_INDEX || n_max > matsubara::MAX_MATSUBARA_INDEX {
            return Err(AppError::input(format!(
                "Matsubara range {n_min}..={n_max} exceeds |n| <= {}.",
                matsubara::MAX_MATSUBARA_INDEX
            )));
        }
        let n_vec: Vec<i64> = (n_min..=n_max).collect();
        self.compute_tnl(&n_vec)
    }

    pub fn summary(&self) -> BasisSummary {
        BasisSummary {
            tool: "irb".to_string(),
            generated: chrono::Utc::now(),
            statistics: self.statistics,
            lambda: self.lambda,
            precision_bits: self.precision_bits,
            dim: self.dim(),
            singular_values: self.singular_values.clone(),
            sections_x: self.u.first().map(|f| f.num_sections()).unwrap_or(0),
            sections_y: self.v.first().map(|f| f.num_sections()).unwrap_or(0),
            order: self.u.first().map(|f| f.order()).unwrap_or(0),
            u_at_one: self
                .u
                .iter()
                .map(|f| f.value(1.0).unwrap_or(f64::NAN))
                .collect(),
        }
    }
}

fn check_x(x: f64) -> Result<(), AppError> {
    if !(-1.0..=1.0).contains(&x) {
        return Err(AppError::input(format!(
            "Invalid value of x: {x} (must be in [-1, 1])."
        )));
    }
    Ok(())
}

/// Compute the IR basis described by `config`.
pub fn compute_basis(config: &BasisConfig) -> Result<IrBasis, AppError> {
    config.validate()?;
    let settings = SveSettings {
        cutoff: config.cutoff,
        max_dim: config.max_dim,
        a_tol: config.a_tol,
        n_local_poly: config.n_local_poly,
        n_gl_node: config.n_gl_node,
        verbose: config.verbose,
    };

    let output = match (config.statistics, config.precision) {
        (Statistics::Fermionic, PrecisionMode::Double) => {
            run::<f64, _>(&FermionicKernel::new(config.lambda), &settings)?
        }
        (Statistics::Fermionic, PrecisionMode::Mp) => {
            run::<twofloat::TwoFloat, _>(&FermionicKernel::new(config.lambda), &settings)?
        }
        (Statistics::Bosonic, PrecisionMode::Double) => {
            run::<f64, _>(&BosonicKernel::new(config.lambda), &settings)?
        }
        (Statistics::Bosonic, PrecisionMode::Mp) => {
            run::<twofloat::TwoFloat, _>(&BosonicKernel::new(config.lambda), &settings)?
        }
    };

    IrBasis::from_parts(
        config.statistics,
        config.lambda,
        config.working_bits(),
        output.singular_values,
        output.u,
        output.v,
    )
}

fn run<T: Real, K: Kernel>(kernel: &K, settings: &SveSettings) -> Result<SveOutput, AppError> {
    let output = compute_sve::<T, K>(kernel, settings)?;
    let message = if output.converged {
        "SVE converged"
    } else {
        "SVE stopped before convergence"
    };
    if settings.verbose {
        info!(
            statistics = kernel.statistics().tag(),
            lambda = kernel.lambda(),
            bits = T::MANTISSA_BITS,
            dim = output.singular_values.len(),
            rounds = output.rounds,
            "{message}"
        );
    }
    Ok(output)
}
