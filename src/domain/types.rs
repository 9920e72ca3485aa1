//! Shared domain types.
//!
//! - computation settings (`Statistics`, `PrecisionMode`, `BasisConfig`)
//! - the serializable description of a computed basis (`BasisSummary`)

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Particle statistics of the analytic continuation kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Statistics {
    Fermionic,
    Bosonic,
}

impl Statistics {
    /// Long tag used in text files and JSON.
    pub fn tag(self) -> &'static str {
        match self {
            Statistics::Fermionic => "fermionic",
            Statistics::Bosonic => "bosonic",
        }
    }

    /// One-letter tag used in default file names.
    pub fn short_tag(self) -> &'static str {
        match self {
            Statistics::Fermionic => "f",
            Statistics::Bosonic => "b",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "fermionic" | "f" => Some(Statistics::Fermionic),
            "bosonic" | "b" => Some(Statistics::Bosonic),
            _ => None,
        }
    }
}

/// Working precision of the SVE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PrecisionMode {
    /// IEEE double (53-bit mantissa).
    Double,
    /// Double-double (106-bit mantissa).
    Mp,
}

impl PrecisionMode {
    pub fn tag(self) -> &'static str {
        match self {
            PrecisionMode::Double => "double",
            PrecisionMode::Mp => "mp",
        }
    }

    /// Mantissa bits actually used for the computation.
    pub fn working_bits(self) -> u32 {
        match self {
            PrecisionMode::Double => 53,
            PrecisionMode::Mp => 106,
        }
    }
}

/// Everything `compute_basis` needs.
#[derive(Debug, Clone, PartialEq)]
pub struct BasisConfig {
    pub statistics: Statistics,
    /// Dimensionless cutoff `beta * omega_max`.
    pub lambda: f64,
    /// Upper bound on the number of basis functions.
    pub max_dim: usize,
    /// Drop functions with `s_l / s_0 < cutoff`.
    pub cutoff: f64,
    pub precision: PrecisionMode,
    /// Absolute tolerance on the truncated Legendre tail in each section.
    pub a_tol: f64,
    /// Requested mantissa bits (only checked in `mp` mode).
    pub prec: u32,
    /// Legendre polynomials per section.
    pub n_local_poly: usize,
    /// Gauss-Legendre nodes per section.
    pub n_gl_node: usize,
    /// Log refinement progress at `info` instead of `debug`.
    pub verbose: bool,
}

impl BasisConfig {
    /// Settings used to publish high-accuracy basis data.
    pub fn new(statistics: Statistics, lambda: f64) -> Self {
        Self {
            statistics,
            lambda,
            max_dim: 1000,
            cutoff: 1e-10,
            precision: PrecisionMode::Mp,
            a_tol: 1e-12,
            prec: 64,
            n_local_poly: 20,
            n_gl_node: 24,
            verbose: true,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.lambda.is_finite() && self.lambda > 0.0) {
            return Err(AppError::input(format!(
                "Invalid Lambda: {} (must be finite and > 0).",
                self.lambda
            )));
        }
        if self.max_dim == 0 {
            return Err(AppError::input("max_dim must be >= 1."));
        }
        if !(self.cutoff > 0.0 && self.cutoff < 1.0) {
            return Err(AppError::input(format!(
                "Invalid cutoff: {} (must satisfy 0 < cutoff < 1).",
                self.cutoff
            )));
        }
        if !(self.a_tol.is_finite() && self.a_tol > 0.0) {
            return Err(AppError::input(format!(
                "Invalid a_tol: {} (must be finite and > 0).",
                self.a_tol
            )));
        }
        if self.n_local_poly < 2 {
            return Err(AppError::input("n_local_poly must be >= 2."));
        }
        if self.n_gl_node < self.n_local_poly {
            return Err(AppError::input(format!(
                "n_gl_node ({}) must be >= n_local_poly ({}).",
                self.n_gl_node, self.n_local_poly
            )));
        }
        if self.precision == PrecisionMode::Mp {
            let max_bits = PrecisionMode::Mp.working_bits();
            if self.prec == 0 || self.prec > max_bits {
                return Err(AppError::input(format!(
                    "Invalid prec: {} bits (mp mode supports 1..={max_bits}).",
                    self.prec
                )));
            }
        }
        Ok(())
    }

    pub fn working_bits(&self) -> u32 {
        self.precision.working_bits()
    }

    /// `basis_f-mp-Lambda10.0-atol1e-12.txt` for the default settings.
    pub fn default_output_name(&self) -> String {
        format!(
            "basis_{}-{}-Lambda{:?}-atol{:e}.txt",
            self.statistics.short_tag(),
            self.precision.tag(),
            self.lambda,
            self.a_tol
        )
    }
}

/// Portable description of a computed basis (written as JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasisSummary {
    pub tool: String,
    pub generated: DateTime<Utc>,
    pub statistics: Statistics,
    pub lambda: f64,
    pub precision_bits: u32,
    pub dim: usize,
    pub singular_values: Vec<f64>,
    /// Sections of the `u_l(x)` representation on `[-1, 1]`.
    pub sections_x: usize,
    /// Sections of the `v_l(y)` representation on `[-1, 1]`.
    pub sections_y: usize,
    pub order: usize,
    /// `u_l(1)` for each `l` (positive by convention).
    pub u_at_one: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_name_matches_published_files() {
        let config = BasisConfig::new(Statistics::Fermionic, 10.0);
        assert_eq!(
            config.default_output_name(),
            "basis_f-mp-Lambda10.0-atol1e-12.txt"
        );

        let mut bosonic = BasisConfig::new(Statistics::Bosonic, 1000.0);
        bosonic.precision = PrecisionMode::Double;
        bosonic.a_tol = 1e-8;
        assert_eq!(
            bosonic.default_output_name(),
            "basis_b-double-Lambda1000.0-atol1e-8.txt"
        );
    }

    #[test]
    fn defaults_validate() {
        assert!(BasisConfig::new(Statistics::Fermionic, 10.0).validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_settings() {
        let base = BasisConfig::new(Statistics::Fermionic, 10.0);

        let mut c = base.clone();
        c.lambda = -1.0;
        assert_eq!(c.validate().unwrap_err().exit_code(), 2);

        let mut c = base.clone();
        c.n_gl_node = c.n_local_poly - 1;
        assert!(c.validate().is_err());

        let mut c = base.clone();
        c.prec = 200;
        assert!(c.validate().is_err());

        // prec is irrelevant in double mode
        let mut c = base.clone();
        c.precision = PrecisionMode::Double;
        c.prec = 200;
        assert!(c.validate().is_ok());

        let mut c = base;
        c.cutoff = 1.0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn statistics_tags_round_trip() {
        for s in [Statistics::Fermionic, Statistics::Bosonic] {
            assert_eq!(Statistics::from_tag(s.tag()), Some(s));
            assert_eq!(Statistics::from_tag(s.short_tag()), Some(s));
        }
        assert_eq!(Statistics::from_tag("anyonic"), None);
    }
}
