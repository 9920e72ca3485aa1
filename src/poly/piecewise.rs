//! Piecewise polynomials.
//!
//! A function on `[x_0, x_N]` is stored per section `[x_s, x_{s+1})` as
//!
//! ```text
//! f(x) = sum_{p=0}^{k} a_{s,p} (x - x_s)^p
//! ```
//!
//! where `x_s` is the left edge of the section. Every basis function of an
//! `IrBasis` is one of these.

use std::io::{BufRead, Write};

use nalgebra::DMatrix;

use crate::error::AppError;
use crate::io::text::TextReader;
use crate::math::Rule;

#[derive(Debug, Clone, PartialEq)]
pub struct PiecewisePolynomial {
    order: usize,
    edges: Vec<f64>,
    /// `[section, power]`
    coeff: DMatrix<f64>,
}

impl PiecewisePolynomial {
    /// The zero function of the given order on `edges`.
    pub fn zeros(order: usize, edges: Vec<f64>) -> Result<Self, AppError> {
        let n_sections = edges.len().saturating_sub(1);
        Self::from_coefficients(edges, DMatrix::zeros(n_sections, order + 1))
    }

    pub fn from_coefficients(edges: Vec<f64>, coeff: DMatrix<f64>) -> Result<Self, AppError> {
        validate(&edges, &coeff)?;
        Ok(Self {
            order: coeff.ncols() - 1,
            edges,
            coeff,
        })
    }

    /// Highest power `k`.
    pub fn order(&self) -> usize {
        self.order
    }

    pub fn num_sections(&self) -> usize {
        self.edges.len() - 1
    }

    /// Edge `i` in `0..=num_sections()`.
    ///
    /// # Panics
    /// Panics if `i > num_sections()`.
    pub fn section_edge(&self, i: usize) -> f64 {
        self.edges[i]
    }

    pub fn section_edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.edges[0], self.edges[self.edges.len() - 1])
    }

    /// Coefficient of `(x - x_s)^p` in section `s`.
    pub fn coefficient(&self, s: usize, p: usize) -> f64 {
        self.coeff[(s, p)]
    }

    pub fn coefficient_mut(&mut self, s: usize, p: usize) -> &mut f64 {
        &mut self.coeff[(s, p)]
    }

    pub fn coefficients(&self) -> &DMatrix<f64> {
        &self.coeff
    }

    pub fn set_zero(&mut self) {
        self.coeff.fill(0.0);
    }

    /// Index of the section containing `x` (edges clamp to the end sections).
    pub fn find_section(&self, x: f64) -> usize {
        let last = self.num_sections() - 1;
        if x <= self.edges[0] {
            return 0;
        }
        if x >= self.edges[self.edges.len() - 1] {
            return last;
        }
        let idx = self.edges.partition_point(|&e| e <= x);
        (idx - 1).min(last)
    }

    pub fn value(&self, x: f64) -> Result<f64, AppError> {
        self.check_range(x)?;
        Ok(self.value_in_section(x, self.find_section(x)))
    }

    /// Value at `x`, which the caller guarantees lies in section `s`.
    pub fn value_in_section(&self, x: f64, s: usize) -> f64 {
        let dx = x - self.edges[s];
        (0..=self.order)
            .rev()
            .fold(0.0, |acc, p| acc * dx + self.coeff[(s, p)])
    }

    /// `d^m f / dx^m` at `x`.
    pub fn derivative(&self, x: f64, m: usize) -> Result<f64, AppError> {
        self.check_range(x)?;
        if m > self.order {
            return Ok(0.0);
        }
        let s = self.find_section(x);
        let dx = x - self.edges[s];
        let mut r = 0.0;
        for p in (0..=(self.order - m)).rev() {
            let falling: f64 = ((p + 1)..=(p + m)).map(|v| v as f64).product();
            r = r * dx + self.coeff[(s, p + m)] * falling;
        }
        Ok(r)
    }

    /// `int f(x) g(x) dx`. Both functions must share the same edges.
    pub fn overlap(&self, other: &PiecewisePolynomial) -> Result<f64, AppError> {
        self.check_same_edges(other, "overlap")?;
        self.overlap_unchecked(other)
    }

    pub fn squared_norm(&self) -> Result<f64, AppError> {
        self.overlap_unchecked(self)
    }

    pub fn add(&self, other: &PiecewisePolynomial) -> Result<PiecewisePolynomial, AppError> {
        self.combine(other, 1.0, "add")
    }

    pub fn sub(&self, other: &PiecewisePolynomial) -> Result<PiecewisePolynomial, AppError> {
        self.combine(other, -1.0, "subtract")
    }

    pub fn scale(&self, factor: f64) -> PiecewisePolynomial {
        Self {
            order: self.order,
            edges: self.edges.clone(),
            coeff: &self.coeff * factor,
        }
    }

    /// Write in the line-oriented stream format:
    /// precision bits, order, sections, edges, then coefficients section-major.
    pub fn write_text<W: Write>(&self, out: &mut W, precision_bits: u32) -> std::io::Result<()> {
        writeln!(out, "{precision_bits}")?;
        writeln!(out, "{}", self.order)?;
        writeln!(out, "{}", self.num_sections())?;
        for e in &self.edges {
            writeln!(out, "{e:e}")?;
        }
        for s in 0..self.num_sections() {
            for p in 0..=self.order {
                writeln!(out, "{:e}", self.coeff[(s, p)])?;
            }
        }
        Ok(())
    }

    /// Read one function written by `write_text`. Returns it with its precision bits.
    pub fn read_text<R: BufRead>(reader: &mut TextReader<R>) -> Result<(Self, u32), AppError> {
        let bits: u32 = reader.next_value("precision bits")?;
        let order: usize = reader.next_value("polynomial order")?;
        let n_sections: usize = reader.next_value("number of sections")?;
        if n_sections == 0 {
            return Err(reader.error("piecewise polynomial must have at least one section"));
        }

        let n_coeff = order
            .checked_add(1)
            .ok_or_else(|| reader.error(&format!("polynomial order {order} is too large")))?;

        // Counts come from the file, so nothing is preallocated from them.
        let mut edges = Vec::new();
        for _ in 0..=n_sections {
            edges.push(reader.next_value::<f64>("section edge")?);
        }
        let mut values = Vec::new();
        for _ in 0..n_sections {
            for _ in 0..n_coeff {
                values.push(reader.next_value::<f64>("coefficient")?);
            }
        }
        let coeff = DMatrix::from_row_slice(n_sections, n_coeff, &values);

        let pp = Self::from_coefficients(edges, coeff)
            .map_err(|e| reader.error(&format!("invalid piecewise polynomial: {e}")))?;
        Ok((pp, bits))
    }

    /// Gauss-Legendre per section with `ceil((k1 + k2 + 1) / 2)` nodes, which
    /// is exact for the product.
    fn overlap_unchecked(&self, other: &PiecewisePolynomial) -> Result<f64, AppError> {
        let rule = Rule::<f64>::legendre((self.order + other.order + 2) / 2)?;
        let mut r = 0.0;
        for s in 0..self.num_sections() {
            let scaled = rule.scaled(self.edges[s], self.edges[s + 1]);
            for (&x, &w) in scaled.nodes.iter().zip(scaled.weights.iter()) {
                r += w * self.value_in_section(x, s) * other.value_in_section(x, s);
            }
        }
        Ok(r)
    }

    fn combine(
        &self,
        other: &PiecewisePolynomial,
        sign: f64,
        what: &str,
    ) -> Result<PiecewisePolynomial, AppError> {
        self.check_same_edges(other, what)?;
        let order = self.order.max(other.order);
        let coeff = DMatrix::from_fn(self.num_sections(), order + 1, |s, p| {
            let a = if p <= self.order { self.coeff[(s, p)] } else { 0.0 };
            let b = if p <= other.order { other.coeff[(s, p)] } else { 0.0 };
            a + sign * b
        });
        Ok(Self {
            order,
            edges: self.edges.clone(),
            coeff,
        })
    }

    fn check_range(&self, x: f64) -> Result<(), AppError> {
        let (lo, hi) = self.domain();
        if x < lo || x > hi || x.is_nan() {
            return Err(AppError::input(format!(
                "x={x} is out of the range [{lo}, {hi}]."
            )));
        }
        Ok(())
    }

    fn check_same_edges(&self, other: &PiecewisePolynomial, what: &str) -> Result<(), AppError> {
        if self.edges != other.edges {
            return Err(AppError::input(format!(
                "Cannot {what} piecewise polynomials with different sections."
            )));
        }
        Ok(())
    }
}

/// Product of two piecewise polynomials on the same sections (order `k1 + k2`).
pub fn multiply(
    f: &PiecewisePolynomial,
    g: &PiecewisePolynomial,
) -> Result<PiecewisePolynomial, AppError> {
    f.check_same_edges(g, "multiply")?;
    let (k1, k2) = (f.order, g.order);
    let mut coeff = DMatrix::zeros(f.num_sections(), k1 + k2 + 1);
    for s in 0..f.num_sections() {
        for p in 0..=k1 {
            for q in 0..=k2 {
                coeff[(s, p + q)] += f.coeff[(s, p)] * g.coeff[(s, q)];
            }
        }
    }
    PiecewisePolynomial::from_coefficients(f.edges.clone(), coeff)
}

/// `int f(x) dx` over the whole domain.
pub fn integrate(f: &PiecewisePolynomial) -> f64 {
    let mut r = 0.0;
    for s in 0..f.num_sections() {
        let dx = f.edges[s + 1] - f.edges[s];
        let mut dx_pow = dx;
        for p in 0..=f.order {
            r += f.coeff[(s, p)] * dx_pow / (p + 1) as f64;
            dx_pow *= dx;
        }
    }
    r
}

/// Residual norms below this many `eps` of the input norm count as zero.
const DEPENDENCE_FACTOR: f64 = 1e3;

/// Gram-Schmidt orthonormalization in place.
pub fn orthonormalize(functions: &mut [PiecewisePolynomial]) -> Result<(), AppError> {
    for l in 0..functions.len() {
        let mut f = functions[l].clone();
        for prev in &functions[..l] {
            let ov = prev.overlap(&f)?;
            f = f.sub(&prev.scale(ov))?;
        }
        let norm2 = f.squared_norm()?;
        // Residual at rounding level means f was in the span of the previous ones.
        let floor = DEPENDENCE_FACTOR * f64::EPSILON * functions[l].squared_norm()?;
        if !(norm2 > floor && norm2.is_finite()) {
            return Err(AppError::numeric(format!(
                "Cannot normalize function {l}: squared norm is {norm2}."
            )));
        }
        functions[l] = f.scale(1.0 / norm2.sqrt());
    }
    Ok(())
}

fn validate(edges: &[f64], coeff: &DMatrix<f64>) -> Result<(), AppError> {
    if edges.len() < 2 {
        return Err(AppError::input(
            "A piecewise polynomial needs at least one section (two edges).",
        ));
    }
    if edges.iter().any(|e| !e.is_finite()) {
        return Err(AppError::input("Section edges must be finite."));
    }
    if edges.windows(2).any(|w| w[0] >= w[1]) {
        return Err(AppError::input("Section edges must be strictly increasing."));
    }
    if coeff.nrows() != edges.len() - 1 {
        return Err(AppError::input(format!(
            "Coefficient rows ({}) do not match the number of sections ({}).",
            coeff.nrows(),
            edges.len() - 1
        )));
    }
    if coeff.ncols() == 0 {
        return Err(AppError::input("Coefficient matrix must have at least one column."));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// f(x) = 1 + 2x on [-1, 0), 1 + 2x on [0, 1] (written about each left edge).
    fn line() -> PiecewisePolynomial {
        let edges = vec![-1.0, 0.0, 1.0];
        let coeff = DMatrix::from_row_slice(2, 2, &[-1.0, 2.0, 1.0, 2.0]);
        PiecewisePolynomial::from_coefficients(edges, coeff).unwrap()
    }

    #[test]
    fn construction_validates_invariants() {
        assert!(PiecewisePolynomial::zeros(3, vec![0.0]).is_err());
        assert!(PiecewisePolynomial::zeros(3, vec![0.0, 0.0]).is_err());
        assert!(PiecewisePolynomial::zeros(3, vec![1.0, 0.0]).is_err());
        let wrong_rows = DMatrix::zeros(1, 2);
        assert!(PiecewisePolynomial::from_coefficients(vec![0.0, 0.5, 1.0], wrong_rows).is_err());

        let z = PiecewisePolynomial::zeros(3, vec![0.0, 0.5, 1.0]).unwrap();
        assert_eq!(z.order(), 3);
        assert_eq!(z.num_sections(), 2);
        assert_eq!(z.value(0.7).unwrap(), 0.0);
    }

    #[test]
    fn find_section_handles_edges() {
        let f = line();
        assert_eq!(f.find_section(-1.0), 0);
        assert_eq!(f.find_section(-0.5), 0);
        assert_eq!(f.find_section(0.0), 1);
        assert_eq!(f.find_section(1.0), 1);
    }

    #[test]
    fn value_and_derivative() {
        let f = line();
        for &x in &[-1.0, -0.25, 0.0, 0.5, 1.0] {
            assert!((f.value(x).unwrap() - (1.0 + 2.0 * x)).abs() < 1e-15);
            assert!((f.derivative(x, 1).unwrap() - 2.0).abs() < 1e-15);
            assert_eq!(f.derivative(x, 2).unwrap(), 0.0);
        }
        assert!(f.value(1.5).is_err());
        assert!(f.value(f64::NAN).is_err());
    }

    #[test]
    fn higher_derivatives_use_falling_factorials() {
        // x^3 on [0, 2]
        let coeff = DMatrix::from_row_slice(1, 4, &[0.0, 0.0, 0.0, 1.0]);
        let f = PiecewisePolynomial::from_coefficients(vec![0.0, 2.0], coeff).unwrap();
        assert!((f.derivative(1.5, 1).unwrap() - 3.0 * 1.5 * 1.5).abs() < 1e-14);
        assert!((f.derivative(1.5, 2).unwrap() - 6.0 * 1.5).abs() < 1e-14);
        assert!((f.derivative(1.5, 3).unwrap() - 6.0).abs() < 1e-14);
    }

    #[test]
    fn overlap_and_integrate() {
        let f = line();
        // int_{-1}^{1} (1 + 2x)^2 dx = 2 + 8/3
        assert!((f.squared_norm().unwrap() - (2.0 + 8.0 / 3.0)).abs() < 1e-14);
        assert!((integrate(&f) - 2.0).abs() < 1e-15);

        let sq = multiply(&f, &f).unwrap();
        assert_eq!(sq.order(), 2);
        assert!((integrate(&sq) - f.squared_norm().unwrap()).abs() < 1e-14);
    }

    #[test]
    fn arithmetic_requires_matching_sections() {
        let f = line();
        let g = PiecewisePolynomial::zeros(1, vec![-1.0, 1.0]).unwrap();
        assert!(f.add(&g).is_err());
        assert!(f.overlap(&g).is_err());
        assert!(multiply(&f, &g).is_err());

        let h = PiecewisePolynomial::zeros(3, vec![-1.0, 0.0, 1.0]).unwrap();
        let sum = f.add(&h).unwrap();
        assert_eq!(sum.order(), 3);
        assert!((sum.value(0.5).unwrap() - 2.0).abs() < 1e-15);

        let zero = f.sub(&f).unwrap();
        assert_eq!(zero.squared_norm().unwrap(), 0.0);
        assert!((f.scale(-2.0).value(0.5).unwrap() + 4.0).abs() < 1e-15);
    }

    #[test]
    fn orthonormalize_builds_legendre_like_set() {
        let edges = vec![-1.0, 1.0];
        let mono = |p: usize| {
            let mut c = DMatrix::zeros(1, 3);
            // x^p written about the left edge -1: expand (t - 1)^p, t = x + 1
            match p {
                0 => c[(0, 0)] = 1.0,
                1 => {
                    c[(0, 0)] = -1.0;
                    c[(0, 1)] = 1.0;
                }
                _ => {
                    c[(0, 0)] = 1.0;
                    c[(0, 1)] = -2.0;
                    c[(0, 2)] = 1.0;
                }
            }
            PiecewisePolynomial::from_coefficients(edges.clone(), c).unwrap()
        };
        let mut fs = vec![mono(0), mono(1), mono(2)];
        orthonormalize(&mut fs).unwrap();

        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((fs[i].overlap(&fs[j]).unwrap() - expected).abs() < 1e-13);
            }
        }
        // Third function is proportional to P_2(x) = (3x^2 - 1) / 2.
        let ratio = fs[2].value(0.0).unwrap() / fs[2].value(1.0).unwrap();
        assert!((ratio + 0.5).abs() < 1e-13);
    }

    #[test]
    fn orthonormalize_rejects_dependent_functions() {
        let f = line();
        let mut fs = vec![f.clone(), f.scale(3.0)];
        assert!(orthonormalize(&mut fs).is_err());
    }

    #[test]
    fn coefficient_accessors() {
        let mut f = line();
        *f.coefficient_mut(1, 0) = 5.0;
        assert_eq!(f.coefficient(1, 0), 5.0);
        assert_eq!(f.section_edge(2), 1.0);
        f.set_zero();
        assert_eq!(f.coefficients().amax(), 0.0);
    }
}
