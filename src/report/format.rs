//! Formatted terminal output for bases, values and Matsubara transforms.
//!
//! We keep formatting code in one place so:
//! - the numerical code stays clean and testable
//! - output changes are localized

use nalgebra::{Complex, DMatrix};

use crate::basis::IrBasis;

/// Singular values listed in the summary before eliding the rest.
const SUMMARY_SINGULAR_VALUES: usize = 10;

/// Format the basis summary (settings, discretization, leading singular values).
pub fn format_basis_summary(basis: &IrBasis) -> String {
    let mut out = String::new();

    out.push_str("=== irb - IR basis ===\n");
    out.push_str(&format!("Statistics: {}\n", basis.statistics().tag()));
    out.push_str(&format!("Lambda: {}\n", basis.lambda()));
    out.push_str(&format!("Precision: {} bits\n", basis.precision_bits()));
    out.push_str(&format!("Dimension: {}\n", basis.dim()));

    if basis.dim() == 0 {
        return out;
    }

    let u0 = basis.ul(0);
    let v0 = basis.vl(0);
    out.push_str(&format!(
        "Sections: x={} | y={} | order={}\n",
        u0.num_sections(),
        v0.num_sections(),
        u0.order()
    ));

    let s0 = basis.sl(0);
    out.push_str("\nSingular values:\n");
    out.push_str(&format!("{:>5} {:>24} {:>12}\n", "l", "s_l", "s_l/s_0"));
    out.push_str(&format!("{:-<5} {:-<24} {:-<12}\n", "", "", ""));
    for (l, &s) in basis
        .singular_values()
        .iter()
        .enumerate()
        .take(SUMMARY_SINGULAR_VALUES)
    {
        out.push_str(&format!("{l:>5} {s:>24.16e} {:>12.3e}\n", s / s0));
    }
    if basis.dim() > SUMMARY_SINGULAR_VALUES {
        let l = basis.dim() - 1;
        let s = basis.sl(l);
        out.push_str(&format!("{:>5}\n", "..."));
        out.push_str(&format!("{l:>5} {s:>24.16e} {:>12.3e}\n", s / s0));
    }

    out
}

/// Format `u_l(x)` for the given `(l, value)` pairs.
pub fn format_values_table(x: f64, rows: &[(usize, f64)]) -> String {
    let mut out = String::new();
    out.push_str(&format!("x = {x}\n"));
    out.push_str(&format!("{:>5} {:>24}\n", "l", "u_l(x)"));
    out.push_str(&format!("{:-<5} {:-<24}\n", "", ""));
    for &(l, v) in rows {
        out.push_str(&format!("{l:>5} {v:>24.16e}\n"));
    }
    out
}

/// Format `T_nl`, one line per `(n, l)` pair.
pub fn format_tnl_table(n_vec: &[i64], tnl: &DMatrix<Complex<f64>>) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:>8} {:>5} {:>24} {:>24}\n",
        "n", "l", "Re T_nl", "Im T_nl"
    ));
    out.push_str(&format!("{:-<8} {:-<5} {:-<24} {:-<24}\n", "", "", "", ""));
    for (i, &n) in n_vec.iter().enumerate() {
        for l in 0..tnl.ncols() {
            let t = tnl[(i, l)];
            out.push_str(&format!("{n:>8} {l:>5} {:>24.16e} {:>24.16e}\n", t.re, t.im));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Statistics;
    use crate::poly::PiecewisePolynomial;

    fn constant_basis(dim: usize) -> IrBasis {
        let f = PiecewisePolynomial::from_coefficients(
            vec![-1.0, 1.0],
            DMatrix::from_element(1, 1, 0.5f64.sqrt()),
        )
        .unwrap();
        let sv: Vec<f64> = (0..dim).map(|l| 0.5f64.powi(l as i32)).collect();
        IrBasis::from_parts(
            Statistics::Bosonic,
            100.0,
            106,
            sv,
            vec![f.clone(); dim],
            vec![f; dim],
        )
        .unwrap()
    }

    #[test]
    fn summary_lists_settings_and_elides_long_tails() {
        let txt = format_basis_summary(&constant_basis(12));
        assert!(txt.contains("Statistics: bosonic"));
        assert!(txt.contains("Lambda: 100"));
        assert!(txt.contains("Precision: 106 bits"));
        assert!(txt.contains("Dimension: 12"));
        assert!(txt.contains("Sections: x=1 | y=1 | order=0"));
        assert!(txt.contains("  ...\n"));
        assert!(txt.trim_end().ends_with("4.883e-4"));
    }

    #[test]
    fn summary_of_short_basis_has_no_ellipsis() {
        let txt = format_basis_summary(&constant_basis(3));
        assert!(!txt.contains("..."));
    }

    #[test]
    fn values_table_has_one_row_per_function() {
        let txt = format_values_table(0.5, &[(0, 0.25), (3, -1.0)]);
        let lines: Vec<&str> = txt.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "x = 0.5");
        assert!(lines[3].trim_start().starts_with("0 "));
        assert!(lines[4].trim_start().starts_with("3 "));
    }

    #[test]
    fn tnl_table_is_row_major_in_n() {
        let tnl = DMatrix::from_fn(2, 2, |i, l| Complex::new(i as f64, l as f64));
        let txt = format_tnl_table(&[-1, 4], &tnl);
        let lines: Vec<&str> = txt.lines().skip(2).collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].trim_start().starts_with("-1 "));
        assert!(lines[3].trim_start().starts_with("4 "));
        assert!(lines[3].ends_with("1.0000000000000000e0"));
    }
}
