//! Basis text files.
//!
//! Layout (one value per line, `#` lines ignored):
//!
//! ```text
//! # comment
//! <statistics tag>
//! <Lambda>
//! <working precision bits>
//! <dim>
//! s_0 ... s_{dim-1}
//! u_0 ... u_{dim-1}      (piecewise polynomial blocks)
//! v_0 ... v_{dim-1}
//! ```
//!
//! Floats are written with `{:e}`, which round-trips `f64` exactly.

use std::fmt::Display;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::Path;
use std::str::FromStr;

use crate::basis::IrBasis;
use crate::domain::Statistics;
use crate::error::AppError;
use crate::poly::PiecewisePolynomial;

/// Mantissa bits of the stored coefficients.
const STORED_BITS: u32 = f64::MANTISSA_DIGITS;

/// Line reader that skips blanks and comments and remembers where it is.
pub struct TextReader<R: BufRead> {
    lines: Lines<R>,
    line_no: usize,
    source: String,
}

impl<R: BufRead> TextReader<R> {
    pub fn new(reader: R, source: impl Into<String>) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            source: source.into(),
        }
    }

    /// 1-based number of the last line read.
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    /// Next line with content, trimmed.
    pub fn next_line(&mut self, what: &str) -> Result<String, AppError> {
        loop {
            let Some(line) = self.lines.next() else {
                return Err(AppError::input(format!(
                    "{}: unexpected end of file while reading {what}.",
                    self.source
                )));
            };
            self.line_no += 1;
            let line = line.map_err(|e| {
                AppError::io(format!(
                    "Failed to read '{}' at line {}: {e}",
                    self.source, self.line_no
                ))
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            return Ok(trimmed.to_string());
        }
    }

    pub fn next_value<F>(&mut self, what: &str) -> Result<F, AppError>
    where
        F: FromStr,
        F::Err: Display,
    {
        let line = self.next_line(what)?;
        line.parse::<F>()
            .map_err(|e| self.error(&format!("invalid {what} '{line}': {e}")))
    }

    /// Input error pointing at the current line.
    pub fn error(&self, message: &str) -> AppError {
        AppError::input(format!("{}:{}: {message}", self.source, self.line_no))
    }
}

/// Write `basis` to `path`.
pub fn savetxt(path: &Path, basis: &IrBasis) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::io(format!("Failed to create basis file '{}': {e}", path.display()))
    })?;
    let mut out = BufWriter::new(file);
    write_basis(&mut out, basis)
        .and_then(|()| out.flush())
        .map_err(|e| AppError::io(format!("Failed to write basis file '{}': {e}", path.display())))
}

/// Read a basis written by `savetxt`.
pub fn loadtxt(path: &Path) -> Result<IrBasis, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::io(format!("Failed to open basis file '{}': {e}", path.display()))
    })?;
    let mut reader = TextReader::new(BufReader::new(file), path.display().to_string());
    read_basis(&mut reader)
}

pub fn write_basis<W: Write>(out: &mut W, basis: &IrBasis) -> std::io::Result<()> {
    writeln!(
        out,
        "# IR basis: {} Lambda={} dim={}",
        basis.statistics().tag(),
        basis.lambda(),
        basis.dim()
    )?;
    writeln!(out, "{}", basis.statistics().tag())?;
    writeln!(out, "{:e}", basis.lambda())?;
    writeln!(out, "{}", basis.precision_bits())?;
    writeln!(out, "{}", basis.dim())?;
    for s in basis.singular_values() {
        writeln!(out, "{s:e}")?;
    }
    for l in 0..basis.dim() {
        basis.ul(l).write_text(out, STORED_BITS)?;
    }
    for l in 0..basis.dim() {
        basis.vl(l).write_text(out, STORED_BITS)?;
    }
    Ok(())
}

pub fn read_basis<R: BufRead>(reader: &mut TextReader<R>) -> Result<IrBasis, AppError> {
    let tag = reader.next_line("statistics")?;
    let statistics = Statistics::from_tag(&tag)
        .ok_or_else(|| reader.error(&format!("unknown statistics '{tag}'")))?;
    let lambda: f64 = reader.next_value("Lambda")?;
    let precision_bits: u32 = reader.next_value("precision bits")?;
    let dim: usize = reader.next_value("dimension")?;

    let sv = (0..dim)
        .map(|_| reader.next_value::<f64>("singular value"))
        .collect::<Result<Vec<_>, _>>()?;
    let u = (0..dim)
        .map(|_| PiecewisePolynomial::read_text(reader).map(|(f, _)| f))
        .collect::<Result<Vec<_>, _>>()?;
    let v = (0..dim)
        .map(|_| PiecewisePolynomial::read_text(reader).map(|(f, _)| f))
        .collect::<Result<Vec<_>, _>>()?;

    IrBasis::from_parts(statistics, lambda, precision_bits, sv, u, v)
        .map_err(|e| reader.error(&format!("inconsistent basis: {}", e.message())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    fn tiny_basis() -> IrBasis {
        let edges = vec![-1.0, 0.0, 1.0];
        let u0 = PiecewisePolynomial::from_coefficients(
            edges.clone(),
            DMatrix::from_row_slice(2, 2, &[0.5f64.sqrt(), 0.0, 0.5f64.sqrt(), 0.0]),
        )
        .unwrap();
        let u1 = PiecewisePolynomial::from_coefficients(
            edges.clone(),
            DMatrix::from_row_slice(2, 2, &[-1.5f64.sqrt(), 1.5f64.sqrt(), 0.0, 1.5f64.sqrt()]),
        )
        .unwrap();
        IrBasis::from_parts(
            Statistics::Fermionic,
            10.0,
            106,
            vec![0.9, 1.0 / 3.0],
            vec![u0.clone(), u1.clone()],
            vec![u0, u1],
        )
        .unwrap()
    }

    #[test]
    fn save_and_load_preserve_every_coefficient() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("basis.txt");
        let basis = tiny_basis();

        savetxt(&path, &basis).unwrap();
        let loaded = loadtxt(&path).unwrap();

        assert_eq!(loaded.statistics(), Statistics::Fermionic);
        assert_eq!(loaded.lambda(), 10.0);
        assert_eq!(loaded.precision_bits(), 106);
        assert_eq!(loaded.singular_values(), basis.singular_values());
        for l in 0..basis.dim() {
            assert_eq!(loaded.ul(l), basis.ul(l));
            assert_eq!(loaded.vl(l), basis.vl(l));
        }
    }

    #[test]
    fn file_starts_with_a_comment_and_header() {
        let mut buf = Vec::new();
        write_basis(&mut buf, &tiny_basis()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().take(5).collect();
        assert!(lines[0].starts_with('#'));
        assert_eq!(lines[1], "fermionic");
        assert_eq!(lines[2].parse::<f64>().unwrap(), 10.0);
        assert_eq!(lines[3], "106");
        assert_eq!(lines[4], "2");
    }

    #[test]
    fn malformed_content_reports_the_line() {
        let text = "# header\nfermionic\n10.0\n53\n1\nnot-a-number\n";
        let mut reader = TextReader::new(text.as_bytes(), "mem");
        let err = read_basis(&mut reader).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("mem:6"), "{}", err.message());
        assert!(err.message().contains("singular value"));
    }

    #[test]
    fn truncated_file_is_an_input_error() {
        let text = "fermionic\n10.0\n53\n2\n0.5\n";
        let mut reader = TextReader::new(text.as_bytes(), "mem");
        let err = read_basis(&mut reader).unwrap_err();
        assert!(err.message().contains("unexpected end of file"));
    }

    #[test]
    fn huge_counts_fail_cleanly() {
        let text = "fermionic\n10.0\n53\n18446744073709551615\n";
        let mut reader = TextReader::new(text.as_bytes(), "mem");
        let err = read_basis(&mut reader).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("unexpected end of file"));

        // one singular value, then a u block claiming usize::MAX order
        let text = "fermionic\n10.0\n53\n1\n1.0\n53\n18446744073709551615\n1\n";
        let mut reader = TextReader::new(text.as_bytes(), "mem");
        let err = read_basis(&mut reader).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("mem:8"), "{}", err.message());
        assert!(err.message().contains("too large"));

        let text = "fermionic\n10.0\n53\n1\n1.0\n53\n3\n18446744073709551615\n-1\n";
        let mut reader = TextReader::new(text.as_bytes(), "mem");
        let err = read_basis(&mut reader).unwrap_err();
        assert!(err.message().contains("unexpected end of file"));
    }

    #[test]
    fn unknown_statistics_is_rejected() {
        let mut reader = TextReader::new("anyonic\n".as_bytes(), "mem");
        assert!(read_basis(&mut reader).is_err());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = loadtxt(&dir.path().join("absent.txt")).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
