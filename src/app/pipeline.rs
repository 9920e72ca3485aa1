//! Shared "compute and save" logic behind `irb compute`.
//!
//! Keeping this in one place keeps the workflow in one readable sequence:
//! config -> SVE -> text file -> optional JSON summary

use std::path::{Path, PathBuf};

use tracing::info;

use crate::basis::{IrBasis, compute_basis};
use crate::cli::ComputeArgs;
use crate::domain::BasisConfig;
use crate::error::AppError;

/// All outputs of computing one basis.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub basis: IrBasis,
    pub output: PathBuf,
    pub summary: Option<PathBuf>,
}

/// Compute the basis for `config` and write the files requested by `args`.
pub fn run_compute(config: &BasisConfig, args: &ComputeArgs) -> Result<RunOutput, AppError> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.output_dir.join(config.default_output_name()));
    let summary = args
        .summary_json
        .then(|| output.with_extension("json"));
    let basis = compute_and_save(config, &output, summary.as_deref())?;
    Ok(RunOutput {
        basis,
        output,
        summary,
    })
}

/// Compute, then write the text file and (optionally) the JSON summary.
pub fn compute_and_save(
    config: &BasisConfig,
    output: &Path,
    summary: Option<&Path>,
) -> Result<IrBasis, AppError> {
    let basis = compute_basis(config)?;
    crate::io::savetxt(output, &basis)?;
    info!(path = %output.display(), dim = basis.dim(), "basis written");

    if let Some(path) = summary {
        crate::io::write_summary_json(path, &basis.summary())?;
    }
    Ok(basis)
}

/// Load a basis text file.
pub fn load_basis(path: &Path) -> Result<IrBasis, AppError> {
    crate::io::loadtxt(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PrecisionMode, Statistics};

    fn quick_config() -> BasisConfig {
        BasisConfig {
            precision: PrecisionMode::Double,
            cutoff: 1e-6,
            a_tol: 1e-8,
            n_local_poly: 10,
            n_gl_node: 14,
            verbose: false,
            ..BasisConfig::new(Statistics::Fermionic, 5.0)
        }
    }

    #[test]
    fn compute_and_save_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = quick_config();
        let output = dir.path().join(config.default_output_name());
        let summary = dir.path().join("summary.json");

        let basis = compute_and_save(&config, &output, Some(&summary)).unwrap();
        let loaded = load_basis(&output).unwrap();
        assert_eq!(loaded.dim(), basis.dim());
        assert_eq!(loaded.singular_values(), basis.singular_values());
        assert_eq!(loaded.value(0.3, 1).unwrap(), basis.value(0.3, 1).unwrap());

        let json = crate::io::read_summary_json(&summary).unwrap();
        assert_eq!(json.dim, basis.dim());
        assert_eq!(json.lambda, 5.0);
    }
}
