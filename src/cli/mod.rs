//! Command-line parsing for the IR basis generator.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! numerical code. `app` turns these structs into a `BasisConfig`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{PrecisionMode, Statistics};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "irb", version, about = "Intermediate-representation basis generator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compute basis functions and save them as text files (the default).
    Compute(ComputeArgs),
    /// Evaluate u_l(x) from a saved basis.
    Eval(EvalArgs),
    /// Print the Matsubara transformation matrix T_nl of a saved basis.
    Matsubara(MatsubaraArgs),
    /// Plot u_l(x) of a saved basis in the terminal.
    Plot(PlotArgs),
    /// Summarize a saved basis.
    Info(InfoArgs),
}

/// Options for `irb compute`.
#[derive(Debug, Parser, Clone)]
pub struct ComputeArgs {
    /// Particle statistics of the kernel.
    #[arg(short = 's', long, value_enum, default_value_t = Statistics::Fermionic)]
    pub statistics: Statistics,

    /// Dimensionless cutoff Lambda = beta * omega_max (repeat for several bases).
    #[arg(short = 'l', long = "lambda", default_values_t = vec![10.0])]
    pub lambdas: Vec<f64>,

    /// Maximum number of basis functions.
    #[arg(long, default_value_t = 1000)]
    pub max_dim: usize,

    /// Drop singular values below cutoff * s_0.
    #[arg(long, default_value_t = 1e-10)]
    pub cutoff: f64,

    /// Working precision of the expansion.
    #[arg(long, value_enum, default_value_t = PrecisionMode::Mp)]
    pub precision: PrecisionMode,

    /// Absolute tolerance on the local Legendre tails.
    #[arg(long, default_value_t = 1e-12)]
    pub a_tol: f64,

    /// Requested mantissa bits in mp mode.
    #[arg(long, default_value_t = 64)]
    pub prec: u32,

    /// Legendre polynomials per section.
    #[arg(long, default_value_t = 20)]
    pub n_local_poly: usize,

    /// Gauss-Legendre nodes per section.
    #[arg(long, default_value_t = 24)]
    pub n_gl_node: usize,

    /// Log refinement progress (enabled by default).
    #[arg(long, default_value_t = true)]
    pub verbose: bool,

    /// Silence progress logging.
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Output text file (only with a single Lambda). Defaults to the published naming scheme.
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Directory for default-named outputs.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Also write a JSON summary next to each text file.
    #[arg(long)]
    pub summary_json: bool,
}

/// Options for `irb eval`.
#[derive(Debug, Parser)]
pub struct EvalArgs {
    /// Basis text file written by `irb compute`.
    #[arg(short = 'i', long, value_name = "FILE")]
    pub input: PathBuf,

    /// Point in [-1, 1].
    #[arg(long, allow_hyphen_values = true)]
    pub x: f64,

    /// Evaluate only this function (all functions otherwise).
    #[arg(long)]
    pub l: Option<usize>,
}

/// Options for `irb matsubara`.
#[derive(Debug, Parser)]
pub struct MatsubaraArgs {
    /// Basis text file written by `irb compute`.
    #[arg(short = 'i', long, value_name = "FILE")]
    pub input: PathBuf,

    /// First Matsubara index.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub n_min: i64,

    /// Last Matsubara index (inclusive).
    #[arg(long, default_value_t = 10, allow_hyphen_values = true)]
    pub n_max: i64,
}

/// Options for plotting a saved basis.
#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Basis text file written by `irb compute`.
    #[arg(short = 'i', long, value_name = "FILE")]
    pub input: PathBuf,

    /// Functions to draw.
    #[arg(long, num_args = 1.., default_values_t = vec![0usize, 1, 2])]
    pub functions: Vec<usize>,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

/// Options for `irb info`.
#[derive(Debug, Parser)]
pub struct InfoArgs {
    /// Basis text file written by `irb compute`.
    #[arg(short = 'i', long, value_name = "FILE")]
    pub input: PathBuf,
}
