//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - computes bases and writes text/JSON files
//! - loads saved bases for evaluation, Matsubara transforms and plots

use clap::Parser;

use crate::cli::{Command, ComputeArgs, EvalArgs, InfoArgs, MatsubaraArgs, PlotArgs};
use crate::domain::BasisConfig;
use crate::error::AppError;

pub mod pipeline;

const SUBCOMMANDS: [&str; 5] = ["compute", "eval", "matsubara", "plot", "info"];

/// Entry point for the `irb` binary.
pub fn run() -> Result<(), AppError> {
    // `irb` and `irb --lambda 100` behave like `irb compute ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Compute(args) => handle_compute(args),
        Command::Eval(args) => handle_eval(args),
        Command::Matsubara(args) => handle_matsubara(args),
        Command::Plot(args) => handle_plot(args),
        Command::Info(args) => handle_info(args),
    }
}

fn handle_compute(args: ComputeArgs) -> Result<(), AppError> {
    let verbose = args.verbose && !args.quiet;
    crate::logging::init_cli_logger(verbose);

    for config in checked_configs(&args)? {
        println!("Computing basis functions... It may take some time");
        let run = pipeline::run_compute(&config, &args)?;
        println!("Done!");
        println!("Wrote {} (dim={})", run.output.display(), run.basis.dim());
        if let Some(path) = &run.summary {
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

fn handle_eval(args: EvalArgs) -> Result<(), AppError> {
    let basis = pipeline::load_basis(&args.input)?;
    let rows: Vec<(usize, f64)> = match args.l {
        Some(l) => vec![(l, basis.value(args.x, l)?)],
        None => basis.values(args.x)?.into_iter().enumerate().collect(),
    };
    print!("{}", crate::report::format_values_table(args.x, &rows));
    Ok(())
}

fn handle_matsubara(args: MatsubaraArgs) -> Result<(), AppError> {
    let basis = pipeline::load_basis(&args.input)?;
    let tnl = basis.compute_tnl_range(args.n_min, args.n_max)?;
    let n_vec: Vec<i64> = (args.n_min..=args.n_max).collect();
    print!("{}", crate::report::format_tnl_table(&n_vec, &tnl));
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let basis = pipeline::load_basis(&args.input)?;
    let functions: Vec<usize> = args
        .functions
        .iter()
        .copied()
        .filter(|&l| l < basis.dim())
        .collect();
    if functions.is_empty() {
        return Err(AppError::input(format!(
            "No functions to plot (basis dimension is {}).",
            basis.dim()
        )));
    }
    let plot = crate::plot::render_ascii_plot(&basis, &functions, args.width, args.height)?;
    print!("{plot}");
    Ok(())
}

fn handle_info(args: InfoArgs) -> Result<(), AppError> {
    let basis = pipeline::load_basis(&args.input)?;
    print!("{}", crate::report::format_basis_summary(&basis));
    Ok(())
}

/// Every config of the run, validated before the first one is computed.
fn checked_configs(args: &ComputeArgs) -> Result<Vec<BasisConfig>, AppError> {
    if args.output.is_some() && args.lambdas.len() > 1 {
        return Err(AppError::input("--output can only be used with a single --lambda."));
    }
    let configs = basis_configs_from_args(args);
    for config in &configs {
        config.validate()?;
    }
    Ok(configs)
}

/// One `BasisConfig` per requested Lambda.
pub fn basis_configs_from_args(args: &ComputeArgs) -> Vec<BasisConfig> {
    args.lambdas
        .iter()
        .map(|&lambda| BasisConfig {
            statistics: args.statistics,
            lambda,
            max_dim: args.max_dim,
            cutoff: args.cutoff,
            precision: args.precision,
            a_tol: args.a_tol,
            prec: args.prec,
            n_local_poly: args.n_local_poly,
            n_gl_node: args.n_gl_node,
            verbose: args.verbose && !args.quiet,
        })
        .collect()
}

/// Rewrite argv so `irb` defaults to `irb compute`.
///
/// Rules:
/// - `irb`                      -> `irb compute`
/// - `irb --lambda 100 ...`     -> `irb compute --lambda 100 ...`
/// - `irb --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("compute".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    if SUBCOMMANDS.contains(&arg1.as_str()) {
        return argv;
    }

    // If the first token is a flag, treat it as "compute flags".
    if arg1.starts_with('-') {
        argv.insert(1, "compute".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}
