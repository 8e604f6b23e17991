//! Command-line front end for the geofem solver.
//!
//! Usage:
//!   geofem run <case_dir> [--solver NAME] [--backend cholesky|lu] [--out DIR]
//!   geofem capabilities [--solver NAME]
//!   geofem solvers

use clap::{Parser, Subcommand, ValueEnum};
use geofem_io::{read_case_folder, write_result_folder};
use geofem_solver::{
    BackendKind, RunCallbacks, RunOptions, RunStatus, SolveRequest, Solver, available_solvers,
    solver_with_options,
};
use log::{info, warn};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "geofem")]
#[command(about = "Staged 2D finite-element solver (plane elasticity, steady seepage)")]
struct Args {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Solve a case folder (request.json + mesh.json)
    Run {
        case_dir: PathBuf,

        /// Solver variant; inferred from the material models when omitted
        #[arg(short, long)]
        solver: Option<String>,

        /// Linear solver backend
        #[arg(short, long, default_value = "cholesky")]
        backend: CliBackend,

        /// Result folder (defaults to <case_dir>/out)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Print solver capabilities as JSON
    Capabilities {
        #[arg(short, long)]
        solver: Option<String>,
    },
    /// List solver variants
    Solvers,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliBackend {
    Cholesky,
    Lu,
}

impl From<CliBackend> for BackendKind {
    fn from(value: CliBackend) -> Self {
        match value {
            CliBackend::Cholesky => BackendKind::SparseCholesky,
            CliBackend::Lu => BackendKind::DenseLu,
        }
    }
}

/// Logs progress lines at info level.
struct LogProgress;

impl RunCallbacks for LogProgress {
    fn on_progress(&mut self, fraction: f64, message: &str, stage_id: &str, step: usize) {
        info!(
            "[{:5.1}%] {message} stage '{stage_id}' step {}",
            fraction * 100.0,
            step + 1
        );
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match args.command {
        Command::Run {
            case_dir,
            solver,
            backend,
            out,
        } => run(case_dir, solver, backend.into(), out),
        Command::Capabilities { solver } => capabilities(solver),
        Command::Solvers => {
            for solver in available_solvers() {
                println!("{}", solver.name());
            }
            ExitCode::SUCCESS
        }
    }
}

fn run(
    case_dir: PathBuf,
    solver: Option<String>,
    backend: BackendKind,
    out: Option<PathBuf>,
) -> ExitCode {
    let case = match read_case_folder(&case_dir) {
        Ok(case) => case,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(1);
        }
    };

    let name = solver.unwrap_or_else(|| infer_solver(&case.request));
    let Some(solver) = solver_with_options(&name, RunOptions { backend }) else {
        eprintln!("error: unknown solver '{name}'");
        return ExitCode::from(2);
    };

    let output = solver.solve(&case.request, &case.mesh, &mut LogProgress);
    for w in &output.meta.warnings {
        warn!("{w}");
    }
    for e in &output.meta.errors {
        eprintln!("{}: {}", e.code, e.message);
    }

    let out_dir = out.unwrap_or_else(|| case_dir.join("out"));
    match write_result_folder(&out_dir, &output) {
        Ok(files) => println!(
            "{}: {} step(s) -> {}",
            status_label(output.meta.status),
            output.meta.global_steps.len(),
            files.meta_path.display()
        ),
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(1);
        }
    }

    if output.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn capabilities(solver: Option<String>) -> ExitCode {
    let solvers: Vec<Box<dyn Solver>> = match solver {
        Some(name) => match solver_with_options(&name, RunOptions::default()) {
            Some(s) => vec![s],
            None => {
                eprintln!("error: unknown solver '{name}'");
                return ExitCode::from(2);
            }
        },
        None => available_solvers(),
    };
    let caps: Vec<_> = solvers.iter().map(|s| s.capabilities()).collect();
    match serde_json::to_string_pretty(&caps) {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

/// First solver whose materials cover every material model of the request.
fn infer_solver(request: &SolveRequest) -> String {
    available_solvers()
        .into_iter()
        .find(|s| {
            let caps = s.capabilities();
            request
                .materials
                .values()
                .all(|m| caps.materials.contains(&m.model_name))
        })
        .map(|s| s.name().to_string())
        .unwrap_or_else(|| "reference_elastic".to_string())
}

fn status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Success => "success",
        RunStatus::Failed => "failed",
        RunStatus::Canceled => "canceled",
    }
}
