//! Command-line entry point: load one or more textual IR modules and,
//! with `--race`, run the detector over them.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use mpi_race_detect::driver::{self, RaceDetectConfig};
use mpi_race_detect::{loader, source_line};

/// Static data-race detector for non-blocking message-passing programs.
#[derive(Debug, Parser)]
#[command(name = "mpi-race", version, about)]
struct Cli {
    /// Textual IR files to load.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Run the race detector over the loaded modules.
    #[arg(long)]
    race: bool,

    /// Diagnostic verbosity threshold (0 = warn, 1 = info, 2+ = debug).
    #[arg(long, default_value_t = 0)]
    verbose_level: u8,
}

fn init_tracing(verbose_level: u8) {
    use tracing_subscriber::EnvFilter;

    let default_level = match verbose_level {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose_level);

    let mut modules = Vec::with_capacity(cli.inputs.len());
    for path in &cli.inputs {
        match loader::load_module(path) {
            Ok(module) => modules.push(module),
            Err(e) => tracing::warn!(target: "mpi_race_detect", path = %path.display(), error = %e, "skipping unloadable module"),
        }
    }

    if cli.race {
        let config = RaceDetectConfig { verbose_level: cli.verbose_level };
        let report = driver::run(&modules, &config);
        print_report(&modules, &report);
    }

    ExitCode::SUCCESS
}

fn print_report(modules: &[mpi_race_detect::ir::Module], report: &driver::DriverReport) {
    for race in &report.races {
        let function = modules
            .iter()
            .find(|m| m.name == race.module)
            .and_then(|m| m.functions.iter().find(|f| f.name == race.function));

        eprintln!("== Found a data race:");
        eprintln!("   =={:?}", race.nonblocking_call);
        if let Some(line) = function.map(|f| source_line::format(f.loc(race.nonblocking_call))).filter(|l| !l.is_empty()) {
            eprintln!("       == {line}");
        }
        eprintln!("   =={:?}", race.offending_instruction);
        if let Some(line) = function.map(|f| source_line::format(f.loc(race.offending_instruction))).filter(|l| !l.is_empty()) {
            eprintln!("       == {line}");
        }
    }
}
