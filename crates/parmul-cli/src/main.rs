mod compare;
mod logging;
mod output;
mod parallel;
mod sequential;

use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};

/// parmul command-line interface
#[derive(Parser)]
#[command(
    name = "parmul",
    version,
    about = "Dense matrix multiplication: sequential baseline and shared-cursor parallel runs"
)]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Subcommand to run
    #[command(subcommand)]
    command: Command,
}

/// Supported subcommands
#[derive(Subcommand)]
enum Command {
    /// Multiply on a single thread, without cursor or semaphore
    Sequential(sequential::SequentialArgs),
    /// Multiply with a pool of workers pulling units from a shared cursor
    Parallel(parallel::ParallelArgs),
    /// Compare two result files cell by cell
    Compare(compare::CompareArgs),
}

fn main() -> ExitCode {
    // Usage errors exit with 1, not clap's default of 2.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    logging::init(cli.verbose);

    let result = match cli.command {
        Command::Sequential(args) => sequential::run(args),
        Command::Parallel(args) => parallel::run(args),
        Command::Compare(args) => compare::run(args),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            if e.downcast_ref::<engine::EngineError>()
                .is_some_and(engine::EngineError::is_usage)
            {
                eprintln!("\nFor more information, try '--help'.");
            }
            ExitCode::FAILURE
        }
    }
}
