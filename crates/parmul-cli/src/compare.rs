use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use matio::{compare_files, Comparison, DEFAULT_TOLERANCE};

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// First result file
    pub left: PathBuf,

    /// Second result file
    pub right: PathBuf,

    /// Matrix dimension
    pub size: usize,

    /// Largest absolute difference treated as equal
    #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
    pub tolerance: f64,
}

pub fn run(args: CompareArgs) -> Result<ExitCode> {
    match compare_files(&args.left, &args.right, args.size, args.tolerance)? {
        Comparison::Identical => {
            println!("Matrices are identical.");
            Ok(ExitCode::SUCCESS)
        }
        Comparison::Differs(m) => {
            println!(
                "Difference found at ({}, {}): {:?} != {:?}",
                m.row, m.col, m.left, m.right
            );
            Ok(ExitCode::FAILURE)
        }
    }
}
