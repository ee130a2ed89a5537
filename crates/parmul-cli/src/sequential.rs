use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use matio::{FileSink, RandomPopulator};

use crate::output::{self, OutputArgs};

#[derive(Args, Debug)]
pub struct SequentialArgs {
    /// Matrix dimension
    pub size: usize,

    #[command(flatten)]
    pub output: OutputArgs,
}

pub fn run(args: SequentialArgs) -> Result<ExitCode> {
    let path = args.output.path("sequential_output.txt");
    if !args.output.json {
        println!("Number of CPU cores available: {}", engine::available_cores());
    }

    let mut populate = RandomPopulator::new(args.output.seed);
    let mut sink = FileSink::new(path);
    let report = engine::sequential::run(args.size, &mut populate, &mut sink)
        .context("sequential multiplication failed")?;

    output::emit(&report, sink.path(), args.output.json)?;
    Ok(ExitCode::SUCCESS)
}
