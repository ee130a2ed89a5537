use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use engine::{Backend, ClampPolicy, Coordinator, Granularity, RunConfigBuilder};
use matio::{FileSink, RandomPopulator};

use crate::output::{self, OutputArgs};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GranularityArg {
    /// One output element per unit
    Element,
    /// One output row per unit
    Row,
    /// One block_size x block_size tile per unit
    Block,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum BackendArg {
    /// Forked worker processes
    Process,
    /// Scoped worker threads
    Thread,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Process => Backend::Process,
            BackendArg::Thread => Backend::Thread,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ClampArg {
    /// Cap row and block runs at the core count
    Auto,
    /// Always cap at the core count
    Always,
    /// Use the requested worker count as is
    Never,
}

impl From<ClampArg> for ClampPolicy {
    fn from(arg: ClampArg) -> Self {
        match arg {
            ClampArg::Auto => ClampPolicy::Auto,
            ClampArg::Always => ClampPolicy::Always,
            ClampArg::Never => ClampPolicy::Never,
        }
    }
}

#[derive(Args, Debug)]
pub struct ParallelArgs {
    /// Matrix dimension
    pub size: usize,

    /// Number of workers to start
    pub workers: usize,

    /// Unit of work each cursor claim hands out
    #[arg(long, value_enum, default_value_t = GranularityArg::Row)]
    pub granularity: GranularityArg,

    /// Block edge for block granularity; must divide the matrix size. Rejected
    /// with any other granularity
    #[arg(long, alias = "block_size", required_if_eq("granularity", "block"))]
    pub block_size: Option<usize>,

    /// How workers are realised
    #[arg(long, value_enum, env = "PARMUL_BACKEND", default_value_t = BackendArg::Process)]
    pub backend: BackendArg,

    /// Whether the worker count is capped at the online core count
    #[arg(long, value_enum, env = "PARMUL_CLAMP", default_value_t = ClampArg::Auto)]
    pub clamp: ClampArg,

    #[command(flatten)]
    pub output: OutputArgs,
}

impl ParallelArgs {
    fn granularity(&self) -> Result<Granularity> {
        if self.granularity != GranularityArg::Block && self.block_size.is_some() {
            bail!("--block-size only applies to --granularity block");
        }
        Ok(match self.granularity {
            GranularityArg::Element => Granularity::Element,
            GranularityArg::Row => Granularity::Row,
            GranularityArg::Block => Granularity::Block {
                block_size: self
                    .block_size
                    .context("--block-size is required for block granularity")?,
            },
        })
    }
}

pub fn run(args: ParallelArgs) -> Result<ExitCode> {
    let granularity = args.granularity()?;
    let config = RunConfigBuilder::default()
        .size(args.size)
        .workers(args.workers)
        .granularity(granularity)
        .backend(args.backend.into())
        .clamp(args.clamp.into())
        .build()?;

    // Validation happens here, before anything is mapped or forked.
    let coordinator = Coordinator::new(config)?;
    let path = args
        .output
        .path(&format!("parallel_{}_output.txt", granularity.name()));

    if !args.output.json {
        println!("Number of CPU cores available: {}", coordinator.cores());
        println!(
            "Using {} workers for parallel {} matrix multiplication",
            coordinator.workers(),
            granularity
        );
    }

    let mut populate = RandomPopulator::new(args.output.seed);
    let mut sink = FileSink::new(path);
    let report = coordinator
        .run(&mut populate, &mut sink)
        .context("parallel multiplication failed")?;

    output::emit(&report, sink.path(), args.output.json)?;
    Ok(ExitCode::SUCCESS)
}
