use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use engine::RunReport;
use serde::Serialize;

/// Options shared by every run mode
#[derive(Args, Debug)]
pub struct OutputArgs {
    /// Seed for populating A and B
    #[arg(long, env = "PARMUL_SEED", default_value_t = matio::populate::DEFAULT_SEED)]
    pub seed: u64,

    /// Result file; defaults to `<output-dir>/<mode>_output.txt`
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory for the default result file
    #[arg(long, env = "PARMUL_OUTPUT_DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Print the run report as JSON instead of the console summary
    #[arg(long)]
    pub json: bool,
}

impl OutputArgs {
    pub fn path(&self, default_name: &str) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.output_dir.join(default_name))
    }
}

#[derive(Serialize)]
struct Report<'a> {
    #[serde(flatten)]
    run: &'a RunReport,
    output: &'a Path,
}

pub fn emit(report: &RunReport, output: &Path, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(&Report { run: report, output })?);
    } else {
        println!("Execution Time: {:.6} seconds", report.elapsed_secs);
    }
    Ok(())
}
