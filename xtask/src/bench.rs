use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use clap::Args;
use serde::Deserialize;

use crate::findup::workspace_root;
use crate::sh::{ShOptionsBuilder, StreamMode};

/// Build the release CLI and time every granularity against the sequential baseline
#[derive(Args, Debug)]
pub struct BenchArgs {
    /// Matrix dimension
    #[arg(long, default_value_t = 256)]
    pub size: usize,

    /// Worker counts to sweep
    #[arg(long, value_delimiter = ',', default_value = "1,2,4")]
    pub workers: Vec<usize>,

    /// Also run block granularity with this block edge
    #[arg(long)]
    pub block_size: Option<usize>,

    /// Seed passed to every run
    #[arg(long, default_value_t = 1)]
    pub seed: u64,

    /// Worker backend passed to parallel runs
    #[arg(long, default_value = "process")]
    pub backend: String,

    /// Skip `cargo build --release`
    #[arg(long)]
    pub no_build: bool,
}

/// The subset of the CLI's `--json` report the table needs.
#[derive(Deserialize)]
struct Report {
    workers: usize,
    elapsed_secs: f64,
}

struct Row {
    label: String,
    workers: usize,
    elapsed: f64,
    identical: bool,
}

fn quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', r"'\''"))
}

fn release_binary(root: &Path) -> PathBuf {
    let target = std::env::var_os("CARGO_TARGET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| root.join("target"));
    target.join("release").join("parmul")
}

fn run_json(cmd: &str) -> Result<Report> {
    let out = crate::sh!(cmd)?;
    serde_json::from_str(out.stdout.trim()).with_context(|| format!("bad report from `{cmd}`"))
}

fn identical(bin: &str, left: &Path, right: &Path, size: usize) -> Result<bool> {
    let opts = ShOptionsBuilder::default()
        .stdout(StreamMode::Null)
        .allow_failure(true)
        .build()?;
    let out = crate::sh!(
        options(opts),
        format!("{bin} compare {} {} {size}", quote(left), quote(right))
    )?;
    Ok(out.success)
}

pub fn run(args: BenchArgs) -> Result<()> {
    ensure!(!args.workers.is_empty(), "--workers needs at least one count");
    let root = workspace_root()?;

    if !args.no_build {
        log::info!("building release parmul");
        let opts = ShOptionsBuilder::default()
            .stdout(StreamMode::Inherit)
            .cwd(root.clone())
            .build()?;
        crate::sh!(options(opts), "cargo build --release --quiet -p parmul")?;
    }

    let bin = release_binary(&root);
    ensure!(bin.exists(), "{} not found", bin.display());
    let bin = quote(&bin);
    let scratch = tempfile::tempdir()?;
    let size = args.size;

    let baseline_path = scratch.path().join("sequential.txt");
    let baseline = run_json(&format!(
        "{bin} sequential {size} --json --seed {} --output {}",
        args.seed,
        quote(&baseline_path)
    ))?;
    log::info!("sequential: {:.6}s", baseline.elapsed_secs);

    let mut granularities = vec![
        ("element".to_string(), "--granularity element".to_string()),
        ("row".to_string(), "--granularity row".to_string()),
    ];
    if let Some(bs) = args.block_size {
        granularities.push((
            format!("block({bs})"),
            format!("--granularity block --block-size {bs}"),
        ));
    }

    let mut rows = vec![Row {
        label: "sequential".to_string(),
        workers: 1,
        elapsed: baseline.elapsed_secs,
        identical: true,
    }];
    for &workers in &args.workers {
        for (label, flags) in &granularities {
            let path = scratch.path().join(format!("{label}-{workers}.txt"));
            let report = run_json(&format!(
                "{bin} parallel {size} {workers} {flags} --backend {} --json --seed {} --output {}",
                args.backend,
                args.seed,
                quote(&path)
            ))?;
            let same = identical(&bin, &baseline_path, &path, size)?;
            if !same {
                log::warn!("{label} with {workers} workers differs from the baseline");
            }
            rows.push(Row {
                label: label.clone(),
                workers: report.workers,
                elapsed: report.elapsed_secs,
                identical: same,
            });
        }
    }

    println!("size {size}, backend {}", args.backend);
    println!(
        "{:<12} {:>8} {:>12} {:>9} {:>6}",
        "mode", "workers", "seconds", "speedup", "match"
    );
    for row in &rows {
        let speedup = if row.elapsed > 0.0 {
            baseline.elapsed_secs / row.elapsed
        } else {
            f64::NAN
        };
        println!(
            "{:<12} {:>8} {:>12.6} {:>8.2}x {:>6}",
            row.label,
            row.workers,
            row.elapsed,
            speedup,
            if row.identical { "yes" } else { "NO" }
        );
    }

    ensure!(
        rows.iter().all(|r| r.identical),
        "some parallel results differ from the sequential baseline"
    );
    Ok(())
}
