use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

fn find_upwards(start: &Path, filename: &str) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Directory holding the workspace `Cargo.lock`.
pub fn workspace_root() -> Result<PathBuf> {
    let start = std::env::current_dir()?;
    let lock = find_upwards(&start, "Cargo.lock")
        .or_else(|| find_upwards(Path::new(env!("CARGO_MANIFEST_DIR")), "Cargo.lock"))
        .context("Cargo.lock not found (run from within the repo)")?;

    Ok(lock.parent().unwrap_or(lock.as_path()).to_path_buf())
}
