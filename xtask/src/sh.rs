// sh! command execution

use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{bail, Result};
use derive_builder::Builder;

#[derive(Clone, Copy, Debug)]
pub enum StreamMode {
    Inherit,
    Pipe,
    Null,
}

impl From<StreamMode> for Stdio {
    fn from(mode: StreamMode) -> Self {
        match mode {
            StreamMode::Inherit => Stdio::inherit(),
            StreamMode::Pipe => Stdio::piped(),
            StreamMode::Null => Stdio::null(),
        }
    }
}

#[derive(Clone, Debug, Builder)]
#[builder(default)]
pub struct ShOptions {
    pub stdout: StreamMode,
    pub stderr: StreamMode,
    #[builder(setter(into, strip_option))]
    pub cwd: Option<PathBuf>,
    /// A non-zero exit is returned as output rather than an error.
    pub allow_failure: bool,
}

impl Default for ShOptions {
    fn default() -> Self {
        Self {
            stdout: StreamMode::Pipe,
            stderr: StreamMode::Inherit,
            cwd: None,
            allow_failure: false,
        }
    }
}

impl ShOptions {
    fn apply(&self, cmd: &mut Command) {
        cmd.stdout(self.stdout).stderr(self.stderr);
        if let Some(ref dir) = self.cwd {
            cmd.current_dir(dir);
        }
    }
}

pub struct ShOutput {
    pub success: bool,
    pub stdout: String,
}

#[macro_export]
macro_rules! sh {
    (options($opts:expr), $cmd:expr $(,)?) => {{ $crate::sh::sh($cmd, &$opts) }};

    ($cmd:expr $(,)?) => {{ $crate::sh::sh($cmd, &$crate::sh::ShOptions::default()) }};
}

pub fn sh(cmd: impl AsRef<str>, opts: &ShOptions) -> Result<ShOutput> {
    let cmd = cmd.as_ref();
    log::debug!("[sh] {}", cmd);

    let mut command = Command::new("sh");
    command.arg("-c").arg(cmd);
    opts.apply(&mut command);

    let output = command.output()?;
    if !output.status.success() && !opts.allow_failure {
        bail!(
            "command failed: {}\nexit code: {:?}",
            cmd,
            output.status.code().unwrap_or(-1)
        );
    }

    Ok(ShOutput {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
    })
}
