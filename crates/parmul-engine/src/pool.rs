//! Fixed-size pool of symmetric workers draining one cursor.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use serde::Serialize;

use crate::cursor::WorkCursor;
use crate::error::{EngineError, Result};
use crate::matrix::MatrixRef;
use crate::strategy::{OutputCells, Partition};

/// Exit status a forked worker reports when its loop panicked.
const PANIC_EXIT_CODE: i32 = 101;

/// How workers are realised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// One forked child process per worker
    #[default]
    Process,
    /// One scoped OS thread per worker
    Thread,
}

/// Everything a worker touches, all of it shared.
#[derive(Clone, Copy)]
pub struct Job<'a> {
    pub cursor: &'a WorkCursor,
    pub partition: &'a dyn Partition,
    pub a: MatrixRef<'a>,
    pub b: MatrixRef<'a>,
    pub c: OutputCells<'a>,
}

impl Job<'_> {
    /// Pull-compute loop. Returns the number of units this worker computed.
    pub fn work(&self) -> usize {
        let mut computed = 0;
        while let Some(unit) = self.cursor.claim() {
            let region = self.partition.region_of(unit);
            // The cursor hands each unit out once and regions are disjoint.
            unsafe { self.partition.compute(&region, self.a, self.b, self.c) };
            computed += 1;
        }
        computed
    }
}

pub struct WorkerPool {
    backend: Backend,
    workers: usize,
}

impl WorkerPool {
    pub fn new(backend: Backend, workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(EngineError::NoWorkers);
        }
        Ok(Self { backend, workers })
    }

    /// Run `job` on every worker and return once all of them have exited.
    pub fn run(&self, job: Job<'_>) -> Result<()> {
        tracing::debug!(backend = ?self.backend, workers = self.workers, "starting workers");
        match self.backend {
            Backend::Process => self.run_processes(job),
            Backend::Thread => self.run_threads(job),
        }
    }

    fn run_threads(&self, job: Job<'_>) -> Result<()> {
        thread::scope(|s| {
            let mut handles = Vec::with_capacity(self.workers);
            let mut spawn_error = None;
            for id in 0..self.workers {
                let spawned = thread::Builder::new()
                    .name(format!("worker-{id}"))
                    .spawn_scoped(s, move || job.work());
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        spawn_error = Some(EngineError::Spawn(e));
                        break;
                    }
                }
            }

            let mut failure = None;
            for (id, handle) in handles.into_iter().enumerate() {
                match handle.join() {
                    Ok(units) => tracing::trace!(worker = id, units, "worker finished"),
                    Err(_) => {
                        failure.get_or_insert(EngineError::WorkerFailed {
                            worker: format!("worker-{id}"),
                            reason: "panicked".to_string(),
                        });
                    }
                }
            }
            spawn_error.or(failure).map_or(Ok(()), Err)
        })
    }

    fn run_processes(&self, job: Job<'_>) -> Result<()> {
        let mut children = Vec::with_capacity(self.workers);
        let mut spawn_error = None;

        for _ in 0..self.workers {
            match unsafe { libc::fork() } {
                -1 => {
                    spawn_error = Some(EngineError::Spawn(io::Error::last_os_error()));
                    break;
                }
                0 => {
                    // Child: no logging, no unwinding back into the parent's frames.
                    let code = match panic::catch_unwind(AssertUnwindSafe(|| job.work())) {
                        Ok(_) => 0,
                        Err(_) => PANIC_EXIT_CODE,
                    };
                    unsafe { libc::_exit(code) }
                }
                pid => children.push(pid),
            }
        }

        // Every child that was started is reaped, even after a failure.
        let mut failure = None;
        for pid in children {
            match reap(pid) {
                Ok(status) => {
                    if let Some(reason) = describe_failure(status) {
                        failure.get_or_insert(EngineError::WorkerFailed {
                            worker: format!("process {pid}"),
                            reason,
                        });
                    }
                }
                Err(source) => {
                    failure.get_or_insert(EngineError::Wait { pid, source });
                }
            }
        }
        spawn_error.or(failure).map_or(Ok(()), Err)
    }
}

fn reap(pid: libc::pid_t) -> io::Result<libc::c_int> {
    let mut status = 0;
    loop {
        if unsafe { libc::waitpid(pid, &mut status, 0) } == pid {
            return Ok(status);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

fn describe_failure(status: libc::c_int) -> Option<String> {
    if libc::WIFEXITED(status) {
        match libc::WEXITSTATUS(status) {
            0 => None,
            PANIC_EXIT_CODE => Some("panicked".to_string()),
            code => Some(format!("exited with status {code}")),
        }
    } else if libc::WIFSIGNALED(status) {
        Some(format!("killed by signal {}", libc::WTERMSIG(status)))
    } else {
        Some(format!("ended with wait status {status:#x}"))
    }
}
