//! Single-threaded baseline.
//!
//! No cursor, no semaphore, no shared mapping: the reference the parallel
//! strategies are timed and checked against.

use std::time::Instant;

use crate::coordinator::{Lifecycle, Persist, Populate, RunPhase, RunReport};
use crate::error::{EngineError, Result};
use crate::matrix::{MatrixRef, MatrixStore};

/// Inner product of row `i` of A and column `j` of B, summed in ascending `k`.
#[inline]
pub fn dot(a: MatrixRef<'_>, b: MatrixRef<'_>, i: usize, j: usize) -> f64 {
    let n = a.size();
    let (a, b) = (a.as_slice(), b.as_slice());
    let mut sum = 0.0;
    for k in 0..n {
        sum += a[i * n + k] * b[k * n + j];
    }
    sum
}

/// Standard matrix multiplication: C = A * B
pub fn multiply(a: MatrixRef<'_>, b: MatrixRef<'_>, c: &mut [f64]) {
    let n = a.size();
    debug_assert_eq!(b.size(), n);
    debug_assert_eq!(c.len(), n * n);
    for i in 0..n {
        for j in 0..n {
            c[i * n + j] = dot(a, b, i, j);
        }
    }
}

/// Populate, multiply on the calling thread, persist.
pub fn run<P, S>(size: usize, populate: &mut P, sink: &mut S) -> Result<RunReport>
where
    P: Populate + ?Sized,
    S: Persist + ?Sized,
{
    let mut lifecycle = Lifecycle::new();
    let mut store = MatrixStore::heap(size)?;
    {
        let (a, b) = store.inputs_mut();
        populate.populate(size, a, b);
    }
    lifecycle.advance(RunPhase::Populated);

    let start = Instant::now();
    lifecycle.advance(RunPhase::Running);
    {
        let (a, b, c) = store.split();
        multiply(a, b, c);
    }
    let elapsed = start.elapsed();
    lifecycle.advance(RunPhase::Joined);

    sink.persist(store.c())
        .map_err(|e| EngineError::Persist(Box::new(e)))?;
    lifecycle.advance(RunPhase::Persisted);

    let report = RunReport {
        mode: "sequential",
        granularity: None,
        block_size: None,
        backend: None,
        size,
        requested_workers: 1,
        workers: 1,
        cores: crate::coordinator::available_cores(),
        units: size * size,
        elapsed_secs: elapsed.as_secs_f64(),
        checksum: store.c().checksum(),
    };
    drop(store);
    lifecycle.advance(RunPhase::Terminated);
    tracing::info!(size, elapsed = report.elapsed_secs, "sequential run complete");
    Ok(report)
}
