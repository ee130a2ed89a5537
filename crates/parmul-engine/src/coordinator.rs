//! Run orchestration: allocate, populate, spawn, join, time, persist.

use std::time::Instant;

use derive_builder::Builder;
use serde::Serialize;

use crate::cursor::WorkCursor;
use crate::error::{EngineError, Result};
use crate::matrix::{MatrixRef, MatrixStore};
use crate::pool::{Backend, Job, WorkerPool};
use crate::strategy::{Granularity, OutputCells, Partition};

/// Fills A and B before any worker exists.
pub trait Populate {
    fn populate(&mut self, size: usize, a: &mut [f64], b: &mut [f64]);
}

/// Receives C once every worker has exited.
pub trait Persist {
    type Error: std::error::Error + Send + Sync + 'static;

    fn persist(&mut self, c: MatrixRef<'_>) -> std::result::Result<(), Self::Error>;
}

/// Online CPU count as reported by `sysconf`, at least 1.
pub fn available_cores() -> usize {
    let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if n < 1 {
        1
    } else {
        n as usize
    }
}

/// Whether the requested worker count is capped to the core count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClampPolicy {
    /// Clamp row and block runs, leave element runs as requested
    #[default]
    Auto,
    Always,
    Never,
}

impl ClampPolicy {
    fn applies_to(&self, granularity: Granularity) -> bool {
        match self {
            ClampPolicy::Auto => !matches!(granularity, Granularity::Element),
            ClampPolicy::Always => true,
            ClampPolicy::Never => false,
        }
    }
}

/// Parameters of one parallel run.
#[derive(Debug, Clone, Builder)]
pub struct RunConfig {
    pub size: usize,

    /// Requested worker count, before clamping
    pub workers: usize,

    #[builder(default = "Granularity::Row")]
    pub granularity: Granularity,

    #[builder(default)]
    pub backend: Backend,

    #[builder(default)]
    pub clamp: ClampPolicy,

    /// Core count override; detected with `sysconf` when unset
    #[builder(default, setter(strip_option))]
    pub cores: Option<usize>,
}

impl RunConfig {
    /// Check every precondition that would otherwise surface inside a worker.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(EngineError::NoWorkers);
        }
        self.size
            .checked_mul(self.size)
            .and_then(|n| n.checked_mul(core::mem::size_of::<f64>()))
            .ok_or(EngineError::SizeOverflow(self.size))?;
        self.granularity.partition(self.size).map(|_| ())
    }
}

/// States a run moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RunPhase {
    Init,
    Populated,
    Running,
    Joined,
    Persisted,
    Terminated,
}

impl RunPhase {
    pub fn next(self) -> Option<RunPhase> {
        match self {
            RunPhase::Init => Some(RunPhase::Populated),
            RunPhase::Populated => Some(RunPhase::Running),
            RunPhase::Running => Some(RunPhase::Joined),
            RunPhase::Joined => Some(RunPhase::Persisted),
            RunPhase::Persisted => Some(RunPhase::Terminated),
            RunPhase::Terminated => None,
        }
    }
}

/// Tracks the current phase; transitions may not skip a state.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    phase: RunPhase,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        tracing::debug!(phase = ?RunPhase::Init, "run phase");
        Self {
            phase: RunPhase::Init,
        }
    }

    pub(crate) fn advance(&mut self, to: RunPhase) {
        debug_assert_eq!(self.phase.next(), Some(to), "illegal transition from {:?}", self.phase);
        tracing::debug!(from = ?self.phase, to = ?to, "run phase");
        self.phase = to;
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> RunPhase {
        self.phase
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: &'static str,
    pub granularity: Option<&'static str>,
    pub block_size: Option<usize>,
    pub backend: Option<Backend>,
    pub size: usize,
    pub requested_workers: usize,
    pub workers: usize,
    pub cores: usize,
    pub units: usize,
    pub elapsed_secs: f64,
    pub checksum: f64,
}

/// Owns a validated configuration and drives one parallel run.
pub struct Coordinator {
    config: RunConfig,
    partition: Box<dyn Partition>,
    cores: usize,
    workers: usize,
}

impl Coordinator {
    /// Validate `config` and settle the effective worker count.
    ///
    /// Nothing is mapped or spawned here, so a rejected configuration
    /// leaves no state behind.
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate()?;
        let partition = config.granularity.partition(config.size)?;
        let cores = config.cores.unwrap_or_else(available_cores);
        let workers = effective_workers(&config, cores);
        if workers < config.workers {
            tracing::warn!(
                requested = config.workers,
                cores,
                "clamping worker count to available cores"
            );
        }
        Ok(Self {
            config,
            partition,
            cores,
            workers,
        })
    }

    pub fn cores(&self) -> usize {
        self.cores
    }

    /// Worker count after clamping.
    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn run<P, S>(&self, populate: &mut P, sink: &mut S) -> Result<RunReport>
    where
        P: Populate + ?Sized,
        S: Persist + ?Sized,
    {
        let size = self.config.size;
        let mut lifecycle = Lifecycle::new();
        tracing::debug!(
            size,
            granularity = %self.config.granularity,
            units = self.partition.unit_count(),
            workers = self.workers,
            "run parameters"
        );

        let mut store = MatrixStore::shared(size)?;
        {
            let (a, b) = store.inputs_mut();
            populate.populate(size, a, b);
        }
        lifecycle.advance(RunPhase::Populated);

        let cursor = WorkCursor::create(self.partition.cursor_shape())?;
        let pool = WorkerPool::new(self.config.backend, self.workers)?;

        let start = Instant::now();
        lifecycle.advance(RunPhase::Running);
        {
            let (a, b, c) = store.split();
            pool.run(Job {
                cursor: &cursor,
                partition: self.partition.as_ref(),
                a,
                b,
                c: OutputCells::new(size, c),
            })?;
        }
        let elapsed = start.elapsed();
        lifecycle.advance(RunPhase::Joined);
        debug_assert_eq!(cursor.claimed(), self.partition.unit_count());

        sink.persist(store.c())
            .map_err(|e| EngineError::Persist(Box::new(e)))?;
        lifecycle.advance(RunPhase::Persisted);

        let report = RunReport {
            mode: "parallel",
            granularity: Some(self.config.granularity.name()),
            block_size: self.config.granularity.block_size(),
            backend: Some(self.config.backend),
            size,
            requested_workers: self.config.workers,
            workers: self.workers,
            cores: self.cores,
            units: self.partition.unit_count(),
            elapsed_secs: elapsed.as_secs_f64(),
            checksum: store.c().checksum(),
        };

        drop(cursor);
        drop(store);
        lifecycle.advance(RunPhase::Terminated);
        tracing::info!(
            granularity = %self.config.granularity,
            workers = self.workers,
            elapsed = report.elapsed_secs,
            "parallel run complete"
        );
        Ok(report)
    }
}

fn effective_workers(config: &RunConfig, cores: usize) -> usize {
    if config.clamp.applies_to(config.granularity) {
        config.workers.min(cores.max(1))
    } else {
        config.workers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    struct Counting;

    impl Populate for Counting {
        fn populate(&mut self, _size: usize, a: &mut [f64], b: &mut [f64]) {
            for (i, (x, y)) in a.iter_mut().zip(b.iter_mut()).enumerate() {
                *x = i as f64;
                *y = 1.0;
            }
        }
    }

    #[derive(Default)]
    struct Capture(Option<Vec<f64>>);

    impl Persist for Capture {
        type Error = Infallible;

        fn persist(&mut self, c: MatrixRef<'_>) -> std::result::Result<(), Infallible> {
            self.0 = Some(c.as_slice().to_vec());
            Ok(())
        }
    }

    struct Refuse;

    impl Persist for Refuse {
        type Error = std::io::Error;

        fn persist(&mut self, _c: MatrixRef<'_>) -> std::result::Result<(), std::io::Error> {
            Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied))
        }
    }

    fn config(size: usize, workers: usize, g: Granularity) -> RunConfigBuilder {
        let mut builder = RunConfigBuilder::default();
        builder.size(size).workers(workers).granularity(g).cores(4);
        builder
    }

    #[test]
    fn test_run_produces_product() {
        let cfg = config(3, 2, Granularity::Row).build().unwrap();
        let coordinator = Coordinator::new(cfg).unwrap();
        let mut sink = Capture::default();
        let report = coordinator.run(&mut Counting, &mut sink).unwrap();

        // B is all ones, so each C cell is the sum of its A row.
        assert_eq!(
            sink.0.unwrap(),
            vec![3.0, 3.0, 3.0, 12.0, 12.0, 12.0, 21.0, 21.0, 21.0]
        );
        assert_eq!(report.units, 3);
        assert_eq!(report.workers, 2);
        assert_eq!(report.checksum, 108.0);
    }

    #[test]
    fn test_clamp_policies() {
        let row = Coordinator::new(config(8, 16, Granularity::Row).build().unwrap()).unwrap();
        assert_eq!(row.workers(), 4);

        let element = Coordinator::new(config(8, 16, Granularity::Element).build().unwrap()).unwrap();
        assert_eq!(element.workers(), 16);

        let always = Coordinator::new(
            config(8, 16, Granularity::Element)
                .clamp(ClampPolicy::Always)
                .build()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(always.workers(), 4);

        let never = Coordinator::new(
            config(8, 16, Granularity::Block { block_size: 2 })
                .clamp(ClampPolicy::Never)
                .build()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(never.workers(), 16);
    }

    #[test]
    fn test_uneven_blocks_rejected_before_run() {
        let cfg = config(10, 2, Granularity::Block { block_size: 4 }).build().unwrap();
        assert!(matches!(
            Coordinator::new(cfg),
            Err(EngineError::UnevenBlocks {
                size: 10,
                block_size: 4
            })
        ));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let cfg = config(4, 0, Granularity::Row).build().unwrap();
        assert!(matches!(Coordinator::new(cfg), Err(EngineError::NoWorkers)));
    }

    #[test]
    fn test_missing_size_is_config_error() {
        let err = RunConfigBuilder::default().workers(1).build().unwrap_err();
        assert!(EngineError::from(err).is_usage());
    }

    #[test]
    fn test_persist_failure_surfaces() {
        let cfg = config(2, 1, Granularity::Element).build().unwrap();
        let err = Coordinator::new(cfg)
            .unwrap()
            .run(&mut Counting, &mut Refuse)
            .unwrap_err();
        assert!(matches!(err, EngineError::Persist(_)));
    }

    #[test]
    fn test_lifecycle_order() {
        let mut lifecycle = Lifecycle::new();
        let mut phase = RunPhase::Init;
        while let Some(next) = phase.next() {
            lifecycle.advance(next);
            assert_eq!(lifecycle.phase(), next);
            phase = next;
        }
        assert_eq!(lifecycle.phase(), RunPhase::Terminated);
    }

    #[test]
    #[should_panic(expected = "illegal transition")]
    #[cfg(debug_assertions)]
    fn test_lifecycle_rejects_skips() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.advance(RunPhase::Running);
    }
}
