//! Error types for engine runs

use std::io;

use thiserror::Error;

use crate::coordinator::RunConfigBuilderError;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can end a run.
///
/// Every variant is fatal; nothing in the engine retries.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A run needs at least one worker
    #[error("worker count must be at least 1")]
    NoWorkers,

    /// Block granularity with a zero block size
    #[error("block size must be at least 1")]
    ZeroBlockSize,

    /// Block size does not tile the matrix
    #[error("matrix size {size} is not divisible by block size {block_size}")]
    UnevenBlocks {
        /// Matrix dimension
        size: usize,
        /// Requested block edge
        block_size: usize,
    },

    /// `size * size * sizeof(f64)` does not fit in the address space
    #[error("matrix size {0} is too large to allocate")]
    SizeOverflow(usize),

    /// Shared mapping could not be created
    #[error("failed to map shared memory")]
    Map(#[from] io::Error),

    /// Cursor semaphore could not be initialised
    #[error("failed to initialise cursor semaphore")]
    Semaphore(#[source] io::Error),

    /// A worker process or thread could not be started
    #[error("failed to spawn worker")]
    Spawn(#[source] io::Error),

    /// Waiting on a worker process failed
    #[error("failed to wait for worker {pid}")]
    Wait {
        /// Worker process id
        pid: i32,
        /// Underlying OS error
        #[source]
        source: io::Error,
    },

    /// A worker did not finish cleanly
    #[error("worker {worker} {reason}")]
    WorkerFailed {
        /// Process id or thread name
        worker: String,
        /// Exit status or panic description
        reason: String,
    },

    /// The result sink rejected the finished matrix
    #[error("failed to persist result")]
    Persist(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Required run parameter missing
    #[error(transparent)]
    Config(#[from] RunConfigBuilderError),
}

impl EngineError {
    /// True for errors caused by the caller's parameters rather than the system.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            EngineError::NoWorkers
                | EngineError::ZeroBlockSize
                | EngineError::UnevenBlocks { .. }
                | EngineError::SizeOverflow(_)
                | EngineError::Config(_)
        )
    }
}
