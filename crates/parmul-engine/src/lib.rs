//! Work distribution engine for parallel dense matrix multiplication.
//!
//! Workers pull units of work (an element, a row, or a block of the output
//! matrix) from a single shared cursor guarded by a binary semaphore. The
//! lock is held only while the cursor advances; the arithmetic for a unit
//! runs unlocked because every unit writes a disjoint region of C.

pub mod coordinator;
pub mod cursor;
pub mod error;
pub mod matrix;
pub mod pool;
pub mod sequential;
pub mod shared;
pub mod strategy;
pub mod sync;

pub use coordinator::{
    available_cores, ClampPolicy, Coordinator, Persist, Populate, RunConfig, RunConfigBuilder,
    RunPhase, RunReport,
};
pub use cursor::{CursorShape, UnitIndex, WorkCursor};
pub use error::{EngineError, Result};
pub use matrix::{MatrixRef, MatrixStore};
pub use pool::{Backend, Job, WorkerPool};
pub use strategy::{Granularity, OutputCells, Partition, Region};
