//! Collaborators around the engine: input population, result files, and
//! result comparison.

pub mod compare;
pub mod error;
pub mod populate;
pub mod serialize;

pub use compare::{compare_files, Comparison, Mismatch, DEFAULT_TOLERANCE};
pub use error::{MatioError, Result};
pub use populate::RandomPopulator;
pub use serialize::{write_matrix, FileSink};
