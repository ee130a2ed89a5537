use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MatioError>;

#[derive(Debug, Error)]
pub enum MatioError {
    #[error("could not open {} for writing", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: row {row} has {found} values, expected {expected}", path.display())]
    ShortRow {
        path: PathBuf,
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("{}: missing row {row}", path.display())]
    MissingRow { path: PathBuf, row: usize },

    #[error("{}: row {row}, column {col}: `{token}` is not a number", path.display())]
    Parse {
        path: PathBuf,
        row: usize,
        col: usize,
        token: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_io_cause_appears_once() {
        let err = MatioError::Create {
            path: PathBuf::from("/missing/out.txt"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(err.to_string(), "could not open /missing/out.txt for writing");

        // The OS message is only reachable through the source chain.
        let cause = err.source().unwrap().to_string();
        assert!(!err.to_string().contains(&cause));
    }
}
