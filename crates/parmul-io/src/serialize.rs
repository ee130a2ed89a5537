//! Plain-text result files.
//!
//! One line per row; each value is fixed-point with six fractional digits
//! followed by a space.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use engine::{MatrixRef, Persist};

use crate::error::{MatioError, Result};

pub fn write_matrix<W: Write>(out: &mut W, m: MatrixRef<'_>) -> io::Result<()> {
    for row in m.rows() {
        for value in row {
            write!(out, "{value:.6} ")?;
        }
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// Writes the finished C matrix to a file, created (or truncated) on persist.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, m: MatrixRef<'_>) -> Result<()> {
        let file = File::create(&self.path).map_err(|source| MatioError::Create {
            path: self.path.clone(),
            source,
        })?;
        let mut out = BufWriter::new(file);
        write_matrix(&mut out, m)
            .and_then(|()| out.flush())
            .map_err(|source| MatioError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

impl Persist for FileSink {
    type Error = MatioError;

    fn persist(&mut self, c: MatrixRef<'_>) -> Result<()> {
        tracing::debug!(path = %self.path.display(), size = c.size(), "writing result");
        self.write(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(size: usize, data: &[f64]) -> String {
        let mut buf = Vec::new();
        write_matrix(&mut buf, MatrixRef::new(size, data)).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_two_by_two_format() {
        assert_eq!(
            render(2, &[1.0, 2.0, 3.0, 4.0]),
            "1.000000 2.000000 \n3.000000 4.000000 \n"
        );
    }

    #[test]
    fn test_fixed_point_for_large_and_fractional_values() {
        assert_eq!(
            render(1, &[4611686018427387904.0]),
            "4611686018427387904.000000 \n"
        );
        assert_eq!(render(1, &[-0.1234567]), "-0.123457 \n");
    }

    #[test]
    fn test_zero_size_is_empty() {
        assert_eq!(render(0, &[]), "");
    }

    #[test]
    fn test_file_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let mut sink = FileSink::new(&path);
        sink.persist(MatrixRef::new(1, &[2.5])).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "2.500000 \n");
    }

    #[test]
    fn test_file_sink_reports_open_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.txt");
        let err = FileSink::new(&path)
            .persist(MatrixRef::new(1, &[1.0]))
            .unwrap_err();
        assert!(matches!(err, MatioError::Create { .. }));
        assert!(err.to_string().contains("could not open"));
    }
}
