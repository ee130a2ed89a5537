//! Cell-by-cell comparison of two result files.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use crate::error::{MatioError, Result};

pub const DEFAULT_TOLERANCE: f64 = 1e-9;

/// First cell whose values differ by more than the tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mismatch {
    pub row: usize,
    pub col: usize,
    pub left: f64,
    pub right: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Comparison {
    Identical,
    Differs(Mismatch),
}

struct RowReader {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
}

impl RowReader {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| MatioError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            lines: BufReader::new(file).lines(),
        })
    }

    /// The first `size` values of row `row`.
    fn row(&mut self, row: usize, size: usize) -> Result<Vec<f64>> {
        let line = match self.lines.next() {
            Some(line) => line.map_err(|source| MatioError::Read {
                path: self.path.clone(),
                source,
            })?,
            None => {
                return Err(MatioError::MissingRow {
                    path: self.path.clone(),
                    row,
                })
            }
        };

        let values = line
            .split_whitespace()
            .take(size)
            .enumerate()
            .map(|(col, token)| {
                token.parse::<f64>().map_err(|_| MatioError::Parse {
                    path: self.path.clone(),
                    row,
                    col,
                    token: token.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if values.len() < size {
            return Err(MatioError::ShortRow {
                path: self.path.clone(),
                row,
                found: values.len(),
                expected: size,
            });
        }
        Ok(values)
    }
}

/// Compare the leading `size x size` values of two result files.
///
/// Stops at the first cell whose absolute difference exceeds `tolerance`.
pub fn compare_files(left: &Path, right: &Path, size: usize, tolerance: f64) -> Result<Comparison> {
    let mut l = RowReader::open(left)?;
    let mut r = RowReader::open(right)?;
    for row in 0..size {
        let (lv, rv) = (l.row(row, size)?, r.row(row, size)?);
        for (col, (&a, &b)) in lv.iter().zip(&rv).enumerate() {
            // NaN never compares within tolerance.
            if !((a - b).abs() <= tolerance) {
                return Ok(Comparison::Differs(Mismatch {
                    row,
                    col,
                    left: a,
                    right: b,
                }));
            }
        }
    }
    Ok(Comparison::Identical)
}
