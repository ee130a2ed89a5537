//! Square row-major `f64` matrices and the A/B/C store for one run.

use crate::error::{EngineError, Result};
use crate::shared::SharedBuffer;

/// Borrowed `size x size` row-major matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatrixRef<'a> {
    size: usize,
    data: &'a [f64],
}

impl<'a> MatrixRef<'a> {
    /// # Panics
    /// If `data.len() != size * size`.
    pub fn new(size: usize, data: &'a [f64]) -> Self {
        assert_eq!(data.len(), size * size, "matrix data does not match size");
        Self { size, data }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn as_slice(&self) -> &'a [f64] {
        self.data
    }

    /// Rows in order; yields nothing for a zero-size matrix.
    pub fn rows(&self) -> impl Iterator<Item = &'a [f64]> {
        self.data.chunks_exact(self.size.max(1))
    }

    /// Sum of all elements (for verification)
    pub fn checksum(&self) -> f64 {
        self.data.iter().sum()
    }
}

enum Buffer {
    Heap(Vec<f64>),
    Shared(SharedBuffer),
}

impl Buffer {
    fn as_slice(&self) -> &[f64] {
        match self {
            Buffer::Heap(v) => v.as_slice(),
            Buffer::Shared(s) => s.as_slice(),
        }
    }

    fn as_mut_slice(&mut self) -> &mut [f64] {
        match self {
            Buffer::Heap(v) => v.as_mut_slice(),
            Buffer::Shared(s) => s.as_mut_slice(),
        }
    }
}

/// Owns the inputs A, B and the output C of a run.
///
/// A shared store maps all three matrices before any worker exists so that
/// forked children inherit them; the mappings are released when the store
/// drops.
pub struct MatrixStore {
    size: usize,
    a: Buffer,
    b: Buffer,
    c: Buffer,
}

impl MatrixStore {
    /// Private heap allocation for the single-threaded baseline.
    pub fn heap(size: usize) -> Result<Self> {
        let len = Self::cells(size)?;
        Ok(Self {
            size,
            a: Buffer::Heap(vec![0.0; len]),
            b: Buffer::Heap(vec![0.0; len]),
            c: Buffer::Heap(vec![0.0; len]),
        })
    }

    /// Shared anonymous mappings visible to forked workers.
    pub fn shared(size: usize) -> Result<Self> {
        let len = Self::cells(size)?;
        Ok(Self {
            size,
            a: Buffer::Shared(SharedBuffer::zeroed(len)?),
            b: Buffer::Shared(SharedBuffer::zeroed(len)?),
            c: Buffer::Shared(SharedBuffer::zeroed(len)?),
        })
    }

    fn cells(size: usize) -> Result<usize> {
        size.checked_mul(size)
            .filter(|n| n.checked_mul(core::mem::size_of::<f64>()).is_some())
            .ok_or(EngineError::SizeOverflow(size))
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn a(&self) -> MatrixRef<'_> {
        MatrixRef::new(self.size, self.a.as_slice())
    }

    pub fn b(&self) -> MatrixRef<'_> {
        MatrixRef::new(self.size, self.b.as_slice())
    }

    pub fn c(&self) -> MatrixRef<'_> {
        MatrixRef::new(self.size, self.c.as_slice())
    }

    /// Mutable access to both inputs, for population.
    pub fn inputs_mut(&mut self) -> (&mut [f64], &mut [f64]) {
        (self.a.as_mut_slice(), self.b.as_mut_slice())
    }

    /// Inputs for reading plus the output for writing.
    pub fn split(&mut self) -> (MatrixRef<'_>, MatrixRef<'_>, &mut [f64]) {
        let size = self.size;
        (
            MatrixRef::new(size, self.a.as_slice()),
            MatrixRef::new(size, self.b.as_slice()),
            self.c.as_mut_slice(),
        )
    }
}
