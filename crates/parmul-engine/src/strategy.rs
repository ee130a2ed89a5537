//! Granularity strategies: how a claimed unit maps onto a region of C.
//!
//! Every strategy partitions the `size x size` output grid so that each cell
//! belongs to exactly one unit. That partition is what lets workers write C
//! without a lock.

use core::marker::PhantomData;
use core::ops::Range;

use crate::cursor::{CursorShape, UnitIndex};
use crate::error::{EngineError, Result};
use crate::matrix::MatrixRef;
use crate::sequential::dot;

/// Rectangular region of the output matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub rows: Range<usize>,
    pub cols: Range<usize>,
}

impl Region {
    pub fn cell(row: usize, col: usize) -> Self {
        Self {
            rows: row..row + 1,
            cols: col..col + 1,
        }
    }

    /// Every `(row, col)` in the region, row by row.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.rows
            .clone()
            .flat_map(move |i| self.cols.clone().map(move |j| (i, j)))
    }
}

/// Write handle to C shared by every worker.
///
/// Holds a raw pointer because several workers write through it at once.
/// Soundness rests on the partition: a worker only stores into the region
/// of a unit it claimed.
#[derive(Clone, Copy)]
pub struct OutputCells<'a> {
    ptr: *mut f64,
    size: usize,
    _marker: PhantomData<&'a mut [f64]>,
}

unsafe impl Send for OutputCells<'_> {}
unsafe impl Sync for OutputCells<'_> {}

impl<'a> OutputCells<'a> {
    pub fn new(size: usize, c: &'a mut [f64]) -> Self {
        assert_eq!(c.len(), size * size, "output does not match size");
        Self {
            ptr: c.as_mut_ptr(),
            size,
            _marker: PhantomData,
        }
    }

    /// # Safety
    /// No other thread or process may access `(row, col)` concurrently.
    #[inline]
    pub unsafe fn store(&self, row: usize, col: usize, value: f64) {
        debug_assert!(row < self.size && col < self.size);
        self.ptr.add(row * self.size + col).write(value);
    }
}

/// Pluggable work-partitioning policy.
pub trait Partition: Send + Sync {
    /// Short name used in diagnostics and file names.
    fn name(&self) -> &'static str;

    /// Matrix dimension the partition was built for.
    fn size(&self) -> usize;

    fn unit_count(&self) -> usize;

    /// Region of C owned by `unit`. `unit` must be below `unit_count()`.
    fn region_of(&self, unit: UnitIndex) -> Region;

    fn cursor_shape(&self) -> CursorShape {
        CursorShape::Linear {
            total: self.unit_count(),
        }
    }

    /// Overwrite every cell of `region` with its inner product.
    ///
    /// The reduction runs over the full `k` range in ascending order, so the
    /// result for a cell does not depend on which strategy computed it.
    ///
    /// # Safety
    /// `region` must be owned exclusively by the caller for the duration of
    /// the call (it came from a unit this caller claimed).
    unsafe fn compute(&self, region: &Region, a: MatrixRef<'_>, b: MatrixRef<'_>, c: OutputCells<'_>) {
        for (i, j) in region.cells() {
            c.store(i, j, dot(a, b, i, j));
        }
    }
}

/// One output cell per unit.
#[derive(Debug, Clone, Copy)]
pub struct ElementPartition {
    size: usize,
}

impl Partition for ElementPartition {
    fn name(&self) -> &'static str {
        "element"
    }

    fn size(&self) -> usize {
        self.size
    }

    fn unit_count(&self) -> usize {
        self.size * self.size
    }

    fn region_of(&self, unit: UnitIndex) -> Region {
        Region::cell(unit / self.size, unit % self.size)
    }

    fn cursor_shape(&self) -> CursorShape {
        CursorShape::Grid { size: self.size }
    }
}

/// One full output row per unit.
#[derive(Debug, Clone, Copy)]
pub struct RowPartition {
    size: usize,
}

impl Partition for RowPartition {
    fn name(&self) -> &'static str {
        "row"
    }

    fn size(&self) -> usize {
        self.size
    }

    fn unit_count(&self) -> usize {
        self.size
    }

    fn region_of(&self, unit: UnitIndex) -> Region {
        Region {
            rows: unit..unit + 1,
            cols: 0..self.size,
        }
    }
}

/// One `block_size x block_size` tile per unit, numbered row-major.
#[derive(Debug, Clone, Copy)]
pub struct BlockPartition {
    size: usize,
    block_size: usize,
    blocks_per_side: usize,
}

impl BlockPartition {
    pub fn new(size: usize, block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(EngineError::ZeroBlockSize);
        }
        if size % block_size != 0 {
            return Err(EngineError::UnevenBlocks { size, block_size });
        }
        Ok(Self {
            size,
            block_size,
            blocks_per_side: size / block_size,
        })
    }
}

impl Partition for BlockPartition {
    fn name(&self) -> &'static str {
        "block"
    }

    fn size(&self) -> usize {
        self.size
    }

    fn unit_count(&self) -> usize {
        self.blocks_per_side * self.blocks_per_side
    }

    fn region_of(&self, unit: UnitIndex) -> Region {
        let block_i = unit / self.blocks_per_side;
        let block_j = unit % self.blocks_per_side;
        let bs = self.block_size;
        Region {
            rows: block_i * bs..(block_i + 1) * bs,
            cols: block_j * bs..(block_j + 1) * bs,
        }
    }
}

/// Strategy selection made at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Element,
    Row,
    Block { block_size: usize },
}

impl Granularity {
    pub fn name(&self) -> &'static str {
        match self {
            Granularity::Element => "element",
            Granularity::Row => "row",
            Granularity::Block { .. } => "block",
        }
    }

    pub fn block_size(&self) -> Option<usize> {
        match *self {
            Granularity::Block { block_size } => Some(block_size),
            _ => None,
        }
    }

    /// Build the partition for a `size x size` output, checking preconditions.
    pub fn partition(&self, size: usize) -> Result<Box<dyn Partition>> {
        let partition: Box<dyn Partition> = match *self {
            Granularity::Element => Box::new(ElementPartition { size }),
            Granularity::Row => Box::new(RowPartition { size }),
            Granularity::Block { block_size } => Box::new(BlockPartition::new(size, block_size)?),
        };
        Ok(partition)
    }
}

impl core::fmt::Display for Granularity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
