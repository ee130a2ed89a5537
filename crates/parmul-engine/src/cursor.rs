//! The shared "next unit of work" cursor.
//!
//! `claim` is the only place workers contend. The semaphore is held for the
//! read and the advance and nothing else; callers compute their unit after
//! the guard has been dropped.

use core::cell::UnsafeCell;
use core::ptr::addr_of_mut;

use crate::error::{EngineError, Result};
use crate::shared::SharedCell;
use crate::sync::Semaphore;

/// Linear index of a unit of work, in `0..unit_count`.
pub type UnitIndex = usize;

/// How the cursor position is laid out.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorShape {
    /// `(row, col)` advanced with carry over a `size x size` grid
    Grid { size: usize },
    /// A single counter over `total` units
    Linear { total: usize },
}

impl CursorShape {
    pub fn total_units(&self) -> usize {
        match *self {
            CursorShape::Grid { size } => size * size,
            CursorShape::Linear { total } => total,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct Position {
    major: usize,
    minor: usize,
}

#[repr(C)]
pub struct WorkCursor {
    lock: Semaphore,
    shape: CursorShape,
    position: UnsafeCell<Position>,
}

// `position` is only touched while `lock` is held.
unsafe impl Sync for WorkCursor {}
unsafe impl Send for WorkCursor {}

impl WorkCursor {
    /// Create a cursor at position zero in its own shared mapping.
    pub fn create(shape: CursorShape) -> Result<SharedCell<WorkCursor>> {
        SharedCell::try_new_with(|slot: *mut WorkCursor| unsafe {
            addr_of_mut!((*slot).shape).write(shape);
            addr_of_mut!((*slot).position).write(UnsafeCell::new(Position::default()));
            Semaphore::init_at(addr_of_mut!((*slot).lock), 1).map_err(EngineError::Semaphore)
        })
    }

    pub fn total_units(&self) -> usize {
        self.shape.total_units()
    }

    /// Claim the next unit, or `None` once every unit has been handed out.
    ///
    /// The position advances on every call, including calls that find the
    /// cursor exhausted, so it never decreases.
    pub fn claim(&self) -> Option<UnitIndex> {
        let guard = self.lock.acquire();
        let pos = unsafe { &mut *self.position.get() };
        let claimed = match self.shape {
            CursorShape::Grid { size } => {
                let (row, col) = (pos.major, pos.minor);
                pos.minor += 1;
                if pos.minor >= size {
                    pos.minor = 0;
                    pos.major += 1;
                }
                (row < size).then(|| row * size + col)
            }
            CursorShape::Linear { total } => {
                let index = pos.major;
                pos.major += 1;
                (index < total).then_some(index)
            }
        };
        drop(guard);
        claimed
    }

    /// Number of units handed out so far.
    pub fn claimed(&self) -> usize {
        let _guard = self.lock.acquire();
        let pos = unsafe { *self.position.get() };
        let handed_out = match self.shape {
            CursorShape::Grid { size } => pos.major.saturating_mul(size).saturating_add(pos.minor),
            CursorShape::Linear { .. } => pos.major,
        };
        handed_out.min(self.total_units())
    }
}
