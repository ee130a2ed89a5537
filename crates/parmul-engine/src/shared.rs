//! Anonymous shared mappings that survive `fork`.
//!
//! Every mapping is `MAP_SHARED | MAP_ANONYMOUS`, so a child created after
//! the mapping exists writes into the same physical pages the parent reads.
//! The kernel zero-fills the pages, which is a valid bit pattern for `f64`
//! and for the cursor position fields.

use core::marker::PhantomData;
use core::ops::Deref;
use core::ptr::{self, NonNull};
use std::io;

/// An owned `mmap` region, unmapped on drop.
pub struct SharedMapping {
    ptr: NonNull<u8>,
    len: usize,
}

// The mapping is plain memory; synchronization is the user's concern.
unsafe impl Send for SharedMapping {}
unsafe impl Sync for SharedMapping {}

impl SharedMapping {
    /// Map `len` zeroed bytes shared with future children.
    ///
    /// `mmap` rejects empty mappings, so a zero `len` still maps one page.
    pub fn new(len: usize) -> io::Result<Self> {
        let map_len = len.max(1);
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                map_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        let ptr = NonNull::new(addr as *mut u8)
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "mmap returned null"))?;
        Ok(Self { ptr, len: map_len })
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

impl Drop for SharedMapping {
    fn drop(&mut self) {
        let rc = unsafe { libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.len) };
        debug_assert_eq!(rc, 0, "munmap failed: {}", io::Error::last_os_error());
    }
}

/// A zero-initialised `f64` buffer in a shared mapping.
pub struct SharedBuffer {
    map: SharedMapping,
    len: usize,
}

impl SharedBuffer {
    pub fn zeroed(len: usize) -> io::Result<Self> {
        let bytes = len
            .checked_mul(core::mem::size_of::<f64>())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "buffer too large"))?;
        Ok(Self {
            map: SharedMapping::new(bytes)?,
            len,
        })
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut f64 {
        self.map.as_ptr() as *mut f64
    }

    pub fn as_slice(&self) -> &[f64] {
        unsafe { core::slice::from_raw_parts(self.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        unsafe { core::slice::from_raw_parts_mut(self.as_ptr(), self.len) }
    }
}

/// A single `T` living in its own shared mapping.
///
/// The value is constructed in place and never moves, which is what
/// process-shared primitives like `sem_t` require.
pub struct SharedCell<T> {
    map: SharedMapping,
    _marker: PhantomData<T>,
}

unsafe impl<T: Send> Send for SharedCell<T> {}
unsafe impl<T: Sync> Sync for SharedCell<T> {}

impl<T> SharedCell<T> {
    /// Map a zeroed slot for `T` and let `init` construct the value in place.
    ///
    /// If `init` fails the slot is unmapped without running `T`'s destructor.
    pub fn try_new_with<E, F>(init: F) -> Result<Self, E>
    where
        E: From<io::Error>,
        F: FnOnce(*mut T) -> Result<(), E>,
    {
        let map = SharedMapping::new(core::mem::size_of::<T>())?;
        debug_assert!(map.as_ptr() as usize % core::mem::align_of::<T>() == 0);
        init(map.as_ptr() as *mut T)?;
        Ok(Self {
            map,
            _marker: PhantomData,
        })
    }

    #[inline]
    fn as_ptr(&self) -> *mut T {
        self.map.as_ptr() as *mut T
    }
}

impl<T> Deref for SharedCell<T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.as_ptr() }
    }
}

impl<T> Drop for SharedCell<T> {
    fn drop(&mut self) {
        unsafe { ptr::drop_in_place(self.as_ptr()) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_is_zeroed() {
        let buf = SharedBuffer::zeroed(64).unwrap();
        assert_eq!(buf.as_slice().len(), 64);
        assert!(buf.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_empty_buffer() {
        let mut buf = SharedBuffer::zeroed(0).unwrap();
        assert!(buf.as_slice().is_empty());
        assert!(buf.as_mut_slice().is_empty());
    }

    #[test]
    fn test_child_writes_are_visible_to_parent() {
        let buf = SharedBuffer::zeroed(4).unwrap();
        let pid = unsafe { libc::fork() };
        assert!(pid >= 0);
        if pid == 0 {
            unsafe {
                buf.as_ptr().add(2).write(42.5);
                libc::_exit(0);
            }
        }
        let mut status = 0;
        assert_eq!(unsafe { libc::waitpid(pid, &mut status, 0) }, pid);
        assert!(libc::WIFEXITED(status));
        assert_eq!(buf.as_slice(), &[0.0, 0.0, 42.5, 0.0]);
    }

    #[test]
    fn test_cell_init_failure_skips_drop() {
        struct Loud;
        impl Drop for Loud {
            fn drop(&mut self) {
                panic!("destructor must not run for an uninitialised slot");
            }
        }
        let result = SharedCell::<Loud>::try_new_with(|_| {
            Err::<(), io::Error>(io::Error::new(io::ErrorKind::Other, "boom"))
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_cell_deref() {
        let cell = SharedCell::<u64>::try_new_with(|slot| {
            unsafe { slot.write(7) };
            Ok::<(), io::Error>(())
        })
        .unwrap();
        assert_eq!(*cell, 7);
    }
}
