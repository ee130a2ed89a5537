//! Unnamed process-shared POSIX semaphore.
//!
//! The semaphore lives inside a shared mapping rather than in the kernel's
//! named-semaphore namespace, so its lifetime is the mapping's lifetime and a
//! crashed run leaves nothing behind for the next one to collide with.

use core::cell::UnsafeCell;
use std::io;

#[repr(C)]
pub struct Semaphore {
    raw: UnsafeCell<libc::sem_t>,
}

unsafe impl Send for Semaphore {}
unsafe impl Sync for Semaphore {}

impl Semaphore {
    /// Initialise a semaphore in place with `value` permits.
    ///
    /// # Safety
    /// `slot` must be valid for writes, must not move afterwards, and must be
    /// visible to every process that will use it (a `MAP_SHARED` mapping).
    pub unsafe fn init_at(slot: *mut Semaphore, value: u32) -> io::Result<()> {
        let raw = UnsafeCell::raw_get(core::ptr::addr_of!((*slot).raw));
        // pshared = 1: the semaphore may be used from forked children.
        if libc::sem_init(raw, 1, value) != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Block until a permit is available, then hold it until the guard drops.
    pub fn acquire(&self) -> SemaphoreGuard<'_> {
        loop {
            if unsafe { libc::sem_wait(self.raw.get()) } == 0 {
                return SemaphoreGuard { sem: self };
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                // Only EINVAL is possible here, which means the slot was never initialised.
                panic!("sem_wait failed: {err}");
            }
        }
    }

    #[cfg(test)]
    fn value(&self) -> i32 {
        let mut value = 0;
        unsafe { libc::sem_getvalue(self.raw.get(), &mut value) };
        value
    }

    fn release(&self) {
        let rc = unsafe { libc::sem_post(self.raw.get()) };
        debug_assert_eq!(rc, 0, "sem_post failed: {}", io::Error::last_os_error());
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe { libc::sem_destroy(self.raw.get()) };
    }
}

/// Holds one permit; releases it on drop.
pub struct SemaphoreGuard<'a> {
    sem: &'a Semaphore,
}

impl Drop for SemaphoreGuard<'_> {
    fn drop(&mut self) {
        self.sem.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{SharedBuffer, SharedCell};

    fn binary() -> SharedCell<Semaphore> {
        SharedCell::try_new_with(|slot| unsafe { Semaphore::init_at(slot, 1) }).unwrap()
    }

    #[test]
    fn test_guard_releases_permit() {
        let sem = binary();
        assert_eq!(sem.value(), 1);
        {
            let _guard = sem.acquire();
            assert_eq!(sem.value(), 0);
        }
        assert_eq!(sem.value(), 1);
    }

    #[test]
    fn test_mutual_exclusion_across_processes() {
        const CHILDREN: usize = 4;
        const ROUNDS: usize = 2000;

        let sem = binary();
        let counter = SharedBuffer::zeroed(1).unwrap();

        let mut pids = Vec::new();
        for _ in 0..CHILDREN {
            let pid = unsafe { libc::fork() };
            assert!(pid >= 0);
            if pid == 0 {
                for _ in 0..ROUNDS {
                    let _guard = sem.acquire();
                    unsafe {
                        let slot = counter.as_ptr();
                        let v = slot.read_volatile();
                        slot.write_volatile(v + 1.0);
                    }
                }
                unsafe { libc::_exit(0) };
            }
            pids.push(pid);
        }

        for pid in pids {
            let mut status = 0;
            assert_eq!(unsafe { libc::waitpid(pid, &mut status, 0) }, pid);
            assert!(libc::WIFEXITED(status) && libc::WEXITSTATUS(status) == 0);
        }

        assert_eq!(counter.as_slice()[0], (CHILDREN * ROUNDS) as f64);
        assert_eq!(sem.value(), 1);
    }
}
