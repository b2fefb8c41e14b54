use std::alloc::{self, Layout};
use std::ptr::NonNull;

use crate::error::TryReserveError;

/// Uninitialized storage for `cap` values of `T`.
///
/// The buffer only owns the allocation: it never reads, writes or drops the
/// values in its slots. Zero-sized types and zero capacities never touch the
/// allocator.
#[derive(Debug)]
pub struct Buffer<T> {
    pub ptr: NonNull<T>,
    pub cap: usize,
}

unsafe impl<T: Send> Send for Buffer<T> {}
unsafe impl<T: Sync> Sync for Buffer<T> {}

impl<T> Buffer<T> {
    pub const fn new() -> Self {
        Buffer {
            ptr: NonNull::dangling(),
            cap: 0,
        }
    }

    pub fn try_with_capacity(cap: usize) -> Result<Self, TryReserveError> {
        let layout = Layout::array::<T>(cap).map_err(|_| TryReserveError::CapacityOverflow)?;

        if layout.size() == 0 {
            return Ok(Buffer {
                ptr: NonNull::dangling(),
                cap,
            });
        }

        let ptr = unsafe { alloc::alloc(layout) } as *mut T;
        match NonNull::new(ptr) {
            Some(ptr) => Ok(Buffer { ptr, cap }),
            None => Err(TryReserveError::AllocError { layout }),
        }
    }

    /// Like [`try_with_capacity`], but panics on capacity overflow and aborts
    /// through [`alloc::handle_alloc_error`] when the allocator fails.
    ///
    /// [`try_with_capacity`]: Buffer::try_with_capacity
    pub fn with_capacity(cap: usize) -> Self {
        match Self::try_with_capacity(cap) {
            Ok(buf) => buf,
            Err(TryReserveError::CapacityOverflow) => panic!("capacity overflow"),
            Err(TryReserveError::AllocError { layout }) => alloc::handle_alloc_error(layout),
        }
    }

    /// Pointer to `slot`.
    ///
    /// # Safety
    ///
    /// `slot` must be less than `cap`.
    #[inline]
    pub unsafe fn slot_ptr(&self, slot: usize) -> *mut T {
        debug_assert!(slot < self.cap || self.cap == 0);
        self.ptr.as_ptr().add(slot)
    }
}

impl<T> Drop for Buffer<T> {
    fn drop(&mut self) {
        if let Ok(layout) = Layout::array::<T>(self.cap) {
            if layout.size() != 0 {
                unsafe {
                    alloc::dealloc(self.ptr.as_ptr() as *mut u8, layout);
                }
            }
        }
    }
}
