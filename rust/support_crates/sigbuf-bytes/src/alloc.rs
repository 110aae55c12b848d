//! The allocation seam behind [`AlignedBuffer`](crate::AlignedBuffer).
//!
//! The buffer never grows storage in place: every capacity increase requests
//! a fresh aligned region from its allocator, copies the live bytes over and
//! only then returns the old region.

use std::{alloc::Layout, ptr::NonNull};

/// Source of aligned memory regions for sample buffers.
///
/// # Safety
///
/// Implementors must guarantee that a region returned by `allocate`:
/// - is valid for reads and writes of `layout.size()` bytes,
/// - starts at an address aligned to `layout.align()`,
/// - is fully initialized (callers expose every byte of the region through
///   safe slices),
/// - stays valid until it is passed back to `deallocate` with the same layout.
pub unsafe trait BufferAllocator {
    /// Allocates a region described by `layout`, or returns `None` if the
    /// request cannot be satisfied. `layout.size()` is never zero.
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// Releases a region previously returned by `allocate`.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate` on this allocator (or a clone of it),
    /// `layout` must be the layout it was allocated with, and the region must
    /// not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// The global allocator, handing out zero-filled regions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAllocator;

unsafe impl BufferAllocator for SystemAllocator {
    #[inline]
    fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        debug_assert_ne!(layout.size(), 0);
        NonNull::new(unsafe { std::alloc::alloc_zeroed(layout) })
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::is_ptr_aligned;

    #[test]
    fn test_system_allocator_zeroed_and_aligned() {
        for align in [32, 64, 4096] {
            let layout = Layout::from_size_align(1000, align).unwrap();
            let ptr = SystemAllocator.allocate(layout).unwrap();
            assert!(is_ptr_aligned(ptr.as_ptr(), align));
            let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), 1000) };
            assert!(bytes.iter().all(|&b| b == 0));
            unsafe { SystemAllocator.deallocate(ptr, layout) };
        }
    }
}
