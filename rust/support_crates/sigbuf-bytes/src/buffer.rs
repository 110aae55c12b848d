use std::{
    alloc::Layout,
    ops::{Range, RangeBounds},
    ptr::NonNull,
};

use sigbuf_common::{
    Result,
    error::{Error, ErrorKind},
    verify_arg,
};
use sigbuf_common_traits::memory_owner::{MemoryAllocation, MemoryOwner};

use crate::{
    align::is_ptr_aligned,
    alloc::{BufferAllocator, SystemAllocator},
};

/// Alignment guaranteed for the storage of every [`AlignedBuffer`], suitable for
/// 256-bit vector loads and stores.
pub const MIN_ALIGNMENT: usize = 32;

/// An owning, growable block of sample bytes whose storage is always aligned to
/// at least [`MIN_ALIGNMENT`] bytes.
///
/// `AlignedBuffer` is the carrier type passed between pipeline stages. It has
/// plain value semantics: cloning or assigning copies the bytes, and no two
/// buffers ever share storage.
///
/// # Capacity
///
/// - Capacity never shrinks. Shortening the buffer only changes its length, and
///   the bytes past the new length keep whatever they held before; they become
///   visible again if the length is increased without overwriting them.
/// - Storage is replaced only when a length exceeds the current capacity, and the
///   new region is then exactly as large as that length.
/// - Every replacement is a fresh aligned allocation. The old region is released
///   only after the new one was obtained and filled, so a failed allocation leaves
///   the buffer untouched.
///
/// # Examples
///
/// ```
/// use sigbuf_bytes::AlignedBuffer;
///
/// let mut buf = AlignedBuffer::new();
/// buf.extend_from_slice(&[0x01, 0x02, 0x03]).unwrap();
/// buf.set_len(1).unwrap();
/// buf.extend_from_slice(&[0xAA, 0xBB]).unwrap();
/// assert_eq!(buf.as_slice(), &[0x01, 0xAA, 0xBB]);
/// assert_eq!(buf.capacity(), 3);
/// ```
///
/// A buffer cannot be assigned from itself, the borrow checker rejects it:
///
/// ```compile_fail
/// use sigbuf_bytes::AlignedBuffer;
///
/// let mut buf = AlignedBuffer::from_slice(b"abc").unwrap();
/// buf.assign(&buf).unwrap();
/// ```
pub struct AlignedBuffer<A: BufferAllocator = SystemAllocator> {
    /// Start of the storage, `None` while nothing was allocated.
    ptr: Option<NonNull<u8>>,
    /// Number of valid bytes.
    len: usize,
    /// Size of the storage region.
    capacity: usize,
    /// Alignment of the storage region, a power of two not below `MIN_ALIGNMENT`.
    alignment: usize,
    alloc: A,
}

unsafe impl<A: BufferAllocator + Send> Send for AlignedBuffer<A> {}

unsafe impl<A: BufferAllocator + Sync> Sync for AlignedBuffer<A> {}

impl AlignedBuffer {
    /// Creates a new empty buffer without allocating.
    pub fn new() -> AlignedBuffer {
        AlignedBuffer::new_in(SystemAllocator)
    }

    /// Creates a new empty buffer whose storage will be aligned to `alignment`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` unless `alignment` is a power of two and at least
    /// [`MIN_ALIGNMENT`].
    pub fn with_alignment(alignment: usize) -> Result<AlignedBuffer> {
        AlignedBuffer::with_alignment_in(alignment, SystemAllocator)
    }

    /// Creates a buffer of `len` bytes with unspecified content.
    pub fn with_len(len: usize) -> Result<AlignedBuffer> {
        AlignedBuffer::from_parts(None, len)
    }

    /// Creates a buffer of `len` bytes, copied from the start of `data` when present.
    ///
    /// Without `data` the content is unspecified.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `data` holds fewer than `len` bytes.
    /// - `AllocationFailure` if the storage cannot be allocated.
    pub fn from_parts(data: Option<&[u8]>, len: usize) -> Result<AlignedBuffer> {
        let mut buf = AlignedBuffer::new();
        buf.append_parts(data, len)?;
        log::trace!(
            "AlignedBuffer::from_parts(len={len}, data={}) -> {:p}",
            data.is_some(),
            buf.as_ptr()
        );
        Ok(buf)
    }

    /// Creates a buffer containing a copy of `data`.
    pub fn from_slice(data: &[u8]) -> Result<AlignedBuffer> {
        AlignedBuffer::from_parts(Some(data), data.len())
    }
}

impl<A: BufferAllocator> AlignedBuffer<A> {
    /// Creates a new empty buffer that obtains its storage from `alloc`.
    pub fn new_in(alloc: A) -> AlignedBuffer<A> {
        AlignedBuffer {
            ptr: None,
            len: 0,
            capacity: 0,
            alignment: MIN_ALIGNMENT,
            alloc,
        }
    }

    /// Creates a new empty buffer with the given storage alignment and allocator.
    pub fn with_alignment_in(alignment: usize, alloc: A) -> Result<AlignedBuffer<A>> {
        verify_arg!(alignment, alignment.is_power_of_two());
        verify_arg!(alignment, alignment >= MIN_ALIGNMENT);
        Ok(AlignedBuffer {
            ptr: None,
            len: 0,
            capacity: 0,
            alignment,
            alloc,
        })
    }

    /// Returns the number of valid bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the buffer holds no valid bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the size of the backing storage in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the alignment of the backing storage.
    #[inline]
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Returns a pointer to the storage, or null if nothing was allocated yet.
    ///
    /// A non-null pointer is aligned to [`alignment`](Self::alignment).
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr
            .map_or(std::ptr::null(), |ptr| ptr.as_ptr() as *const u8)
    }

    /// Returns a mutable pointer to the storage, or null if nothing was allocated yet.
    ///
    /// Callers may read and write `len()` bytes through it, including with
    /// aligned vector instructions.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.map_or(std::ptr::null_mut(), |ptr| ptr.as_ptr())
    }

    /// Returns the valid bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        match self.ptr {
            Some(ptr) => unsafe { std::slice::from_raw_parts(ptr.as_ptr(), self.len) },
            None => &[],
        }
    }

    /// Returns the valid bytes for in-place modification.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match self.ptr {
            Some(ptr) => unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), self.len) },
            None => &mut [],
        }
    }

    /// Sets the number of valid bytes.
    ///
    /// Within the current capacity only the length changes: no allocation, no
    /// copy. Beyond it, the storage is replaced by an aligned region of exactly
    /// `new_len` bytes that starts with the previously valid content.
    ///
    /// Bytes between the old and the new length are unspecified: they are either
    /// left over from an earlier, longer content or zero.
    ///
    /// # Errors
    ///
    /// Returns `AllocationFailure` if the storage cannot be replaced; the buffer is
    /// left unchanged.
    pub fn set_len(&mut self, new_len: usize) -> Result<()> {
        if new_len > self.capacity {
            self.reallocate(new_len)?;
        }
        self.len = new_len;
        Ok(())
    }

    /// Makes sure the storage can hold `additional` more bytes without another
    /// allocation. The length is unchanged.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let required = self.checked_len_add(additional)?;
        if required > self.capacity {
            self.reallocate(required)?;
        }
        Ok(())
    }

    /// Shortens the buffer to `len` bytes. Has no effect if `len` is not smaller
    /// than the current length.
    #[inline]
    pub fn truncate(&mut self, len: usize) {
        if len < self.len {
            self.len = len;
        }
    }

    /// Sets the length to zero, keeping the storage.
    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Replaces the content with a copy of `data`.
    pub fn set_content(&mut self, data: &[u8]) -> Result<()> {
        self.set_content_parts(Some(data), data.len())
    }

    /// Replaces the content with a copy of `data`. Same as
    /// [`set_content`](Self::set_content).
    #[inline]
    pub fn assign_slice(&mut self, data: &[u8]) -> Result<()> {
        self.set_content(data)
    }

    /// Replaces the content with `len` bytes, copied from the start of `data` when
    /// present. Without `data` the resulting content is unspecified.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `data` holds fewer than `len` bytes.
    /// - `AllocationFailure` if the storage cannot grow to `len` bytes.
    ///
    /// On error the buffer keeps its previous length and content.
    pub fn set_content_parts(&mut self, data: Option<&[u8]>, len: usize) -> Result<()> {
        if let Some(data) = data {
            verify_arg!(data, data.len() >= len);
        }
        let prev_len = self.len;
        // Growing from an empty length copies nothing into the new region.
        self.len = 0;
        if let Err(e) = self.append_parts(data, len) {
            self.len = prev_len;
            return Err(e);
        }
        Ok(())
    }

    /// Replaces the content with a copy of `other`'s content.
    ///
    /// The storage alignment of `self` is kept.
    pub fn assign<B: BufferAllocator>(&mut self, other: &AlignedBuffer<B>) -> Result<()> {
        self.set_content(other.as_slice())
    }

    /// Appends a copy of `data`.
    #[inline]
    pub fn extend_from_slice(&mut self, data: &[u8]) -> Result<()> {
        self.append_parts(Some(data), data.len())
    }

    /// Appends a copy of `other`'s content.
    pub fn append<B: BufferAllocator>(&mut self, other: &AlignedBuffer<B>) -> Result<()> {
        self.extend_from_slice(other.as_slice())
    }

    /// Extends the buffer by `additional` bytes with unspecified content.
    ///
    /// # Examples
    ///
    /// ```
    /// use sigbuf_bytes::AlignedBuffer;
    ///
    /// let mut buf = AlignedBuffer::from_slice(b"iq").unwrap();
    /// buf.grow(30).unwrap();
    /// assert_eq!(buf.len(), 32);
    /// assert_eq!(&buf[..2], b"iq");
    /// ```
    #[inline]
    pub fn grow(&mut self, additional: usize) -> Result<()> {
        self.append_parts(None, additional)
    }

    /// Extends the buffer by `len` bytes, copied from the start of `data` when
    /// present. Without `data` the appended bytes are unspecified.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `data` holds fewer than `len` bytes.
    /// - `AllocationFailure` if the storage cannot grow; the buffer is left
    ///   unchanged.
    pub fn append_parts(&mut self, data: Option<&[u8]>, len: usize) -> Result<()> {
        if let Some(data) = data {
            verify_arg!(data, data.len() >= len);
        }
        let offset = self.len;
        let new_len = self.checked_len_add(len)?;
        self.set_len(new_len)?;
        if let Some(data) = data {
            self.as_mut_slice()[offset..new_len].copy_from_slice(&data[..len]);
        }
        Ok(())
    }

    /// Appends a copy of the bytes in `range` of this buffer's own content.
    ///
    /// The storage may be replaced while growing; the bytes are copied afterwards
    /// from their new location.
    ///
    /// # Panics
    ///
    /// Panics if `range` is reversed or extends past the current length.
    pub fn extend_from_within(&mut self, range: impl RangeBounds<usize>) -> Result<()> {
        let range = self.verify_range(range);
        let offset = self.len;
        self.append_parts(None, range.end - range.start)?;
        self.as_mut_slice().copy_within(range, offset);
        Ok(())
    }

    /// Creates an independent copy of this buffer with the same alignment.
    ///
    /// The copy's capacity equals the source length.
    pub fn try_clone(&self) -> Result<AlignedBuffer<A>>
    where
        A: Clone,
    {
        let mut copy =
            AlignedBuffer::with_alignment_in(self.alignment, self.alloc.clone())?;
        copy.extend_from_slice(self.as_slice())?;
        Ok(copy)
    }

    /// Checks if the storage is aligned to `alignment` at the given offset.
    ///
    /// Returns `false` while no storage is allocated.
    ///
    /// # Panics
    ///
    /// Panics if the offset is greater than the buffer's length.
    pub fn is_aligned_at(&self, offset: usize, alignment: usize) -> bool {
        assert!(offset <= self.len());
        match self.ptr {
            Some(ptr) => is_ptr_aligned(ptr.as_ptr().wrapping_add(offset), alignment),
            None => false,
        }
    }
}

impl<A: BufferAllocator> AlignedBuffer<A> {
    /// Returns the content as a slice of `T` samples.
    ///
    /// # Panics
    ///
    /// Panics if the length is not a multiple of `size_of::<T>()`, or if `T`
    /// requires an alignment greater than the buffer's.
    #[inline]
    pub fn typed_data<T>(&self) -> &[T]
    where
        T: bytemuck::AnyBitPattern,
    {
        if self.is_empty() {
            return &[];
        }
        bytemuck::cast_slice(self.as_slice())
    }

    /// Returns the content as a mutable slice of `T` samples.
    ///
    /// # Panics
    ///
    /// Same conditions as [`typed_data`](Self::typed_data).
    #[inline]
    pub fn typed_data_mut<T>(&mut self) -> &mut [T]
    where
        T: bytemuck::AnyBitPattern + bytemuck::NoUninit,
    {
        if self.is_empty() {
            return &mut [];
        }
        bytemuck::cast_slice_mut(self.as_mut_slice())
    }

    /// Appends the bytes of `values`.
    #[inline]
    pub fn extend_from_typed_slice<T>(&mut self, values: &[T]) -> Result<()>
    where
        T: bytemuck::NoUninit,
    {
        self.extend_from_slice(bytemuck::cast_slice(values))
    }
}

impl<A: BufferAllocator> AlignedBuffer<A> {
    /// Replaces the storage with a region of `new_capacity` bytes that holds a copy
    /// of the valid content. The old region is released last.
    #[cold]
    fn reallocate(&mut self, new_capacity: usize) -> Result<()> {
        debug_assert!(new_capacity > self.capacity);
        let layout = self.layout(new_capacity)?;
        let Some(new_ptr) = self.alloc.allocate(layout) else {
            log::debug!(
                "AlignedBuffer: failed to allocate {new_capacity} bytes aligned to {}",
                self.alignment
            );
            return Err(Error::allocation_failure(new_capacity, self.alignment));
        };
        assert!(
            is_ptr_aligned(new_ptr.as_ptr(), self.alignment),
            "allocator returned misaligned storage"
        );

        if let Some(old_ptr) = self.ptr {
            unsafe {
                std::ptr::copy_nonoverlapping(old_ptr.as_ptr(), new_ptr.as_ptr(), self.len);
                self.alloc.deallocate(old_ptr, self.storage_layout());
            }
        }

        log::trace!(
            "AlignedBuffer: storage {} -> {new_capacity} bytes at {:p} (len={})",
            self.capacity,
            new_ptr,
            self.len
        );
        self.ptr = Some(new_ptr);
        self.capacity = new_capacity;
        Ok(())
    }

    fn layout(&self, size: usize) -> Result<Layout> {
        Layout::from_size_align(size, self.alignment).map_err(|_| {
            log::debug!(
                "AlignedBuffer: {size} bytes aligned to {} exceed the address space",
                self.alignment
            );
            Error::allocation_failure(size, self.alignment)
        })
    }

    /// Layout of the current storage region.
    #[inline]
    fn storage_layout(&self) -> Layout {
        // SAFETY: the same size and alignment formed a valid layout when the
        // region was allocated.
        unsafe { Layout::from_size_align_unchecked(self.capacity, self.alignment) }
    }

    #[inline]
    fn checked_len_add(&self, additional: usize) -> Result<usize> {
        self.len
            .checked_add(additional)
            .ok_or_else(|| Error::allocation_failure(usize::MAX, self.alignment))
    }

    /// Verifies that the given range is valid for this buffer.
    ///
    /// # Panics
    ///
    /// Panics if:
    /// - The start index is greater than the end index
    /// - The end index is greater than the buffer's length
    /// - Index calculation results in arithmetic overflow
    fn verify_range(&self, range: impl RangeBounds<usize>) -> Range<usize> {
        use core::ops::Bound;

        let len = self.len();

        let start = match range.start_bound() {
            Bound::Included(&n) => n,
            Bound::Excluded(&n) => n.checked_add(1).expect("out of range"),
            Bound::Unbounded => 0,
        };

        let end = match range.end_bound() {
            Bound::Included(&n) => n.checked_add(1).expect("out of range"),
            Bound::Excluded(&n) => n,
            Bound::Unbounded => len,
        };

        assert!(
            start <= end,
            "range start must not be greater than end: {start:?} <= {end:?}",
        );
        assert!(end <= len, "range end out of bounds: {end:?} <= {len:?}");

        start..end
    }
}

impl<A: BufferAllocator> Drop for AlignedBuffer<A> {
    fn drop(&mut self) {
        log::trace!(
            "AlignedBuffer::drop(len={}, cap={}, ptr={:p})",
            self.len,
            self.capacity,
            self.as_ptr()
        );
        if let Some(ptr) = self.ptr.take() {
            unsafe { self.alloc.deallocate(ptr, self.storage_layout()) };
        }
    }
}

impl<A: BufferAllocator> std::ops::Deref for AlignedBuffer<A> {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<A: BufferAllocator> std::ops::DerefMut for AlignedBuffer<A> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl<A: BufferAllocator> AsRef<[u8]> for AlignedBuffer<A> {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl<A: BufferAllocator> AsMut<[u8]> for AlignedBuffer<A> {
    fn as_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

impl<A: BufferAllocator + Clone> Clone for AlignedBuffer<A> {
    fn clone(&self) -> AlignedBuffer<A> {
        self.try_clone().unwrap_or_else(|e| raise_alloc_error(e))
    }
}

impl<A: BufferAllocator, B: BufferAllocator> PartialEq<AlignedBuffer<B>> for AlignedBuffer<A> {
    fn eq(&self, other: &AlignedBuffer<B>) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<A: BufferAllocator> Eq for AlignedBuffer<A> {}

impl<A: BufferAllocator> PartialEq<[u8]> for AlignedBuffer<A> {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_slice() == other
    }
}

impl<A: BufferAllocator> std::fmt::Debug for AlignedBuffer<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("values", &self.as_slice())
            .field("len", &self.len)
            .field("cap", &self.capacity)
            .field("alignment", &self.alignment)
            .finish_non_exhaustive()
    }
}

impl<A: BufferAllocator + Default> Default for AlignedBuffer<A> {
    fn default() -> Self {
        AlignedBuffer::new_in(A::default())
    }
}

impl<A: BufferAllocator> std::io::Write for AlignedBuffer<A> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.extend_from_slice(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl TryFrom<&[u8]> for AlignedBuffer {
    type Error = Error;

    fn try_from(data: &[u8]) -> Result<AlignedBuffer> {
        AlignedBuffer::from_slice(data)
    }
}

impl TryFrom<&Vec<u8>> for AlignedBuffer {
    type Error = Error;

    fn try_from(data: &Vec<u8>) -> Result<AlignedBuffer> {
        AlignedBuffer::from_slice(data)
    }
}

impl TryFrom<Vec<u8>> for AlignedBuffer {
    type Error = Error;

    fn try_from(data: Vec<u8>) -> Result<AlignedBuffer> {
        AlignedBuffer::from_slice(&data)
    }
}

unsafe impl<A: BufferAllocator> MemoryOwner for AlignedBuffer<A> {
    fn memory(&self) -> MemoryAllocation {
        MemoryAllocation {
            ptr: self.as_ptr(),
            len: self.len,
            capacity: self.capacity,
            alignment: self.alignment,
        }
    }
}

/// Reports a failed allocation from an infallible context, the way the standard
/// collections do.
#[cold]
fn raise_alloc_error(e: Error) -> ! {
    if let ErrorKind::AllocationFailure { size, alignment } = *e.kind() {
        if let Ok(layout) = Layout::from_size_align(size, alignment) {
            std::alloc::handle_alloc_error(layout);
        }
    }
    panic!("{e}");
}
