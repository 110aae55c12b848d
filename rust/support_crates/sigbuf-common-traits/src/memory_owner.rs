//! `MemoryOwner`: a trait for types that own aligned sample memory.

/// A trait for types that own an aligned block of sample bytes.
///
/// Pipeline stages use it to obtain the pointer and length they run vectorized
/// kernels against, without depending on the concrete buffer type.
///
/// # Safety
///
/// Implementors must guarantee that:
/// - `ptr` is either null (only when `capacity` is zero) or valid for reads of
///   `capacity` bytes until the owner is next mutated or dropped.
/// - The memory is exclusively owned by the `MemoryOwner` instance and never
///   shared with another owner.
/// - `ptr` is aligned to `alignment`, and `alignment` is a power of two that is
///   at least 32.
/// - `len <= capacity`, and the first `len` bytes are initialized.
pub unsafe trait MemoryOwner {
    /// Returns information about the owned memory block.
    fn memory(&self) -> MemoryAllocation;
}

/// Describes a block of owned memory.
#[derive(Debug, Clone)]
pub struct MemoryAllocation {
    /// Pointer to the start of the memory, null for an unallocated owner.
    pub ptr: *const u8,
    /// Number of valid bytes.
    pub len: usize,
    /// Number of bytes backing the allocation.
    pub capacity: usize,
    /// Guaranteed alignment of `ptr`.
    pub alignment: usize,
}

impl MemoryAllocation {
    /// Returns `true` if the owner holds no backing allocation.
    pub fn is_unallocated(&self) -> bool {
        self.ptr.is_null()
    }
}
