//! Sample buffers for signal-processing pipelines: owned, growable byte blocks
//! whose storage is always aligned for vector access.
//!
//! [`AlignedBuffer`] is the common carrier type between pipeline stages. Its
//! storage start is aligned to at least [`MIN_ALIGNMENT`] bytes no matter how the
//! buffer was filled or resized, so stages can run SIMD kernels directly against
//! [`AlignedBuffer::as_mut_ptr`].

pub mod align;
pub mod alloc;
pub mod buffer;

pub use alloc::{BufferAllocator, SystemAllocator};
pub use buffer::{AlignedBuffer, MIN_ALIGNMENT};
