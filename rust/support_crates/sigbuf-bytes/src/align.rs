/// Rounds `n` up to the next multiple of `alignment`.
///
/// Returns `None` if the rounded value does not fit in `usize`.
///
/// # Arguments
///
/// * `n` - The number to align up
/// * `alignment` - The alignment boundary (must be a power of 2 and non-zero)
///
/// # Examples
///
/// ```
/// use sigbuf_bytes::align::align_up;
///
/// assert_eq!(align_up(0, 32), Some(0));
/// assert_eq!(align_up(1, 32), Some(32));
/// assert_eq!(align_up(32, 32), Some(32));
/// assert_eq!(align_up(33, 32), Some(64));
/// assert_eq!(align_up(usize::MAX, 32), None);
/// ```
///
/// # Panics
///
/// Panics in debug builds if `alignment` is 0 or not a power of 2.
#[inline]
pub fn align_up(n: usize, alignment: usize) -> Option<usize> {
    debug_assert_ne!(alignment, 0);
    debug_assert!(alignment.is_power_of_two());
    n.checked_add(alignment - 1).map(|n| n & !(alignment - 1))
}

/// Checks if a number is aligned to the specified alignment boundary.
///
/// # Arguments
///
/// * `n` - The number to check for alignment
/// * `alignment` - The alignment boundary to check against (must be a power of 2 and non-zero)
///
/// # Examples
///
/// ```
/// use sigbuf_bytes::align::is_aligned;
///
/// assert!(is_aligned(0, 32));
/// assert!(!is_aligned(1, 32));
/// assert!(!is_aligned(31, 32));
/// assert!(is_aligned(32, 32));
/// assert!(is_aligned(96, 32));
/// assert!(!is_aligned(100, 32));
/// ```
///
/// # Panics
///
/// Panics in debug builds if `alignment` is 0 or not a power of 2.
#[inline]
pub fn is_aligned(n: usize, alignment: usize) -> bool {
    debug_assert_ne!(alignment, 0);
    debug_assert!(alignment.is_power_of_two());
    (n & (alignment - 1)) == 0
}

/// Checks if a pointer address is aligned to the specified alignment boundary.
///
/// Returns `false` if `alignment` is not a power of two.
///
/// # Examples
///
/// ```
/// use sigbuf_bytes::align::is_ptr_aligned;
///
/// let samples = [0f32; 8];
/// assert!(is_ptr_aligned(samples.as_ptr(), 4));
/// assert!(!is_ptr_aligned(samples.as_ptr(), 3));
/// ```
#[inline]
pub fn is_ptr_aligned<T>(ptr: *const T, alignment: usize) -> bool {
    alignment.is_power_of_two() && is_aligned(ptr as usize, alignment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up_boundaries() {
        for alignment in [32, 64, 4096] {
            assert_eq!(align_up(alignment - 1, alignment), Some(alignment));
            assert_eq!(align_up(alignment + 1, alignment), Some(2 * alignment));
            assert!(is_aligned(align_up(12345, alignment).unwrap(), alignment));
        }
        assert_eq!(align_up(usize::MAX - 31, 32), Some(usize::MAX - 31));
        assert_eq!(align_up(usize::MAX - 30, 32), None);
    }
}
