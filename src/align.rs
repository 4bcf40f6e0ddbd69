/// Granularity every block size and payload offset is a multiple of.
pub const ALIGNMENT: usize = 8;

/// Rounds `value` up to the allocator's 8-byte granularity.
///
/// # Examples
///
/// ```rust
/// use tagalloc::align;
///
/// assert_eq!(align!(13), 16);
/// assert_eq!(align!(16), 16);
/// assert_eq!(align!(0), 0);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align_to!($value, $crate::align::ALIGNMENT)
  };
}

/// Rounds `value` up to a multiple of `align`, which must be a power of two.
///
/// # Examples
///
/// ```rust
/// use tagalloc::align_to;
///
/// assert_eq!(align_to!(4097, 4096), 8192);
/// assert_eq!(align_to!(3, 2), 4);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $align:expr) => {
    ($value + $align - 1) & !($align - 1)
  };
}

/// Overflow-checked form of [`align!`], for sizes that come from clients.
pub fn checked_align(value: usize) -> Option<usize> {
  value
    .checked_add(ALIGNMENT - 1)
    .map(|padded| padded & !(ALIGNMENT - 1))
}
