//! The growable byte arena the manager carves blocks from.

use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::slice;

use crate::error::GrowError;

/// A contiguous region of bytes that only ever grows at its high end.
///
/// Bounds are addresses. `bytes()` always covers exactly
/// `low_bound()..high_bound()`, and growing never moves existing bytes.
pub trait Arena {
  /// Extends the arena by `increment` bytes and returns the previous high
  /// bound, which is where the new bytes start.
  ///
  /// On failure the arena must be left exactly as it was. Returning any
  /// other address on success breaks the manager: it reports
  /// [`AllocError::CorruptionDetected`](crate::AllocError::CorruptionDetected)
  /// and the heap is unusable from then on.
  fn grow(
    &mut self,
    increment: usize,
  ) -> Result<usize, GrowError>;

  /// Address of the first byte of the arena.
  fn low_bound(&self) -> usize;

  /// Address one past the last byte of the arena.
  fn high_bound(&self) -> usize;

  fn bytes(&self) -> &[u8];

  fn bytes_mut(&mut self) -> &mut [u8];

  /// Current size of the arena in bytes.
  fn len(&self) -> usize {
    self.high_bound() - self.low_bound()
  }

  fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// An arena backed by one fixed heap reservation with a movable break.
///
/// The whole capacity is reserved (zeroed) up front, so the arena's
/// addresses are stable. `grow` only moves the break and fails once the
/// reservation is used up, which makes exhaustion easy to provoke.
///
/// ```text
///   base                     break                       base + capacity
///   ┌────────────────────────┬──────────────────────────────────────┐
///   │     arena (blocks)     │         reserved, not yet grown      │
///   └────────────────────────┴──────────────────────────────────────┘
/// ```
pub struct MemArena {
  base: NonNull<u8>,
  layout: Layout,
  capacity: usize,
  brk: usize,
}

// The reservation is exclusively owned.
unsafe impl Send for MemArena {}

impl MemArena {
  /// Reservation size when none is given: 20 MiB.
  pub const DEFAULT_CAPACITY: usize = 20 * (1 << 20);

  /// Alignment of the reservation's first byte.
  pub const BASE_ALIGN: usize = 16;

  /// Reserves `capacity` bytes.
  ///
  /// # Panics
  ///
  /// Panics if `capacity` exceeds `isize::MAX` rounded down to
  /// [`BASE_ALIGN`](Self::BASE_ALIGN), and aborts if the reservation itself
  /// cannot be allocated, mirroring `Vec::with_capacity`.
  pub fn new(capacity: usize) -> Self {
    // Zero-sized allocations are not allowed, so reserve at least one unit.
    let layout = Layout::from_size_align(capacity.max(Self::BASE_ALIGN), Self::BASE_ALIGN)
      .unwrap_or_else(|_| panic!("arena capacity {capacity} overflows isize"));

    // SAFETY: `layout` has a non-zero size.
    let raw = unsafe { alloc::alloc_zeroed(layout) };
    let Some(base) = NonNull::new(raw) else {
      alloc::handle_alloc_error(layout);
    };

    log::debug!("MemArena::new({capacity}) -> {:#x}", base.as_ptr() as usize);

    Self {
      base,
      layout,
      capacity,
      brk: 0,
    }
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Bytes that can still be grown into.
  pub fn remaining(&self) -> usize {
    self.capacity - self.brk
  }
}

impl Default for MemArena {
  fn default() -> Self {
    Self::new(Self::DEFAULT_CAPACITY)
  }
}

impl Drop for MemArena {
  fn drop(&mut self) {
    // SAFETY: `base` came from `alloc_zeroed` with this exact layout.
    unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) };
  }
}

impl Arena for MemArena {
  fn grow(
    &mut self,
    increment: usize,
  ) -> Result<usize, GrowError> {
    if increment > self.remaining() {
      log::debug!(
        "MemArena::grow({increment}) refused, {} bytes remaining",
        self.remaining()
      );
      return Err(GrowError::Exhausted {
        requested: increment,
        remaining: self.remaining(),
      });
    }

    let previous = self.high_bound();
    self.brk += increment;
    Ok(previous)
  }

  fn low_bound(&self) -> usize {
    self.base.as_ptr() as usize
  }

  fn high_bound(&self) -> usize {
    self.low_bound() + self.brk
  }

  fn bytes(&self) -> &[u8] {
    // SAFETY: the first `brk` bytes lie inside the zero-initialized
    // reservation, which lives as long as `self`.
    unsafe { slice::from_raw_parts(self.base.as_ptr(), self.brk) }
  }

  fn bytes_mut(&mut self) -> &mut [u8] {
    // SAFETY: as in `bytes`; `&mut self` guarantees exclusivity.
    unsafe { slice::from_raw_parts_mut(self.base.as_ptr(), self.brk) }
  }
}
