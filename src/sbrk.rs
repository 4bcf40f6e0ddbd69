use std::slice;

use libc::{c_void, intptr_t, sbrk};

use crate::{align_to, arena::Arena, error::GrowError};

/// Returns the current program break.
pub fn program_break() -> usize {
  // SAFETY: `sbrk(0)` only queries the break.
  unsafe { sbrk(0) as usize }
}

/// An arena living on the process heap, grown with `sbrk(2)`.
///
/// ```text
///   low                       high = program break
///   ┌─────────────────────────┐
///   │     arena (blocks)      │ ↑ grows with sbrk(n)
///   └─────────────────────────┘
/// ```
///
/// The arena only owns the bytes between the break it observed at creation
/// and the break after its last successful `grow`. If anything else moves
/// the break in between, growth fails with [`GrowError::Discontiguous`]
/// rather than handing out bytes that are not adjacent to the arena.
///
/// The bytes are never returned: dropping the arena leaves the break where
/// it is.
pub struct SbrkArena {
  low: usize,
  high: usize,
  limit: Option<usize>,
}

impl SbrkArena {
  /// Start alignment of the arena's first byte.
  pub const BASE_ALIGN: usize = 16;

  /// Starts an empty arena at the current program break.
  pub fn new() -> Result<Self, GrowError> {
    let current = program_break();
    let low = align_to!(current, Self::BASE_ALIGN);

    if low != current {
      let pad = low - current;
      // SAFETY: moving the break forward hands us `pad` unused bytes.
      let previous = unsafe { sbrk(pad as intptr_t) };
      if previous == usize::MAX as *mut c_void {
        return Err(GrowError::Refused { requested: pad });
      }
      if previous as usize != current {
        // SAFETY: the pad landed on top of someone else's bytes and was
        // never handed out.
        unsafe { give_back(pad as intptr_t) };
        return Err(GrowError::Discontiguous {
          expected: current,
          found: previous as usize,
        });
      }
    }

    log::debug!("SbrkArena::new() -> {low:#x}");

    Ok(Self {
      low,
      high: low,
      limit: None,
    })
  }

  /// Starts an empty arena that refuses to grow past `limit` bytes.
  pub fn with_limit(limit: usize) -> Result<Self, GrowError> {
    let mut arena = Self::new()?;
    arena.limit = Some(limit);
    Ok(arena)
  }
}

/// Lowers the break by `delta` bytes.
///
/// # Safety
///
/// The top `delta` bytes below the break must have come from this process's
/// last `sbrk` call and must not be in use.
unsafe fn give_back(delta: intptr_t) {
  // SAFETY: guaranteed by the caller.
  let previous = unsafe { sbrk(-delta) };
  if previous == usize::MAX as *mut c_void {
    log::warn!("sbrk(-{delta}) failed, {delta} bytes stay on the heap");
  }
}

impl Arena for SbrkArena {
  fn grow(
    &mut self,
    increment: usize,
  ) -> Result<usize, GrowError> {
    if let Some(limit) = self.limit {
      let remaining = limit - self.len();
      if increment > remaining {
        return Err(GrowError::Exhausted {
          requested: increment,
          remaining,
        });
      }
    }

    let Ok(delta) = intptr_t::try_from(increment) else {
      return Err(GrowError::Refused {
        requested: increment,
      });
    };

    // SAFETY: moving the break forward hands us `increment` unused bytes.
    let previous = unsafe { sbrk(delta) };

    if previous == usize::MAX as *mut c_void {
      return Err(GrowError::Refused {
        requested: increment,
      });
    }

    if previous as usize != self.high {
      // The new bytes sit above someone else's; give them straight back.
      // SAFETY: they are at the top of the break and nobody has seen them.
      unsafe { give_back(delta) };
      return Err(GrowError::Discontiguous {
        expected: self.high,
        found: previous as usize,
      });
    }

    log::debug!("SbrkArena::grow({increment}) -> {:#x}", previous as usize);

    self.high += increment;
    Ok(previous as usize)
  }

  fn low_bound(&self) -> usize {
    self.low
  }

  fn high_bound(&self) -> usize {
    self.high
  }

  fn bytes(&self) -> &[u8] {
    // SAFETY: `low..high` was handed to this arena by `sbrk` and is never
    // given back.
    unsafe { slice::from_raw_parts(self.low as *const u8, self.len()) }
  }

  fn bytes_mut(&mut self) -> &mut [u8] {
    // SAFETY: as in `bytes`; `&mut self` guarantees exclusivity.
    unsafe { slice::from_raw_parts_mut(self.low as *mut u8, self.len()) }
  }
}
