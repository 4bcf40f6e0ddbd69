//! Error types for the allocator and its arena backends.

use thiserror::Error;

/// Errors returned by the free-space manager.
///
/// Every variant is recoverable: the manager leaves the heap exactly as it
/// was before the failing call.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum AllocError {
  /// The request cannot be honored as stated: a zero-byte allocation, or a
  /// payload handle that does not name a live allocated block.
  #[error("invalid request: {reason}")]
  InvalidRequest {
    /// What was wrong with the request.
    reason: &'static str,
  },

  /// The arena refused to grow by the bytes the request needed.
  #[error("out of memory: could not obtain {requested} bytes")]
  OutOfMemory {
    /// Bytes requested from the arena (or the block size that overflowed).
    requested: usize,
    /// Why the arena refused, when it was asked at all.
    #[source]
    cause: Option<GrowError>,
  },

  /// In-arena metadata is inconsistent. Only reported by the consistency
  /// checker or when an internal read runs off the arena.
  #[error("heap corruption at offset {offset:#x}: {reason}")]
  CorruptionDetected {
    /// Arena offset of the offending block or word.
    offset: usize,
    /// Which invariant was violated.
    reason: &'static str,
  },
}

impl AllocError {
  pub(crate) fn invalid(reason: &'static str) -> Self {
    Self::InvalidRequest { reason }
  }

  pub(crate) fn corrupt(
    offset: usize,
    reason: &'static str,
  ) -> Self {
    Self::CorruptionDetected { offset, reason }
  }
}

/// Errors returned by an [`Arena`](crate::arena::Arena) asked to grow.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum GrowError {
  /// The arena's fixed reservation has fewer bytes left than requested.
  #[error("arena exhausted: requested {requested} bytes, {remaining} remaining")]
  Exhausted {
    /// Bytes requested.
    requested: usize,
    /// Bytes still available.
    remaining: usize,
  },

  /// The operating system refused to move the program break.
  #[error("program break refused to grow by {requested} bytes")]
  Refused {
    /// Bytes requested.
    requested: usize,
  },

  /// The program break was moved by someone else, so the new bytes would
  /// not be contiguous with the arena.
  #[error("program break moved outside the arena (expected {expected:#x}, found {found:#x})")]
  Discontiguous {
    /// Where the arena's high bound was.
    expected: usize,
    /// Where the break actually was.
    found: usize,
  },
}
