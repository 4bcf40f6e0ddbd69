//! The free list: a circular, doubly-linked ring of free blocks anchored at
//! the sentinel.
//!
//! ```text
//!        ┌────────────────────────────────────────────┐
//!        ▼                                            │
//!   ┌──────────┐  next  ┌────────┐  next  ┌────────┐  │
//!   │ sentinel │ ─────► │ free A │ ─────► │ free B │ ─┘
//!   └──────────┘ ◄───── └────────┘ ◄───── └────────┘
//!                 prior            prior
//! ```
//!
//! Blocks are pushed at the front, so traversal visits the most recently
//! freed block first. Ring order has nothing to do with address order.

use crate::block::{Block, MIN_BLOCK_SIZE};
use crate::error::AllocError;

/// Installs the empty ring: the sentinel links to itself.
pub(crate) fn init(bytes: &mut [u8]) -> Result<(), AllocError> {
  Block::SENTINEL.set_next(bytes, Block::SENTINEL)?;
  Block::SENTINEL.set_prior(bytes, Block::SENTINEL)
}

/// Links `block` in right after the sentinel.
pub(crate) fn push_front(
  bytes: &mut [u8],
  block: Block,
) -> Result<(), AllocError> {
  let first = Block::SENTINEL.next(bytes)?;

  block.set_next(bytes, first)?;
  block.set_prior(bytes, Block::SENTINEL)?;
  first.set_prior(bytes, block)?;
  Block::SENTINEL.set_next(bytes, block)
}

/// Splices `block` out of the ring.
pub(crate) fn unlink(
  bytes: &mut [u8],
  block: Block,
) -> Result<(), AllocError> {
  let next = block.next(bytes)?;
  let prior = block.prior(bytes)?;

  prior.set_next(bytes, next)?;
  next.set_prior(bytes, prior)
}

/// First block in ring order whose size is at least `block_size`.
pub(crate) fn find_fit(
  bytes: &[u8],
  block_size: usize,
) -> Result<Option<Block>, AllocError> {
  for block in Ring::new(bytes) {
    let block = block?;
    if block.tag(bytes)?.size() >= block_size {
      return Ok(Some(block));
    }
  }
  Ok(None)
}

/// Walks the ring from the sentinel's successor back to the sentinel.
///
/// The walk is bounded by how many blocks could possibly fit in the arena,
/// so a corrupted ring ends in an error instead of looping forever.
pub(crate) struct Ring<'a> {
  bytes: &'a [u8],
  cursor: Block,
  steps_left: usize,
  done: bool,
}

impl<'a> Ring<'a> {
  pub(crate) fn new(bytes: &'a [u8]) -> Self {
    Self {
      bytes,
      cursor: Block::SENTINEL,
      steps_left: bytes.len() / MIN_BLOCK_SIZE,
      done: false,
    }
  }
}

impl Iterator for Ring<'_> {
  type Item = Result<Block, AllocError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.done {
      return None;
    }

    let next = match self.cursor.next(self.bytes) {
      Ok(next) => next,
      Err(e) => {
        self.done = true;
        return Some(Err(e));
      }
    };

    if next == Block::SENTINEL {
      self.done = true;
      return None;
    }

    if self.steps_left == 0 {
      self.done = true;
      return Some(Err(AllocError::corrupt(
        next.offset(),
        "free list does not return to the sentinel",
      )));
    }

    self.steps_left -= 1;
    self.cursor = next;
    Some(Ok(next))
  }
}
