//! In-arena block layout.
//!
//! ```text
//!   Allocated block:
//!   ┌──────────┬──────────────────────────────────┬──────────┐
//!   │ size | 1 │            payload               │ size | 1 │
//!   └──────────┴──────────────────────────────────┴──────────┘
//!    header                                         footer
//!
//!   Free block:
//!   ┌──────────┬──────────┬──────────┬────────────┬──────────┐
//!   │ size | 0 │   next   │  prior   │  (unused)  │ size | 0 │
//!   └──────────┴──────────┴──────────┴────────────┴──────────┘
//! ```
//!
//! Blocks are named by the arena offset of their header. Links hold the
//! header offsets of ring neighbors.

use std::fmt;

use crate::error::AllocError;
use crate::raw::{WORD_SIZE, read_word, write_word};

pub const HEADER_SIZE: usize = WORD_SIZE;
pub const FOOTER_SIZE: usize = WORD_SIZE;

/// Per-block metadata that is never available to the client.
pub const OVERHEAD: usize = HEADER_SIZE + FOOTER_SIZE;

/// Header, footer and the two ring links a free block must hold.
pub const MIN_BLOCK_SIZE: usize = OVERHEAD + 2 * WORD_SIZE;

const ALLOCATED_BIT: u64 = 0x1;
const SIZE_MASK: u64 = !0x7;

/// Packed `(size, allocated)` boundary tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tag(u64);

impl Tag {
  pub const fn pack(
    size: usize,
    allocated: bool,
  ) -> Self {
    Self(size as u64 | allocated as u64)
  }

  pub const fn from_word(word: u64) -> Self {
    Self(word)
  }

  pub const fn word(self) -> u64 {
    self.0
  }

  pub const fn size(self) -> usize {
    (self.0 & SIZE_MASK) as usize
  }

  pub const fn is_allocated(self) -> bool {
    self.0 & ALLOCATED_BIT != 0
  }

  pub const fn with_allocated(
    self,
    allocated: bool,
  ) -> Self {
    Self::pack(self.size(), allocated)
  }
}

/// What a block's payload bytes currently mean.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockState {
  /// On the free ring; the payload holds the links.
  Free { next: Block, prior: Block },
  /// Owned by the client (or the sentinel).
  Allocated,
}

/// Handle to a block: the arena offset of its header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Block(usize);

impl Block {
  /// The permanently allocated root of the free ring, at the arena's start.
  pub const SENTINEL: Block = Block(0);

  pub(crate) const fn at(offset: usize) -> Self {
    Self(offset)
  }

  pub const fn offset(self) -> usize {
    self.0
  }

  pub const fn payload(self) -> Payload {
    Payload(self.0 + HEADER_SIZE)
  }

  /// The block that starts right after this one, given this one's size.
  pub(crate) const fn following(
    self,
    size: usize,
  ) -> Block {
    Block(self.0 + size)
  }

  /// Offset of the footer of the block physically before this one.
  /// `None` at the arena's low bound.
  pub(crate) fn preceding_footer(self) -> Option<usize> {
    self.0.checked_sub(FOOTER_SIZE)
  }

  const fn next_link(self) -> usize {
    self.0 + HEADER_SIZE
  }

  const fn prior_link(self) -> usize {
    self.0 + HEADER_SIZE + WORD_SIZE
  }

  pub(crate) fn tag(
    self,
    bytes: &[u8],
  ) -> Result<Tag, AllocError> {
    read_word(bytes, self.0).map(Tag::from_word)
  }

  pub(crate) fn footer_tag(
    self,
    bytes: &[u8],
    size: usize,
  ) -> Result<Tag, AllocError> {
    let footer = self
      .0
      .checked_add(size)
      .and_then(|end| end.checked_sub(FOOTER_SIZE))
      .ok_or(AllocError::corrupt(self.0, "block too small for a footer"))?;
    read_word(bytes, footer).map(Tag::from_word)
  }

  /// Writes the same tag to header and footer.
  pub(crate) fn set_tags(
    self,
    bytes: &mut [u8],
    tag: Tag,
  ) -> Result<(), AllocError> {
    if tag.size() < OVERHEAD {
      return Err(AllocError::corrupt(self.0, "block too small for a footer"));
    }
    write_word(bytes, self.0, tag.word())?;
    write_word(bytes, self.0 + tag.size() - FOOTER_SIZE, tag.word())
  }

  pub(crate) fn next(
    self,
    bytes: &[u8],
  ) -> Result<Block, AllocError> {
    read_word(bytes, self.next_link()).map(|word| Block(word as usize))
  }

  pub(crate) fn prior(
    self,
    bytes: &[u8],
  ) -> Result<Block, AllocError> {
    read_word(bytes, self.prior_link()).map(|word| Block(word as usize))
  }

  pub(crate) fn set_next(
    self,
    bytes: &mut [u8],
    next: Block,
  ) -> Result<(), AllocError> {
    write_word(bytes, self.next_link(), next.0 as u64)
  }

  pub(crate) fn set_prior(
    self,
    bytes: &mut [u8],
    prior: Block,
  ) -> Result<(), AllocError> {
    write_word(bytes, self.prior_link(), prior.0 as u64)
  }

  /// Decodes the block's state. The sentinel reads as `Allocated` even
  /// though it carries links.
  pub(crate) fn state(
    self,
    bytes: &[u8],
  ) -> Result<BlockState, AllocError> {
    if self.tag(bytes)?.is_allocated() {
      return Ok(BlockState::Allocated);
    }
    Ok(BlockState::Free {
      next: self.next(bytes)?,
      prior: self.prior(bytes)?,
    })
  }
}

impl fmt::Display for Block {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "block@{:#x}", self.0)
  }
}

/// Handle to a client payload: the arena offset of its first usable byte.
///
/// Payload handles are only meaningful for the manager that returned them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[must_use]
pub struct Payload(usize);

impl Payload {
  #[cfg(test)]
  pub(crate) const fn at(offset: usize) -> Self {
    Self(offset)
  }

  pub const fn offset(self) -> usize {
    self.0
  }

  /// The block whose header sits right before this payload.
  pub(crate) fn block(self) -> Option<Block> {
    self.0.checked_sub(HEADER_SIZE).map(Block)
  }
}

impl fmt::Display for Payload {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "payload@{:#x}", self.0)
  }
}
