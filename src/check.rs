//! Heap walking and consistency checking.
//!
//! None of this is needed for allocation itself. It exists so tests and
//! trace-driven harnesses can inspect the heap and verify its invariants
//! after every operation.

use std::collections::BTreeSet;

use crate::arena::Arena;
use crate::block::{Block, BlockState, MIN_BLOCK_SIZE, OVERHEAD, Payload, Tag};
use crate::error::AllocError;
use crate::free_list::Ring;
use crate::manager::FreeSpaceManager;

/// One block as seen by an address-order walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
  pub block: Block,
  pub size: usize,
  pub allocated: bool,
}

impl BlockInfo {
  pub fn payload(&self) -> Payload {
    self.block.payload()
  }

  pub fn payload_capacity(&self) -> usize {
    self.size - OVERHEAD
  }

  pub fn is_sentinel(&self) -> bool {
    self.block == Block::SENTINEL
  }
}

/// Address-order walk over every block, sentinel included.
///
/// Stops with an error if a header's size would step outside the arena.
pub struct Blocks<'a> {
  bytes: &'a [u8],
  cursor: usize,
  done: bool,
}

impl Iterator for Blocks<'_> {
  type Item = Result<BlockInfo, AllocError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.done || self.cursor == self.bytes.len() {
      return None;
    }

    let block = Block::at(self.cursor);
    let tag = match block.tag(self.bytes) {
      Ok(tag) => tag,
      Err(e) => {
        self.done = true;
        return Some(Err(e));
      }
    };

    let size = tag.size();
    if size < MIN_BLOCK_SIZE {
      self.done = true;
      return Some(Err(AllocError::corrupt(
        self.cursor,
        "block smaller than the minimum block size",
      )));
    }
    if size > self.bytes.len() - self.cursor {
      self.done = true;
      return Some(Err(AllocError::corrupt(
        self.cursor,
        "block runs past the end of the arena",
      )));
    }

    self.cursor += size;
    Some(Ok(BlockInfo {
      block,
      size,
      allocated: tag.is_allocated(),
    }))
  }
}

/// Summary of the heap produced by [`FreeSpaceManager::check_heap`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
  /// Bytes between the arena's bounds.
  pub arena_bytes: usize,
  /// Client blocks currently allocated (the sentinel is not counted).
  pub allocated_blocks: usize,
  /// Total size of client blocks, metadata included.
  pub allocated_bytes: usize,
  /// Usable payload bytes across client blocks.
  pub payload_bytes: usize,
  pub free_blocks: usize,
  pub free_bytes: usize,
  pub largest_free: usize,
}

impl HeapStats {
  /// Fraction of the arena handed out as usable payload.
  pub fn utilization(&self) -> f64 {
    if self.arena_bytes == 0 {
      return 0.0;
    }
    self.payload_bytes as f64 / self.arena_bytes as f64
  }
}

impl<A: Arena> FreeSpaceManager<A> {
  /// Walks every block in address order.
  pub fn blocks(&self) -> Blocks<'_> {
    Blocks {
      bytes: self.arena().bytes(),
      cursor: 0,
      done: false,
    }
  }

  /// Verifies every structural invariant of the heap.
  ///
  /// * blocks tile the arena exactly, each at least the minimum size;
  /// * header and footer agree on every block;
  /// * no two neighbors are both free;
  /// * the free list holds exactly the free blocks, with symmetric links.
  ///
  /// Returns a [`HeapStats`] summary, or the first violation found as
  /// [`AllocError::CorruptionDetected`].
  pub fn check_heap(&self) -> Result<HeapStats, AllocError> {
    let bytes = self.arena().bytes();

    let mut stats = HeapStats {
      arena_bytes: bytes.len(),
      ..HeapStats::default()
    };
    let mut free = BTreeSet::new();
    let mut prev_free = false;

    if Block::SENTINEL.tag(bytes)? != Tag::pack(MIN_BLOCK_SIZE, true) {
      return Err(AllocError::corrupt(0, "sentinel block is damaged"));
    }

    for info in self.blocks() {
      let info = info?;
      let offset = info.block.offset();
      let header = info.block.tag(bytes)?;

      if header.word() & 0x6 != 0 {
        return Err(AllocError::corrupt(offset, "reserved tag bits are set"));
      }
      if info.block.footer_tag(bytes, info.size)? != header {
        return Err(AllocError::corrupt(offset, "header does not match footer"));
      }
      if !info.allocated && prev_free {
        return Err(AllocError::corrupt(offset, "adjacent free blocks were not coalesced"));
      }
      prev_free = !info.allocated;

      if info.is_sentinel() {
        continue;
      }
      if info.allocated {
        stats.allocated_blocks += 1;
        stats.allocated_bytes += info.size;
        stats.payload_bytes += info.payload_capacity();
      } else {
        stats.free_blocks += 1;
        stats.free_bytes += info.size;
        stats.largest_free = stats.largest_free.max(info.size);
        free.insert(info.block);
      }
    }

    for member in Ring::new(bytes) {
      let member = member?;
      let offset = member.offset();

      if !free.remove(&member) {
        return Err(AllocError::corrupt(
          offset,
          "free list holds a block that is not a free heap block",
        ));
      }

      match member.state(bytes)? {
        BlockState::Free { next, prior } => {
          if next.prior(bytes)? != member || prior.next(bytes)? != member {
            return Err(AllocError::corrupt(offset, "free list links are not symmetric"));
          }
        }
        BlockState::Allocated => {
          return Err(AllocError::corrupt(offset, "allocated block on the free list"));
        }
      }
    }

    if Block::SENTINEL.next(bytes)?.prior(bytes)? != Block::SENTINEL {
      return Err(AllocError::corrupt(0, "free list links are not symmetric"));
    }

    if let Some(missing) = free.first() {
      return Err(AllocError::corrupt(
        missing.offset(),
        "free block missing from the free list",
      ));
    }

    Ok(stats)
  }
}
