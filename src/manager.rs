use crate::arena::{Arena, MemArena};
use crate::block::{Block, FOOTER_SIZE, MIN_BLOCK_SIZE, OVERHEAD, Payload, Tag};
use crate::config::ManagerConfig;
use crate::error::AllocError;
use crate::raw::read_word;
use crate::{align, free_list};

/// First-fit, boundary-tag allocator over a single growable [`Arena`].
///
/// All bookkeeping lives inside the arena: a header and footer word on every
/// block, and ring links inside free payloads. The manager itself only holds
/// the arena and its configuration.
pub struct FreeSpaceManager<A: Arena = MemArena> {
  arena: A,
  config: ManagerConfig,
}

impl FreeSpaceManager<MemArena> {
  /// Manager over a fresh [`MemArena`] of `capacity` bytes with the default
  /// configuration.
  pub fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
    Self::initialize(MemArena::new(capacity), ManagerConfig::default())
  }
}

impl<A: Arena> FreeSpaceManager<A> {
  /// Takes ownership of an empty arena and installs the sentinel block.
  ///
  /// ```text
  ///   ┌──────────┬──────────┬──────────┬──────────┐
  ///   │ 32 | 1   │ next = 0 │ prior = 0│ 32 | 1   │
  ///   └──────────┴──────────┴──────────┴──────────┘
  ///   offset 0                                   32 = high bound
  /// ```
  pub fn initialize(
    mut arena: A,
    config: ManagerConfig,
  ) -> Result<Self, AllocError> {
    if !arena.is_empty() {
      return Err(AllocError::invalid("arena already holds blocks"));
    }

    arena
      .grow(MIN_BLOCK_SIZE)
      .map_err(|cause| AllocError::OutOfMemory {
        requested: MIN_BLOCK_SIZE,
        cause: Some(cause),
      })?;

    let bytes = arena.bytes_mut();
    Block::SENTINEL.set_tags(bytes, Tag::pack(MIN_BLOCK_SIZE, true))?;
    free_list::init(bytes)?;

    log::debug!(
      "FreeSpaceManager::initialize() at {:#x}, chunk size {}",
      arena.low_bound(),
      config.chunk_size
    );

    Ok(Self { arena, config })
  }

  pub fn arena(&self) -> &A {
    &self.arena
  }

  pub fn config(&self) -> &ManagerConfig {
    &self.config
  }

  #[cfg(test)]
  pub(crate) fn arena_mut(&mut self) -> &mut A {
    &mut self.arena
  }

  /// Gives the arena back. Every payload handle becomes meaningless.
  pub fn into_arena(self) -> A {
    self.arena
  }

  /// Block size needed for `size` payload bytes.
  fn adjusted_size(size: usize) -> Result<usize, AllocError> {
    size
      .checked_add(OVERHEAD)
      .and_then(align::checked_align)
      .map(|block_size| block_size.max(MIN_BLOCK_SIZE))
      .ok_or(AllocError::OutOfMemory {
        requested: size,
        cause: None,
      })
  }

  /// Allocates a block with at least `size` usable bytes.
  ///
  /// Searches the free list first-fit and grows the arena only on a miss.
  /// A failed call leaves the heap untouched.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<Payload, AllocError> {
    if size == 0 {
      return Err(AllocError::invalid("zero-size allocation"));
    }

    let block_size = Self::adjusted_size(size)?;

    let block = match free_list::find_fit(self.arena.bytes(), block_size)? {
      Some(block) => {
        free_list::unlink(self.arena.bytes_mut(), block)?;
        block
      }
      None => self.extend(block_size)?,
    };

    self.place(block, block_size)?;

    let payload = block.payload();
    log::trace!("allocate({size}) -> {payload} ({block_size} byte block)");
    Ok(payload)
  }

  /// Grows the arena for a `block_size` request and returns the resulting
  /// free block, already merged with a free block at the old top. The block
  /// is not on the free list.
  fn extend(
    &mut self,
    block_size: usize,
  ) -> Result<Block, AllocError> {
    let increment = self.config.extension_for(block_size);
    let old_len = self.arena.len();

    let previous = self
      .arena
      .grow(increment)
      .map_err(|cause| AllocError::OutOfMemory {
        requested: increment,
        cause: Some(cause),
      })?;

    // The arena has already grown; a heap whose new bytes are not where we
    // expect them cannot be repaired.
    if previous != self.arena.low_bound() + old_len {
      return Err(AllocError::corrupt(old_len, "arena grew somewhere other than its end"));
    }

    log::debug!("extended arena by {increment} bytes at offset {old_len:#x}");

    let block = Block::at(old_len);
    block.set_tags(self.arena.bytes_mut(), Tag::pack(increment, false))?;
    self.coalesce(block)
  }

  /// Marks the free, unlinked `block` allocated with `block_size` bytes,
  /// splitting off the rest as a new free block when it is big enough.
  fn place(
    &mut self,
    block: Block,
    block_size: usize,
  ) -> Result<(), AllocError> {
    let bytes = self.arena.bytes_mut();
    let size = block.tag(bytes)?.size();
    let remainder = size - block_size;

    if remainder >= MIN_BLOCK_SIZE {
      block.set_tags(bytes, Tag::pack(block_size, true))?;

      let rest = block.following(block_size);
      rest.set_tags(bytes, Tag::pack(remainder, false))?;
      free_list::push_front(bytes, rest)?;

      log::trace!("split {block} into {block_size} + {remainder}");
    } else {
      block.set_tags(bytes, Tag::pack(size, true))?;
    }

    Ok(())
  }

  /// Merges the free, unlinked `block` with free address-order neighbors,
  /// pulling them off the free list. Returns the merged block, unlinked.
  fn coalesce(
    &mut self,
    block: Block,
  ) -> Result<Block, AllocError> {
    let len = self.arena.len();
    let bytes = self.arena.bytes_mut();

    let mut merged = block;
    let mut size = block.tag(bytes)?.size();

    let next = block.following(size);
    if next.offset() < len {
      let next_tag = next.tag(bytes)?;
      if !next_tag.is_allocated() {
        free_list::unlink(bytes, next)?;
        size += next_tag.size();
        log::trace!("coalesce {block} with next {next}");
      }
    }

    if let Some(footer) = block.preceding_footer() {
      let prev_tag = Tag::from_word(read_word(bytes, footer)?);
      if !prev_tag.is_allocated() {
        let prev = block
          .offset()
          .checked_sub(prev_tag.size())
          .map(Block::at)
          .ok_or(AllocError::corrupt(footer, "previous block starts before the arena"))?;
        free_list::unlink(bytes, prev)?;
        size += prev_tag.size();
        merged = prev;
        log::trace!("coalesce {block} with previous {prev}");
      }
    }

    merged.set_tags(bytes, Tag::pack(size, false))?;
    Ok(merged)
  }

  /// Returns a block to the free list, merging it with free neighbors.
  ///
  /// Handles that do not name a live allocation are rejected on a best
  /// effort basis with [`AllocError::InvalidRequest`].
  pub fn release(
    &mut self,
    payload: Payload,
  ) -> Result<(), AllocError> {
    let (block, tag) = self.validate(payload)?;

    block.set_tags(self.arena.bytes_mut(), tag.with_allocated(false))?;
    let merged = self.coalesce(block)?;
    free_list::push_front(self.arena.bytes_mut(), merged)?;

    log::trace!("release({payload}) -> free {merged}");
    Ok(())
  }

  /// Moves an allocation into a block of `size` bytes.
  ///
  /// * `None` behaves like [`allocate`](Self::allocate).
  /// * `size == 0` releases `payload` and returns `Ok(None)`.
  /// * Otherwise the first `min(size, capacity)` bytes are copied into a
  ///   fresh block and the old one is released. If the fresh allocation
  ///   fails the old block is left as it was.
  pub fn resize(
    &mut self,
    payload: Option<Payload>,
    size: usize,
  ) -> Result<Option<Payload>, AllocError> {
    let Some(old) = payload else {
      return self.allocate(size).map(Some);
    };

    if size == 0 {
      self.release(old)?;
      return Ok(None);
    }

    let (_, tag) = self.validate(old)?;
    let count = size.min(tag.size() - OVERHEAD);

    let fresh = self.allocate(size)?;
    let src = old.offset()..old.offset() + count;
    self.arena.bytes_mut().copy_within(src, fresh.offset());
    self.release(old)?;

    log::trace!("resize({old}, {size}) -> {fresh}, copied {count} bytes");
    Ok(Some(fresh))
  }

  /// Usable bytes in the block behind `payload`.
  pub fn payload_capacity(
    &self,
    payload: Payload,
  ) -> Result<usize, AllocError> {
    let (_, tag) = self.validate(payload)?;
    Ok(tag.size() - OVERHEAD)
  }

  pub fn payload(
    &self,
    payload: Payload,
  ) -> Result<&[u8], AllocError> {
    let capacity = self.payload_capacity(payload)?;
    let start = payload.offset();
    Ok(&self.arena.bytes()[start..start + capacity])
  }

  pub fn payload_mut(
    &mut self,
    payload: Payload,
  ) -> Result<&mut [u8], AllocError> {
    let capacity = self.payload_capacity(payload)?;
    let start = payload.offset();
    Ok(&mut self.arena.bytes_mut()[start..start + capacity])
  }

  /// Address of the payload's first byte, for callers that need a pointer.
  pub fn as_ptr(
    &mut self,
    payload: Payload,
  ) -> Result<*mut u8, AllocError> {
    Ok(self.payload_mut(payload)?.as_mut_ptr())
  }

  /// Checks that `payload` plausibly names a live allocated block and
  /// returns that block with its header tag.
  fn validate(
    &self,
    payload: Payload,
  ) -> Result<(Block, Tag), AllocError> {
    let bytes = self.arena.bytes();

    if payload.offset() % align::ALIGNMENT != 0 {
      return Err(AllocError::invalid("misaligned payload"));
    }
    let block = match payload.block() {
      Some(block) if block != Block::SENTINEL => block,
      _ => return Err(AllocError::invalid("payload does not follow a block header")),
    };
    if payload.offset() + FOOTER_SIZE > bytes.len() {
      return Err(AllocError::invalid("payload outside the arena"));
    }

    let tag = block.tag(bytes)?;
    let size = tag.size();
    if size < MIN_BLOCK_SIZE || size > bytes.len() - block.offset() {
      return Err(AllocError::invalid("payload does not follow a block header"));
    }
    if block.footer_tag(bytes, size)? != tag {
      return Err(AllocError::invalid("payload does not follow a block header"));
    }
    if !tag.is_allocated() {
      return Err(AllocError::invalid("block is not allocated"));
    }

    Ok((block, tag))
  }
}
