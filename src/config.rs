//! Manager configuration.

/// Tunables for a [`FreeSpaceManager`](crate::FreeSpaceManager).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManagerConfig {
  /// Minimum number of bytes to request from the arena when no free block
  /// fits. Larger requests grow the arena by exactly what they need.
  ///
  /// Default: 4096. Rounded up to the allocator's 8-byte granularity.
  pub chunk_size: usize,
}

impl ManagerConfig {
  pub const DEFAULT_CHUNK_SIZE: usize = 1 << 12;

  pub fn new() -> Self {
    Self {
      chunk_size: Self::DEFAULT_CHUNK_SIZE,
    }
  }

  pub fn with_chunk_size(
    mut self,
    chunk_size: usize,
  ) -> Self {
    self.chunk_size = chunk_size;
    self
  }

  /// Growth request for a block of `block_size` bytes.
  pub(crate) fn extension_for(
    &self,
    block_size: usize,
  ) -> usize {
    block_size.max(crate::align::checked_align(self.chunk_size).unwrap_or(block_size))
  }
}

impl Default for ManagerConfig {
  fn default() -> Self {
    Self::new()
  }
}
