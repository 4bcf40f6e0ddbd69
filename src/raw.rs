//! Word-sized reads and writes on the arena's bytes.
//!
//! Every piece of block metadata is one native-endian `u64`. Accesses are
//! bounds checked against the arena slice, so a bad offset surfaces as
//! [`AllocError::CorruptionDetected`] instead of touching memory outside
//! the arena.

use crate::error::AllocError;

/// Size of one metadata word in bytes.
pub const WORD_SIZE: usize = 8;

pub(crate) fn read_word(
  bytes: &[u8],
  offset: usize,
) -> Result<u64, AllocError> {
  let word = offset
    .checked_add(WORD_SIZE)
    .and_then(|end| bytes.get(offset..end))
    .ok_or(AllocError::corrupt(offset, "metadata word outside the arena"))?;

  let mut buf = [0u8; WORD_SIZE];
  buf.copy_from_slice(word);
  Ok(u64::from_ne_bytes(buf))
}

pub(crate) fn write_word(
  bytes: &mut [u8],
  offset: usize,
  value: u64,
) -> Result<(), AllocError> {
  let word = offset
    .checked_add(WORD_SIZE)
    .and_then(|end| bytes.get_mut(offset..end))
    .ok_or(AllocError::corrupt(offset, "metadata word outside the arena"))?;

  word.copy_from_slice(&value.to_ne_bytes());
  Ok(())
}
