//! The free-list interchange format.
//!
//! ```text
//!   ┌───────┬──────────┬──────────┬──────────┬──────────┬─────┐
//!   │ count │ offset 0 │ length 0 │ offset 1 │ length 1 │ ... │
//!   └───────┴──────────┴──────────┴──────────┴──────────┴─────┘
//!     u16      u16        u16        u16        u16
//! ```
//!
//! Offsets and lengths are in words. Pairs appear in ascending offset
//! order. The byte form used outside the process is little-endian.

use crate::{
  block::Block,
  error::{ManagerError, Result},
};

/// An encoded snapshot of the free blocks.
///
/// Strategies and reports only ever see this, never the manager's maps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeList {
  words: Vec<u16>,
}

impl FreeList {
  pub fn empty() -> Self {
    Self { words: vec![0] }
  }

  /// Encodes `blocks`, which must already be in ascending offset order.
  ///
  /// # Panics
  ///
  /// Panics if more than `u16::MAX` blocks are supplied. A manager never
  /// holds that many, since free blocks inside a 16-bit region are disjoint
  /// and non-adjacent.
  pub fn encode<I>(blocks: I) -> Self
  where
    I: IntoIterator<Item = Block>,
  {
    let mut words = vec![0];

    for block in blocks {
      debug_assert!(
        words.len() < 3 || words[words.len() - 2] < block.offset,
        "free list must be encoded in ascending offset order"
      );

      words.push(block.offset);
      words.push(block.size);
    }

    let count = (words.len() - 1) / 2;
    words[0] = u16::try_from(count).expect("more than u16::MAX free blocks");

    Self { words }
  }

  /// Checked decode of a raw `count, (offset, length)*` sequence.
  ///
  /// Besides the length, every entry must be non-empty and start at or
  /// after the end of the previous one.
  pub fn from_words(words: &[u16]) -> Result<Self> {
    let Some(&count) = words.first() else {
      return Err(ManagerError::MalformedList { expected: 1, found: 0 });
    };

    let expected = 1 + 2 * count as usize;

    if words.len() != expected {
      return Err(ManagerError::MalformedList {
        expected,
        found: words.len(),
      });
    }

    let list = Self { words: words.to_vec() };
    let mut previous: Option<Block> = None;

    for (index, block) in list.blocks().enumerate() {
      let ordered = previous.is_none_or(|prev| prev.end() <= block.offset as usize);

      if block.size == 0 || !ordered {
        return Err(ManagerError::InvalidListEntry {
          index,
          offset: block.offset,
          size: block.size,
        });
      }

      previous = Some(block);
    }

    Ok(list)
  }

  pub fn from_le_bytes(bytes: &[u8]) -> Result<Self> {
    if bytes.len() % 2 != 0 {
      return Err(ManagerError::OddByteLength(bytes.len()));
    }

    let words: Vec<u16> = bytes
      .chunks_exact(2)
      .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
      .collect();

    Self::from_words(&words)
  }

  pub fn count(&self) -> u16 {
    self.words[0]
  }

  pub fn is_empty(&self) -> bool {
    self.count() == 0
  }

  /// Decodes the pairs back into blocks without allocating.
  pub fn blocks(&self) -> impl Iterator<Item = Block> + '_ {
    self.words[1..]
      .chunks_exact(2)
      .map(|pair| Block::new(pair[0], pair[1]))
  }

  pub fn as_words(&self) -> &[u16] {
    &self.words
  }

  pub fn to_le_bytes(&self) -> Vec<u8> {
    self.words.iter().flat_map(|word| word.to_le_bytes()).collect()
  }
}

impl Default for FreeList {
  fn default() -> Self {
    Self::empty()
  }
}
