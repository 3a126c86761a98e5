//! Occupancy bitmap over the whole region.
//!
//! ```text
//!   ┌────────────┬────────────┬──────────┬─────┬──────────┐
//!   │ len (lo)   │ len (hi)   │ byte 0   │ ... │ byte n-1 │
//!   └────────────┴────────────┴──────────┴─────┴──────────┘
//!                              bit 0 = word 0, bit 7 = word 7
//! ```
//!
//! A set bit marks an allocated word. Padding bits past the last word are
//! always clear.

use crate::codec::FreeList;

const HEADER_LEN: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
  bytes: Vec<u8>,
  total_words: u16,
}

impl Bitmap {
  /// Builds the bitmap for a region of `total_words` words. Parts of listed
  /// blocks that fall past the region are ignored.
  pub fn build(
    list: &FreeList,
    total_words: u16,
  ) -> Self {
    let payload_len = (total_words as usize).div_ceil(8);
    let mut bytes = vec![0u8; HEADER_LEN + payload_len];

    // payload_len <= 8192, so the header never truncates.
    bytes[..HEADER_LEN].copy_from_slice(&(payload_len as u16).to_le_bytes());

    let payload = &mut bytes[HEADER_LEN..];

    for block in list.blocks() {
      for word in block.offset as usize..block.end().min(total_words as usize) {
        payload[word / 8] |= 1 << (word % 8);
      }
    }

    for byte in payload.iter_mut() {
      *byte = !*byte;
    }

    let lone_bits = total_words % 8;

    if lone_bits != 0 {
      if let Some(last) = payload.last_mut() {
        *last &= (1u8 << lone_bits) - 1;
      }
    }

    Self { bytes, total_words }
  }

  pub fn payload_len(&self) -> u16 {
    u16::from_le_bytes([self.bytes[0], self.bytes[1]])
  }

  pub fn payload(&self) -> &[u8] {
    &self.bytes[HEADER_LEN..]
  }

  /// Header followed by payload, ready to hand to an external consumer.
  pub fn as_bytes(&self) -> &[u8] {
    &self.bytes
  }

  pub fn into_bytes(self) -> Vec<u8> {
    self.bytes
  }

  pub fn total_words(&self) -> u16 {
    self.total_words
  }

  /// Whether `word` is handed out. Words past the region read as free.
  pub fn is_allocated(
    &self,
    word: usize,
  ) -> bool {
    self
      .payload()
      .get(word / 8)
      .is_some_and(|byte| byte & (1 << (word % 8)) != 0)
  }

  pub fn allocated_words(&self) -> usize {
    self.payload().iter().map(|byte| byte.count_ones() as usize).sum()
  }
}
