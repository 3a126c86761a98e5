/// A run of contiguous words inside the backing region.
///
/// Both fields are counted in words, never bytes. The offset is relative
/// to the start of the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Block {
  pub offset: u16,
  pub size: u16,
}

impl Block {
  pub fn new(
    offset: u16,
    size: u16,
  ) -> Self {
    Self { offset, size }
  }

  /// First word past the end of the block.
  pub fn end(&self) -> usize {
    self.offset as usize + self.size as usize
  }

  /// True when `next` starts exactly where this block ends.
  pub fn precedes(
    &self,
    next: &Block,
  ) -> bool {
    self.end() == next.offset as usize
  }

  pub fn contains(
    &self,
    word: usize,
  ) -> bool {
    (self.offset as usize..self.end()).contains(&word)
  }

  pub fn overlaps(
    &self,
    other: &Block,
  ) -> bool {
    (self.offset as usize) < other.end() && (other.offset as usize) < self.end()
  }
}
