use crate::codec::FreeList;

/// Placement policy: picks which free block serves a request.
///
/// A strategy sees only the requested size and the encoded free list. It
/// returns the word offset of a listed block whose length is at least
/// `words_needed`, or `None` when nothing fits. The manager rejects any
/// other offset.
///
/// Plain functions and closures with the matching signature are
/// strategies too:
///
/// ```rust
/// use rallocsim::{FreeList, MemoryManager};
///
/// let first_fit = |words: u16, list: &FreeList| {
///   list.blocks().find(|block| block.size >= words).map(|block| block.offset)
/// };
///
/// let mut manager = MemoryManager::new(8, first_fit).unwrap();
/// manager.initialize(16).unwrap();
/// assert!(manager.allocate(8).unwrap().is_some());
/// ```
pub trait Strategy {
  fn place(
    &self,
    words_needed: u16,
    list: &FreeList,
  ) -> Option<u16>;
}

impl<F> Strategy for F
where
  F: Fn(u16, &FreeList) -> Option<u16>,
{
  fn place(
    &self,
    words_needed: u16,
    list: &FreeList,
  ) -> Option<u16> {
    self(words_needed, list)
  }
}

/// Smallest block that fits; the lowest offset wins ties.
#[derive(Debug, Clone, Copy, Default)]
pub struct BestFit;

/// Largest block that fits; the lowest offset wins ties.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorstFit;

impl Strategy for BestFit {
  fn place(
    &self,
    words_needed: u16,
    list: &FreeList,
  ) -> Option<u16> {
    best_fit(words_needed, list)
  }
}

impl Strategy for WorstFit {
  fn place(
    &self,
    words_needed: u16,
    list: &FreeList,
  ) -> Option<u16> {
    worst_fit(words_needed, list)
  }
}

pub fn best_fit(
  words_needed: u16,
  list: &FreeList,
) -> Option<u16> {
  let mut best: Option<(u16, u16)> = None;

  for block in list.blocks() {
    let Some(slack) = block.size.checked_sub(words_needed) else {
      continue;
    };

    if best.is_none_or(|(_, min)| slack < min) {
      best = Some((block.offset, slack));
    }
  }

  best.map(|(offset, _)| offset)
}

pub fn worst_fit(
  words_needed: u16,
  list: &FreeList,
) -> Option<u16> {
  let mut worst: Option<(u16, u16)> = None;

  for block in list.blocks() {
    let Some(slack) = block.size.checked_sub(words_needed) else {
      continue;
    };

    if worst.is_none_or(|(_, max)| slack > max) {
      worst = Some((block.offset, slack));
    }
  }

  worst.map(|(offset, _)| offset)
}
