use std::{fmt, io, path::PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ManagerError>;

/// Which step of writing a memory map failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpStage {
  Open,
  Write,
  Close,
}

impl fmt::Display for DumpStage {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      DumpStage::Open => write!(f, "opening"),
      DumpStage::Write => write!(f, "writing"),
      DumpStage::Close => write!(f, "closing"),
    }
  }
}

#[derive(Error, Debug)]
pub enum ManagerError {
  #[error("region of {words} words exceeds the 16-bit word count limit")]
  RegionTooLarge { words: usize },

  #[error("region must hold at least one word")]
  EmptyRegion,

  #[error("word size must be positive, got {0}")]
  InvalidWordSize(usize),

  #[error("requested {requested} bytes but the region only holds {limit} bytes")]
  RequestTooLarge { requested: usize, limit: usize },

  #[error("memory manager has no backing region; call initialize first")]
  NotInitialized,

  #[error("strategy chose word offset {offset}, which is not the start of a free block of at least {words} words")]
  InvalidPlacement { offset: u16, words: u16 },

  #[error("could not reserve the backing region: {0}")]
  Reserve(#[source] io::Error),

  #[error("memory map dump to {} failed while {stage}: {source}", .path.display())]
  Dump {
    stage: DumpStage,
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("malformed free list: expected {expected} words, found {found}")]
  MalformedList { expected: usize, found: usize },

  #[error("free list of {0} bytes does not split into 16-bit words")]
  OddByteLength(usize),

  #[error("free list entry {index} ([{offset}, {size}]) is empty, unordered or overlaps the previous entry")]
  InvalidListEntry { index: usize, offset: u16, size: u16 },
}

impl ManagerError {
  /// True for errors that come from misuse of the manager rather than
  /// from the environment.
  pub fn is_precondition(&self) -> bool {
    matches!(
      self,
      ManagerError::RegionTooLarge { .. }
        | ManagerError::EmptyRegion
        | ManagerError::InvalidWordSize(_)
        | ManagerError::RequestTooLarge { .. }
        | ManagerError::NotInitialized
    )
  }
}
