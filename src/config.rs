use std::{env, mem};

use crate::error::{ManagerError, Result};

/// Largest region, in words, whose offsets and lengths still fit a `u16`.
pub const MAX_REGION_WORDS: usize = u16::MAX as usize;

/// Environment variable overriding the word size, in bytes.
pub const WORD_SIZE_VAR: &str = "RALLOCSIM_WORD_SIZE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
  /// Allocation granularity in bytes.
  pub word_size: usize,
}

impl Default for Config {
  /// One machine word.
  fn default() -> Self {
    Self {
      word_size: mem::size_of::<usize>(),
    }
  }
}

impl Config {
  pub fn new(word_size: usize) -> Self {
    Self { word_size }
  }

  /// Reads [`WORD_SIZE_VAR`], falling back to the default when it is unset
  /// or not a number.
  pub fn from_env() -> Self {
    Self::from_var(env::var(WORD_SIZE_VAR).ok().as_deref())
  }

  fn from_var(value: Option<&str>) -> Self {
    value
      .and_then(|raw| raw.trim().parse::<usize>().ok())
      .map(Self::new)
      .unwrap_or_default()
  }

  pub fn validate(&self) -> Result<()> {
    if self.word_size == 0 {
      return Err(ManagerError::InvalidWordSize(self.word_size));
    }

    Ok(())
  }
}
