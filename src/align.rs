/// Calculates how many words of `$word` bytes are needed to hold `$bytes` bytes.
///
/// Partial words round up: a request that spills one byte into a word
/// still occupies the whole word.
///
/// # Examples
///
/// ```rust
/// use rallocsim::words_for;
///
/// assert_eq!(words_for!(13usize, 8usize), 2);
/// assert_eq!(words_for!(16usize, 8usize), 2);
/// assert_eq!(words_for!(17usize, 8usize), 3);
/// assert_eq!(words_for!(0usize, 4usize), 0);
/// ```
#[macro_export]
macro_rules! words_for {
  ($bytes:expr, $word:expr) => {
    ($bytes).div_ceil($word)
  };
}

#[cfg(test)]
mod tests {
  #[test]
  fn test_words_for() {
    for word_size in [1usize, 2, 4, 8, 12] {
      let mut expectations = Vec::new();

      for i in 0..10 {
        let sizes = (word_size * i + 1)..=(word_size * (i + 1));

        expectations.push((sizes, i + 1));
      }

      for (sizes, expected) in expectations {
        for size in sizes {
          assert_eq!(expected, words_for!(size, word_size));
        }
      }
    }
  }

  #[test]
  fn test_words_for_zero() {
    assert_eq!(0, words_for!(0usize, 8usize));
  }
}
