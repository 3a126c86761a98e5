use std::{fmt, io};

use crate::codec::FreeList;

/// Renders a free list as `[offset, size] - [offset, size] - ...`.
pub struct MapDisplay<'a>(pub &'a FreeList);

impl fmt::Display for MapDisplay<'_> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    for (i, block) in self.0.blocks().enumerate() {
      if i > 0 {
        f.write_str(" - ")?;
      }

      write!(f, "[{}, {}]", block.offset, block.size)?;
    }

    Ok(())
  }
}

pub fn render(list: &FreeList) -> String {
  MapDisplay(list).to_string()
}

/// Human-oriented listing of every free block followed by the total.
pub fn write_listing<W: io::Write>(
  list: &FreeList,
  out: &mut W,
) -> io::Result<()> {
  for (i, block) in list.blocks().enumerate() {
    writeln!(
      out,
      "Block {}: offset {} words, size {} words",
      i + 1,
      block.offset,
      block.size
    )?;
  }

  writeln!(out, "Total blocks: {}", list.count())?;
  writeln!(out)
}
