use std::{
  collections::BTreeMap,
  fs::File,
  io::{self, BufWriter, Write},
  os::fd::IntoRawFd,
  path::Path,
  ptr::NonNull,
};

use log::{debug, error, trace, warn};

use crate::{
  bitmap::Bitmap,
  block::Block,
  codec::FreeList,
  config::{Config, MAX_REGION_WORDS},
  error::{DumpStage, ManagerError, Result},
  map,
  region::Region,
  strategy::Strategy,
  words_for,
};

/// Word-granular block tracker over one backing region.
///
/// ```text
///   region   ┌────────┬──────────────┬────┬──────────────────────┐
///            │ in use │     free     │ in │         free         │
///            │  (3)   │     (5)      │(1) │         (7)          │
///            └────────┴──────────────┴────┴──────────────────────┘
///   free     {3: 5, 9: 7}
///   in_use   {0: 3, 8: 1}
/// ```
///
/// Both maps are keyed by word offset and together tile the region. No two
/// free blocks are ever adjacent: every `free` coalesces before returning.
///
/// The manager is single-threaded. Share it across threads only behind an
/// external lock such as a `Mutex<MemoryManager>`.
pub struct MemoryManager {
  config: Config,
  strategy: Box<dyn Strategy + Send>,
  region: Option<Region>,
  total_words: u16,
  free: BTreeMap<u16, u16>,
  in_use: BTreeMap<u16, u16>,
}

impl MemoryManager {
  pub fn new<S>(
    word_size: usize,
    strategy: S,
  ) -> Result<Self>
  where
    S: Strategy + Send + 'static,
  {
    Self::with_config(Config::new(word_size), strategy)
  }

  pub fn with_config<S>(
    config: Config,
    strategy: S,
  ) -> Result<Self>
  where
    S: Strategy + Send + 'static,
  {
    config.validate()?;

    Ok(Self {
      config,
      strategy: Box::new(strategy),
      region: None,
      total_words: 0,
      free: BTreeMap::new(),
      in_use: BTreeMap::new(),
    })
  }

  /// Reserves a fresh region of `size_words` words, discarding any previous
  /// one together with every outstanding allocation.
  ///
  /// On error the current state is left untouched.
  pub fn initialize(
    &mut self,
    size_words: usize,
  ) -> Result<()> {
    if size_words > MAX_REGION_WORDS {
      return Err(ManagerError::RegionTooLarge { words: size_words });
    }

    if size_words == 0 {
      return Err(ManagerError::EmptyRegion);
    }

    let total_words = size_words as u16;
    let total_bytes = size_words
      .checked_mul(self.config.word_size)
      .ok_or(ManagerError::RegionTooLarge { words: size_words })?;

    let region = Region::reserve(total_bytes).map_err(ManagerError::Reserve)?;

    self.shutdown();

    debug!(
      "initialized region of {} words ({} bytes) at {:?}",
      total_words,
      total_bytes,
      region.start()
    );

    self.region = Some(region);
    self.total_words = total_words;
    self.free.insert(0, total_words);

    Ok(())
  }

  /// Releases the region and forgets every block. Safe to repeat.
  pub fn shutdown(&mut self) {
    if let Some(region) = self.region.take() {
      debug!(
        "releasing region of {} bytes with {} blocks still in use",
        region.len(),
        self.in_use.len()
      );
    }

    self.free.clear();
    self.in_use.clear();
    self.total_words = 0;
  }

  /// Hands out at least `size` bytes, rounded up to whole words.
  ///
  /// `Ok(None)` means no single free block is large enough, or `size` is
  /// zero. Fragmentation is never resolved here: free space split across
  /// blocks does not count.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<Option<NonNull<u8>>> {
    let Some(region) = &self.region else {
      return Err(ManagerError::NotInitialized);
    };

    let limit = region.len();

    if size > limit {
      return Err(ManagerError::RequestTooLarge {
        requested: size,
        limit,
      });
    }

    if size == 0 {
      trace!("zero-byte request, nothing to allocate");
      return Ok(None);
    }

    // Bounded by total_words since size <= limit.
    let words = words_for!(size, self.config.word_size) as u16;
    let list = self.free_list();

    let Some(offset) = self.strategy.place(words, &list) else {
      trace!(
        "no free block holds {} words across {} free blocks",
        words,
        list.count()
      );
      return Ok(None);
    };

    let block_size = match self.free.get(&offset) {
      Some(&block_size) if block_size >= words => block_size,
      _ => {
        warn!("strategy returned word offset {offset}, which cannot hold {words} words");
        return Err(ManagerError::InvalidPlacement { offset, words });
      }
    };

    let address = region.address_at(offset as usize * self.config.word_size);

    self.free.remove(&offset);

    if block_size > words {
      self.free.insert(offset + words, block_size - words);
    }

    self.in_use.insert(offset, words);

    trace!(
      "allocated {} words at offset {} ({:?}), {} words left in the split block",
      words,
      offset,
      address,
      block_size - words
    );

    Ok(Some(address))
  }

  /// Returns a block handed out by [`allocate`](Self::allocate).
  ///
  /// Null, foreign, misaligned and already-freed addresses are ignored.
  /// This keeps the manager permissive: a double free is not detected, so
  /// callers must not rely on it being reported.
  pub fn free(
    &mut self,
    address: *mut u8,
  ) {
    if address.is_null() {
      return;
    }

    let Some(offset) = self.word_offset_of(address) else {
      warn!("ignoring free of {address:?}: not a word inside the region");
      return;
    };

    let Some(size) = self.in_use.remove(&offset) else {
      warn!("ignoring free of {address:?}: word offset {offset} is not allocated");
      return;
    };

    self.free.insert(offset, size);
    trace!("freed {size} words at offset {offset}");

    self.coalesce();
  }

  /// Replaces the placement strategy; existing blocks are unaffected.
  pub fn set_allocator<S>(
    &mut self,
    strategy: S,
  ) where
    S: Strategy + Send + 'static,
  {
    self.strategy = Box::new(strategy);
  }

  /// Encoded snapshot of the free blocks.
  pub fn free_list(&self) -> FreeList {
    FreeList::encode(self.free_blocks())
  }

  pub fn bitmap(&self) -> Bitmap {
    Bitmap::build(&self.free_list(), self.total_words)
  }

  /// Writes the free blocks to `path` as `[offset, size] - ...`, replacing
  /// any existing file.
  pub fn dump_memory_map<P: AsRef<Path>>(
    &self,
    path: P,
  ) -> Result<()> {
    let path = path.as_ref();
    let rendered = map::render(&self.free_list());

    let file = File::create(path).map_err(|source| dump_failed(DumpStage::Open, path, source))?;
    let mut writer = BufWriter::new(file);

    writer
      .write_all(rendered.as_bytes())
      .map_err(|source| dump_failed(DumpStage::Write, path, source))?;

    let file = writer
      .into_inner()
      .map_err(|source| dump_failed(DumpStage::Write, path, source.into_error()))?;

    close_file(file).map_err(|source| dump_failed(DumpStage::Close, path, source))?;

    debug!("dumped {} free blocks to {}", self.free.len(), path.display());

    Ok(())
  }

  pub fn print_list(&self) {
    let stdout = io::stdout();

    if let Err(err) = self.write_list(&mut stdout.lock()) {
      warn!("could not print the free list: {err}");
    }
  }

  pub fn write_list<W: Write>(
    &self,
    out: &mut W,
  ) -> io::Result<()> {
    map::write_listing(&self.free_list(), out)
  }

  pub fn word_size(&self) -> usize {
    self.config.word_size
  }

  pub fn memory_start(&self) -> Option<NonNull<u8>> {
    self.region.as_ref().map(Region::start)
  }

  /// Size of the region in bytes, or zero before `initialize`.
  pub fn memory_limit(&self) -> usize {
    self.region.as_ref().map_or(0, Region::len)
  }

  pub fn total_words(&self) -> u16 {
    self.total_words
  }

  pub fn is_initialized(&self) -> bool {
    self.region.is_some()
  }

  pub fn free_blocks(&self) -> impl Iterator<Item = Block> + '_ {
    self.free.iter().map(|(&offset, &size)| Block::new(offset, size))
  }

  pub fn in_use_blocks(&self) -> impl Iterator<Item = Block> + '_ {
    self.in_use.iter().map(|(&offset, &size)| Block::new(offset, size))
  }

  fn word_offset_of(
    &self,
    address: *mut u8,
  ) -> Option<u16> {
    let byte_offset = self.region.as_ref()?.offset_of(address)?;

    if byte_offset % self.config.word_size != 0 {
      return None;
    }

    u16::try_from(byte_offset / self.config.word_size).ok()
  }

  /// Merges every run of physically adjacent free blocks into one.
  fn coalesce(&mut self) {
    let mut merged = BTreeMap::new();
    let mut run: Option<Block> = None;

    for block in self.free_blocks() {
      run = match run {
        Some(current) if current.precedes(&block) => {
          Some(Block::new(current.offset, current.size + block.size))
        }
        Some(current) => {
          merged.insert(current.offset, current.size);
          Some(block)
        }
        None => Some(block),
      };
    }

    if let Some(current) = run {
      merged.insert(current.offset, current.size);
    }

    let merges = self.free.len() - merged.len();

    if merges > 0 {
      trace!("coalesced {} free blocks into {}", self.free.len(), merged.len());
    }

    self.free = merged;
  }
}

impl Drop for MemoryManager {
  fn drop(&mut self) {
    self.shutdown();
  }
}

/// Closes `file` and reports what close(2) says, which dropping a `File`
/// would discard.
fn close_file(file: File) -> io::Result<()> {
  let fd = file.into_raw_fd();

  if unsafe { libc::close(fd) } == -1 {
    return Err(io::Error::last_os_error());
  }

  Ok(())
}

fn dump_failed(
  stage: DumpStage,
  path: &Path,
  source: io::Error,
) -> ManagerError {
  error!("memory map dump to {} failed while {}: {}", path.display(), stage, source);

  ManagerError::Dump {
    stage,
    path: path.to_path_buf(),
    source,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::strategy::{BestFit, WorstFit};

  const WORD: usize = 8;

  fn manager(words: usize) -> MemoryManager {
    let mut manager = MemoryManager::new(WORD, BestFit).unwrap();
    manager.initialize(words).unwrap();
    manager
  }

  fn free_pairs(manager: &MemoryManager) -> Vec<(u16, u16)> {
    manager.free_blocks().map(|b| (b.offset, b.size)).collect()
  }

  fn in_use_pairs(manager: &MemoryManager) -> Vec<(u16, u16)> {
    manager.in_use_blocks().map(|b| (b.offset, b.size)).collect()
  }

  #[test]
  fn test_initialize_creates_single_free_block() {
    let manager = manager(100);

    assert!(manager.is_initialized());
    assert_eq!(manager.total_words(), 100);
    assert_eq!(manager.memory_limit(), 100 * WORD);
    assert_eq!(free_pairs(&manager), vec![(0, 100)]);
    assert!(in_use_pairs(&manager).is_empty());
  }

  #[test]
  fn test_initialize_rejects_bad_sizes() {
    let mut manager = MemoryManager::new(WORD, BestFit).unwrap();

    assert!(matches!(
      manager.initialize(65536),
      Err(ManagerError::RegionTooLarge { words: 65536 })
    ));
    assert!(matches!(manager.initialize(0), Err(ManagerError::EmptyRegion)));
    assert!(!manager.is_initialized());

    manager.initialize(65535).unwrap();
    assert_eq!(manager.total_words(), u16::MAX);
  }

  #[test]
  fn test_rejected_initialize_keeps_state() {
    let mut manager = manager(10);
    manager.allocate(WORD).unwrap().unwrap();

    assert!(manager.initialize(70000).is_err());

    assert_eq!(in_use_pairs(&manager), vec![(0, 1)]);
    assert_eq!(free_pairs(&manager), vec![(1, 9)]);
  }

  #[test]
  fn test_reinitialize_resets() {
    let mut manager = manager(10);
    manager.allocate(3 * WORD).unwrap().unwrap();

    manager.initialize(20).unwrap();

    assert_eq!(free_pairs(&manager), vec![(0, 20)]);
    assert!(in_use_pairs(&manager).is_empty());
  }

  #[test]
  fn test_shutdown_is_idempotent() {
    let mut manager = manager(10);

    manager.shutdown();
    manager.shutdown();

    assert!(!manager.is_initialized());
    assert_eq!(manager.memory_limit(), 0);
    assert!(manager.memory_start().is_none());
    assert!(free_pairs(&manager).is_empty());
    assert!(matches!(manager.allocate(1), Err(ManagerError::NotInitialized)));
  }

  #[test]
  fn test_allocate_splits_and_rounds_up() {
    let mut manager = manager(10);
    let start = manager.memory_start().unwrap();

    let first = manager.allocate(1).unwrap().unwrap();
    let second = manager.allocate(WORD + 1).unwrap().unwrap();

    assert_eq!(first, start);
    assert_eq!(second.as_ptr() as usize - start.as_ptr() as usize, WORD);
    assert_eq!(in_use_pairs(&manager), vec![(0, 1), (1, 2)]);
    assert_eq!(free_pairs(&manager), vec![(3, 7)]);
  }

  #[test]
  fn test_allocate_exact_fit_consumes_block() {
    let mut manager = manager(4);

    manager.allocate(4 * WORD).unwrap().unwrap();

    assert!(free_pairs(&manager).is_empty());
    assert_eq!(manager.allocate(1).unwrap(), None);
  }

  #[test]
  fn test_allocate_limits() {
    let mut manager = manager(4);

    assert!(matches!(
      manager.allocate(4 * WORD + 1),
      Err(ManagerError::RequestTooLarge { requested: 33, limit: 32 })
    ));
    assert_eq!(manager.allocate(0).unwrap(), None);
    assert_eq!(free_pairs(&manager), vec![(0, 4)]);
  }

  #[test]
  fn test_adjacent_frees_coalesce() {
    let mut manager = manager(10);

    let a = manager.allocate(2 * WORD).unwrap().unwrap();
    let b = manager.allocate(3 * WORD).unwrap().unwrap();

    manager.free(a.as_ptr());
    assert_eq!(free_pairs(&manager), vec![(0, 2), (5, 5)]);

    manager.free(b.as_ptr());
    assert_eq!(free_pairs(&manager), vec![(0, 10)]);
    assert!(in_use_pairs(&manager).is_empty());
  }

  #[test]
  fn test_middle_free_merges_both_sides() {
    let mut manager = manager(9);

    let a = manager.allocate(3 * WORD).unwrap().unwrap();
    let b = manager.allocate(3 * WORD).unwrap().unwrap();
    let c = manager.allocate(3 * WORD).unwrap().unwrap();

    manager.free(a.as_ptr());
    manager.free(c.as_ptr());
    assert_eq!(free_pairs(&manager), vec![(0, 3), (6, 3)]);

    manager.free(b.as_ptr());
    assert_eq!(free_pairs(&manager), vec![(0, 9)]);
  }

  #[test]
  fn test_unknown_frees_are_ignored() {
    let mut manager = manager(10);
    let a = manager.allocate(2 * WORD).unwrap().unwrap();
    let before = (free_pairs(&manager), in_use_pairs(&manager));

    manager.free(std::ptr::null_mut());
    manager.free(a.as_ptr().wrapping_add(1));
    manager.free(a.as_ptr().wrapping_add(WORD));
    manager.free(a.as_ptr().wrapping_add(100 * WORD));

    assert_eq!((free_pairs(&manager), in_use_pairs(&manager)), before);

    manager.free(a.as_ptr());
    manager.free(a.as_ptr());
    assert_eq!(free_pairs(&manager), vec![(0, 10)]);
  }

  #[test]
  fn test_strategy_contract_is_checked() {
    let mut manager = MemoryManager::new(WORD, |_: u16, _: &FreeList| Some(3u16)).unwrap();
    manager.initialize(10).unwrap();

    assert!(matches!(
      manager.allocate(WORD),
      Err(ManagerError::InvalidPlacement { offset: 3, words: 1 })
    ));
    assert_eq!(free_pairs(&manager), vec![(0, 10)]);
  }

  #[test]
  fn test_strategy_must_pick_large_enough_block() {
    let first_block = |_: u16, list: &FreeList| list.blocks().next().map(|b| b.offset);
    let mut manager = manager(10);

    let a = manager.allocate(WORD).unwrap().unwrap();
    manager.allocate(WORD).unwrap().unwrap();
    manager.free(a.as_ptr());

    manager.set_allocator(first_block);

    assert!(matches!(
      manager.allocate(2 * WORD),
      Err(ManagerError::InvalidPlacement { offset: 0, words: 2 })
    ));
  }

  #[test]
  fn test_set_allocator_switches_placement() {
    let mut manager = manager(10);

    // Free blocks: [0, 4], [5, 1], [7, 3]
    let blocks: Vec<_> = [4, 1, 1, 1, 3]
      .iter()
      .map(|words| manager.allocate(words * WORD).unwrap().unwrap())
      .collect();
    manager.free(blocks[0].as_ptr());
    manager.free(blocks[2].as_ptr());
    manager.free(blocks[4].as_ptr());
    assert_eq!(free_pairs(&manager), vec![(0, 4), (5, 1), (7, 3)]);

    let start = manager.memory_start().unwrap().as_ptr() as usize;

    let best = manager.allocate(WORD).unwrap().unwrap();
    assert_eq!((best.as_ptr() as usize - start) / WORD, 5);

    manager.set_allocator(WorstFit);

    let worst = manager.allocate(WORD).unwrap().unwrap();
    assert_eq!((worst.as_ptr() as usize - start) / WORD, 0);
  }

  #[test]
  fn test_memory_is_usable() {
    let mut manager = manager(4);

    let a = manager.allocate(WORD).unwrap().unwrap().cast::<u64>();
    let b = manager.allocate(WORD).unwrap().unwrap().cast::<u64>();

    unsafe {
      a.write(0xDEADBEEF);
      b.write(25);

      assert_eq!(a.read(), 0xDEADBEEF);
      assert_eq!(b.read(), 25);
    }
  }

  #[test]
  fn test_bitmap_and_list_reflect_state() {
    let mut manager = manager(10);
    manager.allocate(3 * WORD).unwrap().unwrap();

    assert_eq!(manager.free_list().as_words(), &[1, 3, 7]);

    let bitmap = manager.bitmap();
    assert_eq!(bitmap.payload(), &[0b0000_0111, 0b0000_0000]);
  }

  #[test]
  fn test_write_list() {
    let manager = manager(10);
    let mut out = Vec::new();

    manager.write_list(&mut out).unwrap();

    assert_eq!(
      String::from_utf8(out).unwrap(),
      "Block 1: offset 0 words, size 10 words\nTotal blocks: 1\n\n"
    );
  }

  #[test]
  fn test_close_file_reports_close_errors() {
    use std::os::fd::FromRawFd;

    // Far above any RLIMIT_NOFILE, so it never names an open descriptor.
    let file = unsafe { File::from_raw_fd(i32::MAX - 1) };

    let err = close_file(file).unwrap_err();

    assert_eq!(err.raw_os_error(), Some(libc::EBADF));
  }

  #[test]
  fn test_close_file_on_open_file() {
    let file = File::open("/dev/null").unwrap();

    assert!(close_file(file).is_ok());
  }

  #[test]
  fn test_close_failure_is_reported_as_close_stage() {
    let error = dump_failed(
      DumpStage::Close,
      Path::new("/tmp/map.txt"),
      io::Error::from_raw_os_error(libc::EIO),
    );

    assert!(matches!(
      error,
      ManagerError::Dump {
        stage: DumpStage::Close,
        ..
      }
    ));
  }

  #[test]
  fn test_new_rejects_zero_word_size() {
    assert!(matches!(
      MemoryManager::new(0, BestFit),
      Err(ManagerError::InvalidWordSize(0))
    ));
  }
}
