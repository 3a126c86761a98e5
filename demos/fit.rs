use std::env;

use rallocsim::{BestFit, Config, MemoryManager, WorstFit};

/// Prints the free list, the occupancy bitmap and the text map.
fn print_state(
  label: &str,
  manager: &MemoryManager,
) {
  let bitmap = manager.bitmap();

  println!("\n[{label}]");
  println!("free list (u16)  = {:?}", manager.free_list().as_words());
  println!("bitmap bytes     = {:02X?}", bitmap.as_bytes());
  println!(
    "map              = {}",
    rallocsim::MapDisplay(&manager.free_list())
  );
  manager.print_list();
}

fn main() -> rallocsim::Result<()> {
  pretty_env_logger::init();

  // RALLOCSIM_WORD_SIZE overrides the machine word.
  let mut manager = MemoryManager::with_config(Config::from_env(), BestFit)?;
  let word_size = manager.word_size();

  // --------------------------------------------------------------------
  // 1) A 7-word region, fully free.
  // --------------------------------------------------------------------
  manager.initialize(7)?;
  print_state("initialized", &manager);

  // --------------------------------------------------------------------
  // 2) Re-initialize with 10 words, fill it and free three blocks,
  //    leaving holes of 4, 1 and 2 words at offsets 0, 5 and 7.
  // --------------------------------------------------------------------
  manager.initialize(10)?;

  let mut blocks = Vec::new();
  for words in [4, 1, 1, 1, 2, 1] {
    if let Some(ptr) = manager.allocate(words * word_size)? {
      blocks.push(ptr);
    }
  }

  for index in [0, 2, 4] {
    manager.free(blocks[index].as_ptr());
  }

  print_state("holes of 4, 1 and 2 words", &manager);

  // --------------------------------------------------------------------
  // 3) The same one-word request under each strategy.
  // --------------------------------------------------------------------
  let start = manager
    .memory_start()
    .map_or(0, |ptr| ptr.as_ptr() as usize);

  if let Some(ptr) = manager.allocate(word_size)? {
    println!(
      "\n[best fit] one word placed at word offset {}",
      (ptr.as_ptr() as usize - start) / word_size
    );
    manager.free(ptr.as_ptr());
  }

  manager.set_allocator(WorstFit);

  if let Some(ptr) = manager.allocate(word_size)? {
    println!(
      "[worst fit] one word placed at word offset {}",
      (ptr.as_ptr() as usize - start) / word_size
    );

    unsafe {
      ptr.write(0xAB);
      println!("[worst fit] value written = 0x{:X}", ptr.read());
    }
  }

  print_state("after worst fit", &manager);

  // --------------------------------------------------------------------
  // 4) Dump the map to a file.
  // --------------------------------------------------------------------
  let path = env::temp_dir().join(format!("rallocsim-{}.map", std::process::id()));
  manager.dump_memory_map(&path)?;
  println!("\nmap dumped to {}", path.display());

  manager.shutdown();

  Ok(())
}
