//! # rallocsim - A Word-Addressed Memory Manager Simulator
//!
//! This crate manages a single contiguous region of memory in fixed-size
//! **words**, tracking which runs of words are free and which are handed
//! out, and delegating the *placement decision* to a swappable
//! [`Strategy`].
//!
//! ## Overview
//!
//! ```text
//!   Memory Manager:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                        BACKING REGION (mmap)                         │
//!   │                                                                      │
//!   │   ┌──────┬────────────┬──────┬──────────────────────────────────────┐│
//!   │   │ A1   │   free     │ A2   │               free                   ││
//!   │   └──────┴────────────┴──────┴──────────────────────────────────────┘│
//!   │   ▲      ▲            ▲      ▲                                       │
//!   │   │      │            │      │                                       │
//!   │  in_use free        in_use free        (both keyed by word offset)   │
//!   │                                                                      │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every request goes through the same steps:
//!
//! ```text
//!   allocate(bytes)
//!        │
//!        ▼
//!   words = ceil(bytes / word_size)
//!        │
//!        ▼
//!   FreeList::encode(free blocks) ──► Strategy::place(words, &list)
//!                                              │
//!                    ┌─────────────────────────┴───────────┐
//!                    ▼                                     ▼
//!                  None                              Some(offset)
//!               Ok(None)                    split block, record in_use,
//!                                           return start + offset * word
//! ```
//!
//! Freeing moves the block back to the free set and coalesces neighbours:
//!
//! ```text
//!   before:  [ free 0..2 ][ A 2..5 ][ free 5..10 ]
//!   free(A): [ free 0..2 ][ free 2..5 ][ free 5..10 ]
//!   after:   [ free 0..10                         ]
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   rallocsim
//!   ├── align      - words_for! rounding macro
//!   ├── block      - Block (offset, size) in words
//!   ├── codec      - FreeList: count + (offset, length) pairs
//!   ├── strategy   - Strategy trait, BestFit, WorstFit
//!   ├── bitmap     - Occupancy bitmap with 2-byte header
//!   ├── map        - "[offset, size] - ..." rendering and listings
//!   ├── config     - Word size configuration
//!   ├── error      - ManagerError
//!   ├── region     - mmap-backed region (internal)
//!   └── manager    - MemoryManager
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use rallocsim::{BestFit, MemoryManager, WorstFit};
//!
//! let mut manager = MemoryManager::new(8, BestFit).unwrap();
//! manager.initialize(64).unwrap();
//!
//! let ptr = manager.allocate(20).unwrap().expect("region is empty");
//!
//! unsafe { ptr.cast::<u64>().write(42) };
//!
//! // 20 bytes round up to 3 words.
//! assert_eq!(manager.free_list().as_words(), &[1, 3, 61]);
//!
//! manager.set_allocator(WorstFit);
//! manager.free(ptr.as_ptr());
//!
//! assert_eq!(manager.free_list().as_words(), &[1, 0, 64]);
//! ```
//!
//! ## Limits
//!
//! - **16-bit words**: a region holds at most [`MAX_REGION_WORDS`] words.
//! - **No compaction**: a request larger than every single free block fails
//!   even when the total free space would suffice.
//! - **Permissive free**: unknown or repeated frees are ignored, not reported.
//! - **Single-threaded**: no internal locking. Wrap the manager in a lock to
//!   share it.
//! - **Unix-only**: the region is mapped with `libc::mmap`.
//!
//! ## Safety
//!
//! The manager itself never dereferences the memory it hands out. Writing
//! through a returned pointer is the caller's `unsafe` responsibility, and
//! the pointer is only valid until it is freed or the manager is shut down.

pub mod align;
mod bitmap;
mod block;
mod codec;
mod config;
mod error;
mod manager;
mod map;
mod region;
mod strategy;

pub use bitmap::Bitmap;
pub use block::Block;
pub use codec::FreeList;
pub use config::{Config, MAX_REGION_WORDS, WORD_SIZE_VAR};
pub use error::{DumpStage, ManagerError, Result};
pub use manager::MemoryManager;
pub use map::{MapDisplay, render as render_map, write_listing};
pub use strategy::{BestFit, Strategy, WorstFit, best_fit, worst_fit};
