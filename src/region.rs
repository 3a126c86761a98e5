use std::{io, ptr, ptr::NonNull};

use libc::{MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE, c_void, mmap, munmap};

/// The backing region: one anonymous private mapping, unmapped on drop.
///
/// ```text
///   start                                              start + len
///   ┌──────┬──────┬──────┬──────┬──────┬──────┬─────────┐
///   │ w0   │ w1   │ w2   │ w3   │ w4   │ ...  │ wN-1    │
///   └──────┴──────┴──────┴──────┴──────┴──────┴─────────┘
/// ```
pub(crate) struct Region {
  start: NonNull<u8>,
  len: usize,
}

// The mapping is owned exclusively; moving it to another thread is sound.
unsafe impl Send for Region {}

impl Region {
  /// Maps `len` bytes of zeroed, readable and writable memory.
  pub fn reserve(len: usize) -> io::Result<Self> {
    if len == 0 {
      return Err(io::Error::new(
        io::ErrorKind::InvalidInput,
        "cannot map an empty region",
      ));
    }

    let address = unsafe {
      mmap(
        ptr::null_mut(),
        len,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if address == MAP_FAILED {
      return Err(io::Error::last_os_error());
    }

    let start = NonNull::new(address as *mut u8)
      .ok_or_else(|| io::Error::other("mmap returned a null mapping"))?;

    Ok(Self { start, len })
  }

  pub fn start(&self) -> NonNull<u8> {
    self.start
  }

  pub fn len(&self) -> usize {
    self.len
  }

  /// Byte offset of `address` from the start, if it lies inside.
  pub fn offset_of(
    &self,
    address: *const u8,
  ) -> Option<usize> {
    let start = self.start.as_ptr() as usize;
    let offset = (address as usize).checked_sub(start)?;

    (offset < self.len).then_some(offset)
  }

  pub fn address_at(
    &self,
    offset: usize,
  ) -> NonNull<u8> {
    debug_assert!(offset < self.len, "offset {offset} outside region of {} bytes", self.len);

    unsafe { self.start.add(offset) }
  }
}

impl Drop for Region {
  fn drop(&mut self) {
    let result = unsafe { munmap(self.start.as_ptr() as *mut c_void, self.len) };

    if result != 0 {
      log::error!(
        "munmap of {} bytes at {:?} failed: {}",
        self.len,
        self.start,
        io::Error::last_os_error()
      );
    }
  }
}
