use alloc::alloc::{Layout, alloc_zeroed, dealloc, handle_alloc_error};
use core::ptr::NonNull;

use crate::{PhysicalAddress, layout::PAGE_SIZE};

/// Emulated physical memory.
///
/// Physical address `0` is the first byte of the buffer. The buffer is page-aligned on the
/// host as well, so emulated frames can be handed out as plain pointers.
pub struct EmulatedMemory {
    base: NonNull<u8>,
    layout: Layout,
}

// SAFETY: The buffer is uniquely owned and only reached through raw pointers whose users
// uphold their own synchronization.
unsafe impl Send for EmulatedMemory {}
unsafe impl Sync for EmulatedMemory {}

impl EmulatedMemory {
    /// Creates a new zeroed memory region of `size` bytes.
    ///
    /// # Panics
    /// Panics if `size` is zero or not a multiple of the page size.
    pub fn new(size: usize) -> Self {
        assert!(
            size > 0 && size % PAGE_SIZE == 0,
            "emulated memory must be a whole number of pages"
        );

        let layout = match Layout::from_size_align(size, PAGE_SIZE) {
            Ok(layout) => layout,
            Err(_) => panic!("emulated memory is too large"),
        };
        // SAFETY: `layout` has a non-zero size.
        let base = unsafe { alloc_zeroed(layout) };
        let Some(base) = NonNull::new(base) else {
            handle_alloc_error(layout)
        };

        Self { base, layout }
    }

    /// Translates a physical address to a pointer into the buffer.
    pub fn translate(&self, phys: PhysicalAddress) -> *mut u8 {
        assert!(
            phys.as_usize() < self.size(),
            "physical address out of bounds"
        );
        // SAFETY: Checked to be within the buffer above.
        unsafe { self.base.as_ptr().add(phys.as_usize()) }
    }

    /// Returns the size of the emulated memory region.
    pub fn size(&self) -> usize {
        self.layout.size()
    }
}

impl Drop for EmulatedMemory {
    fn drop(&mut self) {
        // SAFETY: Allocated in `new` with the same layout.
        unsafe { dealloc(self.base.as_ptr(), self.layout) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_zeroed() {
        let memory = EmulatedMemory::new(2 * PAGE_SIZE);
        let last = memory.translate(PhysicalAddress::new(2 * PAGE_SIZE - 1));
        assert_eq!(unsafe { *last }, 0);
    }

    #[test]
    fn host_buffer_is_page_aligned() {
        let memory = EmulatedMemory::new(PAGE_SIZE);
        assert_eq!(memory.translate(PhysicalAddress::new(0)) as usize % PAGE_SIZE, 0);
    }

    #[test]
    #[should_panic(expected = "physical address out of bounds")]
    fn rejects_address_past_end() {
        let memory = EmulatedMemory::new(PAGE_SIZE);
        memory.translate(PhysicalAddress::new(PAGE_SIZE));
    }
}
