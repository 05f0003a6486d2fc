//! The physical frame allocator contract.

use core::ptr;

use crate::{PhysicalAddress, layout::PAGE_SIZE};

/// A source of physical page frames.
///
/// The virtual memory core never decides where frames come from; it only asks for one
/// frame at a time and hands frames back when the owning page table is torn down.
/// Allocators use interior mutability so that many page tables can share one.
///
/// # Safety
///
/// For every frame returned by [`allocate_frame`](FrameAllocator::allocate_frame) and not
/// yet released, [`frame_ptr`](FrameAllocator::frame_ptr) must return a kernel pointer that
/// is valid for reads and writes of `PAGE_SIZE` bytes and does not alias any other frame.
pub unsafe trait FrameAllocator {
    /// Allocates one page-aligned frame, or returns `None` if physical memory is exhausted.
    fn allocate_frame(&self) -> Option<PhysicalAddress>;

    /// Returns a frame to the allocator.
    ///
    /// # Safety
    ///
    /// The frame must have come from this allocator and must not be used afterwards.
    unsafe fn release_frame(&self, frame: PhysicalAddress);

    /// Translates a frame to a kernel pointer through which its contents can be accessed.
    fn frame_ptr(&self, frame: PhysicalAddress) -> *mut u8;

    /// Fills a frame with zeroes.
    fn zero_fill(&self, frame: PhysicalAddress) {
        // SAFETY: The trait contract guarantees `frame_ptr` covers a whole page.
        unsafe { ptr::write_bytes(self.frame_ptr(frame), 0, PAGE_SIZE) }
    }
}

unsafe impl<T: FrameAllocator + ?Sized> FrameAllocator for &T {
    fn allocate_frame(&self) -> Option<PhysicalAddress> {
        (**self).allocate_frame()
    }

    unsafe fn release_frame(&self, frame: PhysicalAddress) {
        // SAFETY: Forwarded contract.
        unsafe { (**self).release_frame(frame) }
    }

    fn frame_ptr(&self, frame: PhysicalAddress) -> *mut u8 {
        (**self).frame_ptr(frame)
    }

    fn zero_fill(&self, frame: PhysicalAddress) {
        (**self).zero_fill(frame)
    }
}
