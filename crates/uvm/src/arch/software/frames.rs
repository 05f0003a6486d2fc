use alloc::vec::Vec;
use spin::Mutex;

use super::EmulatedMemory;
use crate::{FrameAllocator, PhysicalAddress, layout::PAGE_SIZE};

struct State {
    /// Released frames, reused most recent first.
    free: Vec<PhysicalAddress>,
    /// Frames below this index have been handed out at least once.
    next: usize,
    in_use: Vec<bool>,
    allocations: usize,
    releases: usize,
}

/// A frame allocator over a fixed number of emulated frames.
///
/// Released frames are reused before fresh ones. Releasing a frame that is not allocated
/// panics, which catches double frees in the code under test.
pub struct EmulatedFrameAllocator {
    memory: EmulatedMemory,
    state: Mutex<State>,
}

impl EmulatedFrameAllocator {
    /// Creates an allocator that can hand out at most `frame_limit` frames at once.
    pub fn new(frame_limit: usize) -> Self {
        let mut in_use = Vec::new();
        in_use.resize(frame_limit, false);
        Self {
            memory: EmulatedMemory::new(frame_limit.max(1) * PAGE_SIZE),
            state: Mutex::new(State {
                free: Vec::new(),
                next: 0,
                in_use,
                allocations: 0,
                releases: 0,
            }),
        }
    }

    /// Returns the backing memory.
    pub fn memory(&self) -> &EmulatedMemory {
        &self.memory
    }

    /// Returns the number of frames handed out so far.
    pub fn allocations(&self) -> usize {
        self.state.lock().allocations
    }

    /// Returns the number of frames given back so far.
    pub fn releases(&self) -> usize {
        self.state.lock().releases
    }

    /// Returns the number of frames currently allocated.
    pub fn outstanding(&self) -> usize {
        let state = self.state.lock();
        state.allocations - state.releases
    }
}

// SAFETY: Frames are distinct pages of `memory`, which lives as long as the allocator.
unsafe impl FrameAllocator for EmulatedFrameAllocator {
    fn allocate_frame(&self) -> Option<PhysicalAddress> {
        let mut state = self.state.lock();
        let frame = match state.free.pop() {
            Some(frame) => frame,
            None if state.next < state.in_use.len() => {
                state.next += 1;
                PhysicalAddress::new((state.next - 1) * PAGE_SIZE)
            }
            None => return None,
        };

        state.in_use[frame.as_usize() / PAGE_SIZE] = true;
        state.allocations += 1;
        Some(frame)
    }

    unsafe fn release_frame(&self, frame: PhysicalAddress) {
        let mut state = self.state.lock();
        let index = frame.as_usize() / PAGE_SIZE;
        assert!(
            frame.is_page_aligned() && index < state.in_use.len() && state.in_use[index],
            "released frame {} that is not allocated",
            frame
        );

        state.in_use[index] = false;
        state.free.push(frame);
        state.releases += 1;
    }

    fn frame_ptr(&self, frame: PhysicalAddress) -> *mut u8 {
        self.memory.translate(frame)
    }
}
