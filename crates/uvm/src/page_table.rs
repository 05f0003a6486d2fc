//! Sparse two-level page table.
//!
//! This module provides the `PageTable` type, which maps the 20-bit user page number space
//! to physical frames. The first level is a fixed array of 2048 slots, each either absent
//! or holding the index of a second-level block of 512 entries in an arena. Blocks are
//! created the first time a page in their range is touched and entries the first time the
//! page itself faults, so a small process only pays for the blocks it uses.
//!
//! The table owns every frame it maps. Frames are released when the table is destroyed or
//! dropped.

use alloc::{boxed::Box, vec::Vec};
use core::ptr;

use crate::{
    EntryFlags, FrameAllocator, PageEntry, PageNumber, VmError,
    layout::{FIRST_LEVEL_ENTRIES, PAGE_SIZE, SECOND_LEVEL_ENTRIES},
};

/// Index of a second-level block within the arena.
type BlockIndex = u16;

/// A second-level block. Empty slots are unmapped pages.
struct SecondLevel {
    entries: [Option<PageEntry>; SECOND_LEVEL_ENTRIES],
}

impl SecondLevel {
    /// Allocates a block with every slot empty.
    fn try_new() -> Result<Box<Self>, VmError> {
        Ok(Box::try_new(Self {
            entries: [None; SECOND_LEVEL_ENTRIES],
        })?)
    }
}

/// A lazily populated two-level page table.
///
/// Frames are obtained from, and returned to, the frame allocator `F`.
pub struct PageTable<F: FrameAllocator> {
    /// First-level slots; `Some(index)` refers into `blocks`.
    directory: Box<[Option<BlockIndex>; FIRST_LEVEL_ENTRIES]>,
    /// Second-level blocks in the order they were created.
    blocks: Vec<Box<SecondLevel>>,
    frames: F,
}

impl<F: FrameAllocator> PageTable<F> {
    /// Creates a new page table with every first-level slot absent.
    pub fn new(frames: F) -> Result<Self, VmError> {
        let directory = Box::try_new([None; FIRST_LEVEL_ENTRIES])?;
        Ok(Self {
            directory,
            blocks: Vec::new(),
            frames,
        })
    }

    /// Returns the frame allocator backing this table.
    pub fn frames(&self) -> &F {
        &self.frames
    }

    /// Allocates the second-level block for first-level slot `first`.
    ///
    /// Returns [`VmError::AlreadyExists`] if the block is already present.
    ///
    /// # Panics
    /// Panics if `first >= 2048`.
    pub fn ensure_second_level(&mut self, first: usize) -> Result<(), VmError> {
        assert!(first < FIRST_LEVEL_ENTRIES, "first-level index out of range");
        if self.directory[first].is_some() {
            return Err(VmError::AlreadyExists);
        }

        self.blocks.try_reserve(1)?;
        let block = SecondLevel::try_new()?;
        let index = self.blocks.len() as BlockIndex;
        self.blocks.push(block);
        self.directory[first] = Some(index);
        Ok(())
    }

    /// Maps `page` to a freshly allocated, zero-filled frame.
    ///
    /// The second-level block is created first if needed. The new entry is valid and carries
    /// the given dirty bit. Returns [`VmError::AlreadyExists`] if the page is already mapped,
    /// and [`VmError::OutOfMemory`] if either the block or the frame cannot be allocated.
    pub fn create_entry(&mut self, page: PageNumber, dirty: bool) -> Result<PageEntry, VmError> {
        if self.directory[page.first_index()].is_none() {
            self.ensure_second_level(page.first_index())?;
        }
        if self.exists(page) {
            return Err(VmError::AlreadyExists);
        }

        let frame = self.frames.allocate_frame().ok_or(VmError::OutOfMemory)?;
        self.frames.zero_fill(frame);

        let mut flags = EntryFlags::empty();
        flags.set_valid(true);
        flags.set_dirty(dirty);
        let entry = PageEntry::new(frame, flags);
        *self.slot_mut(page) = Some(entry);

        log::trace!("mapped page {} to frame {}", page, frame);
        Ok(entry)
    }

    /// Returns the entry for `page`, if it is mapped.
    pub fn entry(&self, page: PageNumber) -> Option<PageEntry> {
        let index = self.directory[page.first_index()]?;
        self.blocks[index as usize].entries[page.second_index()]
    }

    /// Returns true if `page` is mapped.
    pub fn exists(&self, page: PageNumber) -> bool {
        self.entry(page).is_some()
    }

    /// Returns an iterator over every mapped page and its entry, in page order.
    pub fn mapped_pages(&self) -> impl Iterator<Item = (PageNumber, PageEntry)> + '_ {
        self.directory
            .iter()
            .enumerate()
            .filter_map(|(first, slot)| slot.map(|index| (first, index)))
            .flat_map(move |(first, index)| {
                self.blocks[index as usize]
                    .entries
                    .iter()
                    .enumerate()
                    .filter_map(move |(second, entry)| {
                        entry.map(|entry| (PageNumber::from_indices(first, second), entry))
                    })
            })
    }

    /// Returns the number of mapped pages.
    pub fn mapped_count(&self) -> usize {
        self.blocks
            .iter()
            .map(|block| block.entries.iter().flatten().count())
            .sum()
    }

    /// Makes an independent copy of this table.
    ///
    /// Every mapped page gets a new frame holding a byte-for-byte copy of the source frame,
    /// with the same dirty bit. If any allocation fails, the frames already given to the copy
    /// are released before [`VmError::OutOfMemory`] is returned. `self` is never modified.
    pub fn copy(&self) -> Result<Self, VmError>
    where
        F: Clone,
    {
        let mut copy = Self::new(self.frames.clone())?;
        copy.blocks.try_reserve_exact(self.blocks.len())?;

        for (page, entry) in self.mapped_pages() {
            if copy.directory[page.first_index()].is_none() {
                copy.ensure_second_level(page.first_index())?;
            }

            let frame = copy.frames.allocate_frame().ok_or(VmError::OutOfMemory)?;
            // SAFETY: Both frames are owned by live tables and the allocator guarantees that
            // distinct frames do not alias.
            unsafe {
                ptr::copy_nonoverlapping(
                    self.frames.frame_ptr(entry.frame()),
                    copy.frames.frame_ptr(frame),
                    PAGE_SIZE,
                );
            }

            let mut flags = entry.flags();
            flags.set_valid(true);
            *copy.slot_mut(page) = Some(PageEntry::new(frame, flags));
        }

        Ok(copy)
    }

    /// Releases every mapped frame and every second-level block.
    ///
    /// The table is left empty and usable; calling this again does nothing.
    pub fn destroy(&mut self) {
        let mut released = 0;
        for block in self.blocks.iter_mut() {
            for slot in block.entries.iter_mut() {
                if let Some(entry) = slot.take() {
                    // SAFETY: The frame was allocated by `create_entry` or `copy` from this
                    // allocator and the slot that owned it has just been cleared.
                    unsafe { self.frames.release_frame(entry.frame()) };
                    released += 1;
                }
            }
        }

        self.blocks.clear();
        self.directory.fill(None);

        if released > 0 {
            log::trace!("released {} frames", released);
        }
    }

    /// Returns the slot for `page`, whose second-level block must already exist.
    fn slot_mut(&mut self, page: PageNumber) -> &mut Option<PageEntry> {
        let index = self.directory[page.first_index()]
            .expect("second-level block should exist");
        &mut self.blocks[index as usize].entries[page.second_index()]
    }
}

impl<F: FrameAllocator> Drop for PageTable<F> {
    fn drop(&mut self) {
        self.destroy();
    }
}
