//! Page table entries.

use crate::{PhysicalAddress, layout::PAGE_SIZE};

/// State bits stored alongside a frame address in a page table entry.
///
/// The bit positions follow the low word of a software-refilled TLB entry, so an entry can
/// be written into the translation cache unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryFlags(usize);

impl EntryFlags {
    /// Valid bit (bit 9).
    const VALID: usize = 1 << 9;

    /// Dirty bit (bit 10). Set when the page may be written.
    const DIRTY: usize = 1 << 10;

    /// Creates empty flags (entry not valid).
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Creates flags from a raw usize value.
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw & (Self::VALID | Self::DIRTY))
    }

    /// Returns the raw usize value of these flags.
    pub const fn to_raw(self) -> usize {
        self.0
    }

    /// Returns whether the valid bit is set.
    pub fn is_valid(self) -> bool {
        (self.0 & Self::VALID) != 0
    }

    /// Sets or clears the valid bit.
    pub fn set_valid(&mut self, valid: bool) {
        if valid {
            self.0 |= Self::VALID;
        } else {
            self.0 &= !Self::VALID;
        }
    }

    /// Returns whether the dirty bit is set.
    pub fn is_dirty(self) -> bool {
        (self.0 & Self::DIRTY) != 0
    }

    /// Sets or clears the dirty bit.
    pub fn set_dirty(&mut self, dirty: bool) {
        if dirty {
            self.0 |= Self::DIRTY;
        } else {
            self.0 &= !Self::DIRTY;
        }
    }
}

impl Default for EntryFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// A single page table entry: a frame address with its low 12 bits replaced by flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct PageEntry(usize);

impl PageEntry {
    /// Frame address mask (everything above the page offset).
    const ADDRESS_MASK: usize = !(PAGE_SIZE - 1);

    /// Creates a new page table entry.
    ///
    /// The frame address must be page-aligned.
    pub fn new(frame: PhysicalAddress, flags: EntryFlags) -> Self {
        debug_assert!(
            frame.is_page_aligned(),
            "frame address must be page-aligned"
        );
        Self((frame.as_usize() & Self::ADDRESS_MASK) | flags.to_raw())
    }

    /// Returns the frame address stored in this entry.
    pub fn frame(self) -> PhysicalAddress {
        PhysicalAddress::new(self.0 & Self::ADDRESS_MASK)
    }

    /// Returns the flags for this entry.
    pub fn flags(self) -> EntryFlags {
        EntryFlags::from_raw(self.0)
    }

    /// Returns whether the valid bit is set.
    pub fn is_valid(self) -> bool {
        self.flags().is_valid()
    }

    /// Returns whether the dirty bit is set.
    pub fn is_dirty(self) -> bool {
        self.flags().is_dirty()
    }

    /// Returns a copy of this entry with the dirty bit replaced.
    pub fn with_dirty(self, dirty: bool) -> Self {
        let mut flags = self.flags();
        flags.set_dirty(dirty);
        Self::new(self.frame(), flags)
    }

    /// Returns the raw usize value of this entry.
    pub const fn as_usize(self) -> usize {
        self.0
    }
}
