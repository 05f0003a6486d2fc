//! Virtual page numbers.
//!
//! A page number is the 20-bit key of the page table. It knows how to split itself into
//! the first- and second-level indices used to walk the table.

use core::{
    fmt,
    iter::Step,
    ops::{Add, Sub},
};

use crate::{address::VirtualAddress, layout};

/// A user virtual page number.
///
/// Page numbers are zero-indexed and correspond to `PAGE_SIZE`-aligned virtual addresses.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PageNumber(usize);

impl PageNumber {
    /// Creates a new page number.
    #[inline]
    pub const fn new(number: usize) -> Self {
        Self(number)
    }

    /// Builds a page number from its first- and second-level indices.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range for its level.
    #[inline]
    pub const fn from_indices(first: usize, second: usize) -> Self {
        assert!(
            first < layout::FIRST_LEVEL_ENTRIES,
            "first-level index out of range"
        );
        assert!(
            second < layout::SECOND_LEVEL_ENTRIES,
            "second-level index out of range"
        );
        Self((first << layout::SECOND_LEVEL_BITS) | second)
    }

    /// Returns the raw page number.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Returns the first-level table index for this page.
    #[inline]
    pub const fn first_index(self) -> usize {
        layout::page_index(self.0 << layout::PAGE_SHIFT, 1)
    }

    /// Returns the second-level block index for this page.
    #[inline]
    pub const fn second_index(self) -> usize {
        layout::page_index(self.0 << layout::PAGE_SHIFT, 0)
    }

    /// Returns the virtual address at the start of this page.
    #[inline]
    pub const fn start(self) -> VirtualAddress {
        VirtualAddress::new(self.0 * layout::PAGE_SIZE)
    }
}

impl fmt::Debug for PageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageNumber({:#x})", self.0)
    }
}

impl fmt::Display for PageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<VirtualAddress> for PageNumber {
    #[inline]
    fn from(addr: VirtualAddress) -> Self {
        Self::new(addr.as_usize() / layout::PAGE_SIZE)
    }
}

impl Add<usize> for PageNumber {
    type Output = Self;

    #[inline]
    fn add(self, rhs: usize) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl Sub<usize> for PageNumber {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: usize) -> Self::Output {
        Self(self.0 - rhs)
    }
}

impl Sub<PageNumber> for PageNumber {
    type Output = usize;

    #[inline]
    fn sub(self, rhs: PageNumber) -> Self::Output {
        self.0 - rhs.0
    }
}

impl Step for PageNumber {
    fn steps_between(start: &Self, end: &Self) -> (usize, Option<usize>) {
        if start <= end {
            let diff = end.0 - start.0;
            (diff, Some(diff))
        } else {
            (0, None)
        }
    }

    fn forward_checked(start: Self, count: usize) -> Option<Self> {
        start.0.checked_add(count).map(Self)
    }

    fn backward_checked(start: Self, count: usize) -> Option<Self> {
        start.0.checked_sub(count).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_address() {
        let page = PageNumber::new(1);
        assert_eq!(page.start().as_usize(), layout::PAGE_SIZE);
    }

    #[test]
    fn from_virtual_address() {
        let addr = VirtualAddress::new(layout::PAGE_SIZE * 3 + 10);
        assert_eq!(PageNumber::from(addr).as_usize(), 3);
    }

    #[test]
    fn indices_round_trip() {
        let page = PageNumber::from_indices(0x7FF, 0x1FF);
        assert_eq!(page.as_usize(), 0xFFFFF);
        assert_eq!(page.first_index(), 0x7FF);
        assert_eq!(page.second_index(), 0x1FF);
    }

    #[test]
    fn adjacent_pages_share_a_block() {
        let page = VirtualAddress::new(0x1000).page_number();
        let next = page + 1;
        assert_eq!(page.first_index(), next.first_index());
        assert_eq!(next.second_index(), page.second_index() + 1);
    }

    #[test]
    fn crossing_a_block_boundary() {
        let last = PageNumber::from_indices(0, layout::SECOND_LEVEL_ENTRIES - 1);
        let next = last + 1;
        assert_eq!(next.first_index(), 1);
        assert_eq!(next.second_index(), 0);
    }

    #[test]
    #[should_panic(expected = "second-level index out of range")]
    fn rejects_wide_second_index() {
        PageNumber::from_indices(0, layout::SECOND_LEVEL_ENTRIES);
    }

    #[test]
    fn iterates_ranges() {
        let start = PageNumber::new(4);
        let pages: Vec<_> = (start..start + 3).collect();
        assert_eq!(
            pages,
            [PageNumber::new(4), PageNumber::new(5), PageNumber::new(6)]
        );
    }

    #[test]
    fn sub_page() {
        assert_eq!(PageNumber::new(10) - PageNumber::new(3), 7);
    }
}
