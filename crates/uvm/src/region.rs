//! Declared memory regions.
//!
//! A region is a page-aligned interval of the user address space together with the access
//! permissions the program declared for it. Regions are only ever appended; lookup scans
//! from the most recently declared region backwards, so a later declaration shadows any
//! earlier one it overlaps.

use alloc::vec::Vec;
use core::{fmt, ops::BitOr, ops::Range};

use crate::{PageNumber, VirtualAddress, VmError, layout};

/// Access permissions of a region.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Permissions(u8);

impl Permissions {
    /// Instruction fetch is allowed.
    pub const EXECUTE: Self = Self(1 << 0);

    /// Stores are allowed.
    pub const WRITE: Self = Self(1 << 1);

    /// Loads are allowed.
    pub const READ: Self = Self(1 << 2);

    /// Read and write, the permissions regions are widened to during loading.
    pub const READ_WRITE: Self = Self(Self::READ.0 | Self::WRITE.0);

    /// Read, write and execute.
    pub const ALL: Self = Self(Self::READ.0 | Self::WRITE.0 | Self::EXECUTE.0);

    /// Creates an empty permission set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Creates a permission set from individual flags.
    pub const fn new(readable: bool, writable: bool, executable: bool) -> Self {
        let mut bits = 0;
        if readable {
            bits |= Self::READ.0;
        }
        if writable {
            bits |= Self::WRITE.0;
        }
        if executable {
            bits |= Self::EXECUTE.0;
        }
        Self(bits)
    }

    /// Returns true if every permission in `other` is also in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns whether loads are allowed.
    pub const fn is_readable(self) -> bool {
        self.contains(Self::READ)
    }

    /// Returns whether stores are allowed.
    pub const fn is_writable(self) -> bool {
        self.contains(Self::WRITE)
    }

    /// Returns whether instruction fetch is allowed.
    pub const fn is_executable(self) -> bool {
        self.contains(Self::EXECUTE)
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |set: bool, c: char| if set { c } else { '-' };
        write!(
            f,
            "Permissions({}{}{})",
            flag(self.is_readable(), 'r'),
            flag(self.is_writable(), 'w'),
            flag(self.is_executable(), 'x')
        )
    }
}

/// A declared, page-aligned interval of the user address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    base: VirtualAddress,
    size: usize,
    permissions: Permissions,
    saved_permissions: Permissions,
}

impl Region {
    /// Creates a region covering every page touched by `[address, address + length)`.
    ///
    /// The base is aligned down and the size rounded up to whole pages. Returns
    /// [`VmError::InvalidArgument`] if the resulting interval leaves the user address space.
    pub fn new(address: usize, length: usize, permissions: Permissions) -> Result<Self, VmError> {
        let base = address & !(layout::PAGE_SIZE - 1);
        if !layout::validate_virtual(base) {
            return Err(VmError::InvalidArgument);
        }

        let end = address
            .checked_add(length)
            .and_then(|end| end.checked_add(layout::PAGE_SIZE - 1))
            .map(|end| end & !(layout::PAGE_SIZE - 1))
            .ok_or(VmError::InvalidArgument)?;

        // The end is exclusive, so it may sit exactly at the top of the address space.
        let size = end - base;
        if size > 0 && !layout::validate_virtual(end - 1) {
            return Err(VmError::InvalidArgument);
        }

        Ok(Self {
            base: VirtualAddress::new(base),
            size,
            permissions,
            saved_permissions: permissions,
        })
    }

    /// Returns the base address of this region.
    pub const fn base(&self) -> VirtualAddress {
        self.base
    }

    /// Returns the size of this region in bytes.
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Returns the permissions currently in effect.
    pub const fn permissions(&self) -> Permissions {
        self.permissions
    }

    /// Returns the permissions saved when loading began.
    pub const fn saved_permissions(&self) -> Permissions {
        self.saved_permissions
    }

    /// Returns the range of pages covered by this region.
    pub fn pages(&self) -> Range<PageNumber> {
        let first = self.base.page_number();
        first..first + self.size / layout::PAGE_SIZE
    }

    /// Returns true if the page lies within `[base, base + size)`.
    pub fn contains(&self, page: PageNumber) -> bool {
        self.pages().contains(&page)
    }

    /// Saves the current permissions and widens them to read and write.
    fn widen_for_load(&mut self) {
        self.saved_permissions = self.permissions;
        self.permissions = Permissions::READ_WRITE;
    }

    /// Restores the permissions saved by [`widen_for_load`](Self::widen_for_load).
    fn restore_after_load(&mut self) {
        self.permissions = self.saved_permissions;
    }
}

/// The regions of one address space, in declaration order.
#[derive(Debug, Default)]
pub(crate) struct RegionList {
    regions: Vec<Region>,
}

impl RegionList {
    /// Creates an empty region list.
    pub const fn new() -> Self {
        Self {
            regions: Vec::new(),
        }
    }

    /// Appends a region, reporting heap exhaustion instead of aborting.
    pub fn push(&mut self, region: Region) -> Result<(), VmError> {
        self.regions.try_reserve(1)?;
        self.regions.push(region);
        Ok(())
    }

    /// Finds the most recently declared region containing the page.
    pub fn find(&self, page: PageNumber) -> Option<&Region> {
        self.regions.iter().rev().find(|region| region.contains(page))
    }

    /// Returns the regions in declaration order.
    pub fn as_slice(&self) -> &[Region] {
        &self.regions
    }

    /// Returns true if no region has been declared.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Makes an independent copy with the same regions in the same order.
    pub fn try_clone(&self) -> Result<Self, VmError> {
        let mut regions = Vec::new();
        regions.try_reserve_exact(self.regions.len())?;
        regions.extend_from_slice(&self.regions);
        Ok(Self { regions })
    }

    /// Widens every region to read and write, saving its permissions.
    pub fn widen_for_load(&mut self) {
        self.regions.iter_mut().for_each(Region::widen_for_load);
    }

    /// Restores every region's saved permissions.
    pub fn restore_after_load(&mut self) {
        self.regions.iter_mut().for_each(Region::restore_after_load);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::PAGE_SIZE;

    fn page(addr: usize) -> PageNumber {
        VirtualAddress::new(addr).page_number()
    }

    mod permissions {
        use super::*;

        #[test]
        fn new_from_flags() {
            let rw = Permissions::new(true, true, false);
            assert!(rw.is_readable());
            assert!(rw.is_writable());
            assert!(!rw.is_executable());
            assert_eq!(rw, Permissions::READ_WRITE);
        }

        #[test]
        fn contains() {
            assert!(Permissions::ALL.contains(Permissions::WRITE));
            assert!(!Permissions::READ.contains(Permissions::WRITE));
            assert!(Permissions::READ.contains(Permissions::empty()));
        }

        #[test]
        fn debug_format() {
            let rx = Permissions::READ | Permissions::EXECUTE;
            assert_eq!(format!("{:?}", rx), "Permissions(r-x)");
        }
    }

    mod region {
        use super::*;

        #[test]
        fn aligns_base_down_and_size_up() {
            let region = Region::new(0x1234, 0x1000, Permissions::READ).unwrap();
            assert_eq!(region.base(), VirtualAddress::new(0x1000));
            assert_eq!(region.size(), 0x2000);
        }

        #[test]
        fn aligned_request_is_unchanged() {
            let region = Region::new(0x1000, 0x2000, Permissions::READ).unwrap();
            assert_eq!(region.base(), VirtualAddress::new(0x1000));
            assert_eq!(region.size(), 0x2000);
        }

        #[test]
        fn empty_request_covers_nothing() {
            let region = Region::new(0x5000, 0, Permissions::READ).unwrap();
            assert_eq!(region.size(), 0);
            assert!(!region.contains(page(0x5000)));
        }

        #[test]
        fn empty_unaligned_request_covers_its_page() {
            let region = Region::new(0x5010, 0, Permissions::READ).unwrap();
            assert_eq!(region.size(), PAGE_SIZE);
        }

        #[test]
        fn half_open_interval() {
            let region = Region::new(0x1000, 0x2000, Permissions::READ).unwrap();
            assert!(!region.contains(page(0x0FFF)));
            assert!(region.contains(page(0x1000)));
            assert!(region.contains(page(0x2FFF)));
            assert!(!region.contains(page(0x3000)));
        }

        #[test]
        fn may_end_at_top_of_address_space() {
            let region = Region::new(0xFFFF_F000, PAGE_SIZE, Permissions::READ).unwrap();
            assert!(region.contains(page(0xFFFF_F000)));
        }

        #[test]
        fn rejects_region_past_top_of_address_space() {
            assert_eq!(
                Region::new(0xFFFF_F000, 2 * PAGE_SIZE, Permissions::READ),
                Err(VmError::InvalidArgument)
            );
            assert_eq!(
                Region::new(usize::MAX - 1, 4, Permissions::READ),
                Err(VmError::InvalidArgument)
            );
        }

        #[test]
        fn permissions_start_saved() {
            let region = Region::new(0x1000, PAGE_SIZE, Permissions::READ).unwrap();
            assert_eq!(region.permissions(), Permissions::READ);
            assert_eq!(region.saved_permissions(), Permissions::READ);
        }

        #[test]
        fn load_widens_then_restores() {
            let mut region =
                Region::new(0x1000, PAGE_SIZE, Permissions::READ | Permissions::EXECUTE)
                    .unwrap();
            region.widen_for_load();
            assert_eq!(region.permissions(), Permissions::READ_WRITE);
            assert_eq!(
                region.saved_permissions(),
                Permissions::READ | Permissions::EXECUTE
            );

            region.restore_after_load();
            assert_eq!(
                region.permissions(),
                Permissions::READ | Permissions::EXECUTE
            );
        }
    }

    mod region_list {
        use super::*;

        #[test]
        fn finds_containing_region() {
            let mut list = RegionList::new();
            list.push(Region::new(0x1000, PAGE_SIZE, Permissions::READ).unwrap())
                .unwrap();
            list.push(Region::new(0x8000, PAGE_SIZE, Permissions::ALL).unwrap())
                .unwrap();

            let found = list.find(page(0x8010)).unwrap();
            assert_eq!(found.base(), VirtualAddress::new(0x8000));
            assert!(list.find(page(0x4000)).is_none());
        }

        #[test]
        fn newest_declaration_wins_overlap() {
            let mut list = RegionList::new();
            list.push(Region::new(0x1000, 4 * PAGE_SIZE, Permissions::READ).unwrap())
                .unwrap();
            list.push(Region::new(0x2000, PAGE_SIZE, Permissions::READ_WRITE).unwrap())
                .unwrap();

            assert_eq!(
                list.find(page(0x2000)).unwrap().permissions(),
                Permissions::READ_WRITE
            );
            assert_eq!(
                list.find(page(0x3000)).unwrap().permissions(),
                Permissions::READ
            );
        }

        #[test]
        fn clone_preserves_order_and_permissions() {
            let mut list = RegionList::new();
            list.push(Region::new(0x1000, PAGE_SIZE, Permissions::READ).unwrap())
                .unwrap();
            list.push(Region::new(0x4000, PAGE_SIZE, Permissions::ALL).unwrap())
                .unwrap();
            list.widen_for_load();

            let copy = list.try_clone().unwrap();
            assert_eq!(copy.as_slice(), list.as_slice());
            assert_eq!(copy.as_slice()[0].saved_permissions(), Permissions::READ);
        }
    }
}
