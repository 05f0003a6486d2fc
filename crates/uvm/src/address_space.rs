//! Address space management.
//!
//! An address space is the per-process view of user memory: the regions a program has
//! declared, the page table that backs them, and the top of the user stack. Pages are not
//! populated up front; the fault handler asks the address space to resolve each first
//! touch against the declared regions.

use crate::{
    Cpu, FaultKind, FrameAllocator, InterruptControl, PageNumber, PageTable, PhysicalAddress,
    TlbEntry, TranslationCache, VirtualAddress, VmError,
    layout::{USER_STACK_SIZE, USER_STACK_TOP},
    region::{Permissions, Region, RegionList},
};

/// A user virtual address space.
///
/// Each address space owns its page table and, through it, every frame mapped into it.
/// Dropping the address space releases all of them.
pub struct AddressSpace<F: FrameAllocator> {
    regions: RegionList,
    page_table: PageTable<F>,
    stack_base: VirtualAddress,
    /// True between `begin_load` and `end_load`.
    loading: bool,
}

impl<F: FrameAllocator> AddressSpace<F> {
    /// Creates an empty address space whose frames come from `frames`.
    pub fn create(frames: F) -> Result<Self, VmError> {
        let page_table = PageTable::new(frames)?;
        log::debug!("created address space");
        Ok(Self {
            regions: RegionList::new(),
            page_table,
            stack_base: VirtualAddress::new(USER_STACK_TOP),
            loading: false,
        })
    }

    /// Makes an independent copy of this address space for a forked process.
    ///
    /// Regions are copied with both permission sets in declaration order. Every mapped page
    /// is copied into a fresh frame. On failure nothing allocated for the copy survives and
    /// `self` is unchanged.
    pub fn copy(&self) -> Result<Self, VmError>
    where
        F: Clone,
    {
        let regions = self.regions.try_clone()?;
        let page_table = self.page_table.copy()?;
        log::debug!(
            "copied address space ({} regions, {} pages)",
            regions.as_slice().len(),
            page_table.mapped_count()
        );

        Ok(Self {
            regions,
            page_table,
            stack_base: self.stack_base,
            loading: self.loading,
        })
    }

    /// Destroys this address space, releasing every frame it owns.
    pub fn destroy(mut self) {
        log::debug!(
            "destroying address space ({} pages)",
            self.page_table.mapped_count()
        );
        self.page_table.destroy();
    }

    /// Declares a region covering `[address, address + length)`.
    ///
    /// The base is aligned down and the length rounded up so the whole byte range is
    /// covered. Regions are never merged; where declarations overlap, the most recent one
    /// decides.
    pub fn define_region(
        &mut self,
        address: usize,
        length: usize,
        permissions: Permissions,
    ) -> Result<(), VmError> {
        let region = Region::new(address, length, permissions)?;
        self.regions.push(region)?;
        log::debug!(
            "defined region {}..{:#x} {:?}",
            region.base(),
            region.base().as_usize() + region.size(),
            permissions
        );
        Ok(())
    }

    /// Declares the user stack just below the stack base and returns the initial stack
    /// pointer.
    pub fn define_stack(&mut self) -> Result<VirtualAddress, VmError> {
        let bottom = self.stack_base.as_usize() - USER_STACK_SIZE;
        self.define_region(bottom, USER_STACK_SIZE, Permissions::ALL)?;
        Ok(self.stack_base)
    }

    /// Makes every region readable and writable so a loader can fill it in.
    ///
    /// Returns [`VmError::InvalidArgument`] if loading has already begun.
    pub fn begin_load(&mut self) -> Result<(), VmError> {
        if self.loading {
            return Err(VmError::InvalidArgument);
        }

        self.regions.widen_for_load();
        self.loading = true;
        log::debug!("load phase started");
        Ok(())
    }

    /// Restores the permissions saved by [`begin_load`](Self::begin_load) and invalidates
    /// the translation cache, so no translation made during loading outlives it.
    ///
    /// Returns [`VmError::InvalidArgument`] if loading has not begun.
    pub fn end_load<T: TranslationCache, I: InterruptControl>(
        &mut self,
        cpu: &Cpu<T, I>,
    ) -> Result<(), VmError> {
        if !self.loading {
            return Err(VmError::InvalidArgument);
        }

        self.regions.restore_after_load();
        self.loading = false;
        cpu.invalidate_tlb();
        log::debug!("load phase finished");
        Ok(())
    }

    /// Returns the declared regions in declaration order.
    pub fn regions(&self) -> &[Region] {
        self.regions.as_slice()
    }

    /// Returns the page table backing this address space.
    pub fn page_table(&self) -> &PageTable<F> {
        &self.page_table
    }

    /// Returns the top of the user stack.
    pub fn stack_base(&self) -> VirtualAddress {
        self.stack_base
    }

    /// Returns true between [`begin_load`](Self::begin_load) and [`end_load`](Self::end_load).
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Returns the physical address `address` is mapped to, if its page has been populated.
    pub fn translate(&self, address: VirtualAddress) -> Option<PhysicalAddress> {
        let entry = self.page_table.entry(address.page_number())?;
        Some(entry.frame() + address.page_offset())
    }

    /// Checks an access against the declared regions and returns the translation to
    /// install, populating the page on first touch.
    ///
    /// Permissions are checked on every call, including for pages that are already mapped,
    /// so tightening at the end of the load phase applies to pages populated during it.
    pub(crate) fn resolve_fault(
        &mut self,
        kind: FaultKind,
        page: PageNumber,
    ) -> Result<TlbEntry, VmError> {
        if self.regions.is_empty() {
            log::debug!("fault at {}: no regions defined", page.start());
            return Err(VmError::ProtectionFault);
        }

        let Some(region) = self.regions.find(page) else {
            log::debug!("fault at {}: outside every region", page.start());
            return Err(VmError::ProtectionFault);
        };

        let permissions = region.permissions();
        let allowed = match kind {
            FaultKind::Read => true,
            FaultKind::Write => permissions.is_writable(),
            FaultKind::Execute => permissions.is_executable(),
            FaultKind::ReadOnlyViolation => false,
        };
        if !allowed {
            log::debug!(
                "fault at {}: {:?} not permitted by {:?}",
                page.start(),
                kind,
                permissions
            );
            return Err(VmError::ProtectionFault);
        }

        let entry = match self.page_table.entry(page) {
            Some(entry) => entry,
            None => self
                .page_table
                .create_entry(page, permissions.is_writable())?,
        };

        Ok(TlbEntry::new(
            page.start(),
            entry.with_dirty(entry.is_dirty() && permissions.is_writable()),
        ))
    }
}
