//! Translation cache and interrupt masking.
//!
//! Writes to the translation cache race with interrupt handlers that may themselves fault,
//! so they are only legal while interrupts are masked on the local processor. [`Cpu`] pairs
//! a translation cache with an interrupt controller and only ever touches the cache while
//! holding an [`InterruptGuard`], which restores the prior interrupt level when dropped.

use crate::{PageEntry, VirtualAddress};

/// A translation as written into the translation cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlbEntry {
    page: VirtualAddress,
    entry: PageEntry,
}

impl TlbEntry {
    /// Creates a translation from the start of a virtual page to a page table entry.
    pub fn new(page: VirtualAddress, entry: PageEntry) -> Self {
        debug_assert!(page.page_offset() == 0, "virtual page must be page-aligned");
        Self { page, entry }
    }

    /// Returns the virtual page this translation covers.
    pub fn page(&self) -> VirtualAddress {
        self.page
    }

    /// Returns the frame address and state bits.
    pub fn entry(&self) -> PageEntry {
        self.entry
    }
}

/// Hardware translation cache primitives.
pub trait TranslationCache {
    /// Invalidates every slot.
    ///
    /// # Safety
    /// Interrupts must be masked on the local processor.
    unsafe fn invalidate_all(&self);

    /// Writes a translation into a slot chosen by the hardware.
    ///
    /// # Safety
    /// Interrupts must be masked on the local processor.
    unsafe fn insert_random(&self, entry: TlbEntry);
}

impl<T: TranslationCache + ?Sized> TranslationCache for &T {
    unsafe fn invalidate_all(&self) {
        // SAFETY: Forwarded contract.
        unsafe { (**self).invalidate_all() }
    }

    unsafe fn insert_random(&self, entry: TlbEntry) {
        // SAFETY: Forwarded contract.
        unsafe { (**self).insert_random(entry) }
    }
}

/// Interrupt level of the local processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptLevel {
    /// Interrupts are delivered.
    Enabled,
    /// Interrupts are held off.
    Masked,
}

/// Local interrupt masking primitives.
pub trait InterruptControl {
    /// Masks interrupts and returns the level that was in effect before.
    fn mask(&self) -> InterruptLevel;

    /// Returns to a level previously returned by [`mask`](InterruptControl::mask).
    fn restore(&self, prior: InterruptLevel);
}

impl<I: InterruptControl + ?Sized> InterruptControl for &I {
    fn mask(&self) -> InterruptLevel {
        (**self).mask()
    }

    fn restore(&self, prior: InterruptLevel) {
        (**self).restore(prior)
    }
}

/// Keeps interrupts masked until dropped.
#[must_use = "interrupts are restored as soon as the guard is dropped"]
pub struct InterruptGuard<'a, I: InterruptControl> {
    control: &'a I,
    prior: InterruptLevel,
}

impl<'a, I: InterruptControl> InterruptGuard<'a, I> {
    /// Masks interrupts through `control`.
    pub fn new(control: &'a I) -> Self {
        let prior = control.mask();
        Self { control, prior }
    }

    /// Returns the level that will be restored.
    pub fn prior(&self) -> InterruptLevel {
        self.prior
    }
}

impl<I: InterruptControl> Drop for InterruptGuard<'_, I> {
    fn drop(&mut self) {
        self.control.restore(self.prior);
    }
}

/// The translation cache and interrupt controller of the local processor.
pub struct Cpu<T, I> {
    tlb: T,
    interrupts: I,
}

impl<T: TranslationCache, I: InterruptControl> Cpu<T, I> {
    /// Creates a new processor handle.
    pub const fn new(tlb: T, interrupts: I) -> Self {
        Self { tlb, interrupts }
    }

    /// Returns the translation cache.
    pub fn tlb(&self) -> &T {
        &self.tlb
    }

    /// Returns the interrupt controller.
    pub fn interrupts(&self) -> &I {
        &self.interrupts
    }

    /// Masks interrupts until the returned guard is dropped.
    pub fn mask_interrupts(&self) -> InterruptGuard<'_, I> {
        InterruptGuard::new(&self.interrupts)
    }

    /// Invalidates the whole translation cache.
    pub fn invalidate_tlb(&self) {
        let _guard = self.mask_interrupts();
        // SAFETY: Interrupts are masked until `_guard` is dropped.
        unsafe { self.tlb.invalidate_all() };
    }

    /// Installs a translation in a random slot of the translation cache.
    pub fn install(&self, entry: TlbEntry) {
        #[cfg(feature = "detailed-logging")]
        log::trace!(
            "tlb: {} -> {} (dirty: {})",
            entry.page(),
            entry.entry().frame(),
            entry.entry().is_dirty()
        );

        let _guard = self.mask_interrupts();
        // SAFETY: Interrupts are masked until `_guard` is dropped.
        unsafe { self.tlb.insert_random(entry) };
    }

    /// Requests invalidation of `page` on other processors.
    ///
    /// # Panics
    /// Always. Translation caches are only maintained for a single processor.
    pub fn shootdown(&self, page: VirtualAddress) -> ! {
        panic!("tried to do TLB shootdown for {}", page);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EmulatedMachine, EntryFlags, PhysicalAddress};

    fn translation(page: usize, frame: usize) -> TlbEntry {
        let mut flags = EntryFlags::empty();
        flags.set_valid(true);
        TlbEntry::new(
            VirtualAddress::new(page),
            PageEntry::new(PhysicalAddress::new(frame), flags),
        )
    }

    #[test]
    fn guard_restores_enabled_level() {
        let machine = EmulatedMachine::new();
        {
            let guard = InterruptGuard::new(&machine);
            assert_eq!(guard.prior(), InterruptLevel::Enabled);
            assert!(machine.is_masked());
        }
        assert!(!machine.is_masked());
    }

    #[test]
    fn nested_guards_restore_in_order() {
        let machine = EmulatedMachine::new();
        let outer = InterruptGuard::new(&machine);
        {
            let inner = InterruptGuard::new(&machine);
            assert_eq!(inner.prior(), InterruptLevel::Masked);
        }
        assert!(machine.is_masked());
        drop(outer);
        assert!(!machine.is_masked());
    }

    #[test]
    fn install_masks_then_restores() {
        let machine = EmulatedMachine::new();
        let cpu = Cpu::new(&machine, &machine);

        cpu.install(translation(0x1000, 0x5000));
        assert!(!machine.is_masked());
        assert_eq!(
            machine.lookup(VirtualAddress::new(0x1000)),
            Some(translation(0x1000, 0x5000))
        );
    }

    #[test]
    fn install_keeps_caller_mask() {
        let machine = EmulatedMachine::new();
        let cpu = Cpu::new(&machine, &machine);

        let _guard = cpu.mask_interrupts();
        cpu.install(translation(0x1000, 0x5000));
        assert!(machine.is_masked());
    }

    #[test]
    fn invalidate_clears_every_slot() {
        let machine = EmulatedMachine::new();
        let cpu = Cpu::new(&machine, &machine);

        cpu.install(translation(0x1000, 0x5000));
        cpu.install(translation(0x2000, 0x6000));
        cpu.invalidate_tlb();

        assert_eq!(machine.live_entries(), 0);
        assert_eq!(machine.invalidations(), 1);
        assert!(!machine.is_masked());
    }

    #[test]
    #[should_panic(expected = "tried to do TLB shootdown")]
    fn shootdown_is_fatal() {
        let machine = EmulatedMachine::new();
        let cpu = Cpu::new(&machine, &machine);
        cpu.shootdown(VirtualAddress::new(0x1000));
    }
}
