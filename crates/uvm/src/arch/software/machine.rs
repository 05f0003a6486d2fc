use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use spin::Mutex;

use crate::{
    InterruptControl, InterruptLevel, TlbEntry, TranslationCache, VirtualAddress,
    layout::TLB_SLOTS,
};

/// An emulated processor with a software-refilled translation cache.
///
/// Slot selection prefers an empty slot and falls back to a pseudo-random victim once the
/// cache is full. Touching the cache while interrupts are enabled panics.
pub struct EmulatedMachine {
    slots: Mutex<[Option<TlbEntry>; TLB_SLOTS]>,
    masked: AtomicBool,
    seed: AtomicU32,
    invalidations: AtomicUsize,
}

impl EmulatedMachine {
    /// Creates a machine with interrupts enabled and every slot empty.
    pub const fn new() -> Self {
        Self {
            slots: Mutex::new([None; TLB_SLOTS]),
            masked: AtomicBool::new(false),
            seed: AtomicU32::new(0x2545_F491),
            invalidations: AtomicUsize::new(0),
        }
    }

    /// Returns the cached translation for the page containing `address`.
    pub fn lookup(&self, address: VirtualAddress) -> Option<TlbEntry> {
        let page = address.page_base();
        self.slots
            .lock()
            .iter()
            .flatten()
            .find(|entry| entry.page() == page)
            .copied()
    }

    /// Returns the number of occupied slots.
    pub fn live_entries(&self) -> usize {
        self.slots.lock().iter().flatten().count()
    }

    /// Returns how many times the whole cache has been invalidated.
    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::Relaxed)
    }

    /// Returns whether interrupts are currently masked.
    pub fn is_masked(&self) -> bool {
        self.masked.load(Ordering::Relaxed)
    }

    /// Next slot index from a xorshift sequence.
    fn random_slot(&self) -> usize {
        let mut x = self.seed.load(Ordering::Relaxed);
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.seed.store(x, Ordering::Relaxed);
        x as usize % TLB_SLOTS
    }

    fn assert_masked(&self) {
        assert!(
            self.is_masked(),
            "translation cache written with interrupts enabled"
        );
    }
}

impl Default for EmulatedMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl TranslationCache for EmulatedMachine {
    unsafe fn invalidate_all(&self) {
        self.assert_masked();
        self.slots.lock().fill(None);
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    unsafe fn insert_random(&self, entry: TlbEntry) {
        self.assert_masked();
        let mut slots = self.slots.lock();

        // A page is never cached twice.
        let slot = slots
            .iter()
            .position(|slot| slot.is_some_and(|cached| cached.page() == entry.page()))
            .or_else(|| slots.iter().position(Option::is_none))
            .unwrap_or_else(|| self.random_slot());
        slots[slot] = Some(entry);
    }
}

impl InterruptControl for EmulatedMachine {
    fn mask(&self) -> InterruptLevel {
        if self.masked.swap(true, Ordering::Relaxed) {
            InterruptLevel::Masked
        } else {
            InterruptLevel::Enabled
        }
    }

    fn restore(&self, prior: InterruptLevel) {
        self.masked
            .store(prior == InterruptLevel::Masked, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EntryFlags, PageEntry, PhysicalAddress};

    fn translation(page: usize, frame: usize) -> TlbEntry {
        let mut flags = EntryFlags::empty();
        flags.set_valid(true);
        TlbEntry::new(
            VirtualAddress::new(page),
            PageEntry::new(PhysicalAddress::new(frame), flags),
        )
    }

    #[test]
    fn reinserting_a_page_replaces_it() {
        let machine = EmulatedMachine::new();
        machine.mask();
        unsafe {
            machine.insert_random(translation(0x1000, 0x5000));
            machine.insert_random(translation(0x1000, 0x6000));
        }

        assert_eq!(machine.live_entries(), 1);
        assert_eq!(
            machine.lookup(VirtualAddress::new(0x1234)),
            Some(translation(0x1000, 0x6000))
        );
    }

    #[test]
    fn evicts_when_full() {
        let machine = EmulatedMachine::new();
        machine.mask();
        for i in 0..TLB_SLOTS + 8 {
            unsafe { machine.insert_random(translation(i * 0x1000, i * 0x1000)) };
        }
        assert_eq!(machine.live_entries(), TLB_SLOTS);
    }

    #[test]
    #[should_panic(expected = "interrupts enabled")]
    fn unmasked_write_panics() {
        let machine = EmulatedMachine::new();
        unsafe { machine.invalidate_all() };
    }

    #[test]
    fn restore_returns_prior_level() {
        let machine = EmulatedMachine::new();
        let first = machine.mask();
        let second = machine.mask();
        assert_eq!(first, InterruptLevel::Enabled);
        assert_eq!(second, InterruptLevel::Masked);

        machine.restore(second);
        assert!(machine.is_masked());
        machine.restore(first);
        assert!(!machine.is_masked());
    }
}
