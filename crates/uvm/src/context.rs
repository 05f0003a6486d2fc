//! Address space switching.

use crate::{AddressSpace, Cpu, FrameAllocator, InterruptControl, TranslationCache};

/// Access to the address space of the process running on the local processor.
pub trait ProcessContext {
    /// The frame allocator backing the process's address space.
    type Frames: FrameAllocator;

    /// Returns the current address space, or `None` for a kernel-only thread.
    fn current_address_space(&mut self) -> Option<&mut AddressSpace<Self::Frames>>;
}

impl<F: FrameAllocator> ProcessContext for Option<AddressSpace<F>> {
    type Frames = F;

    fn current_address_space(&mut self) -> Option<&mut AddressSpace<F>> {
        self.as_mut()
    }
}

/// Makes the current process's address space the one the processor translates through.
///
/// Translations are only ever cached for one address space, so switching simply discards
/// all of them. Kernel-only threads have no address space and leave the cache untouched.
pub fn activate<C, T, I>(context: &mut C, cpu: &Cpu<T, I>)
where
    C: ProcessContext + ?Sized,
    T: TranslationCache,
    I: InterruptControl,
{
    if context.current_address_space().is_none() {
        return;
    }

    cpu.invalidate_tlb();
}

/// Stops translating through the current process's address space.
///
/// This has the same effect as [`activate`].
pub fn deactivate<C, T, I>(context: &mut C, cpu: &Cpu<T, I>)
where
    C: ProcessContext + ?Sized,
    T: TranslationCache,
    I: InterruptControl,
{
    activate(context, cpu);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        EmulatedFrameAllocator, EmulatedMachine, EntryFlags, PageEntry, PhysicalAddress, TlbEntry,
        VirtualAddress,
    };

    fn prime(cpu: &Cpu<&EmulatedMachine, &EmulatedMachine>) {
        let mut flags = EntryFlags::empty();
        flags.set_valid(true);
        cpu.install(TlbEntry::new(
            VirtualAddress::new(0x1000),
            PageEntry::new(PhysicalAddress::new(0x5000), flags),
        ));
    }

    #[test]
    fn activate_invalidates_every_slot() {
        let frames = EmulatedFrameAllocator::new(1);
        let machine = EmulatedMachine::new();
        let cpu = Cpu::new(&machine, &machine);
        let mut context = Some(AddressSpace::create(&frames).unwrap());

        prime(&cpu);
        activate(&mut context, &cpu);

        assert_eq!(machine.live_entries(), 0);
        assert_eq!(machine.invalidations(), 1);
        assert!(!machine.is_masked());
    }

    #[test]
    fn kernel_thread_leaves_cache_alone() {
        let machine = EmulatedMachine::new();
        let cpu = Cpu::new(&machine, &machine);
        let mut context: Option<AddressSpace<&EmulatedFrameAllocator>> = None;

        prime(&cpu);
        activate(&mut context, &cpu);
        deactivate(&mut context, &cpu);

        assert_eq!(machine.live_entries(), 1);
        assert_eq!(machine.invalidations(), 0);
    }

    #[test]
    fn deactivate_matches_activate() {
        let frames = EmulatedFrameAllocator::new(1);
        let machine = EmulatedMachine::new();
        let cpu = Cpu::new(&machine, &machine);
        let mut context = Some(AddressSpace::create(&frames).unwrap());

        prime(&cpu);
        deactivate(&mut context, &cpu);
        assert_eq!(machine.live_entries(), 0);
    }
}
