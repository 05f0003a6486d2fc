#![cfg_attr(not(any(test, feature = "software-emulation")), no_std)]
#![feature(allocator_api)]
#![feature(step_trait)]

//! # Polaris User Virtual Memory (UVM)
//!
//! The Polaris User Virtual Memory crate (UVM) is the per-process virtual memory core of the
//! kernel. It provides:
//!
//! - Address spaces built from declared regions and a lazily populated two-level page table.
//! - A page-fault handler that materializes zero-filled pages on first touch.
//! - Full-copy address space duplication for `fork`.
//! - Translation cache (TLB) population and invalidation with interrupts masked.
//! - Software emulation of physical memory and the TLB for testing in non-kernel environments.

extern crate alloc;

mod address;
mod address_space;
mod arch;
mod context;
mod cpu;
mod entry;
mod error;
mod fault;
mod frame;
pub mod layout;
mod numbers;
mod page_table;
mod region;

pub use address::{PhysicalAddress, VirtualAddress};
pub use address_space::AddressSpace;
pub use context::{ProcessContext, activate, deactivate};
pub use cpu::{Cpu, InterruptControl, InterruptGuard, InterruptLevel, TlbEntry, TranslationCache};
pub use entry::{EntryFlags, PageEntry};
pub use error::VmError;
pub use fault::{FaultKind, handle_fault, handle_raw_fault};
pub use frame::FrameAllocator;
pub use numbers::PageNumber;
pub use page_table::PageTable;
pub use region::{Permissions, Region};

#[cfg(any(test, feature = "software-emulation"))]
pub use arch::{EmulatedFrameAllocator, EmulatedMachine, EmulatedMemory};

#[cfg(all(target_arch = "x86_64", not(test), not(feature = "software-emulation")))]
pub use arch::HardwareInterrupts;

pub use layout::PAGE_SIZE;
