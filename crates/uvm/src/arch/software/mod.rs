//! Software emulation for testing and development.
//!
//! This module provides an emulated machine that runs on any host:
//! - [`EmulatedMemory`], a zeroed buffer standing in for physical memory.
//! - [`EmulatedFrameAllocator`], which hands out page frames from that buffer and keeps
//!   allocation counters so tests can check that every frame comes back exactly once.
//! - [`EmulatedMachine`], a software-refilled translation cache with an interrupt flag.

mod frames;
mod machine;
mod memory;

pub use frames::EmulatedFrameAllocator;
pub use machine::EmulatedMachine;
pub use memory::EmulatedMemory;
