//! Architecture-specific translation cache and interrupt control.
//!
//! On x86_64 kernels the hardware interrupt controller is exported. Tests and the
//! `software-emulation` feature get an emulated machine instead, together with emulated
//! physical memory to allocate frames from.

// The hardware module is compiled during tests too so that rust-analyzer can see it.
#[cfg(target_arch = "x86_64")]
mod x86_64;
#[cfg(all(target_arch = "x86_64", not(test), not(feature = "software-emulation")))]
pub use self::x86_64::*;

#[cfg(any(test, feature = "software-emulation"))]
mod software;
#[cfg(any(test, feature = "software-emulation"))]
pub use software::*;
