//! x86_64 hardware implementation.
//!
//! Only interrupt masking is provided here. The translation cache belongs to the
//! platform layer, which supplies its own [`TranslationCache`](crate::TranslationCache).

mod interrupts;

pub use interrupts::HardwareInterrupts;
