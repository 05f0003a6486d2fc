//! Local interrupt masking through the interrupt flag.

use x86_64::instructions::interrupts;

use crate::{InterruptControl, InterruptLevel};

/// Masks interrupts by clearing `RFLAGS.IF`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HardwareInterrupts;

impl InterruptControl for HardwareInterrupts {
    fn mask(&self) -> InterruptLevel {
        let prior = if interrupts::are_enabled() {
            InterruptLevel::Enabled
        } else {
            InterruptLevel::Masked
        };
        interrupts::disable();
        prior
    }

    fn restore(&self, prior: InterruptLevel) {
        if prior == InterruptLevel::Enabled {
            interrupts::enable();
        }
    }
}
