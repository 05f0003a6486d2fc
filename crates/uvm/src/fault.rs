//! User page fault handling.
//!
//! Every page starts out unmapped. The first access to a page raises a fault, which is
//! resolved here against the regions declared in the current address space: a permitted
//! access materializes a zero-filled page and installs its translation, anything else is
//! reported back to the trap handler as an error.

use crate::{Cpu, InterruptControl, ProcessContext, TranslationCache, VirtualAddress, VmError};

/// The kind of access that caused a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// A load from an unmapped page.
    Read,
    /// A store to an unmapped page.
    Write,
    /// An instruction fetch from an unmapped page.
    Execute,
    /// A store to a page whose translation is installed read-only.
    ReadOnlyViolation,
}

impl FaultKind {
    /// Decodes the fault code passed up by the trap handler.
    ///
    /// Only read, write and read-only violation have trap codes. Instruction fetches are
    /// reported through the typed [`handle_fault`] entry point.
    pub const fn from_raw(code: u32) -> Result<Self, VmError> {
        match code {
            0 => Ok(Self::Read),
            1 => Ok(Self::Write),
            2 => Ok(Self::ReadOnlyViolation),
            _ => Err(VmError::InvalidArgument),
        }
    }
}

/// Resolves a fault at `address` in the current process's address space.
///
/// On success the translation for the faulting page is in the translation cache and the
/// access can be retried.
pub fn handle_fault<C, T, I>(
    context: &mut C,
    cpu: &Cpu<T, I>,
    kind: FaultKind,
    address: usize,
) -> Result<(), VmError>
where
    C: ProcessContext + ?Sized,
    T: TranslationCache,
    I: InterruptControl,
{
    // Translations are only installed writable for writable pages.
    if kind == FaultKind::ReadOnlyViolation {
        log::debug!("fault at {:#x}: write to read-only page", address);
        return Err(VmError::ProtectionFault);
    }

    if address == 0 {
        log::debug!("fault at null address");
        return Err(VmError::ProtectionFault);
    }

    let Some(space) = context.current_address_space() else {
        log::debug!("fault at {:#x}: no address space", address);
        return Err(VmError::ProtectionFault);
    };

    let Some(address) = VirtualAddress::try_new(address) else {
        log::debug!("fault at {:#x}: outside the user address space", address);
        return Err(VmError::ProtectionFault);
    };

    let entry = space.resolve_fault(kind, address.page_number())?;
    cpu.install(entry);
    Ok(())
}

/// Decodes a raw fault code and resolves the fault.
///
/// Unknown codes are rejected with [`VmError::InvalidArgument`] before anything else is
/// looked at.
pub fn handle_raw_fault<C, T, I>(
    context: &mut C,
    cpu: &Cpu<T, I>,
    code: u32,
    address: usize,
) -> Result<(), VmError>
where
    C: ProcessContext + ?Sized,
    T: TranslationCache,
    I: InterruptControl,
{
    let kind = FaultKind::from_raw(code).inspect_err(|_| {
        log::debug!("fault at {:#x}: unknown fault code {}", address, code);
    })?;
    handle_fault(context, cpu, kind, address)
}
