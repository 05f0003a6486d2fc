use alloc::collections::TryReserveError;
use core::alloc::AllocError;
use core::fmt;

/// Errors reported by address space, page table and fault operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmError {
    /// The heap or the frame allocator is exhausted.
    OutOfMemory,
    /// A malformed call, such as an unknown fault code or an out-of-order load phase.
    InvalidArgument,
    /// An attempt to materialize a table block or entry that already exists.
    AlreadyExists,
    /// The faulting address is not covered by any region, or the access is not permitted.
    ProtectionFault,
}

impl VmError {
    /// Returns the kernel errno value reported to user space for this error.
    pub const fn errno(self) -> i32 {
        match self {
            VmError::OutOfMemory => 3,
            VmError::ProtectionFault => 6,
            VmError::InvalidArgument => 8,
            VmError::AlreadyExists => 22,
        }
    }
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            VmError::OutOfMemory => "out of memory",
            VmError::InvalidArgument => "invalid argument",
            VmError::AlreadyExists => "mapping already exists",
            VmError::ProtectionFault => "bad memory reference",
        };
        f.write_str(message)
    }
}

impl From<AllocError> for VmError {
    fn from(_: AllocError) -> Self {
        VmError::OutOfMemory
    }
}

impl From<TryReserveError> for VmError {
    fn from(_: TryReserveError) -> Self {
        VmError::OutOfMemory
    }
}
