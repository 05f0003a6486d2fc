//! Address types for physical and user virtual memory.
//!
//! Both types are plain `usize` wrappers. Physical addresses name frames handed out by the
//! frame allocator; virtual addresses are checked to fit the 32-bit user address space.

use core::{fmt, ops::Add};

use crate::{
    PageNumber,
    layout::{self, PAGE_SIZE},
};

/// Generates an address newtype with page-granular helpers and formatting.
macro_rules! page_address {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name(usize);

        impl $name {
            /// Returns the raw address value.
            #[inline]
            pub const fn as_usize(self) -> usize {
                self.0
            }

            /// Returns true if the address is the first byte of a page.
            #[inline]
            pub const fn is_page_aligned(self) -> bool {
                self.0 % PAGE_SIZE == 0
            }

            /// Returns the first address of the page containing this address.
            #[inline]
            pub const fn page_base(self) -> Self {
                Self(self.0 & !(PAGE_SIZE - 1))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name))
                    .field(&format_args!("{:#x}", self.0))
                    .finish()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#x}", self.0)
            }
        }

        impl Add<usize> for $name {
            type Output = Self;

            #[inline]
            fn add(self, offset: usize) -> Self {
                Self::new(self.0 + offset)
            }
        }
    };
}

page_address!(
    PhysicalAddress,
    "A physical memory address.\n\n\
     Physical addresses are only ever produced by a frame allocator and are opaque to the\n\
     virtual memory core, which reaches frame contents through the allocator."
);

impl PhysicalAddress {
    /// Creates a new physical address.
    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }
}

page_address!(
    VirtualAddress,
    "A user virtual memory address.\n\n\
     User virtual addresses are 32 bits wide and split into a page number and an offset."
);

impl VirtualAddress {
    /// Creates a new user virtual address.
    ///
    /// # Panics
    ///
    /// Panics if the address does not fit in the user address space.
    #[inline]
    pub const fn new(addr: usize) -> Self {
        assert!(
            layout::validate_virtual(addr),
            "address exceeds the user address space"
        );
        Self(addr)
    }

    /// Creates a new user virtual address, or `None` if it is wider than 32 bits.
    #[inline]
    pub const fn try_new(addr: usize) -> Option<Self> {
        if layout::validate_virtual(addr) {
            Some(Self(addr))
        } else {
            None
        }
    }

    /// Returns true if this is the null address.
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns the offset of this address within its page.
    #[inline]
    pub const fn page_offset(self) -> usize {
        self.0 & (PAGE_SIZE - 1)
    }

    /// Returns the table index for this address at `level` (0 = second level, 1 = first).
    #[inline]
    pub const fn page_index(self, level: usize) -> usize {
        layout::page_index(self.0, level)
    }

    /// Returns the number of the page containing this address.
    #[inline]
    pub fn page_number(self) -> PageNumber {
        PageNumber::from(self)
    }
}
