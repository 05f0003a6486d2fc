//! User address-space layout.
//!
//! User virtual addresses are 32 bits wide and split into 4 KiB pages. A page number is
//! 20 bits: the top 11 bits select a first-level slot and the next 9 bits select a slot in
//! the second-level block it refers to.
//!
//! ```text
//!  31           21 20        12 11          0
//! +---------------+------------+-------------+
//! | level 1 index | level 0 ix | page offset |
//! +---------------+------------+-------------+
//! ```

/// Number of bits in a page offset.
pub const PAGE_SHIFT: usize = 12;

/// Page size in bytes (4 KiB).
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

/// Number of bits in a user virtual address.
pub const VIRTUAL_BITS: usize = 32;

/// Number of index bits consumed by the first-level table.
pub const FIRST_LEVEL_BITS: usize = 11;

/// Number of index bits consumed by a second-level block.
pub const SECOND_LEVEL_BITS: usize = 9;

/// Number of slots in the first-level table.
pub const FIRST_LEVEL_ENTRIES: usize = 1 << FIRST_LEVEL_BITS;

/// Number of slots in each second-level block.
pub const SECOND_LEVEL_ENTRIES: usize = 1 << SECOND_LEVEL_BITS;

/// Number of pages in a user address space.
pub const PAGE_COUNT: usize = 1 << (VIRTUAL_BITS - PAGE_SHIFT);

/// Highest user address plus one; the user stack grows down from here.
pub const USER_STACK_TOP: usize = 0x8000_0000;

/// Number of pages reserved for the user stack.
pub const USER_STACK_PAGES: usize = 16;

/// Size of the user stack region in bytes.
pub const USER_STACK_SIZE: usize = USER_STACK_PAGES * PAGE_SIZE;

/// Number of slots in the translation cache.
pub const TLB_SLOTS: usize = 64;

/// Returns the page table index for a given virtual address at the specified level.
///
/// - Level 0: Bits 12-20 (second-level block)
/// - Level 1: Bits 21-31 (first-level table)
#[inline]
pub const fn page_index(address: usize, level: usize) -> usize {
    let (shift, bits) = match level {
        0 => (PAGE_SHIFT, SECOND_LEVEL_BITS),
        1 => (PAGE_SHIFT + SECOND_LEVEL_BITS, FIRST_LEVEL_BITS),
        _ => panic!("level out of range for a two-level page table (0-1)"),
    };
    (address >> shift) & ((1 << bits) - 1)
}

/// Validates a user virtual address.
///
/// User addresses must fit within 32 bits.
#[inline]
pub const fn validate_virtual(addr: usize) -> bool {
    addr < (1 << VIRTUAL_BITS)
}
