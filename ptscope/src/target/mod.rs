//! Operations on the paused guest, and the page-table walker they feed.

mod guest;
mod memory;
mod registers;
mod walk;

pub use {
    guest::{parse_cr3_text, parse_xp_text, Guest, CR3_PATTERNS},
    memory::decode_contents,
    registers::{RegisterMap, RegisterSnapshot, CANONICAL_REGISTERS, REGISTER_NA},
    walk::{walk_va, PageSize, PhysSource, PteFlags, VaIndices, WalkLevel, WalkResult},
};
