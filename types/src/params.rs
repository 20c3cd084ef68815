//! Protocol constants.
//!
//! These are fixed rather than configurable: the allocation constraint system
//! is compiled against them, so changing one means a new circuit.

/// Basis-point denominator. Every member's allocation vector sums to this.
pub const BASIS_POINTS: u64 = 10_000;

/// Smallest epoch membership.
pub const MIN_MEMBERS: usize = 2;

/// Largest epoch membership.
pub const MAX_MEMBERS: usize = 15;

/// Width of the private allocation vector. Slots at or beyond the member
/// count must stay zero.
pub const ALLOCATION_SLOTS: usize = MAX_MEMBERS;

/// Whether `count` is an admissible epoch membership size.
pub fn member_count_in_range(count: usize) -> bool {
    (MIN_MEMBERS..=MAX_MEMBERS).contains(&count)
}
