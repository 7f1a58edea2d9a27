//! Physical addresses and their decomposition into cache/TLB coordinates.
//!
//! Every bank in the hierarchy (data cache, directory, TLB) decomposes an
//! address the same way: a block- or page-aligned offset, a set index taken
//! from the bits above it, and a tag from everything above that. This module
//! centralizes that arithmetic so every bank (`cache::bank::Bank`,
//! `mmu::tlb::Tlb`) composes and decomposes addresses identically.

/// The decomposition of an address into a bank's set index and tag.
///
/// `offset` is kept even though bank operations work on whole blocks/pages,
/// because the testable "address round-trip" property composes the full
/// address back up from its parts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decomposed {
    /// Byte offset within the block or page.
    pub offset: u64,
    /// Set index, always `< num_sets`.
    pub index: u64,
    /// Tag bits above the set index.
    pub tag: u64,
}

/// Decomposes `addr` into offset/index/tag given a block (or page) size and
/// a set count, both of which must be powers of two.
///
/// `offset = addr mod block_size`
/// `index = (addr >> offset_bits) mod num_sets`
/// `tag = addr >> (offset_bits + index_bits)`
#[must_use]
pub fn decompose(addr: u64, block_size: usize, num_sets: usize) -> Decomposed {
    debug_assert!(
        block_size.is_power_of_two(),
        "block_size must be a power of two"
    );
    debug_assert!(num_sets.is_power_of_two(), "num_sets must be a power of two");

    let offset_bits = block_size.trailing_zeros();
    let index_bits = num_sets.trailing_zeros();

    let offset = addr & (block_size as u64 - 1);
    let index = (addr >> offset_bits) & (num_sets as u64 - 1);
    let tag = addr >> (offset_bits + index_bits);

    Decomposed { offset, index, tag }
}

/// Reconstructs the block-aligned address from a `(tag, index)` pair under
/// the same `block_size`/`num_sets` geometry used to decompose it.
///
/// This is the inverse of [`decompose`], used when a bank reconstructs an
/// evicted line's address to hand back to the coherence engine: the offset
/// is always zero since banks track whole blocks, never sub-block bytes.
#[must_use]
pub fn compose(tag: u64, index: u64, block_size: usize, num_sets: usize) -> u64 {
    let offset_bits = block_size.trailing_zeros();
    let index_bits = num_sets.trailing_zeros();
    (tag << (offset_bits + index_bits)) | (index << offset_bits)
}

#[cfg(test)]
mod tests {
    use super::{compose, decompose};

    #[test]
    fn round_trip_is_exact_for_aligned_addresses() {
        let block_size = 64;
        let num_sets = 128;
        for addr in [0u64, 64, 128, 1 << 20, 0xDEAD_0000, u64::MAX & !63] {
            let d = decompose(addr, block_size, num_sets);
            assert_eq!(
                d.offset, 0,
                "addr {addr:#x} wasn't block-aligned in the test fixture"
            );
            let back = compose(d.tag, d.index, block_size, num_sets);
            assert_eq!(back, addr, "round trip failed for {addr:#x}");
        }
    }

    #[test]
    fn index_is_always_in_range() {
        let block_size = 64;
        let num_sets = 32;
        for addr in 0u64..10_000 {
            let d = decompose(addr * 17, block_size, num_sets);
            assert!((d.index as usize) < num_sets);
        }
    }

    #[test]
    fn offset_recovers_byte_within_block() {
        let d = decompose(0x1007, 64, 16);
        assert_eq!(d.offset, 0x07);
    }
}
