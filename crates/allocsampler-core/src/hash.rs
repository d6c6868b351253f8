//! The xor-shift address hashes used by the two hash-based sampling schemes.
//!
//! There are two distinct helpers here, not one: the live `StatelessHash`
//! scheme and the reserved `PageHash` variant hash differently in the
//! original source, and conflating them computes the wrong decision for
//! whichever one borrows the other's steps.

/// Three xor-shift passes, no multiply. This is the address-hash that
/// `StatelessHash` actually dispatches to — it matches the source's live
/// `sample_hash`/`was_sampled_hash` exactly.
#[inline]
#[must_use]
pub fn address_hash(x: u64) -> u64 {
    let mut h = x;
    h ^= h >> 12;
    h ^= h << 25;
    h ^= h >> 27;
    h
}

/// Three xor-shift passes followed by a multiply. This is the source's
/// separate `hash64`, used only by the reserved page-hash helper
/// (`should_sample_alloc_page_hash`), never by the live address-hash
/// decision. `PageHash` dispatches as a no-op in this implementation
/// (`SamplerScheme::is_active`), so nothing calls this yet, but it's kept
/// distinct from [`address_hash`] so a future `PageHash` implementation
/// hashes the same way the source does.
#[inline]
#[must_use]
pub fn page_hash(x: u64) -> u64 {
    address_hash(x).wrapping_mul(0x2545_F491_4F6C_DD1D)
}
