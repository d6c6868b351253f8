//! Stateless per-address hash sampling.
//!
//! Unlike the Poisson sampler, the decision carries no per-thread history: it
//! is a pure function of the address, which is what lets release-side
//! correlation work without a lookup table (`SPEC_FULL.md` §4.3).

use crate::hash::address_hash;

/// Per-thread accumulator consumed by [`decide`] on a fire. Owned by the same
/// thread-local record as [`crate::poisson::PoissonState`]; kept as a bare
/// `u64` here since, unlike Poisson, there is no other state to bundle it
/// with.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashAccumulator(u64);

impl HashAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self(0)
    }

    #[inline]
    pub fn accumulate(&mut self, size: usize) {
        self.0 = self.0.saturating_add(size as u64);
    }

    #[must_use]
    pub fn running_bytes(&self) -> u64 {
        self.0
    }
}

/// Returns whether `addr` is selected under the given `mask`.
///
/// Stateless: calling this twice with the same address always returns the
/// same answer, which is the property release-side correlation depends on.
#[inline]
#[must_use]
pub fn is_selected(addr: usize, mask: u64) -> bool {
    address_hash(addr as u64) & mask == 0
}

/// Evaluates the hash-sampling decision for an allocation at `addr`.
///
/// On a hit, returns the accumulated byte weight since the last hit and
/// resets the accumulator to zero. On a miss, returns `0` and leaves the
/// accumulator untouched (it keeps growing until the next hit).
pub fn sample(acc: &mut HashAccumulator, addr: usize, mask: u64) -> u64 {
    if is_selected(addr, mask) {
        let reported = acc.0;
        acc.0 = 0;
        reported
    } else {
        0
    }
}
