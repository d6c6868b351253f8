//! Byte-weighted Poisson sampling.
//!
//! Selects allocations with probability approximately `size / mean`, so that
//! the expected sum of reported weights equals the expected total allocated
//! bytes. See the crate-level docs and `SPEC_FULL.md` §4.2 for the full
//! contract.

use crate::rng::draw_geometric_bytes;

/// Per-thread Poisson-by-bytes sampler state.
///
/// `bytes_until_next` rises monotonically between fires and is consumed by
/// geometric draws; it is signed because a single allocation can push it
/// arbitrarily negative when many geometric draws fire in one call.
#[derive(Debug, Clone)]
pub struct PoissonState {
    bytes_until_next: i64,
    initialized: bool,
    rng_state: u64,
}

impl PoissonState {
    /// Constructs fresh state seeded with a caller-supplied non-zero RNG seed.
    #[must_use]
    pub fn new(rng_seed: u64) -> Self {
        Self {
            bytes_until_next: 0,
            initialized: false,
            rng_state: if rng_seed == 0 {
                crate::rng::FALLBACK_SEED
            } else {
                rng_seed
            },
        }
    }

    /// Current value of `bytes_until_next`, exposed for the determinism check
    /// in `SPEC_FULL.md` §8: replaying the same seed against the same size
    /// sequence reproduces the same trace.
    #[must_use]
    pub fn bytes_until_next(&self) -> i64 {
        self.bytes_until_next
    }

    /// Adds `size` to the running byte accumulator. The interposer calls this
    /// unconditionally, before consulting [`Self::sample`], regardless of
    /// which scheme is active (`SPEC_FULL.md` §9: "add first, then decide,
    /// unambiguously").
    #[inline]
    pub fn accumulate(&mut self, size: usize) {
        self.bytes_until_next = self.bytes_until_next.saturating_add(size as i64);
    }

    /// Evaluates the sampling decision for the current accumulator value.
    ///
    /// Returns the reported byte weight (a multiple of `mean_bytes`), or `0`
    /// if no sample fires.
    pub fn sample(&mut self, mean_bytes: i64) -> u64 {
        if self.bytes_until_next < 0 {
            return 0;
        }

        let mut remaining = self.bytes_until_next;

        if !self.initialized {
            remaining -= draw_geometric_bytes(&mut self.rng_state, mean_bytes);
            self.initialized = true;
            if remaining < 0 {
                self.bytes_until_next = remaining;
                return 0;
            }
        }

        let mut nsamples = remaining / mean_bytes;
        remaining %= mean_bytes;

        loop {
            remaining -= draw_geometric_bytes(&mut self.rng_state, mean_bytes);
            nsamples += 1;
            if remaining < 0 {
                break;
            }
        }

        self.bytes_until_next = remaining;
        (nsamples as u64).saturating_mul(mean_bytes as u64)
    }
}
