//! Per-thread sampler state bundle and the scheme-dispatch decision logic.
//!
//! This is the allocation-free heart of the interposer: given a scheme,
//! a size, and (for release) an address, it decides what to emit. It knows
//! nothing about the host allocator or thread-locals — those live in
//! `allocsampler-interpose`, which is the only crate that needs `unsafe`.

use crate::config::{SamplerConfig, SamplerScheme};
use crate::hash_sampler::{self, HashAccumulator};
use crate::poisson::PoissonState;
use crate::rng::seed_from;

/// Everything a single thread needs to make sampling decisions, independent
/// of which scheme is active (`SPEC_FULL.md` §3: both accumulators update
/// unconditionally so scheme switches mid-run cannot corrupt counters).
pub struct ThreadSamplerState {
    poisson: PoissonState,
    hash_acc: HashAccumulator,
}

impl ThreadSamplerState {
    /// Builds state seeded from values that are cheap to obtain per-thread:
    /// the address of some thread-local storage, the current wall-clock
    /// seconds, and an OS thread identifier, mirroring the source's
    /// `init_rng`.
    #[must_use]
    pub fn new(thread_local_addr: u64, wall_clock_secs: u64, thread_id: u64) -> Self {
        let seed = seed_from(thread_local_addr, wall_clock_secs, thread_id);
        Self {
            poisson: PoissonState::new(seed),
            hash_acc: HashAccumulator::new(),
        }
    }

    #[must_use]
    pub fn poisson_bytes_until_next(&self) -> i64 {
        self.poisson.bytes_until_next()
    }

    #[must_use]
    pub fn hash_running_bytes(&self) -> u64 {
        self.hash_acc.running_bytes()
    }
}

/// The outcome of an allocate-side decision, covering every active scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocDecision {
    /// `SamplerScheme::None` (and the reserved, dispatched-as-`None` schemes):
    /// always emit with the raw size, never track.
    Passthrough,
    /// A single active scheme fired or didn't; `weight == 0` means it didn't.
    Single { weight: u64 },
    /// Combined mode: both schemes are evaluated independently.
    Combined {
        pois_weight: u64,
        hash_weight: u64,
    },
}

/// Evaluates the allocate-side decision for `size` bytes at `addr`, updating
/// `state` in place. `addr` is only consumed by the hash sampler and the
/// caller's selected-set bookkeeping; the accumulators update regardless of
/// scheme (`SPEC_FULL.md` §4.5 step 4).
pub fn decide_alloc(state: &mut ThreadSamplerState, cfg: &SamplerConfig, addr: usize, size: usize) -> AllocDecision {
    state.poisson.accumulate(size);
    state.hash_acc.accumulate(size);

    match cfg.scheme {
        SamplerScheme::Combined => {
            let pois_weight = state.poisson.sample(cfg.poisson_mean_bytes);
            let hash_weight = hash_sampler::sample(&mut state.hash_acc, addr, cfg.hash_mask);
            AllocDecision::Combined {
                pois_weight,
                hash_weight,
            }
        }
        SamplerScheme::Poisson => AllocDecision::Single {
            weight: state.poisson.sample(cfg.poisson_mean_bytes),
        },
        SamplerScheme::StatelessHash => AllocDecision::Single {
            weight: hash_sampler::sample(&mut state.hash_acc, addr, cfg.hash_mask),
        },
        SamplerScheme::None | SamplerScheme::Hybrid | SamplerScheme::PageHash => {
            AllocDecision::Passthrough
        }
    }
}

/// The outcome of a release-side decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeDecision {
    /// Always log (`NONE` and the reserved schemes).
    AlwaysLog,
    /// A single active scheme: whether this release correlates to a sample.
    Single { tracked: bool },
    /// Combined mode: both schemes' correlation, independently.
    Combined { pois_tracked: bool, hash_tracked: bool },
}

/// Evaluates the release-side decision for `addr`. `pois_was_tracked` is the
/// result of probing (and removing from) the Poisson selected-address set —
/// that lookup needs the process-wide set the interposer owns, so it is
/// passed in rather than computed here.
#[must_use]
pub fn decide_free(cfg: &SamplerConfig, addr: usize, pois_was_tracked: impl FnOnce() -> bool) -> FreeDecision {
    match cfg.scheme {
        SamplerScheme::None | SamplerScheme::Hybrid | SamplerScheme::PageHash => {
            FreeDecision::AlwaysLog
        }
        SamplerScheme::Poisson => FreeDecision::Single {
            tracked: pois_was_tracked(),
        },
        SamplerScheme::StatelessHash => FreeDecision::Single {
            tracked: hash_sampler::is_selected(addr, cfg.hash_mask),
        },
        SamplerScheme::Combined => FreeDecision::Combined {
            pois_tracked: pois_was_tracked(),
            hash_tracked: hash_sampler::is_selected(addr, cfg.hash_mask),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SamplerConfig;

    fn cfg_with(scheme: SamplerScheme) -> SamplerConfig {
        SamplerConfig {
            scheme,
            ..SamplerConfig::default()
        }
    }

    #[test]
    fn none_scheme_always_passes_through_on_alloc() {
        let mut state = ThreadSamplerState::new(1, 2, 3);
        let cfg = cfg_with(SamplerScheme::None);
        let decision = decide_alloc(&mut state, &cfg, 0x1000, 64);
        assert_eq!(decision, AllocDecision::Passthrough);
    }

    #[test]
    fn none_scheme_always_logs_on_free() {
        let cfg = cfg_with(SamplerScheme::None);
        let decision = decide_free(&cfg, 0x1000, || false);
        assert_eq!(decision, FreeDecision::AlwaysLog);
    }

    #[test]
    fn hash_scheme_free_decision_matches_the_address_hash_not_a_callback() {
        let cfg = cfg_with(SamplerScheme::StatelessHash);
        // The closure's return value must be ignored for StatelessHash: the
        // decision is re-derived purely from the address.
        let decision = decide_free(&cfg, 0x1000, || panic!("should not be called"));
        assert_eq!(
            decision,
            FreeDecision::Single {
                tracked: hash_sampler::is_selected(0x1000, cfg.hash_mask)
            }
        );
    }

    #[test]
    fn poisson_free_decision_delegates_to_the_selected_set_probe() {
        let cfg = cfg_with(SamplerScheme::Poisson);
        assert_eq!(
            decide_free(&cfg, 0x1000, || true),
            FreeDecision::Single { tracked: true }
        );
        assert_eq!(
            decide_free(&cfg, 0x1000, || false),
            FreeDecision::Single { tracked: false }
        );
    }

    #[test]
    fn combined_scheme_evaluates_both_independently_on_alloc() {
        let mut state = ThreadSamplerState::new(1, 2, 3);
        let cfg = cfg_with(SamplerScheme::Combined);
        // Use a tiny mean so the Poisson side is virtually guaranteed to fire
        // at least once across a handful of calls, without depending on a
        // specific RNG stream.
        let cfg = SamplerConfig {
            poisson_mean_bytes: 1,
            ..cfg
        };
        let mut any_pois = false;
        for i in 0..64usize {
            if let AllocDecision::Combined { pois_weight, .. } =
                decide_alloc(&mut state, &cfg, 0x1000 + i * 16, 32)
            {
                any_pois |= pois_weight > 0;
            } else {
                panic!("combined scheme must return AllocDecision::Combined");
            }
        }
        assert!(any_pois, "poisson side should fire with mean=1");
    }

    #[test]
    fn reserved_schemes_dispatch_as_none() {
        let mut state = ThreadSamplerState::new(1, 2, 3);
        for scheme in [SamplerScheme::Hybrid, SamplerScheme::PageHash] {
            let cfg = cfg_with(scheme);
            assert_eq!(
                decide_alloc(&mut state, &cfg, 0x1000, 64),
                AllocDecision::Passthrough
            );
            assert_eq!(decide_free(&cfg, 0x1000, || false), FreeDecision::AlwaysLog);
        }
    }

    #[test]
    fn accumulators_update_regardless_of_active_scheme() {
        let mut state = ThreadSamplerState::new(1, 2, 3);
        let cfg = cfg_with(SamplerScheme::None);
        decide_alloc(&mut state, &cfg, 0x1000, 100);
        assert_eq!(state.poisson_bytes_until_next(), 100);
        assert_eq!(state.hash_running_bytes(), 100);
    }
}
