//! Cycle-counter instrumentation for the sampler decision hot path.
//!
//! Four independent [`TimingStats`] blocks, matching `sampler_timed.c`:
//! Poisson-on-allocate, hash-on-allocate, Poisson-on-release,
//! hash-on-release. Min/max are maintained with compare-exchange loops;
//! races at most mis-report by one sample, which `SPEC_FULL.md` §4.8 accepts.

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-scheme, per-phase timing accumulator.
#[derive(Debug, Default)]
pub struct TimingStats {
    total_calls: AtomicU64,
    total_cycles: AtomicU64,
    min_cycles: AtomicU64,
    max_cycles: AtomicU64,
    samples_taken: AtomicU64,
}

/// Snapshot of a [`TimingStats`] block at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingSnapshot {
    pub total_calls: u64,
    pub total_cycles: u64,
    pub min_cycles: u64,
    pub max_cycles: u64,
    pub samples_taken: u64,
}

impl TimingStats {
    #[must_use]
    pub fn new() -> Self {
        Self {
            total_calls: AtomicU64::new(0),
            total_cycles: AtomicU64::new(0),
            min_cycles: AtomicU64::new(u64::MAX),
            max_cycles: AtomicU64::new(0),
            samples_taken: AtomicU64::new(0),
        }
    }

    /// Records one measured call, in cycles (or nanoseconds on targets
    /// without a cycle counter), and whether it resulted in a fired sample.
    pub fn record(&self, cycles: u64, sampled: bool) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.total_cycles.fetch_add(cycles, Ordering::Relaxed);
        if sampled {
            self.samples_taken.fetch_add(1, Ordering::Relaxed);
        }

        let mut current_min = self.min_cycles.load(Ordering::Relaxed);
        while cycles < current_min {
            match self.min_cycles.compare_exchange_weak(
                current_min,
                cycles,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current_min = observed,
            }
        }

        let mut current_max = self.max_cycles.load(Ordering::Relaxed);
        while cycles > current_max {
            match self.max_cycles.compare_exchange_weak(
                current_max,
                cycles,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current_max = observed,
            }
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> TimingSnapshot {
        TimingSnapshot {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            total_cycles: self.total_cycles.load(Ordering::Relaxed),
            min_cycles: self.min_cycles.load(Ordering::Relaxed),
            max_cycles: self.max_cycles.load(Ordering::Relaxed),
            samples_taken: self.samples_taken.load(Ordering::Relaxed),
        }
    }
}

impl TimingSnapshot {
    /// Mean cycles per call, or `0.0` if no calls were recorded.
    #[must_use]
    pub fn mean_cycles(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.total_cycles as f64 / self.total_calls as f64
        }
    }
}

/// The four independent timing blocks the interposer feeds, matching
/// `sampler_timed.c`'s `g_timing_{poisson,hash}{,_free}` globals.
#[derive(Debug, Default)]
pub struct TimingRegistry {
    pub poisson_alloc: TimingStats,
    pub hash_alloc: TimingStats,
    pub poisson_free: TimingStats,
    pub hash_free: TimingStats,
}

impl TimingRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            poisson_alloc: TimingStats::new(),
            hash_alloc: TimingStats::new(),
            poisson_free: TimingStats::new(),
            hash_free: TimingStats::new(),
        }
    }
}

/// Reads a monotonic cycle counter on supported targets, falling back to
/// monotonic nanoseconds elsewhere. The recorded values are comparative only
/// (`SPEC_FULL.md` §4.8): callers should not treat them as wall-clock cycles
/// on the fallback path.
#[inline]
#[must_use]
pub fn read_cycles() -> u64 {
    #[cfg(target_arch = "x86_64")]
    {
        // SAFETY: `__rdtscp` is available on all x86_64 targets Rust supports;
        // the aux value is discarded, matching the source's plain `rdtsc`.
        let mut aux = 0u32;
        unsafe { core::arch::x86_64::__rdtscp(&mut aux) }
    }
    #[cfg(target_arch = "aarch64")]
    {
        let val: u64;
        // SAFETY: reading the virtual counter register has no side effects.
        unsafe {
            core::arch::asm!("mrs {}, cntvct_el0", out(reg) val);
        }
        val
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        use std::time::Instant;
        static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
        START.get_or_init(Instant::now).elapsed().as_nanos() as u64
    }
}
