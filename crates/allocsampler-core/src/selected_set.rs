//! Fixed-capacity, allocation-free set of addresses the Poisson sampler has
//! selected, used to correlate a later release with an earlier sample.
//!
//! Backed by a linearly-probed array of `usize` slots, `0` meaning empty
//! (matching the source's `NULL` sentinel — a real heap allocation is never
//! placed at address 0). All access is under a single [`parking_lot::Mutex`],
//! matching `SPEC_FULL.md` §4.4 and §5: the lock is only ever held for a
//! bounded linear probe and never across a call into the wrapped allocator.

use parking_lot::Mutex;

/// Default capacity, matching the source's `SAMPLED_SET_SIZE`.
pub const DEFAULT_CAPACITY: usize = 1 << 20; // 1,048,576

/// Default bound on linear probing, matching the source's hardcoded `100`.
pub const DEFAULT_MAX_PROBE: usize = 100;

/// A bounded-probe open-addressed set of live addresses.
pub struct SelectedAddressSet {
    slots: Mutex<Box<[usize]>>,
    capacity: usize,
    max_probe: usize,
}

impl SelectedAddressSet {
    /// Builds a set with the default capacity and probe bound.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, DEFAULT_MAX_PROBE)
    }

    /// Builds a set with an explicit capacity and probe bound (used by tests
    /// that want to exercise saturation without allocating a million slots).
    #[must_use]
    pub fn with_capacity(capacity: usize, max_probe: usize) -> Self {
        assert!(capacity > 0, "capacity must be positive");
        Self {
            slots: Mutex::new(vec![0usize; capacity].into_boxed_slice()),
            capacity,
            max_probe: max_probe.min(capacity),
        }
    }

    fn index_of(&self, addr: usize) -> usize {
        (addr >> 4) % self.capacity
    }

    /// Records `addr` as selected. A no-op if the probe chain saturates
    /// before finding an empty slot or the address itself — the set is
    /// defined to be approximate (`SPEC_FULL.md` §7: saturation degrades
    /// correlation, never the decision stream).
    pub fn insert(&self, addr: usize) {
        debug_assert_ne!(addr, 0, "address 0 can never be a real allocation");
        let start = self.index_of(addr);
        let mut slots = self.slots.lock();
        for i in 0..self.max_probe {
            let probe = (start + i) % self.capacity;
            let slot = &mut slots[probe];
            if *slot == 0 || *slot == addr {
                *slot = addr;
                return;
            }
        }
    }

    /// Removes `addr` if present, returning whether it was found. Stops at
    /// the first empty slot encountered (matching the source: an empty slot
    /// terminates the probe chain, it does not skip past it).
    pub fn probe_and_remove(&self, addr: usize) -> bool {
        let start = self.index_of(addr);
        let mut slots = self.slots.lock();
        for i in 0..self.max_probe {
            let probe = (start + i) % self.capacity;
            let slot = &mut slots[probe];
            if *slot == addr {
                *slot = 0;
                return true;
            }
            if *slot == 0 {
                return false;
            }
        }
        false
    }
}

impl Default for SelectedAddressSet {
    fn default() -> Self {
        Self::new()
    }
}
