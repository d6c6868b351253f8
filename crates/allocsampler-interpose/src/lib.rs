//! `GlobalAlloc` interposer: the Rust realization of "replace the host
//! allocator's allocate/release entry points at runtime-link time".
//!
//! Wrap `std::alloc::System` behind [`Interposer`] and register it as the
//! process's `#[global_allocator]`:
//!
//! ```ignore
//! use allocsampler_interpose::Interposer;
//!
//! #[global_allocator]
//! static GLOBAL: Interposer = Interposer::new();
//! ```
//!
//! See `SPEC_FULL.md` §4.5 for the full allocate/release sequence this
//! implements, and `process_config` for the one-time init latch that
//! resolves configuration from the environment.

mod process_config;
mod raw_emit;
mod teardown;

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::{Cell, RefCell};
use std::sync::OnceLock;

use allocsampler_core::config::SamplerScheme;
use allocsampler_core::decision::{self, AllocDecision, FreeDecision, ThreadSamplerState};
use allocsampler_core::emitter::{self, Timestamp};
use allocsampler_core::selected_set::SelectedAddressSet;
use allocsampler_core::timing::{TimingRegistry, read_cycles};

use process_config::process_config;

struct ProcessState {
    poisson_selected: SelectedAddressSet,
    timing: TimingRegistry,
}

impl ProcessState {
    fn new() -> Self {
        Self {
            poisson_selected: SelectedAddressSet::new(),
            timing: TimingRegistry::new(),
        }
    }
}

static PROCESS_STATE: OnceLock<ProcessState> = OnceLock::new();

fn process_state() -> &'static ProcessState {
    // By the time any code path reaches this call the re-entrancy guard is
    // already set, so a reentrant allocation triggered by `ProcessState::new`'s
    // own vector allocations forwards straight to `System` (see
    // `Interposer::alloc`) instead of recursing back into this function.
    PROCESS_STATE.get_or_init(ProcessState::new)
}

thread_local! {
    static IN_WRAPPER: Cell<bool> = const { Cell::new(false) };
    static THREAD_STATE: RefCell<Option<ThreadSamplerState>> = const { RefCell::new(None) };
}

fn thread_id_bits() -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    // std::thread::current() can itself allocate (it may build a Thread
    // handle lazily); this is only ever reached from inside the guarded
    // section, so any such allocation forwards to `System` directly.
    let mut hasher = DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    hasher.finish()
}

fn with_thread_state<R>(f: impl FnOnce(&mut ThreadSamplerState) -> R) -> R {
    THREAD_STATE.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            let addr = cell as *const _ as u64;
            let secs = Timestamp::now().secs;
            let tid = thread_id_bits();
            *slot = Some(ThreadSamplerState::new(addr, secs, tid));
        }
        f(slot.as_mut().expect("just initialized"))
    })
}

/// The sampler's `GlobalAlloc` implementation, wrapping `System`.
pub struct Interposer;

impl Interposer {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Default for Interposer {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl GlobalAlloc for Interposer {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if IN_WRAPPER.with(Cell::get) {
            // Reentrant call: act transparently (SPEC_FULL §4.5 step 1).
            return unsafe { System.alloc(layout) };
        }
        IN_WRAPPER.with(|g| g.set(true));

        // Lazy init (env resolution, process state) happens here, fully
        // inside the guarded section so any reentrant allocation it triggers
        // takes the fast-path branch above instead of recursing.
        let cfg = process_config();

        let ptr = unsafe { System.alloc(layout) };
        let ts = Timestamp::now();

        if ptr.is_null() {
            IN_WRAPPER.with(|g| g.set(false));
            return ptr;
        }

        let addr = ptr as usize;
        let size = layout.size();
        let timing_enabled = cfg.timing_enabled;

        let decision = if timing_enabled {
            let start = read_cycles();
            let state = process_state();
            teardown::install_teardown_hook(&state.timing);
            let decision = with_thread_state(|ts| decision::decide_alloc(ts, &cfg, addr, size));
            let elapsed = read_cycles().wrapping_sub(start);
            match (&decision, cfg.scheme) {
                (AllocDecision::Single { weight }, SamplerScheme::Poisson) => {
                    state.timing.poisson_alloc.record(elapsed, *weight > 0);
                }
                (AllocDecision::Single { weight }, SamplerScheme::StatelessHash) => {
                    state.timing.hash_alloc.record(elapsed, *weight > 0);
                }
                (AllocDecision::Combined { pois_weight, hash_weight }, _) => {
                    state.timing.poisson_alloc.record(elapsed, *pois_weight > 0);
                    state.timing.hash_alloc.record(elapsed, *hash_weight > 0);
                }
                _ => {}
            }
            decision
        } else {
            with_thread_state(|ts| decision::decide_alloc(ts, &cfg, addr, size))
        };

        match decision {
            AllocDecision::Passthrough => {
                raw_emit::emit_line(|w| emitter::emit_malloc(w, ts, addr, size, None));
            }
            AllocDecision::Single { weight } if weight > 0 => {
                if cfg.scheme == SamplerScheme::Poisson {
                    process_state().poisson_selected.insert(addr);
                }
                raw_emit::emit_line(|w| emitter::emit_malloc(w, ts, addr, size, Some(weight)));
            }
            AllocDecision::Single { .. } => {}
            AllocDecision::Combined {
                pois_weight,
                hash_weight,
            } => {
                if pois_weight > 0 {
                    process_state().poisson_selected.insert(addr);
                }
                raw_emit::emit_line(|w| {
                    emitter::emit_malloc_combined(
                        w,
                        ts,
                        addr,
                        size,
                        pois_weight > 0,
                        pois_weight,
                        hash_weight > 0,
                        hash_weight,
                    )
                });
            }
        }

        IN_WRAPPER.with(|g| g.set(false));
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if ptr.is_null() {
            return;
        }
        if IN_WRAPPER.with(Cell::get) {
            unsafe { System.dealloc(ptr, layout) };
            return;
        }
        IN_WRAPPER.with(|g| g.set(true));

        let cfg = process_config();
        let addr = ptr as usize;
        let ts = Timestamp::now();

        let decision = if cfg.timing_enabled {
            let state = process_state();
            teardown::install_teardown_hook(&state.timing);
            let start = read_cycles();
            let decision = decision::decide_free(&cfg, addr, || state.poisson_selected.probe_and_remove(addr));
            let elapsed = read_cycles().wrapping_sub(start);
            match (&decision, cfg.scheme) {
                (FreeDecision::Single { tracked }, SamplerScheme::Poisson) => {
                    state.timing.poisson_free.record(elapsed, *tracked);
                }
                (FreeDecision::Single { tracked }, SamplerScheme::StatelessHash) => {
                    state.timing.hash_free.record(elapsed, *tracked);
                }
                (FreeDecision::Combined { pois_tracked, hash_tracked }, _) => {
                    state.timing.poisson_free.record(elapsed, *pois_tracked);
                    state.timing.hash_free.record(elapsed, *hash_tracked);
                }
                _ => {}
            }
            decision
        } else {
            decision::decide_free(&cfg, addr, || {
                process_state().poisson_selected.probe_and_remove(addr)
            })
        };

        match decision {
            FreeDecision::AlwaysLog | FreeDecision::Single { tracked: true } => {
                raw_emit::emit_line(|w| emitter::emit_free(w, ts, addr));
            }
            FreeDecision::Single { tracked: false } => {}
            FreeDecision::Combined {
                pois_tracked,
                hash_tracked,
            } => {
                raw_emit::emit_line(|w| emitter::emit_free_combined(w, ts, addr, pois_tracked, hash_tracked));
            }
        }

        unsafe { System.dealloc(ptr, layout) };
        IN_WRAPPER.with(|g| g.set(false));
    }

    // `alloc_zeroed` and `realloc` are intentionally not intercepted
    // (SPEC_FULL §6): they forward straight to `System` with no sampling
    // side effects, exactly like the shipped C core's untouched `calloc`/
    // `realloc` symbols.
    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        unsafe { System.alloc_zeroed(layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        unsafe { System.realloc(ptr, layout, new_size) }
    }
}

pub use teardown::{install_teardown_hook, timing_summary_text};
