//! Lazily-resolved process-wide sampler configuration, behind the one-time
//! init latch `SPEC_FULL.md` §5 describes: "a single atomic flag plus one
//! mutex, contention only during the first interposed call on each of the
//! first few threads."
//!
//! By the time this is ever called, `IN_WRAPPER` is already `true` for the
//! calling thread (`lib.rs` sets the guard before calling here), so a
//! reentrant allocation triggered by `SamplerConfig::from_env`'s own
//! `std::env::var` call is caught by the fast path in `alloc`/`dealloc` and
//! never recurses back into this function on the same thread. A *different*
//! thread racing to read configuration while thread A is still resolving it
//! is expected to block until resolution completes, exactly as the spec's
//! "contention ... on each of the first few threads" implies — not observe a
//! silently-substituted default. `parking_lot::Mutex` is the teacher
//! workspace's standard lock, used here for the same reason `selected_set.rs`
//! uses it: lighter-weight than `std::sync::Mutex` for a short critical
//! section.
//!
//! Resolution is logged once through `tracing`, including a warning for any
//! malformed `SAMPLER_*` value that fell back to its default. Since this
//! fires on the process's first-ever allocation, a subscriber a host
//! installs from its own `main` only observes it if that installation
//! completes before anything else on the heap does — `tracing_subscriber`'s
//! own builder typically allocates, so a binary that installs its subscriber
//! as its first statement (as `allocsampler-harness` does) still usually
//! loses this particular line to the default no-op dispatcher. A longer-lived
//! host process that installs logging during process bring-up, well before
//! its own first allocation, observes it normally.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use allocsampler_core::config::SamplerConfig;

static READY: AtomicBool = AtomicBool::new(false);
static CONFIG: Mutex<Option<SamplerConfig>> = Mutex::new(None);

/// Returns the resolved process-wide configuration, resolving it from the
/// environment on the first call and blocking any concurrent caller on a
/// different thread until that resolution completes.
#[must_use]
pub fn process_config() -> SamplerConfig {
    if READY.load(Ordering::Acquire) {
        let guard = CONFIG.lock();
        return guard.clone().expect("READY implies CONFIG is populated");
    }

    let mut guard = CONFIG.lock();
    if let Some(cfg) = guard.as_ref() {
        return cfg.clone();
    }

    let (resolved, err) = SamplerConfig::from_env_checked();
    if let Some(err) = &err {
        tracing::warn!(%err, "malformed sampler environment variable, falling back to default");
    }
    tracing::info!(
        scheme = ?resolved.scheme,
        poisson_mean_bytes = resolved.poisson_mean_bytes,
        hash_mask = resolved.hash_mask,
        timing_enabled = resolved.timing_enabled,
        "sampler configuration resolved",
    );
    *guard = Some(resolved.clone());
    READY.store(true, Ordering::Release);
    resolved
}
