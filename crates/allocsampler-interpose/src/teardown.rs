//! Process-exit timing summary, registered via `libc::atexit`.
//!
//! The Rust-idiomatic analogue of the source's destructor-attributed
//! `print_timing_summary`: an `extern "C" fn` with no captured state,
//! registered once, reading the same process-wide [`TimingRegistry`] the
//! interposer feeds on every sampled call.
//!
//! Registration itself is logged through `tracing`; the `atexit` callback is
//! not, since by the time it runs heap allocation and the thread's `tracing`
//! dispatcher are no longer dependably available (the same hazard documented
//! in `raw_emit`).

use std::sync::OnceLock;

use allocsampler_core::timing::{TimingRegistry, TimingSnapshot};

static REGISTERED: OnceLock<()> = OnceLock::new();
static SUMMARY_SOURCE: OnceLock<&'static TimingRegistry> = OnceLock::new();

fn format_block(name: &str, snap: TimingSnapshot) -> String {
    format!(
        "{name}: calls={} sampled={} mean_cycles={:.1} min={} max={}",
        snap.total_calls,
        snap.samples_taken,
        snap.mean_cycles(),
        snap.min_cycles,
        snap.max_cycles,
    )
}

/// Renders the four timing blocks as the plain-text summary the process
/// prints at exit (`SPEC_FULL.md` §4.8).
#[must_use]
pub fn timing_summary_text(registry: &TimingRegistry) -> String {
    [
        format_block("poisson_alloc", registry.poisson_alloc.snapshot()),
        format_block("hash_alloc", registry.hash_alloc.snapshot()),
        format_block("poisson_free", registry.poisson_free.snapshot()),
        format_block("hash_free", registry.hash_free.snapshot()),
    ]
    .join("\n")
}

extern "C" fn print_timing_summary() {
    // Written straight to fd 2 (not `eprintln!`): `std::io::Stderr` still
    // routes through a `Mutex`-guarded global that can itself be mid-cleanup
    // at this point in process exit (see `raw_emit` for the same hazard on
    // the stdout side).
    if let Some(registry) = SUMMARY_SOURCE.get() {
        let text = timing_summary_text(registry);
        unsafe {
            libc::write(2, text.as_ptr().cast(), text.len());
            libc::write(2, b"\n".as_ptr().cast(), 1);
        }
    }
}

/// Registers the timing-summary `atexit` hook, pointed at `registry`.
/// Idempotent: only the first call actually registers the C hook.
///
/// # Safety
/// `registry` must outlive process exit, which holds for the
/// `'static` process-wide registry the interposer owns.
pub fn install_teardown_hook(registry: &'static TimingRegistry) {
    SUMMARY_SOURCE.get_or_init(|| registry);
    REGISTERED.get_or_init(|| {
        tracing::info!("timing summary teardown hook installed");
        // SAFETY: `print_timing_summary` takes no arguments, captures nothing,
        // and only reads process-wide statics; registering it twice would be
        // harmless but `REGISTERED` keeps it to once regardless.
        unsafe {
            libc::atexit(print_timing_summary);
        }
    });
}
