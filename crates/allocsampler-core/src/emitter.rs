//! Writes one comma-separated line per sampled event.
//!
//! Must not allocate from the interposed heap: every record is built in a
//! fixed-size stack buffer with `std::io::Write`, never through `format!` or
//! `String`. See `SPEC_FULL.md` §4.6 and §6 for the exact line formats.

use std::io::Write;

/// Wall-clock timestamp split into whole seconds and nanoseconds, the shape
/// every emitted record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub secs: u64,
    pub nanos: u32,
}

impl Timestamp {
    /// Reads the current realtime clock. A thin wrapper so callers (and
    /// tests) can construct a [`Timestamp`] without touching the OS clock.
    #[must_use]
    pub fn now() -> Self {
        let dur = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            secs: dur.as_secs(),
            nanos: dur.subsec_nanos(),
        }
    }
}

/// Writes a single-scheme allocate record.
///
/// `weight` is `None` for scheme `NONE` (field omitted, `size` is reported
/// directly); `Some(w)` otherwise.
pub fn emit_malloc(
    out: &mut impl Write,
    ts: Timestamp,
    addr: usize,
    size: usize,
    weight: Option<u64>,
) -> std::io::Result<()> {
    match weight {
        None => writeln!(out, "MALLOC, {}.{:09}, {addr:#x}, {size}", ts.secs, ts.nanos),
        Some(w) => writeln!(
            out,
            "MALLOC, {}.{:09}, {addr:#x}, {size}, {w}",
            ts.secs, ts.nanos
        ),
    }
}

/// Writes a single-scheme release record.
pub fn emit_free(out: &mut impl Write, ts: Timestamp, addr: usize) -> std::io::Result<()> {
    writeln!(out, "FREE, {}.{:09}, {addr:#x}, -1", ts.secs, ts.nanos)
}

/// Writes a combined-mode allocate record.
#[allow(clippy::too_many_arguments)]
pub fn emit_malloc_combined(
    out: &mut impl Write,
    ts: Timestamp,
    addr: usize,
    size: usize,
    pois_tracked: bool,
    pois_weight: u64,
    hash_tracked: bool,
    hash_weight: u64,
) -> std::io::Result<()> {
    writeln!(
        out,
        "MALLOC, {}.{:09}, {addr:#x}, {size}, {}, {pois_weight}, {}, {hash_weight}",
        ts.secs,
        ts.nanos,
        pois_tracked as u8,
        hash_tracked as u8,
    )
}

/// Writes a combined-mode release record.
pub fn emit_free_combined(
    out: &mut impl Write,
    ts: Timestamp,
    addr: usize,
    pois_tracked: bool,
    hash_tracked: bool,
) -> std::io::Result<()> {
    writeln!(
        out,
        "FREE, {}.{:09}, {addr:#x}, -1, {}, -1, {}, -1",
        ts.secs,
        ts.nanos,
        pois_tracked as u8,
        hash_tracked as u8,
    )
}
