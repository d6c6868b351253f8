//! Per-thread xorshift64* generator and the geometric-by-bytes draw built on it.
//!
//! Both are deliberately allocation-free: every call operates on a `u64` passed
//! by mutable reference, so this module can be driven from the interposer's hot
//! path without touching the heap.

/// A single xorshift64* step. `state` must be non-zero on entry and stays
/// non-zero for all subsequent calls (xorshift is only bijective away from 0).
#[inline]
pub fn xorshift64_star(state: &mut u64) -> u64 {
    let mut x = *state;
    x ^= x >> 12;
    x ^= x << 25;
    x ^= x >> 27;
    *state = x;
    x.wrapping_mul(0x2545_F491_4F6C_DD1D)
}

/// Constant substituted for a zero-valued seed, preserving the generator's
/// non-zero-state invariant.
pub const FALLBACK_SEED: u64 = 0xCAFE_BABE;

/// Mixes a thread-local address, the current wall-clock seconds, and a thread
/// identifier into a seed, falling back to [`FALLBACK_SEED`] if the result is
/// zero.
#[must_use]
pub fn seed_from(thread_local_addr: u64, wall_clock_secs: u64, thread_id: u64) -> u64 {
    let mixed = thread_local_addr ^ wall_clock_secs ^ thread_id;
    if mixed == 0 { FALLBACK_SEED } else { mixed }
}

/// Draws a geometric-distributed byte count with mean `mean_bytes`.
///
/// Uses inverse-transform sampling: `u` is the top 53 bits of an xorshift64*
/// output scaled into `(0, 1]`, and the draw is `floor(-ln(u) * mean_bytes)`.
/// `u == 0.0` is clamped to `1e-12` to avoid `ln(0)`.
#[must_use]
pub fn draw_geometric_bytes(state: &mut u64, mean_bytes: i64) -> i64 {
    let bits = xorshift64_star(state);
    let mut u = (bits >> 11) as f64 * f64::from_bits(0x3CA0_0000_0000_0000); // 0x1.0p-53
    if u <= 0.0 {
        u = 1e-12;
    }
    (-u.ln() * mean_bytes as f64) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xorshift_never_settles_at_zero() {
        let mut state = 1u64;
        for _ in 0..10_000 {
            let out = xorshift64_star(&mut state);
            assert_ne!(state, 0);
            assert_ne!(out, 0);
        }
    }

    #[test]
    fn seed_from_falls_back_on_zero() {
        assert_eq!(seed_from(0, 0, 0), FALLBACK_SEED);
        assert_ne!(seed_from(1, 0, 0), 0);
    }

    #[test]
    fn geometric_draw_averages_to_the_configured_mean() {
        let mut state = 0x1234_5678_9abc_def1u64;
        let mean = 4096i64;
        let n = 50_000;
        let mut sum = 0i64;
        for _ in 0..n {
            sum += draw_geometric_bytes(&mut state, mean).max(0);
        }
        let avg = sum as f64 / n as f64;
        // Geometric mean should land within a generous band of `mean`.
        assert!(avg > mean as f64 * 0.5 && avg < mean as f64 * 1.5, "avg={avg}");
    }
}
