//! Runtime configuration, resolved once from `SAMPLER_*` environment variables.
//!
//! Mirrors the source's `init_sampler`: the scheme, the Poisson mean, the
//! optional stats-file hint, and the timing switch are all read a single time
//! and then cached. Parsing is best-effort — a malformed
//! `SAMPLER_POISSON_MEAN_BYTES` falls back to the default rather than failing
//! the process, matching the C implementation's bare `atol`. [`ConfigError`]
//! exists so callers that *do* want to know about a malformed value (the
//! harness binary, in particular) can observe it without the interposer's own
//! fast path ever having to handle a `Result`.

use std::env;
use std::sync::OnceLock;

use thiserror::Error;

/// Default Poisson mean, in bytes, per `SAMPLER_POISSON_MEAN_BYTES`.
pub const DEFAULT_POISSON_MEAN_BYTES: i64 = 4096;

/// Default stateless-hash mask: low 8 bits, i.e. 1-in-256.
pub const DEFAULT_HASH_MASK: u64 = 0xFF;

/// Selects which sampler(s) the interposer consults on each allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerScheme {
    /// No sampling: every allocation and release is logged with its raw size.
    None,
    /// Stateless per-address hash sampling.
    StatelessHash,
    /// Byte-weighted Poisson sampling.
    Poisson,
    /// Run both samplers against the same event stream for comparison.
    Combined,
    /// Reserved: declared but dispatched as `None` in the shipped core.
    Hybrid,
    /// Reserved: declared but dispatched as `None` in the shipped core.
    PageHash,
}

impl SamplerScheme {
    fn parse(raw: &str) -> Self {
        match raw {
            "STATELESS_HASH" => Self::StatelessHash,
            "POISSON" => Self::Poisson,
            "COMBINED" => Self::Combined,
            "HYBRID" => Self::Hybrid,
            "PAGE_HASH" => Self::PageHash,
            _ => Self::None,
        }
    }

    /// Whether this scheme dispatches as a real, active sampler in the shipped
    /// core. `Hybrid` and `PageHash` are declared but not implemented.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::StatelessHash | Self::Poisson | Self::Combined | Self::None
        )
    }
}

/// A malformed `SAMPLER_*` environment variable. The sampler itself never
/// surfaces this — it silently falls back to the documented default — but
/// tooling that wants visibility into bad configuration can call
/// [`SamplerConfig::from_env_checked`] directly.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("SAMPLER_POISSON_MEAN_BYTES={raw:?} is not a positive integer; using default {DEFAULT_POISSON_MEAN_BYTES}")]
    InvalidPoissonMean { raw: String },
}

/// Resolved sampler configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerConfig {
    pub scheme: SamplerScheme,
    pub poisson_mean_bytes: i64,
    pub hash_mask: u64,
    pub stats_file: Option<String>,
    pub timing_enabled: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            scheme: SamplerScheme::None,
            poisson_mean_bytes: DEFAULT_POISSON_MEAN_BYTES,
            hash_mask: DEFAULT_HASH_MASK,
            stats_file: None,
            timing_enabled: false,
        }
    }
}

impl SamplerConfig {
    /// Reads configuration from the process environment, reporting a parse
    /// error for `SAMPLER_POISSON_MEAN_BYTES` instead of silently dropping it.
    #[must_use]
    pub fn from_env_checked() -> (Self, Option<ConfigError>) {
        let mut cfg = Self {
            scheme: env::var("SAMPLER_SCHEME")
                .map(|raw| SamplerScheme::parse(&raw))
                .unwrap_or(SamplerScheme::None),
            stats_file: env::var("SAMPLER_STATS_FILE").ok(),
            timing_enabled: env::var("SAMPLER_TIMING").as_deref() == Ok("1"),
            ..Self::default()
        };

        let mut error = None;
        if let Ok(raw) = env::var("SAMPLER_POISSON_MEAN_BYTES") {
            match raw.trim().parse::<i64>() {
                Ok(val) if val > 0 => cfg.poisson_mean_bytes = val,
                _ => error = Some(ConfigError::InvalidPoissonMean { raw }),
            }
        }

        (cfg, error)
    }

    /// Reads configuration from the environment, silently discarding any
    /// parse error (matching the source's `atol` best-effort behavior). This
    /// is what the interposer's own init path calls.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_checked().0
    }
}

static CONFIG: OnceLock<SamplerConfig> = OnceLock::new();

/// Returns the process-wide configuration, resolving it from the environment
/// on first call and caching it thereafter. Mirrors the source's
/// `init_sampler` one-time env parse, realized with `OnceLock` instead of a
/// hand-rolled atomic state machine since Rust's standard library already
/// gives the same double-checked-init guarantee without the reentrancy hazard
/// the source's comment in `config.rs`-equivalent code warns about (this
/// crate's init path never calls back into the allocator while resolving).
pub fn config() -> &'static SamplerConfig {
    CONFIG.get_or_init(SamplerConfig::from_env)
}
