//! Sampling decision engine for the in-process allocation sampler.
//!
//! This crate holds every piece of the system that can be exercised without
//! touching the real heap: the RNG and geometric draw, the two sampling
//! schemes, the selected-address set, the event emitter, configuration, and
//! timing instrumentation. The `unsafe` boundary that actually wraps the
//! process allocator lives in `allocsampler-interpose`.

pub mod config;
pub mod decision;
pub mod emitter;
pub mod hash;
pub mod hash_sampler;
pub mod poisson;
pub mod rng;
pub mod selected_set;
pub mod timing;

pub use config::{ConfigError, SamplerConfig, SamplerScheme};
pub use decision::{AllocDecision, FreeDecision, ThreadSamplerState, decide_alloc, decide_free};
pub use selected_set::SelectedAddressSet;
pub use timing::TimingRegistry;
