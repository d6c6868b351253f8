//! CLI entrypoint for exercising the allocation sampler under synthetic
//! workloads.
//!
//! Registers [`Interposer`] as the process's global allocator, so every
//! `Vec`/`Box` allocation a workload performs flows through the sampler
//! exactly as it would for a real instrumented process.
//!
//! Initializes `tracing_subscriber` so the interposer's configuration and
//! teardown-hook log lines are visible; set `RUST_LOG=info` to see them.
//! Each workload prints a human-readable summary table after its `END`
//! marker, counting its own allocations/bytes/leaks rather than querying the
//! interposer's internal timing registry, which this binary has no access
//! to.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use allocsampler_interpose::Interposer;
use clap::{Parser, Subcommand};
use rand::Rng;

/// Allocation/byte/leak counters for a workload run, printed as a
/// human-readable table once the workload completes.
#[derive(Debug, Default)]
struct WorkloadSummary {
    allocations: usize,
    bytes_allocated: u64,
    leaked: usize,
}

impl WorkloadSummary {
    fn record(&mut self, size: usize) {
        self.allocations += 1;
        self.bytes_allocated += size as u64;
    }

    fn print(&self, name: &str, elapsed: std::time::Duration) {
        let leaked_pct = if self.allocations == 0 {
            0.0
        } else {
            100.0 * self.leaked as f64 / self.allocations as f64
        };
        println!("--- workload summary: {name} ---");
        println!("allocations     : {}", self.allocations);
        println!("bytes_allocated : {}", self.bytes_allocated);
        println!("leaked          : {} ({leaked_pct:.1}%)", self.leaked);
        println!("elapsed_ms      : {:.3}", elapsed.as_secs_f64() * 1000.0);
    }
}

#[global_allocator]
static GLOBAL: Interposer = Interposer::new();

/// Synthetic allocation workloads for the sampler.
#[derive(Debug, Parser)]
#[command(name = "allocsampler-harness")]
#[command(about = "Synthetic allocation workloads for the in-process memory sampler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Allocate N items, free 95%, leak the remaining 5%.
    MonotonicLeak {
        #[arg(long, default_value_t = 10_000)]
        count: usize,
        #[arg(long, default_value_t = 16)]
        min_size: usize,
        #[arg(long, default_value_t = 4096)]
        max_size: usize,
    },
    /// Churn a fixed-size pool of allocations, injecting permanent leaks halfway through.
    SteadyPool {
        #[arg(long, default_value_t = 200)]
        iterations: usize,
        #[arg(long, default_value_t = 1_000)]
        pool_size: usize,
        #[arg(long, default_value_t = 16)]
        min_size: usize,
        #[arg(long, default_value_t = 4096)]
        max_size: usize,
        /// Probability (0-100) of allocating into an empty slot each pass.
        #[arg(long, default_value_t = 50)]
        alloc_prob_percent: u32,
    },
    /// Repeatedly free and reallocate a small set of hot slots, stressing
    /// address-reuse correlation.
    HighReuse {
        #[arg(long, default_value_t = 64)]
        hot_slots: usize,
        #[arg(long, default_value_t = 50_000)]
        iterations: usize,
        #[arg(long, default_value_t = 16)]
        min_size: usize,
        #[arg(long, default_value_t = 4096)]
        max_size: usize,
    },
    /// Call a function that leaks 90% of its allocations, ten times in a row.
    RepeatedLeakyCall,
}

fn marker(label: &str) {
    let dur = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    println!("{label}, {}.{:09}, -1, -1", dur.as_secs(), dur.subsec_nanos());
}

fn rand_size(rng: &mut impl Rng, min: usize, max: usize) -> usize {
    if min == max { min } else { rng.random_range(min..=max) }
}

fn monotonic_leak(count: usize, min_size: usize, max_size: usize) {
    let mut rng = rand::rng();
    let mut ptrs: Vec<Option<Box<[u8]>>> = Vec::with_capacity(count);
    let mut summary = WorkloadSummary::default();
    let start = Instant::now();

    marker("START");
    for _ in 0..count {
        let size = rand_size(&mut rng, min_size, max_size);
        let mut buf = vec![0u8; size].into_boxed_slice();
        if let Some(b) = buf.first_mut() {
            *b = 1;
        }
        summary.record(size);
        ptrs.push(Some(buf));
    }

    let cutoff = (count as f64 * 0.95) as usize;
    for slot in ptrs.iter_mut().take(cutoff) {
        *slot = None; // dropping frees; the trailing 5% stay Some and leak for the run
    }
    summary.leaked = ptrs.len() - cutoff;
    marker("END");
    summary.print("monotonic_leak", start.elapsed());
    std::mem::forget(ptrs); // the leaked slots must survive past this function, matching the source
}

fn steady_pool(iterations: usize, pool_size: usize, min_size: usize, max_size: usize, alloc_prob_percent: u32) {
    let mut rng = rand::rng();
    let mut pool: Vec<Option<Box<[u8]>>> = (0..pool_size).map(|_| None).collect();
    let mut leaked = vec![false; pool_size];
    let mut summary = WorkloadSummary::default();
    let start = Instant::now();

    marker("START");
    for i in 0..iterations {
        for p in 0..pool_size {
            if leaked[p] {
                continue;
            }
            if pool[p].is_none() {
                if rng.random_range(0..100) < alloc_prob_percent {
                    let size = rand_size(&mut rng, min_size, max_size);
                    pool[p] = Some(vec![0u8; size].into_boxed_slice());
                    summary.record(size);
                }
            } else if rng.random_range(0..100) < (100 - alloc_prob_percent) {
                pool[p] = None;
            }
        }

        if i == iterations / 2 {
            let leaks_to_create = pool_size / 20;
            for _ in 0..leaks_to_create {
                let idx = rng.random_range(0..pool_size);
                if pool[idx].is_none() {
                    let size = rand_size(&mut rng, min_size, max_size);
                    pool[idx] = Some(vec![0u8; size].into_boxed_slice());
                    summary.record(size);
                }
                leaked[idx] = true;
            }
        }
    }

    for p in 0..pool_size {
        if !leaked[p] {
            pool[p] = None;
        }
    }
    summary.leaked = leaked.iter().filter(|&&l| l).count();
    marker("END");
    summary.print("steady_pool", start.elapsed());
    std::mem::forget(pool);
}

fn high_reuse(hot_slots: usize, iterations: usize, min_size: usize, max_size: usize) {
    let mut rng = rand::rng();
    let mut hot: Vec<Option<Box<[u8]>>> = (0..hot_slots)
        .map(|_| Some(vec![0u8; rand_size(&mut rng, min_size, max_size)].into_boxed_slice()))
        .collect();
    let mut leaky = vec![false; hot_slots];
    let mut summary = WorkloadSummary {
        allocations: hot_slots,
        ..Default::default()
    };
    let start = Instant::now();

    marker("START");
    for i in 0..iterations {
        let idx = rng.random_range(0..hot_slots);
        if leaky[idx] {
            continue;
        }
        hot[idx] = None; // free, then immediately reallocate to encourage address reuse
        let size = rand_size(&mut rng, min_size, max_size);
        let mut buf = vec![0u8; size].into_boxed_slice();
        if let Some(b) = buf.first_mut() {
            *b = 1;
        }
        summary.record(size);
        hot[idx] = Some(buf);

        if i == iterations / 2 {
            let leaks = hot_slots / 20;
            for _ in 0..leaks {
                leaky[rng.random_range(0..hot_slots)] = true;
            }
        }
    }

    for i in 0..hot_slots {
        if !leaky[i] {
            hot[i] = None;
        }
    }
    summary.leaked = leaky.iter().filter(|&&l| l).count();
    marker("END");
    summary.print("high_reuse", start.elapsed());
    std::mem::forget(hot);
}

fn leaky_function(summary: &mut WorkloadSummary) {
    let mut rng = rand::rng();
    let mut keep = Vec::new();
    for i in 0..10_000 {
        let size = rand_size(&mut rng, 16, 4096);
        let buf = vec![0u8; size].into_boxed_slice();
        summary.record(size);
        if i % 10 == 0 {
            drop(buf); // 10% freed
        } else {
            summary.leaked += 1;
            keep.push(buf); // the remaining 90% leak, matching the source
        }
    }
    std::mem::forget(keep);
}

fn repeated_leaky_call() {
    let mut summary = WorkloadSummary::default();
    let start = Instant::now();
    marker("START");
    for _ in 0..10 {
        leaky_function(&mut summary);
    }
    marker("END");
    summary.print("repeated_leaky_call", start.elapsed());
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::MonotonicLeak { count, min_size, max_size } => monotonic_leak(count, min_size, max_size),
        Command::SteadyPool {
            iterations,
            pool_size,
            min_size,
            max_size,
            alloc_prob_percent,
        } => steady_pool(iterations, pool_size, min_size, max_size, alloc_prob_percent),
        Command::HighReuse {
            hot_slots,
            iterations,
            min_size,
            max_size,
        } => high_reuse(hot_slots, iterations, min_size, max_size),
        Command::RepeatedLeakyCall => repeated_leaky_call(),
    }
}
