//! Throughput tests for minting and checking tokens
//!
//! Thresholds are loose enough for debug builds; the
//! printed numbers are the interesting part.
//!
//! Run with: cargo test --test integration_performance -- --nocapture

use fast_token::{TokenCache, TokenConfig, TokenGenerator, TokenValidator};
use std::sync::Arc;
use std::time::{Duration, Instant};

const DATASET_SIZE: usize = 10_000;

/// Elapsed time for a batch of operations.
struct Throughput {
    label: &'static str,
    elapsed: Duration,
    ops: usize,
}

impl Throughput {
    fn per_sec(&self) -> f64 {
        self.ops as f64 / self.elapsed.as_secs_f64()
    }

    /// Prints the rate and fails the test if it is below `floor` ops/sec.
    fn report(&self, floor: f64) {
        let rate = self.per_sec();
        println!("  {}: {:?} ({rate:.0} ops/sec, {} ops)", self.label, self.elapsed, self.ops);
        assert!(rate >= floor, "{} below {floor:.0} ops/sec: {rate:.0}", self.label);
    }
}

fn measure<R>(label: &'static str, ops: usize, f: impl FnOnce() -> R) -> Throughput {
    let start = Instant::now();
    let _ = f();
    Throughput {
        label,
        elapsed: start.elapsed(),
        ops,
    }
}

fn shared_config() -> Arc<TokenConfig> {
    Arc::new(TokenConfig::builder().build().unwrap())
}

#[test]
fn test_stateless_throughput() {
    println!("Stateless Token Throughput");
    println!("==========================\n");

    let config = shared_config();
    let generator = TokenGenerator::new(Arc::clone(&config));
    let validator = TokenValidator::new(config);

    let mut tokens = Vec::with_capacity(DATASET_SIZE);
    let minting = measure("Mint", DATASET_SIZE, || {
        for _ in 0..DATASET_SIZE {
            tokens.push(generator.new_token().unwrap());
        }
    });
    minting.report(5_000.0);

    let checking = measure("Validate", DATASET_SIZE, || {
        for token in &tokens {
            assert!(validator.is_valid(token));
        }
    });
    checking.report(20_000.0);

    // Garbage fails at the base64 step.
    let garbage: Vec<String> = (0..DATASET_SIZE).map(|i| format!("junk-{i}")).collect();
    let rejecting = measure("Reject garbage", DATASET_SIZE, || {
        for token in &garbage {
            assert!(!validator.is_valid(token));
        }
    });
    rejecting.report(20_000.0);
}

#[test]
fn test_cache_throughput() {
    println!("Issuance Cache Throughput");
    println!("=========================\n");

    let cache = TokenCache::new(shared_config());

    let mut tokens = Vec::with_capacity(DATASET_SIZE);
    let issuing = measure("Issue", DATASET_SIZE, || {
        for _ in 0..DATASET_SIZE {
            tokens.push(cache.issue().unwrap());
        }
    });
    issuing.report(5_000.0);

    let checking = measure("Verify issued", DATASET_SIZE, || {
        for token in &tokens {
            assert!(cache.is_valid(token));
        }
    });
    checking.report(10_000.0);

    let redeeming = measure("Redeem", DATASET_SIZE, || {
        for token in &tokens {
            cache.redeem(token).unwrap();
        }
    });
    redeeming.report(10_000.0);

    let stats = cache.stats();
    println!("\n  Final stats: {stats:?}");
    assert_eq!(stats.issued, DATASET_SIZE);
    assert_eq!(stats.consumed, DATASET_SIZE);
}

#[test]
fn test_concurrent_issue_throughput() {
    println!("Concurrent Issue Throughput");
    println!("===========================\n");

    let threads = 4;
    let per_thread = DATASET_SIZE / threads;
    let cache = Arc::new(TokenCache::new(shared_config()));

    let result = measure("Concurrent issue", DATASET_SIZE, || {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for _ in 0..per_thread {
                        cache.issue().unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    });
    result.report(5_000.0);
    assert_eq!(cache.stats().issued, DATASET_SIZE);
}
