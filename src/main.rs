// EsoxSolutions.ResourcePool
// Thread-safe, bounded resource pool with eviction and metrics

// This is just a binary wrapper - the actual library is in lib.rs
// Run examples with: cargo run --example basic
// Set RUST_LOG=esox_resourcepool=debug to watch the pool work

use esox_resourcepool::{Pool, PoolConfiguration, PoolResult, ResetError, Resource};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

struct Session {
    id: u64,
    requests: u32,
}

impl Resource for Session {
    type Id = u64;

    fn identity(&self) -> u64 {
        self.id
    }

    fn reset(&mut self) -> Result<(), ResetError> {
        self.requests = 0;
        Ok(())
    }

    fn validate(&self) -> bool {
        true
    }
}

fn main() -> PoolResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== EsoxSolutions.ResourcePool ===");
    println!("See demos/ directory for usage examples");
    println!();

    let next = AtomicU64::new(1);
    let pool = Pool::new(
        PoolConfiguration::new()
            .with_initial_size(1)
            .with_max_size(2)
            .with_factory(move || {
                Ok(Session {
                    id: next.fetch_add(1, Ordering::Relaxed),
                    requests: 0,
                })
            }),
    )?;

    println!("Quick Demo:");
    {
        let mut session = pool.get(Duration::from_secs(1))?;
        session.requests += 1;
        println!(
            "  Got session {} ({} requests)",
            session.id, session.requests
        );
    }

    let status = pool.status();
    println!(
        "  After return - active: {}, idle: {}",
        status.active, status.idle
    );

    pool.close();
    Ok(())
}
