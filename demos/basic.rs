//! Basic usage examples for Pool

use esox_resourcepool::{Pool, PoolConfiguration, PoolError, ResetError, Resource};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

#[derive(Debug)]
struct Connection {
    id: usize,
    queries: Vec<String>,
}

impl Resource for Connection {
    type Id = usize;

    fn identity(&self) -> usize {
        self.id
    }

    fn reset(&mut self) -> Result<(), ResetError> {
        self.queries.clear();
        Ok(())
    }

    fn validate(&self) -> bool {
        true
    }
}

fn connection_pool(initial: usize, max: usize) -> Pool<Connection> {
    let next = AtomicUsize::new(1);
    let config = PoolConfiguration::new()
        .with_initial_size(initial)
        .with_max_size(max)
        .with_max_idle(2)
        .with_min_evictable_idle_time(Duration::from_millis(50))
        .with_validation_interval(Duration::from_millis(25))
        .with_factory(move || {
            Ok(Connection {
                id: next.fetch_add(1, Ordering::Relaxed),
                queries: Vec::new(),
            })
        });

    Pool::new(config).expect("valid configuration")
}

fn main() {
    println!("=== EsoxSolutions.ResourcePool - Basic Examples ===\n");

    // Example 1: Explicit acquire and release
    explicit_release();

    // Example 2: Guards
    guards();

    // Example 3: Timeouts
    timeouts();

    // Example 4: Threads and eviction
    threads_and_eviction();
}

fn explicit_release() {
    println!("1. Acquire / Release:");
    let pool = connection_pool(2, 4);

    let mut conn = pool.acquire(Duration::from_secs(1)).unwrap();
    conn.queries.push("SELECT 1".to_string());
    println!("   Got connection {} -> {:?}", conn.id, pool.status());

    pool.release(conn).unwrap();
    println!("   After release -> {:?}\n", pool.status());
}

fn guards() {
    println!("2. Guards:");
    let pool = connection_pool(0, 2);

    {
        let conn = pool.get(Duration::from_secs(1)).unwrap();
        println!("   Created connection {} on demand", conn.id);
    }

    println!("   Released on drop -> {:?}\n", pool.status());
}

fn timeouts() {
    println!("3. Timeouts:");
    let pool = connection_pool(1, 1);

    let held = pool.acquire(Duration::from_secs(1)).unwrap();
    match pool.acquire(Duration::from_millis(100)) {
        Err(PoolError::Timeout(waited)) => println!("   Timed out after {waited:?}"),
        other => println!("   Unexpected: {other:?}"),
    }
    pool.release(held).unwrap();
    println!("   Timeouts recorded: {}\n", pool.stats().timeouts);
}

fn threads_and_eviction() {
    println!("4. Threads and Eviction:");
    let pool = Arc::new(connection_pool(0, 6));

    let workers: Vec<_> = (0..6)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for _ in 0..10 {
                    let conn = pool.get(Duration::from_secs(1)).unwrap();
                    thread::sleep(Duration::from_millis(2));
                    drop(conn);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    println!("   After load -> {:?}", pool.status());
    thread::sleep(Duration::from_millis(150));
    println!("   After eviction -> {:?}", pool.status());

    let stats = pool.stats();
    println!("   Stats:");
    for (key, value) in stats.export() {
        println!("     {}: {}", key, value);
    }
}
