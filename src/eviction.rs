//! Background eviction of excess idle resources

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Sender};
use tracing::{debug, trace};

use crate::pool::Shared;
use crate::resource::Resource;

/// Outcome of one eviction cycle
///
/// # Examples
///
/// ```
/// # use esox_resourcepool::{Pool, PoolConfiguration, Resource, ResetError};
/// # use std::sync::atomic::{AtomicU32, Ordering};
/// # use std::time::Duration;
/// # struct Conn(u32);
/// # impl Resource for Conn {
/// #     type Id = u32;
/// #     fn identity(&self) -> u32 { self.0 }
/// #     fn reset(&mut self) -> Result<(), ResetError> { Ok(()) }
/// #     fn validate(&self) -> bool { true }
/// # }
/// static NEXT: AtomicU32 = AtomicU32::new(0);
///
/// let pool = Pool::new(
///     PoolConfiguration::new()
///         .with_initial_size(3)
///         .with_max_size(3)
///         .with_max_idle(1)
///         .with_min_evictable_idle_time(Duration::ZERO)
///         .with_validation_interval(Duration::ZERO)
///         .with_factory(|| Ok(Conn(NEXT.fetch_add(1, Ordering::Relaxed)))),
/// )
/// .unwrap();
///
/// std::thread::sleep(Duration::from_millis(2));
/// let report = pool.evict_now();
/// assert_eq!(report.examined, 2);
/// assert_eq!(report.evicted, 2);
/// assert_eq!(pool.status().idle, 1);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Idle resources inspected this cycle
    pub examined: usize,

    /// Idle resources destroyed this cycle
    pub evicted: usize,
}

impl<R: Resource> Shared<R> {
    /// Inspect idle resources beyond `max_idle` and destroy the stale or
    /// invalid ones. Runs entirely under the pool lock.
    pub(crate) fn evict(&self) -> EvictionReport {
        let mut report = EvictionReport::default();
        let mut evicted = Vec::new();

        {
            let mut ledger = self.ledger.lock();
            if ledger.closed {
                return report;
            }

            let excess = self.idle.len().saturating_sub(self.config.max_idle);
            let now = Instant::now();

            for _ in 0..excess {
                let Some(resource) = self.idle.pop() else {
                    break;
                };
                report.examined += 1;

                let id = resource.identity();
                let stale = ledger
                    .get(&id)
                    .is_none_or(|entry| entry.idle_for(now) > self.config.min_evictable_idle_time);

                if stale || !resource.validate() {
                    ledger.destroy(&id);
                    evicted.push(resource);
                } else if let Err(resource) = self.idle.push(resource) {
                    ledger.destroy(&id);
                    evicted.push(resource);
                }
            }
        }

        report.evicted = evicted.len();
        if report.evicted > 0 {
            self.available.notify_all();
        }
        report
    }
}

/// Handle to the evictor thread
pub(crate) struct Evictor {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

impl Evictor {
    /// Spawn a thread that runs an eviction cycle every `interval`.
    pub fn start<R: Resource>(shared: Arc<Shared<R>>, interval: Duration) -> io::Result<Self> {
        let (shutdown, stopped) = channel::bounded::<()>(0);
        let ticker = channel::tick(interval);

        let handle = thread::Builder::new()
            .name("resourcepool-evictor".to_string())
            .spawn(move || {
                loop {
                    let stop = crossbeam::select! {
                        recv(ticker) -> _ => false,
                        recv(stopped) -> _ => true,
                    };
                    if stop {
                        break;
                    }

                    let report = shared.evict();
                    if report.evicted > 0 {
                        debug!(
                            examined = report.examined,
                            evicted = report.evicted,
                            "evicted idle resources"
                        );
                    }
                }
                trace!("evictor stopped");
            })?;

        Ok(Self { shutdown, handle })
    }

    /// Signal the thread and wait for it to exit.
    pub fn stop(self) {
        drop(self.shutdown);
        if self.handle.join().is_err() {
            debug!("evictor thread panicked");
        }
    }
}
