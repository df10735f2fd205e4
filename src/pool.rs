//! Core resource pool implementation

use crate::config::{Factory, PoolConfiguration};
use crate::errors::{PoolError, PoolResult};
use crate::eviction::{EvictionReport, Evictor};
use crate::health::HealthStatus;
use crate::ledger::{Ledger, Slot};
use crate::metrics::{PoolStatistics, PoolStatus};
use crate::resource::{FactoryError, Resource};

use crossbeam::queue::ArrayQueue;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// State shared between the pool handle, outstanding guards and the evictor.
pub(crate) struct Shared<R: Resource> {
    pub(crate) config: PoolConfiguration<R>,
    factory: Factory<R>,
    /// Guards every bookkeeping mutation, including idle queue push/pop
    pub(crate) ledger: Mutex<Ledger<R::Id>>,
    pub(crate) idle: ArrayQueue<R>,
    /// Signalled whenever a resource is requeued or capacity is freed
    pub(crate) available: Condvar,
}

impl<R: Resource> Shared<R> {
    fn acquire(&self, timeout: Duration) -> PoolResult<R> {
        let started = Instant::now();
        let deadline = started.checked_add(timeout);
        let mut ledger = self.ledger.lock();

        loop {
            if ledger.closed {
                ledger.record_wait(started.elapsed());
                return Err(PoolError::PoolClosed);
            }

            if let Some(resource) = self.idle.pop() {
                let id = resource.identity();
                let checked_out = ledger.checkout(&id);
                debug_assert!(checked_out, "queued resource {id:?} was not idle");

                let valid = MutexGuard::unlocked(&mut ledger, || resource.validate());
                if ledger.closed {
                    ledger.record_wait(started.elapsed());
                    drop(ledger);
                    drop(resource);
                    return Err(PoolError::PoolClosed);
                }
                if valid {
                    ledger.record_acquired(started.elapsed());
                    trace!(?id, "acquired idle resource");
                    return Ok(resource);
                }

                ledger.destroy(&id);
                self.available.notify_one();
                debug!(?id, "destroyed idle resource that failed validation");
                // Teardown runs in Drop and must not hold up other callers.
                MutexGuard::unlocked(&mut ledger, || drop(resource));
                continue;
            }

            // Capacity is checked and claimed in one step so concurrent
            // callers cannot both grow the pool past max_size.
            if ledger.try_reserve(self.config.max_size) {
                let created = MutexGuard::unlocked(&mut ledger, || (self.factory)());
                return self.admit_created(&mut ledger, created, started);
            }

            match deadline {
                Some(deadline) if Instant::now() >= deadline => {
                    ledger.record_timeout(started.elapsed());
                    debug!(?timeout, "acquire timed out");
                    return Err(PoolError::Timeout(timeout));
                }
                Some(deadline) => {
                    self.available.wait_until(&mut ledger, deadline);
                }
                None => self.available.wait(&mut ledger),
            }
        }
    }

    /// Finish a growth attempt that held a capacity reservation.
    fn admit_created(
        &self,
        ledger: &mut MutexGuard<'_, Ledger<R::Id>>,
        created: Result<R, FactoryError>,
        started: Instant,
    ) -> PoolResult<R> {
        let resource = match created {
            Ok(resource) => resource,
            Err(err) => {
                ledger.cancel_reservation();
                ledger.record_wait(started.elapsed());
                self.available.notify_one();
                warn!(error = %err, "resource factory failed");
                return Err(err.into());
            }
        };

        let id = resource.identity();
        if ledger.closed {
            ledger.cancel_reservation();
            ledger.record_wait(started.elapsed());
            MutexGuard::unlocked(ledger, || drop(resource));
            return Err(PoolError::PoolClosed);
        }
        if ledger.contains(&id) {
            ledger.cancel_reservation();
            ledger.record_wait(started.elapsed());
            self.available.notify_one();
            warn!(?id, "resource factory returned a duplicate identity");
            MutexGuard::unlocked(ledger, || drop(resource));
            return Err(FactoryError::new(format!("duplicate resource identity {id:?}")).into());
        }

        ledger.insert_created(id.clone(), Slot::Active, true);
        ledger.record_acquired(started.elapsed());
        debug!(?id, "created resource on demand");
        Ok(resource)
    }

    fn release(&self, mut resource: R) -> PoolResult<()> {
        let id = resource.identity();
        let mut ledger = self.ledger.lock();

        if ledger.closed {
            return Err(PoolError::PoolClosed);
        }
        if !ledger.begin_return(&id) {
            return Err(PoolError::InvalidObject);
        }

        let recyclable = MutexGuard::unlocked(&mut ledger, || match resource.reset() {
            Ok(()) => resource.validate(),
            Err(err) => {
                debug!(?id, error = %err, "reset failed");
                false
            }
        });

        // Close ran while we were recycling; the ledger no longer knows us.
        if ledger.closed {
            return Ok(());
        }

        if !recyclable {
            ledger.destroy(&id);
            self.available.notify_one();
            debug!(?id, "destroyed returned resource");
            return Ok(());
        }

        ledger.finish_return(&id);
        if self.idle.push(resource).is_err() {
            ledger.destroy(&id);
            debug!(?id, "idle queue full, destroyed returned resource");
        } else {
            trace!(?id, "released resource");
        }
        self.available.notify_one();
        Ok(())
    }

    /// Flip the closed flag and tear down idle resources.
    ///
    /// Returns false if the pool was already closed.
    fn shut_down(&self) -> bool {
        let drained = {
            let mut ledger = self.ledger.lock();
            if ledger.closed {
                return false;
            }
            ledger.closed = true;

            let mut drained = Vec::with_capacity(self.idle.len());
            while let Some(resource) = self.idle.pop() {
                ledger.destroy(&resource.identity());
                drained.push(resource);
            }
            ledger.clear();
            drained
        };

        self.available.notify_all();
        info!(destroyed = drained.len(), "pool closed");
        true
    }

    /// Occupancy and counters read under a single lock acquisition.
    fn snapshot(&self) -> (PoolStatus, PoolStatistics) {
        let ledger = self.ledger.lock();
        let idle = self.idle.len();
        let total = ledger.len();
        debug_assert_eq!(ledger.count(Slot::Idle), idle);
        let status = PoolStatus {
            active: total.saturating_sub(idle),
            idle,
            total,
        };
        (status, ledger.stats)
    }
}

/// A pooled resource that is released back to the pool when dropped
pub struct PooledResource<R: Resource> {
    resource: Option<R>,
    shared: Arc<Shared<R>>,
}

impl<R: Resource> PooledResource<R> {
    /// Detach the resource from the guard.
    ///
    /// The pool still counts it as active; hand it back with
    /// [`Pool::release`] when done.
    pub fn into_inner(mut self) -> R {
        self.resource.take().expect("Resource already taken")
    }

    /// Release now and report the outcome instead of discarding it on drop.
    pub fn release(mut self) -> PoolResult<()> {
        match self.resource.take() {
            Some(resource) => self.shared.release(resource),
            None => Err(PoolError::InvalidObject),
        }
    }
}

impl<R: Resource> Deref for PooledResource<R> {
    type Target = R;

    fn deref(&self) -> &Self::Target {
        self.resource.as_ref().expect("Resource already taken")
    }
}

impl<R: Resource> DerefMut for PooledResource<R> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.resource.as_mut().expect("Resource already taken")
    }
}

impl<R: Resource> Drop for PooledResource<R> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            if let Err(err) = self.shared.release(resource) {
                trace!(error = %err, "guard release rejected");
            }
        }
    }
}

/// Thread-safe, bounded pool of reusable resources
///
/// Resources are created by the configured factory, either up front
/// (`initial_size`) or on demand while fewer than `max_size` are alive.
/// A background evictor trims idle resources beyond `max_idle` that have
/// been unused longer than `min_evictable_idle_time` or fail validation.
///
/// Waiters are served in no particular order.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{Pool, PoolConfiguration, Resource, ResetError};
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use std::time::Duration;
///
/// struct Conn {
///     id: u64,
/// }
///
/// impl Resource for Conn {
///     type Id = u64;
///     fn identity(&self) -> u64 { self.id }
///     fn reset(&mut self) -> Result<(), ResetError> { Ok(()) }
///     fn validate(&self) -> bool { true }
/// }
///
/// static NEXT: AtomicU64 = AtomicU64::new(0);
///
/// let pool = Pool::new(
///     PoolConfiguration::new()
///         .with_initial_size(2)
///         .with_max_size(4)
///         .with_factory(|| Ok(Conn { id: NEXT.fetch_add(1, Ordering::Relaxed) })),
/// )
/// .unwrap();
///
/// let conn = pool.acquire(Duration::from_secs(1)).unwrap();
/// assert_eq!(pool.status().active, 1);
/// pool.release(conn).unwrap();
///
/// pool.close();
/// assert_eq!(pool.status().total, 0);
/// ```
pub struct Pool<R: Resource> {
    shared: Arc<Shared<R>>,
    evictor: Mutex<Option<Evictor>>,
}

impl<R: Resource> Pool<R> {
    /// Create a pool and fill it to `initial_size`.
    ///
    /// Fails with [`PoolError::Configuration`] when no factory is set,
    /// `max_size` is zero, or the factory fails during the initial fill.
    /// Resources created before a failure are dropped.
    pub fn new(config: PoolConfiguration<R>) -> PoolResult<Self> {
        let (config, factory) = config.normalized()?;
        let idle = ArrayQueue::new(config.max_size);
        let mut ledger = Ledger::with_capacity(config.max_size);

        for _ in 0..config.initial_size {
            let resource = factory().map_err(|err| {
                warn!(error = %err, "resource factory failed during initial fill");
                PoolError::configuration(format!("initial fill failed: {err}"))
            })?;
            let id = resource.identity();
            if ledger.contains(&id) {
                return Err(PoolError::configuration(format!(
                    "factory returned duplicate identity {id:?}"
                )));
            }
            if idle.push(resource).is_err() {
                return Err(PoolError::configuration(
                    "idle queue overflow during initial fill",
                ));
            }
            ledger.insert_created(id, Slot::Idle, false);
        }

        let interval = config.validation_interval;
        let shared = Arc::new(Shared {
            config,
            factory,
            ledger: Mutex::new(ledger),
            idle,
            available: Condvar::new(),
        });

        let evictor = if interval.is_zero() {
            None
        } else {
            match Evictor::start(Arc::clone(&shared), interval) {
                Ok(evictor) => Some(evictor),
                Err(err) => {
                    shared.shut_down();
                    return Err(PoolError::configuration(format!(
                        "failed to start evictor: {err}"
                    )));
                }
            }
        };

        debug!(
            initial = shared.config.initial_size,
            max = shared.config.max_size,
            max_idle = shared.config.max_idle,
            "pool created"
        );

        Ok(Self {
            shared,
            evictor: Mutex::new(evictor),
        })
    }

    /// Take a resource, waiting up to `timeout` for one to become available.
    ///
    /// An idle resource is preferred; otherwise a new one is created if the
    /// pool is below `max_size`. The returned resource has passed
    /// validation and is marked active until [`release`](Self::release)d.
    pub fn acquire(&self, timeout: Duration) -> PoolResult<R> {
        self.shared.acquire(timeout)
    }

    /// Take a resource without waiting.
    ///
    /// `Ok(None)` means the pool is exhausted right now. Closed pools and
    /// factory failures are still reported as errors.
    pub fn try_acquire(&self) -> PoolResult<Option<R>> {
        match self.acquire(Duration::ZERO) {
            Ok(resource) => Ok(Some(resource)),
            Err(PoolError::Timeout(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Take a resource wrapped in a guard that releases it on drop
    pub fn get(&self, timeout: Duration) -> PoolResult<PooledResource<R>> {
        let resource = self.shared.acquire(timeout)?;
        Ok(PooledResource {
            resource: Some(resource),
            shared: Arc::clone(&self.shared),
        })
    }

    /// Acquire on tokio's blocking thread pool.
    ///
    /// The blocking task hands back a guard, so if this future is dropped
    /// before the task finishes, the resource it obtains is released.
    pub async fn acquire_async(&self, timeout: Duration) -> PoolResult<R> {
        let shared = Arc::clone(&self.shared);
        let guard = tokio::task::spawn_blocking(move || -> PoolResult<PooledResource<R>> {
            let resource = shared.acquire(timeout)?;
            Ok(PooledResource {
                resource: Some(resource),
                shared,
            })
        })
        .await
        .map_err(|_| PoolError::Cancelled)??;
        Ok(guard.into_inner())
    }

    /// Hand a resource back.
    ///
    /// Returns [`PoolError::InvalidObject`] if the resource is not on loan
    /// from this pool. A resource that fails reset or validation is
    /// destroyed and the call still succeeds.
    pub fn release(&self, resource: R) -> PoolResult<()> {
        self.shared.release(resource)
    }

    /// Close the pool. Safe to call more than once.
    ///
    /// Idle resources are destroyed, the evictor is stopped and joined, and
    /// every later operation fails with [`PoolError::PoolClosed`].
    pub fn close(&self) {
        self.shared.shut_down();
        if let Some(evictor) = self.evictor.lock().take() {
            evictor.stop();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.ledger.lock().closed
    }

    /// Current (active, idle, total) counts
    pub fn status(&self) -> PoolStatus {
        self.shared.snapshot().0
    }

    /// Copy of the running counters
    pub fn stats(&self) -> PoolStatistics {
        self.shared.snapshot().1
    }

    /// Run one eviction cycle on the calling thread
    pub fn evict_now(&self) -> EvictionReport {
        self.shared.evict()
    }

    /// Get health status
    pub fn health(&self) -> HealthStatus {
        let (status, stats) = self.shared.snapshot();
        HealthStatus::new(&status, &stats, self.shared.config.max_size)
    }

    /// Effective configuration after clamping
    pub fn config(&self) -> &PoolConfiguration<R> {
        &self.shared.config
    }
}

impl<R: Resource> Drop for Pool<R> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<R: Resource> fmt::Debug for Pool<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("status", &self.status())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResetError;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    #[derive(Debug, Clone)]
    struct TestConn {
        id: u64,
        healthy: Arc<AtomicBool>,
        dirty: bool,
    }

    impl Resource for TestConn {
        type Id = u64;

        fn identity(&self) -> u64 {
            self.id
        }

        fn reset(&mut self) -> Result<(), ResetError> {
            if self.dirty {
                return Err(ResetError::new("dirty"));
            }
            Ok(())
        }

        fn validate(&self) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }
    }

    fn config(max: usize, initial: usize) -> (PoolConfiguration<TestConn>, Arc<AtomicBool>) {
        let next = Arc::new(AtomicU64::new(0));
        let healthy = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&healthy);
        let config = PoolConfiguration::new()
            .with_max_size(max)
            .with_max_idle(max)
            .with_initial_size(initial)
            .with_validation_interval(Duration::ZERO)
            .with_factory(move || {
                Ok(TestConn {
                    id: next.fetch_add(1, Ordering::SeqCst),
                    healthy: Arc::clone(&flag),
                    dirty: false,
                })
            });
        (config, healthy)
    }

    #[test]
    fn test_acquire_release_round_trip() {
        let (config, _) = config(3, 2);
        let pool = Pool::new(config).unwrap();
        let before = pool.status();

        let conn = pool.acquire(Duration::from_millis(10)).unwrap();
        assert_eq!(
            pool.status(),
            PoolStatus {
                active: 1,
                idle: 1,
                total: 2
            }
        );

        pool.release(conn).unwrap();
        assert_eq!(pool.status(), before);
    }

    #[test]
    fn test_grows_on_demand_up_to_max() {
        let (config, _) = config(2, 0);
        let pool = Pool::new(config).unwrap();

        let a = pool.acquire(Duration::from_millis(10)).unwrap();
        let b = pool.acquire(Duration::from_millis(10)).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(pool.stats().created, 2);

        let err = pool.acquire(Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, PoolError::Timeout(t) if t == Duration::from_millis(20)));
        assert_eq!(pool.stats().timeouts, 1);
    }

    #[test]
    fn test_failed_reset_destroys() {
        let (config, _) = config(2, 1);
        let pool = Pool::new(config).unwrap();

        let mut conn = pool.acquire(Duration::from_millis(10)).unwrap();
        conn.dirty = true;
        pool.release(conn).unwrap();

        assert_eq!(
            pool.status(),
            PoolStatus {
                active: 0,
                idle: 0,
                total: 0
            }
        );
        let stats = pool.stats();
        assert_eq!(stats.released, 1);
        assert_eq!(stats.destroyed, 1);
    }

    #[test]
    fn test_invalid_idle_resource_replaced_on_acquire() {
        let (config, healthy) = config(1, 1);
        let pool = Pool::new(config).unwrap();

        healthy.store(false, Ordering::SeqCst);
        // Freshly created resources are handed out without validation.
        let conn = pool.acquire(Duration::from_millis(10)).unwrap();
        assert_eq!(conn.id, 1);
        assert_eq!(pool.stats().destroyed, 1);
        assert_eq!(pool.status().total, 1);
    }

    #[test]
    fn test_foreign_and_double_release() {
        let (config, healthy) = config(2, 1);
        let pool = Pool::new(config).unwrap();

        let stranger = TestConn {
            id: 999,
            healthy,
            dirty: false,
        };
        assert_eq!(pool.release(stranger), Err(PoolError::InvalidObject));

        let conn = pool.acquire(Duration::from_millis(10)).unwrap();
        let copy = conn.clone();
        pool.release(conn).unwrap();
        assert_eq!(pool.release(copy), Err(PoolError::InvalidObject));
        assert_eq!(pool.stats().released, 1);
    }

    #[test]
    fn test_release_of_idle_resource_rejected() {
        let (config, _) = config(1, 1);
        let pool = Pool::new(config).unwrap();

        let conn = pool.acquire(Duration::from_millis(10)).unwrap();
        let copy = conn.clone();
        pool.release(conn).unwrap();

        // Still idle in the pool, so a second hand-back is a caller bug.
        assert_eq!(pool.release(copy), Err(PoolError::InvalidObject));
        assert_eq!(
            pool.status(),
            PoolStatus {
                active: 0,
                idle: 1,
                total: 1
            }
        );
    }

    #[test]
    fn test_factory_error_during_growth() {
        let config = PoolConfiguration::<TestConn>::new()
            .with_max_size(2)
            .with_validation_interval(Duration::ZERO)
            .with_factory(|| Err(FactoryError::new("unreachable host")));
        let pool = Pool::new(config).unwrap();

        let err = pool.acquire(Duration::from_millis(10)).unwrap_err();
        assert_eq!(
            err,
            PoolError::Factory(FactoryError::new("unreachable host"))
        );
        assert_eq!(pool.status().total, 0);
    }

    #[test]
    fn test_initial_fill_failure_tears_down() {
        let made = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&made);
        let healthy = Arc::new(AtomicBool::new(true));
        let config = PoolConfiguration::new()
            .with_initial_size(4)
            .with_max_size(4)
            .with_factory(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n == 2 {
                    return Err(FactoryError::new("boom"));
                }
                Ok(TestConn {
                    id: n,
                    healthy: Arc::clone(&healthy),
                    dirty: false,
                })
            });

        let err = Pool::new(config).unwrap_err();
        assert!(matches!(err, PoolError::Configuration(_)));
        assert_eq!(made.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let healthy = Arc::new(AtomicBool::new(true));
        let config = PoolConfiguration::new()
            .with_max_size(2)
            .with_validation_interval(Duration::ZERO)
            .with_factory(move || {
                Ok(TestConn {
                    id: 7,
                    healthy: Arc::clone(&healthy),
                    dirty: false,
                })
            });
        let pool = Pool::new(config).unwrap();

        let _first = pool.acquire(Duration::from_millis(10)).unwrap();
        let err = pool.acquire(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, PoolError::Factory(_)));
        assert_eq!(pool.status().total, 1);
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let (config, _) = config(1, 1);
        let pool = Pool::new(config).unwrap();

        {
            let conn = pool.get(Duration::from_millis(10)).unwrap();
            assert_eq!(conn.id, 0);
            assert_eq!(pool.status().active, 1);
        }

        assert_eq!(
            pool.status(),
            PoolStatus {
                active: 0,
                idle: 1,
                total: 1
            }
        );
        assert_eq!(pool.stats().released, 1);
    }

    #[test]
    fn test_guard_into_inner_stays_active() {
        let (config, _) = config(1, 1);
        let pool = Pool::new(config).unwrap();

        let conn = pool.get(Duration::from_millis(10)).unwrap().into_inner();
        assert_eq!(pool.status().active, 1);
        pool.release(conn).unwrap();
        assert_eq!(pool.status().idle, 1);
    }

    #[test]
    fn test_close_is_idempotent() {
        let (config, _) = config(2, 2);
        let pool = Pool::new(config).unwrap();

        pool.close();
        pool.close();

        assert!(pool.is_closed());
        assert_eq!(pool.status(), PoolStatus::default());
        assert_eq!(pool.stats().destroyed, 2);
        assert!(matches!(
            pool.acquire(Duration::ZERO),
            Err(PoolError::PoolClosed)
        ));
    }

    #[test]
    fn test_try_acquire() {
        let (config, _) = config(1, 0);
        let pool = Pool::new(config).unwrap();

        let conn = pool.try_acquire().unwrap();
        assert!(conn.is_some());
        assert!(pool.try_acquire().unwrap().is_none());

        pool.close();
        assert!(matches!(pool.try_acquire(), Err(PoolError::PoolClosed)));
    }

    #[tokio::test]
    async fn test_async_acquire() {
        let (config, _) = config(2, 1);
        let pool = Pool::new(config).unwrap();

        let conn = pool.acquire_async(Duration::from_millis(50)).await.unwrap();
        assert_eq!(pool.status().active, 1);
        pool.release(conn).unwrap();
    }
}
