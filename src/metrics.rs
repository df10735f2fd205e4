//! Statistics collection and export for resource pools

use std::collections::HashMap;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Running counters for a pool
///
/// Counters only grow until the pool is closed. A copy returned by
/// [`Pool::stats`](crate::Pool::stats) is taken under the pool lock, so all
/// fields belong to the same instant.
///
/// # Examples
///
/// ```
/// # use esox_resourcepool::{Pool, PoolConfiguration, Resource, ResetError};
/// # use std::time::Duration;
/// # struct Conn(u32);
/// # impl Resource for Conn {
/// #     type Id = u32;
/// #     fn identity(&self) -> u32 { self.0 }
/// #     fn reset(&mut self) -> Result<(), ResetError> { Ok(()) }
/// #     fn validate(&self) -> bool { true }
/// # }
/// let pool = Pool::new(
///     PoolConfiguration::new()
///         .with_initial_size(1)
///         .with_factory(|| Ok(Conn(1))),
/// )
/// .unwrap();
///
/// let conn = pool.acquire(Duration::from_millis(10)).unwrap();
/// pool.release(conn).unwrap();
///
/// let stats = pool.stats();
/// assert_eq!(stats.created, 1);
/// assert_eq!(stats.acquired, 1);
/// assert_eq!(stats.released, 1);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolStatistics {
    /// Resources produced by the factory
    pub created: u64,

    /// Successful acquisitions
    pub acquired: u64,

    /// Accepted releases
    pub released: u64,

    /// Resources destroyed for any reason
    pub destroyed: u64,

    /// Acquisitions that hit their deadline
    pub timeouts: u64,

    /// Total time callers spent inside acquire
    pub wait_time: Duration,

    /// Longest single acquire
    pub max_wait_time: Duration,
}

impl PoolStatistics {
    /// Mean time spent per acquire attempt that completed or timed out
    pub fn average_wait_time(&self) -> Duration {
        let attempts = self.acquired + self.timeouts;
        if attempts == 0 {
            return Duration::ZERO;
        }
        let nanos = self.wait_time.as_nanos() / u128::from(attempts);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Export statistics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("created".to_string(), self.created.to_string());
        metrics.insert("acquired".to_string(), self.acquired.to_string());
        metrics.insert("released".to_string(), self.released.to_string());
        metrics.insert("destroyed".to_string(), self.destroyed.to_string());
        metrics.insert("timeouts".to_string(), self.timeouts.to_string());
        metrics.insert(
            "wait_time_ms".to_string(),
            self.wait_time.as_millis().to_string(),
        );
        metrics.insert(
            "max_wait_time_ms".to_string(),
            self.max_wait_time.as_millis().to_string(),
        );
        metrics
    }
}

/// Point-in-time occupancy of a pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolStatus {
    /// Resources on loan (including ones being recycled)
    pub active: usize,

    /// Resources waiting in the idle queue
    pub idle: usize,

    /// All live resources
    pub total: usize,
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Export pool metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::{MetricsExporter, PoolStatistics, PoolStatus};
    /// use std::collections::HashMap;
    ///
    /// let stats = PoolStatistics { acquired: 3, ..Default::default() };
    /// let status = PoolStatus { active: 1, idle: 2, total: 3 };
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = MetricsExporter::export_prometheus(&stats, &status, "db", Some(&tags)).unwrap();
    /// assert!(output.contains("resourcepool_resources_active"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        stats: &PoolStatistics,
        status: &PoolStatus,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> Result<String, prometheus::Error> {
        use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Opts, Registry, TextEncoder};

        let mut labels = HashMap::new();
        labels.insert("pool".to_string(), pool_name.to_string());
        if let Some(tags) = tags {
            for (key, value) in tags {
                labels.insert(key.clone(), value.clone());
            }
        }

        let registry = Registry::new();
        let opts = |name: &str, help: &str| Opts::new(name, help).const_labels(labels.clone());

        let gauges = [
            (
                "resourcepool_resources_active",
                "Resources currently on loan",
                status.active,
            ),
            (
                "resourcepool_resources_idle",
                "Resources waiting in the idle queue",
                status.idle,
            ),
            (
                "resourcepool_resources_total",
                "Live resources",
                status.total,
            ),
        ];
        for (name, help, value) in gauges {
            let gauge = IntGauge::with_opts(opts(name, help))?;
            gauge.set(i64::try_from(value).unwrap_or(i64::MAX));
            registry.register(Box::new(gauge))?;
        }

        let counters = [
            (
                "resourcepool_resources_created_total",
                "Resources created",
                stats.created,
            ),
            (
                "resourcepool_acquired_total",
                "Successful acquisitions",
                stats.acquired,
            ),
            (
                "resourcepool_released_total",
                "Accepted releases",
                stats.released,
            ),
            (
                "resourcepool_resources_destroyed_total",
                "Resources destroyed",
                stats.destroyed,
            ),
            (
                "resourcepool_timeouts_total",
                "Acquisitions that timed out",
                stats.timeouts,
            ),
        ];
        for (name, help, value) in counters {
            let counter = IntCounter::with_opts(opts(name, help))?;
            counter.inc_by(value);
            registry.register(Box::new(counter))?;
        }

        let wait = Gauge::with_opts(opts(
            "resourcepool_wait_seconds_max",
            "Longest time spent in a single acquire",
        ))?;
        wait.set(stats.max_wait_time.as_secs_f64());
        registry.register(Box::new(wait))?;

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
