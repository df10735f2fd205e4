//! Health monitoring for resource pools

use crate::metrics::{PoolStatistics, PoolStatus};

/// Utilization above which a pool is reported unhealthy
const HIGH_UTILIZATION: f64 = 0.9;

/// Health status of a resource pool
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{HealthStatus, PoolStatistics, PoolStatus};
///
/// let status = PoolStatus { active: 1, idle: 3, total: 4 };
/// let health = HealthStatus::new(&status, &PoolStatistics::default(), 10);
///
/// assert!(health.is_healthy());
/// assert_eq!(health.idle_resources, 3);
/// ```
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Share of capacity currently on loan (0.0 to 1.0)
    pub utilization: f64,

    /// Idle resources count
    pub idle_resources: usize,

    /// Active resources count
    pub active_resources: usize,

    /// Maximum number of live resources
    pub max_size: usize,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    /// Create a new health status
    pub fn new(status: &PoolStatus, stats: &PoolStatistics, max_size: usize) -> Self {
        let utilization = if max_size > 0 {
            status.active as f64 / max_size as f64
        } else {
            0.0
        };

        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if utilization > HIGH_UTILIZATION {
            warnings.push(format!("High utilization: {:.1}%", utilization * 100.0));
            is_healthy = false;
        }

        if stats.timeouts > 0 {
            warnings.push(format!("{} acquire calls timed out", stats.timeouts));
        }

        if status.idle == 0 && status.total >= max_size && max_size > 0 {
            warnings.push("Pool is exhausted".to_string());
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            utilization,
            idle_resources: status.idle,
            active_resources: status.active,
            max_size,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}
