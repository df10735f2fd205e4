//! Pool configuration options

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{PoolError, PoolResult};
use crate::resource::FactoryError;

/// Creates new resources on demand.
pub type Factory<R> = Arc<dyn Fn() -> Result<R, FactoryError> + Send + Sync>;

/// Configuration for pool behavior
///
/// # Examples
///
/// ```
/// use esox_resourcepool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::<String>::new()
///     .with_initial_size(2)
///     .with_max_size(10)
///     .with_max_idle(4)
///     .with_min_evictable_idle_time(Duration::from_secs(60))
///     .with_validation_interval(Duration::from_secs(5));
///
/// assert_eq!(config.max_size, 10);
/// assert_eq!(config.max_idle, 4);
/// assert!(config.factory.is_none());
/// ```
pub struct PoolConfiguration<R> {
    /// Resources created up front when the pool is constructed
    pub initial_size: usize,

    /// Maximum number of live (active + idle) resources
    pub max_size: usize,

    /// Idle resources beyond this count are candidates for eviction
    pub max_idle: usize,

    /// How long an idle resource must sit unused before it can be evicted
    pub min_evictable_idle_time: Duration,

    /// Period of the background evictor; zero disables it
    pub validation_interval: Duration,

    /// Produces new resources
    pub factory: Option<Factory<R>>,
}

impl<R> Default for PoolConfiguration<R> {
    fn default() -> Self {
        Self {
            initial_size: 0,
            max_size: 8,
            max_idle: 8,
            min_evictable_idle_time: Duration::from_secs(30 * 60),
            validation_interval: Duration::from_secs(30),
            factory: None,
        }
    }
}

impl<R> Clone for PoolConfiguration<R> {
    fn clone(&self) -> Self {
        Self {
            initial_size: self.initial_size,
            max_size: self.max_size,
            max_idle: self.max_idle,
            min_evictable_idle_time: self.min_evictable_idle_time,
            validation_interval: self.validation_interval,
            factory: self.factory.clone(),
        }
    }
}

impl<R> fmt::Debug for PoolConfiguration<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfiguration")
            .field("initial_size", &self.initial_size)
            .field("max_size", &self.max_size)
            .field("max_idle", &self.max_idle)
            .field("min_evictable_idle_time", &self.min_evictable_idle_time)
            .field("validation_interval", &self.validation_interval)
            .field("factory", &self.factory.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl<R> PoolConfiguration<R> {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of resources created at construction
    pub fn with_initial_size(mut self, size: usize) -> Self {
        self.initial_size = size;
        self
    }

    /// Set the maximum number of live resources
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Set how many idle resources are kept before eviction applies
    pub fn with_max_idle(mut self, count: usize) -> Self {
        self.max_idle = count;
        self
    }

    /// Set the minimum idle time before an excess resource is evicted
    pub fn with_min_evictable_idle_time(mut self, idle: Duration) -> Self {
        self.min_evictable_idle_time = idle;
        self
    }

    /// Set the evictor period. `Duration::ZERO` turns the evictor off.
    pub fn with_validation_interval(mut self, interval: Duration) -> Self {
        self.validation_interval = interval;
        self
    }

    /// Set the resource factory
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::PoolConfiguration;
    ///
    /// let config = PoolConfiguration::new()
    ///     .with_factory(|| Ok(String::from("fresh")));
    ///
    /// let factory = config.factory.unwrap();
    /// assert_eq!(factory().unwrap(), "fresh");
    /// ```
    pub fn with_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Result<R, FactoryError> + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Check the configuration and clamp oversized limits to `max_size`.
    ///
    /// Returns the factory alongside the clamped configuration so the pool
    /// never has to re-check its presence.
    pub(crate) fn normalized(mut self) -> PoolResult<(Self, Factory<R>)> {
        let Some(factory) = self.factory.clone() else {
            return Err(PoolError::configuration("a resource factory is required"));
        };
        if self.max_size == 0 {
            return Err(PoolError::configuration("max_size must be greater than 0"));
        }
        self.initial_size = self.initial_size.min(self.max_size);
        self.max_idle = self.max_idle.min(self.max_size);
        Ok((self, factory))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_factory_rejected() {
        let err = PoolConfiguration::<u32>::new().normalized().err().unwrap();
        assert!(matches!(err, PoolError::Configuration(_)));
    }

    #[test]
    fn test_zero_max_size_rejected() {
        let err = PoolConfiguration::new()
            .with_max_size(0)
            .with_factory(|| Ok(1u32))
            .normalized()
            .err()
            .unwrap();
        assert!(matches!(err, PoolError::Configuration(_)));
    }

    #[test]
    fn test_oversized_limits_are_clamped() {
        let (config, _) = PoolConfiguration::new()
            .with_initial_size(20)
            .with_max_size(5)
            .with_max_idle(50)
            .with_factory(|| Ok(1u32))
            .normalized()
            .unwrap();

        assert_eq!(config.initial_size, 5);
        assert_eq!(config.max_idle, 5);
        assert_eq!(config.max_size, 5);
    }

    #[test]
    fn test_debug_hides_factory() {
        let config = PoolConfiguration::new().with_factory(|| Ok(1u32));
        let rendered = format!("{config:?}");
        assert!(rendered.contains("<fn>"));
    }
}
