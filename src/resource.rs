//! Capability contract for pooled resources

use std::fmt::Debug;
use std::hash::Hash;

use thiserror::Error;

/// A resource the pool can lend out and take back.
///
/// The pool never inspects what the resource is. It only resets it on
/// return, validates it before lending or keeping it, and tracks it by
/// [`identity`](Resource::identity). Destroying a resource means dropping
/// it, so any teardown belongs in its `Drop` impl.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{Resource, ResetError};
///
/// struct Buffer {
///     id: u64,
///     data: Vec<u8>,
/// }
///
/// impl Resource for Buffer {
///     type Id = u64;
///
///     fn identity(&self) -> u64 {
///         self.id
///     }
///
///     fn reset(&mut self) -> Result<(), ResetError> {
///         self.data.clear();
///         Ok(())
///     }
///
///     fn validate(&self) -> bool {
///         self.data.capacity() <= 64 * 1024
///     }
/// }
/// ```
pub trait Resource: Send + 'static {
    /// Key used for all bookkeeping. Must be unique among live resources.
    type Id: Eq + Hash + Clone + Debug + Send + Sync + 'static;

    /// Stable identity; must not change while the resource is alive.
    fn identity(&self) -> Self::Id;

    /// Restore the resource to a reusable state.
    ///
    /// An error means the resource is destroyed instead of requeued.
    fn reset(&mut self) -> Result<(), ResetError>;

    /// Whether the resource is still safe to hand out or keep idle.
    fn validate(&self) -> bool;
}

/// A resource could not be brought back to a reusable state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("reset failed: {message}")]
pub struct ResetError {
    message: String,
}

impl ResetError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A factory could not produce a new resource.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct FactoryError {
    message: String,
}

impl FactoryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for FactoryError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for FactoryError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}
