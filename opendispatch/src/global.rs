//! The process-wide registry.
//!
//! Programs that register from many places share one [`Registry`] behind a
//! read-write lock: registration and initialization take the write lock,
//! calls take the read lock.

use std::sync::OnceLock;

use parking_lot::RwLock;

use crate::config::RegistryConfig;
use crate::registry::Registry;

static DEFAULT_REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();

/// The process-wide registry, configured from the environment on first use.
///
/// ```
/// use opendispatch::default_registry;
///
/// let mut registry = default_registry().write();
/// registry.unit("main");
/// assert!(!registry.is_initialized());
/// ```
pub fn default_registry() -> &'static RwLock<Registry> {
    DEFAULT_REGISTRY.get_or_init(|| RwLock::new(Registry::with_config(RegistryConfig::default().with_env())))
}
