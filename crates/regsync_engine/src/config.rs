//! Configuration for the reconciliation engine.

use std::path::PathBuf;
use std::time::Duration;

/// How many removed artifacts a synchronizer cleans up per pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanupPolicy {
    /// Clean up every artifact whose source file is gone.
    #[default]
    AllMissing,
    /// Stop after the first missing artifact per synchronizer per pass.
    FirstMissing,
}

/// Configuration for the synchronization processor.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root directory of the registry.
    pub registry_root: PathBuf,
    /// Whether passes run at all.
    pub enabled: bool,
    /// Interval between scheduled passes.
    pub sync_interval: Duration,
    /// Cleanup throttle.
    pub cleanup_policy: CleanupPolicy,
    /// Whether the walker follows symbolic links.
    pub follow_links: bool,
}

impl EngineConfig {
    /// Creates a new configuration for a registry root.
    pub fn new(registry_root: impl Into<PathBuf>) -> Self {
        Self {
            registry_root: registry_root.into(),
            enabled: true,
            sync_interval: Duration::from_secs(10),
            cleanup_policy: CleanupPolicy::default(),
            follow_links: true,
        }
    }

    /// Enables or disables synchronization.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the interval for scheduled passes.
    #[must_use]
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Sets the cleanup policy.
    #[must_use]
    pub fn with_cleanup_policy(mut self, policy: CleanupPolicy) -> Self {
        self.cleanup_policy = policy;
        self
    }

    /// Sets whether symbolic links are followed while walking.
    #[must_use]
    pub fn with_follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("registry")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_config_builder() {
        let config = EngineConfig::new("/var/registry/public")
            .with_enabled(false)
            .with_sync_interval(Duration::from_secs(2))
            .with_cleanup_policy(CleanupPolicy::FirstMissing)
            .with_follow_links(false);

        assert_eq!(config.registry_root, PathBuf::from("/var/registry/public"));
        assert!(!config.enabled);
        assert_eq!(config.sync_interval, Duration::from_secs(2));
        assert_eq!(config.cleanup_policy, CleanupPolicy::FirstMissing);
        assert!(!config.follow_links);
    }

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert!(config.enabled);
        assert!(config.follow_links);
        assert_eq!(config.cleanup_policy, CleanupPolicy::AllMissing);
        assert_eq!(config.sync_interval, Duration::from_secs(10));
    }
}
