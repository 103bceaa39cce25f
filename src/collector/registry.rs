//! Collector registry and startup resolution of the active set.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::collector::{Collector, CollectorContext, CollectorError};
use crate::collector::{cluster_cpu, cluster_network, fsa, node_capacity};
use crate::config::CollectorSelection;

/// Constructor for a long-lived collector instance.
pub type CollectorFactory = fn(&CollectorContext) -> Result<Arc<dyn Collector>, CollectorError>;

/// One registered collector implementation.
#[derive(Clone, Copy)]
pub struct Registration {
    pub name: &'static str,
    pub default_enabled: bool,
    pub factory: CollectorFactory,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("default_enabled", &self.default_enabled)
            .finish_non_exhaustive()
    }
}

/// Table of collector name to registration.
///
/// Names are unique; registering a name twice is a programming error and
/// panics. The table is only read after startup.
#[derive(Debug, Default)]
pub struct CollectorRegistry {
    registrations: BTreeMap<&'static str, Registration>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in collector.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(cluster_cpu::NAME, true, cluster_cpu::build);
        registry.register(cluster_network::NAME, true, cluster_network::build);
        registry.register(node_capacity::NAME, true, node_capacity::build);
        registry.register(fsa::NAME, true, fsa::build);
        registry
    }

    /// Register a collector implementation.
    ///
    /// # Panics
    /// Panics if `name` is already registered.
    pub fn register(&mut self, name: &'static str, default_enabled: bool, factory: CollectorFactory) {
        let registration = Registration {
            name,
            default_enabled,
            factory,
        };
        if self.registrations.insert(name, registration).is_some() {
            panic!("collector '{name}' registered twice");
        }
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&'static str> {
        self.registrations.keys().copied().collect()
    }

    pub fn get(&self, name: &str) -> Option<&Registration> {
        self.registrations.get(name)
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Compute the active set for `selection`, sorted by name.
    ///
    /// A collector is active iff it is enabled by default, explicitly
    /// enabled, or `all` is set, and it is not explicitly disabled.
    ///
    /// # Errors
    /// Returns `CollectorError::Config` when the selection names an
    /// unregistered collector.
    pub fn resolve_active(&self, selection: &CollectorSelection) -> Result<Vec<Registration>, CollectorError> {
        if let Some(unknown) = selection
            .enable
            .iter()
            .chain(&selection.disable)
            .find(|name| !self.registrations.contains_key(name.as_str()))
        {
            return Err(CollectorError::Config(format!("unknown collector '{unknown}'")));
        }

        let active = self
            .registrations
            .values()
            .filter(|reg| {
                let included = reg.default_enabled
                    || selection.all
                    || selection.enable.iter().any(|n| n == reg.name);
                let excluded = selection.disable.iter().any(|n| n == reg.name);
                included && !excluded
            })
            .copied()
            .collect();
        Ok(active)
    }

    /// Resolve the active set and construct each collector once.
    ///
    /// # Errors
    /// Fails on an invalid selection or the first factory error.
    pub fn build_active(
        &self,
        selection: &CollectorSelection,
        ctx: &CollectorContext,
    ) -> Result<Vec<Arc<dyn Collector>>, CollectorError> {
        let active = self.resolve_active(selection)?;
        for name in self.names() {
            let enabled = active.iter().any(|reg| reg.name == name);
            tracing::info!(collector = %name, enabled, "Collector resolved");
        }

        active.iter().map(|reg| (reg.factory)(ctx)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResultCache;
    use crate::collector::{ClusterIdentity, DEFAULT_QUERY_TIMEOUT};
    use crate::stats::MockStatsEngine;

    fn selection(all: bool, enable: &[&str], disable: &[&str]) -> CollectorSelection {
        CollectorSelection {
            all,
            enable: enable.iter().map(|s| s.to_string()).collect(),
            disable: disable.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn registry() -> CollectorRegistry {
        let mut registry = CollectorRegistry::new();
        registry.register("alpha", true, cluster_cpu::build);
        registry.register("beta", false, cluster_network::build);
        registry.register("gamma", true, node_capacity::build);
        registry
    }

    fn active_names(registry: &CollectorRegistry, sel: &CollectorSelection) -> Vec<&'static str> {
        registry
            .resolve_active(sel)
            .unwrap()
            .iter()
            .map(|r| r.name)
            .collect()
    }

    #[test]
    fn test_defaults_only() {
        let registry = registry();
        assert_eq!(active_names(&registry, &selection(false, &[], &[])), vec!["alpha", "gamma"]);
    }

    #[test]
    fn test_enable_and_disable() {
        let registry = registry();
        let sel = selection(false, &["beta"], &["gamma"]);
        assert_eq!(active_names(&registry, &sel), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_collect_all_still_honours_disable() {
        let registry = registry();
        let sel = selection(true, &[], &["alpha"]);
        assert_eq!(active_names(&registry, &sel), vec!["beta", "gamma"]);
    }

    #[test]
    fn test_unknown_name_rejected() {
        let registry = registry();
        let err = registry
            .resolve_active(&selection(false, &["delta"], &[]))
            .unwrap_err();
        assert!(err.to_string().contains("delta"));
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn test_duplicate_registration_panics() {
        let mut registry = registry();
        registry.register("alpha", false, fsa::build);
    }

    #[test]
    fn test_builtin_names() {
        let registry = CollectorRegistry::builtin();
        assert_eq!(
            registry.names(),
            vec!["cluster_cpu", "cluster_network", "fsa", "node_capacity"]
        );
        assert!(registry.get("fsa").is_some_and(|r| r.default_enabled));
    }

    #[test]
    fn test_build_active_constructs_collectors() {
        let ctx = CollectorContext::new(
            Arc::new(MockStatsEngine::new("c1")),
            Arc::new(ResultCache::default()),
            ClusterIdentity::new("c1", None),
            DEFAULT_QUERY_TIMEOUT,
        );
        let collectors = CollectorRegistry::builtin()
            .build_active(&selection(false, &[], &["fsa"]), &ctx)
            .unwrap();
        let names: Vec<_> = collectors.iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["cluster_cpu", "cluster_network", "node_capacity"]);
    }
}
