// Path: crates/telemetry/src/gatherer.rs
//! Merging of named metric sources.
//!
//! The node exposes a single metrics surface. Every chain contributes to it
//! under its own namespace, and within a chain the adapter merges its local
//! registry with the families reported by the plugin process.

use async_trait::async_trait;
use parking_lot::RwLock;
use plugvm_types::VmError;
use prometheus::proto::MetricFamily;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A source of metric families.
#[async_trait]
pub trait Gatherer: Send + Sync {
    /// Collects the current value of every metric family this source owns.
    async fn gather(&self) -> Result<Vec<MetricFamily>, VmError>;
}

#[async_trait]
impl Gatherer for prometheus::Registry {
    async fn gather(&self) -> Result<Vec<MetricFamily>, VmError> {
        Ok(prometheus::Registry::gather(self))
    }
}

/// Merges gatherers registered under distinct namespaces.
///
/// Family names are prefixed with `<namespace>_`; the empty namespace adds no prefix.
#[derive(Default)]
pub struct MultiGatherer {
    gatherers: RwLock<BTreeMap<String, Arc<dyn Gatherer>>>,
}

impl std::fmt::Debug for MultiGatherer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiGatherer")
            .field("namespaces", &self.gatherers.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl MultiGatherer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `gatherer` under `namespace`. Each namespace may be registered once.
    pub fn register(&self, namespace: &str, gatherer: Arc<dyn Gatherer>) -> Result<(), VmError> {
        let mut gatherers = self.gatherers.write();
        if gatherers.contains_key(namespace) {
            return Err(VmError::Metrics(format!(
                "duplicate metrics namespace {:?}",
                namespace
            )));
        }
        gatherers.insert(namespace.to_string(), gatherer);
        Ok(())
    }

    /// Returns the registered namespaces in order.
    pub fn namespaces(&self) -> Vec<String> {
        self.gatherers.read().keys().cloned().collect()
    }
}

#[async_trait]
impl Gatherer for MultiGatherer {
    async fn gather(&self) -> Result<Vec<MetricFamily>, VmError> {
        let sources: Vec<(String, Arc<dyn Gatherer>)> = self
            .gatherers
            .read()
            .iter()
            .map(|(ns, g)| (ns.clone(), g.clone()))
            .collect();

        let mut merged = Vec::new();
        for (namespace, gatherer) in sources {
            for mut family in gatherer.gather().await? {
                if !namespace.is_empty() {
                    let name = format!("{}_{}", namespace, family.get_name());
                    family.set_name(name);
                }
                merged.push(family);
            }
        }
        merged.sort_by(|a, b| a.get_name().cmp(b.get_name()));
        Ok(merged)
    }
}

/// The metrics sink a chain context hands to its VM.
pub trait MetricsRegisterer: Send + Sync {
    /// Registers the VM's merged gatherer with the node-wide surface.
    fn register(&self, gatherer: Arc<dyn Gatherer>) -> Result<(), VmError>;
}

/// Registers into a parent [`MultiGatherer`] under a fixed namespace.
#[derive(Debug, Clone)]
pub struct NamespacedRegisterer {
    parent: Arc<MultiGatherer>,
    namespace: String,
}

impl NamespacedRegisterer {
    pub fn new(parent: Arc<MultiGatherer>, namespace: impl Into<String>) -> Self {
        Self {
            parent,
            namespace: namespace.into(),
        }
    }
}

impl MetricsRegisterer for NamespacedRegisterer {
    fn register(&self, gatherer: Arc<dyn Gatherer>) -> Result<(), VmError> {
        self.parent.register(&self.namespace, gatherer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{IntCounter, Registry};

    fn registry_with(name: &str) -> Arc<Registry> {
        let registry = Registry::new();
        let counter = IntCounter::new(name, "test counter").unwrap();
        counter.inc();
        registry.register(Box::new(counter)).unwrap();
        Arc::new(registry)
    }

    #[tokio::test]
    async fn prefixes_and_sorts_families() {
        let multi = MultiGatherer::new();
        multi.register("rpcchainvm", registry_with("requests")).unwrap();
        multi.register("", registry_with("blocks")).unwrap();

        let names: Vec<String> = multi
            .gather()
            .await
            .unwrap()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert_eq!(names, vec!["blocks", "rpcchainvm_requests"]);
    }

    #[tokio::test]
    async fn rejects_duplicate_namespace() {
        let multi = MultiGatherer::new();
        multi.register("a", registry_with("x")).unwrap();
        assert!(matches!(
            multi.register("a", registry_with("y")),
            Err(VmError::Metrics(_))
        ));
    }

    #[tokio::test]
    async fn namespaced_registerer_nests_gatherers() {
        let node = Arc::new(MultiGatherer::new());
        let registerer = NamespacedRegisterer::new(node.clone(), "chain");
        let vm = Arc::new(MultiGatherer::new());
        vm.register("rpcchainvm", registry_with("calls")).unwrap();
        registerer.register(vm).unwrap();

        let families = node.gather().await.unwrap();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].get_name(), "chain_rpcchainvm_calls");
        assert_eq!(node.namespaces(), vec!["chain".to_string()]);
    }
}
