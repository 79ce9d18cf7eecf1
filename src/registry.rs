//! Connections to the individual peers of a clustered Alertmanager.

use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::config::ResolvedConfig;
use crate::connection::{Connection, ConnectionFactory};
use crate::errors::Result;

/// Peer URL to connection map, reconciled against cluster membership
///
/// Keys are `scheme://host:target_port`. Handles of peers that stay in the
/// cluster are reused across reconciliations.
pub struct EndpointRegistry {
    factory: ConnectionFactory,
    config: ResolvedConfig,
    endpoints: Mutex<BTreeMap<String, Connection>>,
}

impl EndpointRegistry {
    /// Empty registry building peer connections with `factory`
    pub fn new(factory: ConnectionFactory, config: ResolvedConfig) -> Self {
        Self {
            factory,
            config,
            endpoints: Mutex::new(BTreeMap::new()),
        }
    }

    /// Make the registry hold exactly one connection per host in `peer_hosts`
    ///
    /// Returns the resulting connections ordered by URL. On error the
    /// registry is left as it was.
    ///
    /// # Errors
    ///
    /// Returns an error if a peer URL cannot be built.
    pub fn reconcile(&self, peer_hosts: &BTreeSet<String>) -> Result<Vec<Connection>> {
        let mut endpoints = self.endpoints.lock();

        let mut next = BTreeMap::new();
        let mut added = 0usize;
        for host in peer_hosts {
            let url = self.config.peer_url(host);
            let conn = match endpoints.get(&url) {
                Some(conn) => conn.clone(),
                None => {
                    added += 1;
                    self.factory.connect_str(&url)?
                }
            };
            next.insert(url, conn);
        }

        let removed = endpoints.keys().filter(|url| !next.contains_key(*url)).count();
        if added > 0 || removed > 0 {
            info!(
                added,
                removed,
                peers = next.len(),
                "peer endpoints changed"
            );
        } else {
            debug!(peers = next.len(), "peer endpoints unchanged");
        }

        *endpoints = next;
        Ok(endpoints.values().cloned().collect())
    }

    /// Current connections, ordered by URL
    pub fn snapshot(&self) -> Vec<Connection> {
        self.endpoints.lock().values().cloned().collect()
    }

    /// Current peer URLs, sorted
    pub fn urls(&self) -> Vec<String> {
        self.endpoints.lock().keys().cloned().collect()
    }

    /// Number of registered peers
    pub fn len(&self) -> usize {
        self.endpoints.lock().len()
    }

    /// Whether no peer is registered
    pub fn is_empty(&self) -> bool {
        self.endpoints.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientConfig, ServiceReference};
    use std::time::Duration;

    fn registry(target_port: u16) -> EndpointRegistry {
        let config = ClientConfig::from_url("http://alertmanager:9093")
            .with_service(ServiceReference::new("monitoring", "alertmanager").with_target_port(target_port))
            .resolve()
            .unwrap();
        let factory = ConnectionFactory::new(Duration::from_secs(1)).unwrap();
        EndpointRegistry::new(factory, config)
    }

    fn hosts(hosts: &[&str]) -> BTreeSet<String> {
        hosts.iter().map(|h| h.to_string()).collect()
    }

    fn find<'a>(conns: &'a [Connection], url: &str) -> &'a Connection {
        conns
            .iter()
            .find(|c| c.base_url().as_str().trim_end_matches('/') == url)
            .unwrap()
    }

    #[test]
    fn test_keys_use_target_port() {
        let registry = registry(9093);
        let conns = registry.reconcile(&hosts(&["10.0.0.2", "10.0.0.3"])).unwrap();

        assert_eq!(conns.len(), 2);
        assert_eq!(
            registry.urls(),
            ["http://10.0.0.2:9093", "http://10.0.0.3:9093"]
        );
    }

    #[test]
    fn test_empty_membership_clears_registry() {
        let registry = registry(9093);
        registry.reconcile(&hosts(&["10.0.0.2", "10.0.0.3"])).unwrap();
        assert_eq!(registry.len(), 2);

        let conns = registry.reconcile(&BTreeSet::new()).unwrap();
        assert!(conns.is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unchanged_membership_keeps_handles() {
        let registry = registry(9093);
        let members = hosts(&["10.0.0.2", "10.0.0.3"]);
        let first = registry.reconcile(&members).unwrap();
        let second = registry.reconcile(&members).unwrap();

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert!(a.same_handle(b));
        }
    }

    #[test]
    fn test_membership_change_evicts_and_reuses() {
        let registry = registry(9093);
        let first = registry
            .reconcile(&hosts(&["10.0.0.1", "10.0.0.2"]))
            .unwrap();
        let second = registry
            .reconcile(&hosts(&["10.0.0.2", "10.0.0.3"]))
            .unwrap();

        assert_eq!(
            registry.urls(),
            ["http://10.0.0.2:9093", "http://10.0.0.3:9093"]
        );
        assert!(find(&first, "http://10.0.0.2:9093").same_handle(find(&second, "http://10.0.0.2:9093")));
        assert_eq!(registry.snapshot().len(), 2);
    }

    #[test]
    fn test_failed_reconcile_leaves_registry_untouched() {
        let registry = registry(9093);
        let before = registry.reconcile(&hosts(&["10.0.0.2"])).unwrap();

        let err = registry.reconcile(&hosts(&["10.0.0.3", "bad host"]));
        assert!(err.is_err());

        assert_eq!(registry.urls(), ["http://10.0.0.2:9093"]);
        assert!(registry.snapshot()[0].same_handle(&before[0]));
    }

    #[test]
    fn test_concurrent_reconciles_never_mix_memberships() {
        let registry = registry(9093);
        let left = hosts(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
        let right = hosts(&["10.0.0.3", "10.0.0.4"]);
        let left_urls: Vec<String> = left.iter().map(|h| format!("http://{h}:9093")).collect();
        let right_urls: Vec<String> = right.iter().map(|h| format!("http://{h}:9093")).collect();

        let urls_of = |conns: &[Connection]| -> Vec<String> {
            conns
                .iter()
                .map(|c| c.base_url().as_str().trim_end_matches('/').to_string())
                .collect()
        };

        std::thread::scope(|scope| {
            for i in 0..8 {
                let members = if i % 2 == 0 { &left } else { &right };
                let (registry, left_urls, right_urls) = (&registry, &left_urls, &right_urls);
                scope.spawn(move || {
                    for _ in 0..200 {
                        let urls = urls_of(&registry.reconcile(members).unwrap());
                        assert!(urls == *left_urls || urls == *right_urls, "mixed set: {urls:?}");

                        let current = registry.urls();
                        assert!(current == *left_urls || current == *right_urls, "mixed set: {current:?}");
                    }
                });
            }
        });

        let last = registry.urls();
        assert!(last == left_urls || last == right_urls);
    }

    #[test]
    fn test_custom_target_port() {
        let registry = registry(19093);
        registry.reconcile(&hosts(&["am-0.am"])).unwrap();
        assert_eq!(registry.urls(), ["http://am-0.am:19093"]);
    }
}
