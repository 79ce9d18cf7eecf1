use tracing::{debug, instrument, warn};

use crate::connection::Connection;
use crate::context::Context;
use crate::errors::{AlertmanagerError, Result};
use crate::registry::EndpointRegistry;
use crate::resolver::resolve_peers;
use crate::types::RawAlert;

/// Replicates alert writes to every member of an Alertmanager cluster
///
/// Alertmanager does not forward posted alerts to its peers, so with more
/// than one peer behind the shared address every peer is written directly.
pub(crate) struct FanoutDispatcher {
    registry: EndpointRegistry,
}

impl FanoutDispatcher {
    pub(crate) fn new(registry: EndpointRegistry) -> Self {
        Self { registry }
    }

    pub(crate) fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    /// Post `alerts` through `shared` or to every peer
    ///
    /// Membership is resolved first; if that fails nothing is posted.
    #[instrument(name = "FanoutDispatcher::post_alerts", skip_all, fields(alert_count = alerts.len()))]
    pub(crate) async fn post_alerts(
        &self,
        ctx: &Context,
        shared: &Connection,
        alerts: &[RawAlert],
    ) -> Result<()> {
        let peers = resolve_peers(shared, ctx).await?;

        if peers.len() <= 1 {
            debug!(peers = peers.len(), "posting through shared endpoint");
            return shared.post_alerts(ctx, alerts).await;
        }

        let targets = self.registry.reconcile(&peers)?;
        replicate(ctx, &targets, alerts).await
    }
}

/// Post to each target in turn, stopping at the first failure
async fn replicate(ctx: &Context, targets: &[Connection], alerts: &[RawAlert]) -> Result<()> {
    let mut delivered = Vec::with_capacity(targets.len());

    for target in targets {
        if let Err(source) = target.post_alerts(ctx, alerts).await {
            warn!(
                target = %target.base_url(),
                delivered = delivered.len(),
                error = %source,
                "fan-out write failed"
            );
            return Err(AlertmanagerError::Fanout {
                target: target.base_url().clone(),
                delivered,
                source: Box::new(source),
            });
        }
        delivered.push(target.base_url().clone());
    }

    debug!(peers = delivered.len(), "alerts replicated to all peers");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::connection::ConnectionFactory;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixture {
        dispatcher: FanoutDispatcher,
        shared: Connection,
    }

    /// Dispatcher whose peers are reached on the mock server's port
    fn fixture(server: &MockServer) -> Fixture {
        let config = ClientConfig::from_url(server.uri()).resolve().unwrap();
        let factory = ConnectionFactory::new(Duration::from_secs(5)).unwrap();
        let shared = factory.connect(config.base_url().unwrap());
        Fixture {
            dispatcher: FanoutDispatcher::new(EndpointRegistry::new(factory, config)),
            shared,
        }
    }

    async fn mount_status(server: &MockServer, peers: &[&str]) {
        let peers: Vec<_> = peers
            .iter()
            .map(|address| json!({"name": address, "address": address}))
            .collect();
        Mock::given(method("GET"))
            .and(path("/api/v2/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "cluster": {"name": "test", "status": "ready", "peers": peers}
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_single_peer_uses_shared_endpoint() {
        let server = MockServer::start().await;
        mount_status(&server, &["10.255.0.1:9094"]).await;

        Mock::given(method("POST"))
            .and(path("/api/v2/alerts"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let fx = fixture(&server);
        fx.dispatcher
            .post_alerts(&Context::background(), &fx.shared, &[RawAlert::new("test")])
            .await
            .unwrap();
        assert!(fx.dispatcher.registry().is_empty());
    }

    #[tokio::test]
    async fn test_standalone_instance_uses_shared_endpoint() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v2/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "versionInfo": {"version": "0.27.0"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v2/alerts"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let fx = fixture(&server);
        fx.dispatcher
            .post_alerts(&Context::background(), &fx.shared, &[RawAlert::new("test")])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_each_peer_receives_the_write() {
        let server = MockServer::start().await;
        // Both hosts reach the mock server on its port.
        mount_status(&server, &["127.0.0.1:9094", "localhost:9094"]).await;

        Mock::given(method("POST"))
            .and(path("/api/v2/alerts"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let fx = fixture(&server);
        fx.dispatcher
            .post_alerts(&Context::background(), &fx.shared, &[RawAlert::new("test")])
            .await
            .unwrap();
        assert_eq!(fx.dispatcher.registry().len(), 2);
    }

    #[tokio::test]
    async fn test_fanout_stops_at_first_failure() {
        let server = MockServer::start().await;
        // 127.0.0.2 is loopback but nothing listens there.
        mount_status(
            &server,
            &["127.0.0.1:9094", "127.0.0.2:9094", "localhost:9094"],
        )
        .await;

        Mock::given(method("POST"))
            .and(path("/api/v2/alerts"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let fx = fixture(&server);
        let port = fx.shared.base_url().port().unwrap();
        let err = fx
            .dispatcher
            .post_alerts(&Context::background(), &fx.shared, &[RawAlert::new("test")])
            .await
            .unwrap_err();

        match err {
            AlertmanagerError::Fanout {
                target,
                delivered,
                source,
            } => {
                assert_eq!(target.as_str(), format!("http://127.0.0.2:{port}/"));
                assert_eq!(delivered.len(), 1);
                assert_eq!(delivered[0].as_str(), format!("http://127.0.0.1:{port}/"));
                assert!(matches!(*source, AlertmanagerError::Request { .. }));
            }
            other => panic!("Expected Fanout error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_status_failure_posts_nothing() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v2/status"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v2/alerts"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let fx = fixture(&server);
        let err = fx
            .dispatcher
            .post_alerts(&Context::background(), &fx.shared, &[RawAlert::new("test")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AlertmanagerError::Api {
                operation: "get_status",
                status: 500,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_cancelled_context_posts_nothing() {
        let server = MockServer::start().await;
        mount_status(&server, &["127.0.0.1:9094", "localhost:9094"]).await;

        Mock::given(method("POST"))
            .and(path("/api/v2/alerts"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let fx = fixture(&server);
        let (ctx, handle) = Context::background().with_cancel();
        handle.cancel();
        let err = fx
            .dispatcher
            .post_alerts(&ctx, &fx.shared, &[RawAlert::new("test")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AlertmanagerError::Cancelled {
                operation: "get_status"
            }
        ));
    }
}
