use reqwest_middleware::ClientWithMiddleware;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::config::{ClientConfig, ResolvedConfig};
use crate::connection::{Connection, ConnectionFactory};
use crate::context::Context;
use crate::errors::Result;
use crate::fanout::FanoutDispatcher;
use crate::registry::EndpointRegistry;
use crate::types::{
    Alert, AlertGroup, AlertmanagerStatus, AlertsFilter, RawAlert, RawSilence, Receiver, Silence,
};

/// Request timeout used by [`AlertmanagerClient::new`]
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for an Alertmanager deployment
///
/// Reads and silence writes go through the shared (possibly load-balanced)
/// endpoint. Posted alerts are written to every cluster peer.
///
/// # Example
///
/// ```rust,no_run
/// use alert_manager_kit::{AlertmanagerClient, AlertsFilter, ClientConfig, Context, RawAlert};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = AlertmanagerClient::new(&ClientConfig::from_url("http://localhost:9093"))?;
///     let ctx = Context::with_timeout(Duration::from_secs(10));
///
///     client
///         .push_alert(&ctx, RawAlert::new("TestAlert").with_label("service", "my-service"))
///         .await?;
///
///     let alerts = client
///         .get_alerts(&ctx, &AlertsFilter::new().with_matcher("alertname=\"TestAlert\""))
///         .await?;
///     println!("{} alert(s)", alerts.len());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct AlertmanagerClient {
    config: ResolvedConfig,
    shared: Connection,
    dispatcher: Arc<FanoutDispatcher>,
}

impl AlertmanagerClient {
    /// Create a new Alertmanager client with the default request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be resolved or the HTTP
    /// client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::with_timeout(config, DEFAULT_TIMEOUT)
    }

    /// Create a new Alertmanager client
    ///
    /// # Arguments
    ///
    /// * `config` - Where the Alertmanager instances live
    /// * `timeout` - Request timeout duration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be resolved or the HTTP
    /// client cannot be built.
    pub fn with_timeout(config: &ClientConfig, timeout: Duration) -> Result<Self> {
        Self::from_factory(config, ConnectionFactory::new(timeout)?)
    }

    /// Create a new client with a custom reqwest middleware client
    ///
    /// This allows you to add custom middleware (retry, logging, etc.). The
    /// same client is used for the shared endpoint and every peer.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be resolved.
    pub fn with_client(client: ClientWithMiddleware, config: &ClientConfig) -> Result<Self> {
        Self::from_factory(config, ConnectionFactory::with_client(client))
    }

    fn from_factory(config: &ClientConfig, factory: ConnectionFactory) -> Result<Self> {
        let config = config.resolve()?;
        let shared = factory.connect(config.base_url()?);
        debug!(
            url = %shared.base_url(),
            target_port = config.target_port(),
            "created Alertmanager client"
        );

        Ok(Self {
            dispatcher: Arc::new(FanoutDispatcher::new(EndpointRegistry::new(
                factory,
                config.clone(),
            ))),
            config,
            shared,
        })
    }

    /// Get alerts matching the filter
    #[instrument(name = "AlertmanagerClient::get_alerts", skip_all)]
    pub async fn get_alerts(&self, ctx: &Context, filter: &AlertsFilter) -> Result<Vec<Alert>> {
        self.shared.get_alerts(ctx, filter).await
    }

    /// Get alert groups matching the filter
    ///
    /// `filter.unprocessed` does not apply to groups and is ignored.
    #[instrument(name = "AlertmanagerClient::get_alert_groups", skip_all)]
    pub async fn get_alert_groups(
        &self,
        ctx: &Context,
        filter: &AlertsFilter,
    ) -> Result<Vec<AlertGroup>> {
        self.shared.get_alert_groups(ctx, filter).await
    }

    /// Push one or more alerts to every Alertmanager instance
    ///
    /// Alertmanager deduplicates alerts by their labels, so replaying a
    /// partially delivered batch is safe.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Cluster membership cannot be read, in which case nothing is posted
    /// - A request fails or Alertmanager returns a non-success status code;
    ///   with several peers this is [`AlertmanagerError::Fanout`](crate::AlertmanagerError::Fanout),
    ///   listing the peers that already accepted the alerts
    #[instrument(
        name = "AlertmanagerClient::post_alerts",
        skip_all,
        fields(alert_count = alerts.len())
    )]
    pub async fn post_alerts(&self, ctx: &Context, alerts: Vec<RawAlert>) -> Result<()> {
        if alerts.is_empty() {
            debug!("No alerts to push");
            return Ok(());
        }

        self.dispatcher.post_alerts(ctx, &self.shared, &alerts).await?;

        debug!("Alerts pushed successfully");
        Ok(())
    }

    /// Push a single alert
    ///
    /// Convenience method that wraps `post_alerts` for a single alert.
    pub async fn push_alert(&self, ctx: &Context, alert: RawAlert) -> Result<()> {
        self.post_alerts(ctx, vec![alert]).await
    }

    /// Get a silence by id
    #[instrument(name = "AlertmanagerClient::get_silence", skip(self, ctx))]
    pub async fn get_silence(&self, ctx: &Context, silence_id: &str) -> Result<Silence> {
        self.shared.get_silence(ctx, silence_id).await
    }

    /// Get silences matching every filter expression
    ///
    /// Filters use the operators `=`, `!=`, `=~` and `!~`.
    #[instrument(name = "AlertmanagerClient::get_silences", skip_all)]
    pub async fn get_silences(&self, ctx: &Context, filter: &[String]) -> Result<Vec<Silence>> {
        self.shared.get_silences(ctx, filter).await
    }

    /// Create a silence, or update it when `silence.id` is set
    ///
    /// Returns the id of the stored silence.
    #[instrument(
        name = "AlertmanagerClient::post_silence",
        skip_all,
        fields(created_by = %silence.created_by)
    )]
    pub async fn post_silence(&self, ctx: &Context, silence: &RawSilence) -> Result<String> {
        let id = self.shared.post_silence(ctx, silence).await?;
        debug!(silence_id = %id, "silence stored");
        Ok(id)
    }

    /// Expire a silence by id
    #[instrument(name = "AlertmanagerClient::delete_silence", skip(self, ctx))]
    pub async fn delete_silence(&self, ctx: &Context, silence_id: &str) -> Result<()> {
        self.shared.delete_silence(ctx, silence_id).await
    }

    /// Get the configured receivers
    #[instrument(name = "AlertmanagerClient::get_receivers", skip_all)]
    pub async fn get_receivers(&self, ctx: &Context) -> Result<Vec<Receiver>> {
        self.shared.get_receivers(ctx).await
    }

    /// Get the status of the shared endpoint
    #[instrument(name = "AlertmanagerClient::get_status", skip_all)]
    pub async fn get_status(&self, ctx: &Context) -> Result<AlertmanagerStatus> {
        self.shared.get_status(ctx).await
    }

    /// Get the base API URL
    pub fn api_url(&self) -> &Url {
        self.shared.base_url()
    }

    /// Get the resolved configuration
    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Get the connection to the shared endpoint
    pub fn shared_connection(&self) -> &Connection {
        &self.shared
    }

    /// Peer URLs from the last multi-peer reconciliation
    ///
    /// Writes that found at most one peer go through the shared endpoint and
    /// leave this list unchanged.
    pub fn peer_urls(&self) -> Vec<String> {
        self.dispatcher.registry().urls()
    }
}
