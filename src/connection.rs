use reqwest::{Client, Method};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::context::Context;
use crate::errors::{AlertmanagerError, ConfigError, Result};
use crate::models::{
    decode_all, GettableAlert, GettableSilence, PostSilenceResponse, PostableAlert,
    PostableSilence, WireAlertGroup, WireReceiver,
};
use crate::types::{
    Alert, AlertGroup, AlertmanagerStatus, AlertsFilter, RawAlert, RawSilence, Receiver, Silence,
};

const API_PREFIX: [&str; 2] = ["api", "v2"];

/// Builds [`Connection`]s that share one HTTP client
///
/// Construction is pure: no request is made until a connection is used.
#[derive(Clone)]
pub struct ConnectionFactory {
    client: ClientWithMiddleware,
}

impl ConnectionFactory {
    /// Factory backed by a fresh HTTP client with the given request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(AlertmanagerError::BuildHttpClient)?;

        Ok(Self::with_client(ClientBuilder::new(client).build()))
    }

    /// Factory backed by a custom reqwest middleware client
    pub fn with_client(client: ClientWithMiddleware) -> Self {
        Self { client }
    }

    /// Connection to `base_url` sharing this factory's HTTP client
    pub fn connect(&self, base_url: Url) -> Connection {
        Connection {
            inner: Arc::new(ConnectionInner {
                client: self.client.clone(),
                base_url,
            }),
        }
    }

    /// Parse `raw` and connect to it
    ///
    /// # Errors
    ///
    /// Returns an error if `raw` is not a valid URL.
    pub fn connect_str(&self, raw: &str) -> Result<Connection> {
        let base_url = Url::parse(raw).map_err(|source| ConfigError::InvalidEndpoint {
            url: raw.to_string(),
            source,
        })?;
        Ok(self.connect(base_url))
    }
}

/// Handle to the API of one Alertmanager endpoint
///
/// Cloning is cheap; clones are the same handle (see [`Connection::same_handle`]).
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    client: ClientWithMiddleware,
    base_url: Url,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("base_url", &self.inner.base_url.as_str())
            .finish()
    }
}

impl Connection {
    /// Base URL of the instance this connection talks to
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Whether both values were produced by the same [`ConnectionFactory::connect`] call
    pub fn same_handle(&self, other: &Connection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// List alerts matching `filter`
    pub async fn get_alerts(&self, ctx: &Context, filter: &AlertsFilter) -> Result<Vec<Alert>> {
        let mut query = state_query(filter);
        query.push(("unprocessed", filter.unprocessed.to_string()));
        push_filters(&mut query, filter);

        let request = self.request(Method::GET, &["alerts"])?.query(&query);
        let alerts: Vec<GettableAlert> = self.fetch(ctx, "get_alerts", request).await?;
        decode_all(alerts)
    }

    /// List alert groups matching `filter`
    pub async fn get_alert_groups(
        &self,
        ctx: &Context,
        filter: &AlertsFilter,
    ) -> Result<Vec<AlertGroup>> {
        let mut query = state_query(filter);
        push_filters(&mut query, filter);

        let request = self.request(Method::GET, &["alerts", "groups"])?.query(&query);
        let groups: Vec<WireAlertGroup> = self.fetch(ctx, "get_alert_groups", request).await?;
        decode_all(groups)
    }

    /// Post `alerts` to this instance only
    pub async fn post_alerts(&self, ctx: &Context, alerts: &[RawAlert]) -> Result<()> {
        let body: Vec<PostableAlert<'_>> = alerts.iter().map(PostableAlert::from).collect();
        let request = self.request(Method::POST, &["alerts"])?;
        self.send_json(ctx, "post_alerts", request, &body).await
    }

    /// Fetch one silence by id
    pub async fn get_silence(&self, ctx: &Context, silence_id: &str) -> Result<Silence> {
        let request = self.request(Method::GET, &["silence", silence_id])?;
        let silence: GettableSilence = self.fetch(ctx, "get_silence", request).await?;
        Silence::try_from(silence)
    }

    /// List silences, optionally narrowed by matcher expressions
    pub async fn get_silences(&self, ctx: &Context, filter: &[String]) -> Result<Vec<Silence>> {
        let query: Vec<(&str, &str)> = filter.iter().map(|f| ("filter", f.as_str())).collect();
        let request = self.request(Method::GET, &["silences"])?.query(&query);
        let silences: Vec<GettableSilence> = self.fetch(ctx, "get_silences", request).await?;
        decode_all(silences)
    }

    /// Create or update a silence, returning its id
    pub async fn post_silence(&self, ctx: &Context, silence: &RawSilence) -> Result<String> {
        let request = self
            .request(Method::POST, &["silences"])?
            .json(&PostableSilence::from(silence));
        let response: PostSilenceResponse = self.fetch(ctx, "post_silence", request).await?;
        response.into_id()
    }

    /// Expire a silence by id
    pub async fn delete_silence(&self, ctx: &Context, silence_id: &str) -> Result<()> {
        let request = self.request(Method::DELETE, &["silence", silence_id])?;
        self.execute(ctx, "delete_silence", request).await.map(drop)
    }

    /// List configured receivers
    pub async fn get_receivers(&self, ctx: &Context) -> Result<Vec<Receiver>> {
        let request = self.request(Method::GET, &["receivers"])?;
        let receivers: Vec<WireReceiver> = self.fetch(ctx, "get_receivers", request).await?;
        decode_all(receivers)
    }

    /// Fetch instance status, including cluster peers
    pub async fn get_status(&self, ctx: &Context) -> Result<AlertmanagerStatus> {
        let request = self.request(Method::GET, &["status"])?;
        self.fetch(ctx, "get_status", request).await
    }

    /// Builds `{base}/api/v2/{segments...}`, percent-encoding each segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut endpoint = self.inner.base_url.clone();
        endpoint
            .path_segments_mut()
            .map_err(|()| ConfigError::InvalidEndpoint {
                url: self.inner.base_url.to_string(),
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            })?
            .pop_if_empty()
            .extend(API_PREFIX)
            .extend(segments);
        Ok(endpoint)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.endpoint(segments)?;
        debug!(method = method.as_str(), url = %url, "Alertmanager request");
        Ok(self.inner.client.request(method, url))
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        ctx: &Context,
        operation: &'static str,
        request: RequestBuilder,
        body: &B,
    ) -> Result<()> {
        self.execute(ctx, operation, request.json(body))
            .await
            .map(drop)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T> {
        let text = self.execute(ctx, operation, request).await?;
        serde_json::from_str(&text).map_err(|source| AlertmanagerError::Decode { operation, source })
    }

    /// Send the request and return the body of a successful response
    async fn execute(
        &self,
        ctx: &Context,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<String> {
        ctx.run(operation, async {
            let response = request
                .send()
                .await
                .map_err(|source| AlertmanagerError::Request { operation, source })?;

            let status = response.status();

            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(AlertmanagerError::Api {
                    operation,
                    status: status.as_u16(),
                    message,
                });
            }

            response
                .text()
                .await
                .map_err(|source| AlertmanagerError::Body { operation, source })
        })
        .await
    }
}

fn state_query(filter: &AlertsFilter) -> Vec<(&'static str, String)> {
    vec![
        ("active", filter.active.to_string()),
        ("silenced", filter.silenced.to_string()),
        ("inhibited", filter.inhibited.to_string()),
    ]
}

fn push_filters(query: &mut Vec<(&'static str, String)>, filter: &AlertsFilter) {
    query.extend(filter.filter.iter().map(|f| ("filter", f.clone())));
    if !filter.receiver.is_empty() {
        query.push(("receiver", filter.receiver.clone()));
    }
}
