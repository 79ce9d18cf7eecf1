//! # Alert Manager Kit
//!
//! A Rust client library for the [Prometheus Alertmanager](https://prometheus.io/docs/alerting/latest/alertmanager/)
//! v2 API, aware of clustered deployments.
//!
//! ## Features
//!
//! - Query alerts, alert groups, silences, receivers and instance status
//! - Create, update and delete silences
//! - Post alerts to every instance of an Alertmanager cluster: peers are
//!   discovered through the status endpoint and written to directly, since
//!   Alertmanager does not forward posted alerts to its peers
//! - Configure by URL or by in-cluster service reference
//! - Explicit cancellation and deadlines on every call via [`Context`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use alert_manager_kit::{
//!     AlertSeverity, AlertmanagerClient, ClientConfig, Context, RawAlert, ServiceReference,
//! };
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::from_service(ServiceReference::new("monitoring", "alertmanager"));
//!     let client = AlertmanagerClient::new(&config)?;
//!     let ctx = Context::with_timeout(Duration::from_secs(10));
//!
//!     let alert = RawAlert::new("HighMemoryUsage")
//!         .with_severity(AlertSeverity::Warning)
//!         .with_label("service", "my-app")
//!         .with_label("instance", "localhost:8080")
//!         .with_summary("Memory usage is above 90%")
//!         .with_description("The service is using more than 90% of available memory");
//!
//!     client.push_alert(&ctx, alert).await?;
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod connection;
mod context;
mod errors;
mod fanout;
mod models;
mod registry;
mod resolver;
mod types;

pub use client::{AlertmanagerClient, DEFAULT_TIMEOUT};
pub use config::{ClientConfig, ResolvedConfig, ServiceReference, DEFAULT_PORT};
pub use connection::{Connection, ConnectionFactory};
pub use context::{CancelHandle, Context};
pub use errors::{AlertmanagerError, ConfigError, Result};
pub use registry::EndpointRegistry;
pub use types::{
    Alert, AlertGroup, AlertSeverity, AlertState, AlertStatus, AlertmanagerConfig,
    AlertmanagerStatus, AlertsFilter, ClusterStatus, LabelSet, Matcher, PeerStatus, RawAlert,
    RawSilence, Receiver, Silence, SilenceState, SilenceStatus, VersionInfo,
};
