//! Walks through the client against a running Alertmanager.
//!
//! ```sh
//! ALERTMANAGER_URL=http://localhost:9093 cargo run --example walkthrough
//! ```
//!
//! Without `ALERTMANAGER_URL` the in-cluster service `monitoring/alertmanager`
//! is used.

use alert_manager_kit::{
    AlertmanagerClient, AlertsFilter, ClientConfig, Context, Matcher, RawAlert, RawSilence,
    ServiceReference,
};
use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn print_json<T: Serialize>(title: &str, value: &T) -> Result<(), serde_json::Error> {
    println!("---------- {title}");
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("alert_manager_kit=debug")),
        )
        .init();

    let config = match std::env::var("ALERTMANAGER_URL") {
        Ok(url) => ClientConfig::from_url(url),
        Err(_) => ClientConfig::from_service(ServiceReference::new("monitoring", "alertmanager")),
    };
    let client = AlertmanagerClient::new(&config)?;
    let ctx = Context::with_timeout(Duration::from_secs(10));

    let status = client.get_status(&ctx).await?;
    print_json("status", &status)?;

    client
        .post_alerts(
            &ctx,
            vec![RawAlert::new("test")
                .with_label("alerttype", "test")
                .with_label("namespace", "test")
                .with_label("pod", "test")
                .with_annotation("message", "test")],
        )
        .await?;
    println!("---------- posted alerts to {:?}", client.peer_urls());

    let alerts = client
        .get_alerts(&ctx, &AlertsFilter::new().with_matcher("alertname=\"test\""))
        .await?;
    print_json("alerts", &alerts)?;

    let now = Utc::now();
    let silence_id = client
        .post_silence(
            &ctx,
            &RawSilence::new(now, now + ChronoDuration::minutes(1), "test")
                .with_matcher(Matcher::equal("alertname", "test")),
        )
        .await?;
    println!("---------- silence {silence_id}");

    let silence = client.get_silence(&ctx, &silence_id).await?;
    print_json("silence", &silence)?;

    client.delete_silence(&ctx, &silence_id).await?;
    println!("---------- deleted silence {silence_id}");
    Ok(())
}
