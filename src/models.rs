//! Wire shapes of the Alertmanager v2 API.
//!
//! Every field is optional on the wire. Conversion into the public types
//! fails with [`AlertmanagerError::MissingField`] when a required field is
//! absent; absent label sets and lists decode as empty.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{AlertmanagerError, Result};
use crate::types::{
    Alert, AlertGroup, AlertState, AlertStatus, LabelSet, Matcher, RawAlert, RawSilence, Receiver,
    Silence, SilenceState, SilenceStatus,
};

fn required<T>(value: Option<T>, entity: &'static str, field: &'static str) -> Result<T> {
    value.ok_or(AlertmanagerError::MissingField { entity, field })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GettableAlert {
    labels: Option<LabelSet>,
    annotations: Option<LabelSet>,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "generatorURL")]
    generator_url: Option<String>,
    fingerprint: Option<String>,
    receivers: Option<Vec<WireReceiver>>,
    status: Option<WireAlertStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAlertStatus {
    inhibited_by: Option<Vec<String>>,
    silenced_by: Option<Vec<String>>,
    state: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireReceiver {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireAlertGroup {
    labels: Option<LabelSet>,
    receiver: Option<WireReceiver>,
    alerts: Option<Vec<GettableAlert>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GettableSilence {
    id: Option<String>,
    status: Option<WireSilenceStatus>,
    updated_at: Option<DateTime<Utc>>,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
    comment: Option<String>,
    created_by: Option<String>,
    matchers: Option<Vec<WireMatcher>>,
}

#[derive(Debug, Default, Deserialize)]
struct WireSilenceStatus {
    state: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMatcher {
    name: Option<String>,
    value: Option<String>,
    is_regex: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PostSilenceResponse {
    #[serde(rename = "silenceID")]
    silence_id: Option<String>,
}

/// Request body of `POST /api/v2/alerts`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PostableAlert<'a> {
    labels: &'a LabelSet,
    annotations: &'a LabelSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    starts_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ends_at: Option<DateTime<Utc>>,
    #[serde(rename = "generatorURL", skip_serializing_if = "Option::is_none")]
    generator_url: Option<&'a str>,
}

impl<'a> From<&'a RawAlert> for PostableAlert<'a> {
    fn from(alert: &'a RawAlert) -> Self {
        Self {
            labels: &alert.labels,
            annotations: &alert.annotations,
            starts_at: alert.starts_at,
            ends_at: alert.ends_at,
            generator_url: alert.generator_url.as_deref(),
        }
    }
}

/// Request body of `POST /api/v2/silences`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PostableSilence<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    matchers: Vec<WireMatcher>,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    created_by: &'a str,
    comment: &'a str,
}

impl<'a> From<&'a RawSilence> for PostableSilence<'a> {
    fn from(silence: &'a RawSilence) -> Self {
        Self {
            id: silence.id.as_deref().filter(|id| !id.is_empty()),
            matchers: silence
                .matchers
                .iter()
                .map(|m| WireMatcher {
                    name: Some(m.name.clone()),
                    value: Some(m.value.clone()),
                    is_regex: Some(m.is_regex),
                })
                .collect(),
            starts_at: silence.starts_at,
            ends_at: silence.ends_at,
            created_by: &silence.created_by,
            comment: &silence.comment,
        }
    }
}

impl TryFrom<WireReceiver> for Receiver {
    type Error = AlertmanagerError;

    fn try_from(wire: WireReceiver) -> Result<Self> {
        Ok(Self {
            name: required(wire.name, "receiver", "name")?,
        })
    }
}

impl TryFrom<WireAlertStatus> for AlertStatus {
    type Error = AlertmanagerError;

    fn try_from(wire: WireAlertStatus) -> Result<Self> {
        let state = required(wire.state, "alert status", "state")?;
        let state = AlertState::parse(&state).ok_or(AlertmanagerError::InvalidField {
            entity: "alert status",
            field: "state",
            value: state,
        })?;
        Ok(Self {
            inhibited_by: wire.inhibited_by.unwrap_or_default(),
            silenced_by: wire.silenced_by.unwrap_or_default(),
            state,
        })
    }
}

impl TryFrom<GettableAlert> for Alert {
    type Error = AlertmanagerError;

    fn try_from(wire: GettableAlert) -> Result<Self> {
        Ok(Self {
            labels: wire.labels.unwrap_or_default(),
            annotations: wire.annotations.unwrap_or_default(),
            starts_at: required(wire.starts_at, "alert", "startsAt")?,
            ends_at: required(wire.ends_at, "alert", "endsAt")?,
            updated_at: wire.updated_at,
            generator_url: wire.generator_url,
            fingerprint: required(wire.fingerprint, "alert", "fingerprint")?,
            receivers: decode_all(wire.receivers.unwrap_or_default())?,
            status: wire.status.map(AlertStatus::try_from).transpose()?,
        })
    }
}

impl TryFrom<WireAlertGroup> for AlertGroup {
    type Error = AlertmanagerError;

    fn try_from(wire: WireAlertGroup) -> Result<Self> {
        Ok(Self {
            labels: wire.labels.unwrap_or_default(),
            receiver: wire.receiver.map(Receiver::try_from).transpose()?,
            alerts: decode_all(wire.alerts.unwrap_or_default())?,
        })
    }
}

impl TryFrom<WireMatcher> for Matcher {
    type Error = AlertmanagerError;

    fn try_from(wire: WireMatcher) -> Result<Self> {
        Ok(Self {
            name: required(wire.name, "matcher", "name")?,
            value: required(wire.value, "matcher", "value")?,
            is_regex: required(wire.is_regex, "matcher", "isRegex")?,
        })
    }
}

impl TryFrom<GettableSilence> for Silence {
    type Error = AlertmanagerError;

    fn try_from(wire: GettableSilence) -> Result<Self> {
        let status = required(wire.status, "silence", "status")?;
        let state = required(status.state, "silence status", "state")?;
        let state = SilenceState::parse(&state).ok_or(AlertmanagerError::InvalidField {
            entity: "silence status",
            field: "state",
            value: state,
        })?;

        Ok(Self {
            id: required(wire.id, "silence", "id")?,
            starts_at: required(wire.starts_at, "silence", "startsAt")?,
            ends_at: required(wire.ends_at, "silence", "endsAt")?,
            comment: required(wire.comment, "silence", "comment")?,
            created_by: required(wire.created_by, "silence", "createdBy")?,
            matchers: decode_all(wire.matchers.unwrap_or_default())?,
            status: SilenceStatus { state },
            updated_at: required(wire.updated_at, "silence", "updatedAt")?,
        })
    }
}

impl PostSilenceResponse {
    pub(crate) fn into_id(self) -> Result<String> {
        required(self.silence_id, "post silence response", "silenceID")
    }
}

/// Convert a list of wire values, failing on the first invalid entry
pub(crate) fn decode_all<W, T>(wire: Vec<W>) -> Result<Vec<T>>
where
    T: TryFrom<W, Error = AlertmanagerError>,
{
    wire.into_iter().map(T::try_from).collect()
}
