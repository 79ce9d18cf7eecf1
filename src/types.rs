use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// Label or annotation set
pub type LabelSet = HashMap<String, String>;

/// Alert severity levels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Critical,
    Warning,
    Info,
}

impl Display for AlertSeverity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Critical => write!(f, "critical"),
            AlertSeverity::Warning => write!(f, "warning"),
            AlertSeverity::Info => write!(f, "info"),
        }
    }
}

/// Alert to be posted to Alertmanager
///
/// Alerts are identified by their labels. Two alerts with identical labels
/// are considered the same alert by Alertmanager and will be deduplicated.
///
/// See: <https://prometheus.io/docs/alerting/latest/clients/>
///
/// # Example
///
/// ```rust
/// use alert_manager_kit::{RawAlert, AlertSeverity};
///
/// let alert = RawAlert::new("HighCPUUsage")
///     .with_severity(AlertSeverity::Warning)
///     .with_label("service", "api-server")
///     .with_label("instance", "prod-1")
///     .with_summary("CPU usage above 80%")
///     .with_description("The API server CPU usage has exceeded the warning threshold");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAlert {
    /// Labels identify the alert (used for deduplication and routing)
    #[serde(default)]
    pub labels: LabelSet,

    /// Annotations contain additional information (not used for dedup)
    #[serde(default)]
    pub annotations: LabelSet,

    /// Start time of the alert. Alertmanager uses the receive time when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,

    /// End time (if resolved)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,

    /// Generator URL (link back to source)
    #[serde(default, rename = "generatorURL", skip_serializing_if = "Option::is_none")]
    pub generator_url: Option<String>,
}

impl RawAlert {
    /// Create a new alert with the given name
    ///
    /// The `alertname` label is automatically set.
    pub fn new(alertname: &str) -> Self {
        Self::default().with_label("alertname", alertname)
    }

    /// Add a label to the alert
    ///
    /// Alerts with identical labels are considered the same alert.
    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    /// Add severity label
    pub fn with_severity(self, severity: AlertSeverity) -> Self {
        self.with_label("severity", &severity.to_string())
    }

    /// Add an annotation
    pub fn with_annotation(mut self, key: &str, value: &str) -> Self {
        self.annotations.insert(key.to_string(), value.to_string());
        self
    }

    /// Add summary annotation
    pub fn with_summary(self, summary: &str) -> Self {
        self.with_annotation("summary", summary)
    }

    /// Add description annotation
    pub fn with_description(self, description: &str) -> Self {
        self.with_annotation("description", description)
    }

    /// Set generator URL
    pub fn with_generator_url(mut self, url: &str) -> Self {
        self.generator_url = Some(url.to_string());
        self
    }

    /// Set custom start time
    ///
    /// By default, the start time is set to the current time when the alert is created.
    pub fn with_starts_at(mut self, time: DateTime<Utc>) -> Self {
        self.starts_at = Some(time);
        self
    }

    /// Set end time to resolve the alert
    pub fn with_ends_at(mut self, time: DateTime<Utc>) -> Self {
        self.ends_at = Some(time);
        self
    }

    /// Mark the alert as resolved (sets ends_at to now)
    pub fn resolve(mut self) -> Self {
        self.ends_at = Some(Utc::now());
        self
    }

    /// Get the alertname label
    pub fn alertname(&self) -> Option<&str> {
        self.labels.get("alertname").map(|s| s.as_str())
    }
}

impl Default for RawAlert {
    fn default() -> Self {
        Self {
            labels: HashMap::new(),
            annotations: HashMap::new(),
            starts_at: Some(Utc::now()),
            ends_at: None,
            generator_url: None,
        }
    }
}

/// Alert as reported by Alertmanager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub labels: LabelSet,
    pub annotations: LabelSet,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "generatorURL")]
    pub generator_url: Option<String>,
    pub fingerprint: String,
    pub receivers: Vec<Receiver>,
    pub status: Option<AlertStatus>,
}

impl Alert {
    /// Get the alertname label
    pub fn alertname(&self) -> Option<&str> {
        self.labels.get("alertname").map(|s| s.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertStatus {
    /// Fingerprints of the alerts inhibiting this one
    pub inhibited_by: Vec<String>,
    /// IDs of the silences muting this one
    pub silenced_by: Vec<String>,
    pub state: AlertState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    Unprocessed,
    Active,
    Suppressed,
}

impl AlertState {
    /// Wire name of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unprocessed => "unprocessed",
            Self::Active => "active",
            Self::Suppressed => "suppressed",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "unprocessed" => Some(Self::Unprocessed),
            "active" => Some(Self::Active),
            "suppressed" => Some(Self::Suppressed),
            _ => None,
        }
    }
}

impl Display for AlertState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Receiver {
    pub name: String,
}

/// Alerts grouped by the routing tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertGroup {
    pub labels: LabelSet,
    pub receiver: Option<Receiver>,
    pub alerts: Vec<Alert>,
}

/// Query for alerts and alert groups
///
/// All state flags default to `true`. `filter` entries use the simplified
/// Prometheus matcher syntax with the operators `=`, `!=`, `=~` and `!~`,
/// e.g. `alertname="HighCPUUsage"`. `receiver` is a regex over receiver
/// names; an empty string means no receiver filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsFilter {
    pub active: bool,
    pub inhibited: bool,
    pub silenced: bool,
    /// Only honored by alert queries, alert group queries ignore it
    pub unprocessed: bool,
    #[serde(default)]
    pub filter: Vec<String>,
    #[serde(default)]
    pub receiver: String,
}

impl Default for AlertsFilter {
    fn default() -> Self {
        Self {
            active: true,
            inhibited: true,
            silenced: true,
            unprocessed: true,
            filter: Vec::new(),
            receiver: String::new(),
        }
    }
}

impl AlertsFilter {
    /// Filter matching alerts in every state
    pub fn new() -> Self {
        Self::default()
    }

    /// Include active alerts
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Include inhibited alerts
    pub fn with_inhibited(mut self, inhibited: bool) -> Self {
        self.inhibited = inhibited;
        self
    }

    /// Include silenced alerts
    pub fn with_silenced(mut self, silenced: bool) -> Self {
        self.silenced = silenced;
        self
    }

    /// Include unprocessed alerts
    pub fn with_unprocessed(mut self, unprocessed: bool) -> Self {
        self.unprocessed = unprocessed;
        self
    }

    /// Replace the filter expressions
    pub fn with_filter(mut self, filter: Vec<String>) -> Self {
        self.filter = filter;
        self
    }

    /// Append one filter expression
    pub fn with_matcher(mut self, expression: impl Into<String>) -> Self {
        self.filter.push(expression.into());
        self
    }

    /// Restrict to alerts routed to receivers matching this regex
    pub fn with_receiver(mut self, receiver: impl Into<String>) -> Self {
        self.receiver = receiver.into();
        self
    }
}

/// Label condition selecting the alerts a silence applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Matcher {
    pub name: String,
    pub value: String,
    pub is_regex: bool,
}

impl Matcher {
    /// Matcher requiring `name` to equal `value`
    pub fn equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            is_regex: false,
        }
    }

    /// Matcher requiring `name` to match `pattern`
    pub fn regex(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: pattern.into(),
            is_regex: true,
        }
    }
}

/// Silence to be created, or updated when `id` is set
///
/// # Example
///
/// ```rust
/// use alert_manager_kit::{Matcher, RawSilence};
/// use chrono::{Duration, Utc};
///
/// let now = Utc::now();
/// let silence = RawSilence::new(now, now + Duration::hours(2), "ops")
///     .with_comment("planned maintenance")
///     .with_matcher(Matcher::equal("alertname", "HighCPUUsage"));
/// assert!(silence.id.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSilence {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub comment: String,
    pub created_by: String,
    pub matchers: Vec<Matcher>,
}

impl RawSilence {
    /// New silence for the given window
    pub fn new(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>, created_by: &str) -> Self {
        Self {
            id: None,
            starts_at,
            ends_at,
            comment: String::new(),
            created_by: created_by.to_string(),
            matchers: Vec::new(),
        }
    }

    /// Set the comment
    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_string();
        self
    }

    /// Add a matcher
    pub fn with_matcher(mut self, matcher: Matcher) -> Self {
        self.matchers.push(matcher);
        self
    }

    /// Target an existing silence; posting replaces it
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }
}

/// Silence as reported by Alertmanager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Silence {
    pub id: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub comment: String,
    pub created_by: String,
    pub matchers: Vec<Matcher>,
    pub status: SilenceStatus,
    pub updated_at: DateTime<Utc>,
}

impl Silence {
    /// Postable copy of this silence, keeping its id so a post updates it
    pub fn to_raw(&self) -> RawSilence {
        RawSilence {
            id: Some(self.id.clone()),
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            comment: self.comment.clone(),
            created_by: self.created_by.clone(),
            matchers: self.matchers.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilenceStatus {
    pub state: SilenceState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SilenceState {
    Expired,
    Active,
    Pending,
}

impl SilenceState {
    /// Wire name of the state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::Active => "active",
            Self::Pending => "pending",
        }
    }

    /// State Alertmanager reports for a silence spanning `[starts_at, ends_at)` at `now`
    pub fn for_window(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if ends_at <= now {
            Self::Expired
        } else if starts_at > now {
            Self::Pending
        } else {
            Self::Active
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "expired" => Some(Self::Expired),
            "active" => Some(Self::Active),
            "pending" => Some(Self::Pending),
            _ => None,
        }
    }
}

impl Display for SilenceState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of an Alertmanager instance, passed through as reported
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertmanagerStatus {
    #[serde(default)]
    pub cluster: Option<ClusterStatus>,
    #[serde(default)]
    pub config: Option<AlertmanagerConfig>,
    #[serde(default)]
    pub uptime: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version_info: Option<VersionInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatus {
    #[serde(default)]
    pub name: Option<String>,
    /// `ready`, `settling` or `disabled`
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub peers: Vec<PeerStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerStatus {
    #[serde(default)]
    pub name: Option<String>,
    /// Gossip address, `host:port`
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertmanagerConfig {
    /// Loaded configuration file, verbatim
    #[serde(default)]
    pub original: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub build_date: Option<String>,
    #[serde(default)]
    pub build_user: Option<String>,
    #[serde(default)]
    pub go_version: Option<String>,
    #[serde(default)]
    pub revision: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}
