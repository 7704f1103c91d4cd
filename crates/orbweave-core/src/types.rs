//! Core types for Orbweave

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Thread identifier - cheaply cloneable
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ThreadId(Arc<str>);

impl ThreadId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive a thread id from the signal that caught it. The signal id's
    /// first segment keeps ids short; the millisecond stamp disambiguates
    /// re-entry from the same signal.
    pub fn derive(signal_id: &str, at: DateTime<Utc>) -> Self {
        let prefix = signal_id.split('-').next().unwrap_or(signal_id);
        Self::new(format!("thr-{}-{}", prefix, at.timestamp_millis()))
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ThreadId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Serialize for ThreadId {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ThreadId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        String::deserialize(d).map(Self::new)
    }
}

/// What produced a signal
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Message,
    Mention,
    Transaction,
    Webhook,
    Alert,
    Other,
}

/// Signal/thread priority. Variant order is rank order: `Critical` sorts
/// first, so `Ord` can drive priority queues directly.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Kind of node a signal source or thread target points at.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Channel,
    Feed,
    Agent,
    Service,
    Ledger,
}

/// A reference to an external node (channel, feed, service, ...).
/// Sources and targets are both NodeRefs; templates match on the `kind`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub id: String,
    pub kind: NodeKind,
}

impl NodeRef {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    pub fn channel(id: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Channel)
    }

    pub fn feed(id: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Feed)
    }

    pub fn agent(id: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Agent)
    }

    pub fn service(id: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Service)
    }

    pub fn ledger(id: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Ledger)
    }
}

/// Webhook sub-type, parsed from the raw payload's `type` field at ingress.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum WebhookEvent {
    Funding,
    Governance,
    Other(String),
}

impl WebhookEvent {
    pub fn parse(s: &str) -> Self {
        match s {
            "funding" => Self::Funding,
            "governance" => Self::Governance,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Funding => "funding",
            Self::Governance => "governance",
            Self::Other(s) => s,
        }
    }
}

impl Serialize for WebhookEvent {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for WebhookEvent {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        String::deserialize(d).map(|s| Self::parse(&s))
    }
}

/// Structured signal payload, validated at ingress.
///
/// Schema table applied to the raw JSON body:
/// - `type` (string)     → `event` — webhook sub-type
/// - `verified` (bool)   → `verified` — source-asserted verification flag
///
/// Everything else stays in `data` untouched and flows through to plan steps.
/// Parsing is total; absent or malformed keys fall back to defaults.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Payload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<WebhookEvent>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub data: Value,
}

impl Payload {
    pub fn parse(raw: Value) -> Self {
        let event = raw
            .get("type")
            .and_then(Value::as_str)
            .map(WebhookEvent::parse);
        let verified = raw
            .get("verified")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Self {
            event,
            verified,
            data: raw,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// A raw external event entering the system before classification.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub kind: SignalKind,
    pub source: NodeRef,
    pub payload: Payload,
    pub caught_at: DateTime<Utc>,
    pub priority: Priority,
    pub sticky: bool,
    pub processed: bool,
    pub thread_id: Option<ThreadId>,
}

impl Signal {
    pub fn new(
        kind: SignalKind,
        source: NodeRef,
        payload: Payload,
        priority: Priority,
        sticky: bool,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            source,
            payload,
            caught_at: Utc::now(),
            priority,
            sticky,
            processed: false,
            thread_id: None,
        }
    }
}

/// Classified unit of work. Open-ended: the closed variants cover what the
/// classifier emits, `Other` carries anything collaborators invent.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ThreadKind {
    Reply,
    Engage,
    LedgerNote,
    WolfWinStory,
    GovernanceBrief,
    StatusBroadcast,
    Triage,
    Other(String),
}

impl ThreadKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Reply => "reply",
            Self::Engage => "engage",
            Self::LedgerNote => "ledger-note",
            Self::WolfWinStory => "wolf-win-story",
            Self::GovernanceBrief => "governance-brief",
            Self::StatusBroadcast => "status-broadcast",
            Self::Triage => "triage",
            Self::Other(s) => s,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "reply" => Self::Reply,
            "engage" => Self::Engage,
            "ledger-note" => Self::LedgerNote,
            "wolf-win-story" => Self::WolfWinStory,
            "governance-brief" => Self::GovernanceBrief,
            "status-broadcast" => Self::StatusBroadcast,
            "triage" => Self::Triage,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ThreadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ThreadKind {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ThreadKind {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        String::deserialize(d).map(|s| Self::parse(&s))
    }
}

/// Thread lifecycle status. Transitions are one-directional:
/// pending → in_progress → completed | failed. A thread never re-enters
/// pending, and completed/failed are terminal.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl ThreadStatus {
    pub const ALL: [ThreadStatus; 4] = [
        ThreadStatus::Pending,
        ThreadStatus::InProgress,
        ThreadStatus::Completed,
        ThreadStatus::Failed,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `next` is a legal forward transition from `self`.
    pub fn can_advance_to(self, next: ThreadStatus) -> bool {
        use ThreadStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, Completed)
                | (Pending, Failed)
                | (InProgress, Completed)
                | (InProgress, Failed)
        )
    }
}

impl fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A classified, trackable unit of work with a lifecycle status.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub source: NodeRef,
    pub targets: Vec<NodeRef>,
    pub kind: ThreadKind,
    pub payload: Payload,
    pub status: ThreadStatus,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub executable: bool,
    pub template_id: Option<String>,
    /// Owned copy of the attached plan. Never shared with the template it
    /// came from.
    pub plan: Option<ExecutionPlan>,
}

impl Thread {
    pub fn new(
        id: ThreadId,
        source: NodeRef,
        targets: Vec<NodeRef>,
        kind: ThreadKind,
        payload: Payload,
        priority: Priority,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            source,
            targets,
            kind,
            payload,
            status: ThreadStatus::Pending,
            priority,
            created_at: now,
            updated_at: now,
            executable: false,
            template_id: None,
            plan: None,
        }
    }
}

/// One step of an execution plan.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PlanStep {
    pub id: String,
    /// Action name, resolved through the action registry at execution time.
    pub action: String,
    pub target: NodeRef,
    #[serde(default)]
    pub params: Value,
    pub order: u32,
}

impl PlanStep {
    pub fn new(action: impl Into<String>, target: NodeRef, params: Value, order: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            action: action.into(),
            target,
            params,
            order,
        }
    }
}

/// Ordered list of steps. Owned exclusively by the thread it is attached to.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ExecutionPlan {
    pub steps: Vec<PlanStep>,
}

impl ExecutionPlan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    /// Steps in ascending `order`. Stable for equal orders.
    pub fn ordered_steps(&self) -> Vec<PlanStep> {
        let mut steps = self.steps.clone();
        steps.sort_by_key(|s| s.order);
        steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// A reusable, pre-authored execution plan matched against thread shape.
/// Long-lived and shared read-only; application deep-copies the plan.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub kind: ThreadKind,
    pub source_pattern: NodeKind,
    pub target_patterns: Vec<NodeKind>,
    pub plan: ExecutionPlan,
    pub priority: Priority,
    pub usage_count: u64,
    pub success_rate: f64,
}

impl Template {
    pub fn new(
        name: impl Into<String>,
        kind: ThreadKind,
        source_pattern: NodeKind,
        target_patterns: Vec<NodeKind>,
        plan: ExecutionPlan,
        priority: Priority,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            kind,
            source_pattern,
            target_patterns,
            plan,
            priority,
            usage_count: 0,
            success_rate: 1.0,
        }
    }
}

/// A scored, decaying record of a previously successful routing path.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trail {
    pub id: String,
    /// Ordered hop ids, last hop is the destination.
    pub path: Vec<String>,
    /// Always clamped to [0, 1].
    pub strength: f64,
    /// Exponential moving average of traversal outcomes, in [0, 1].
    pub success_rate: f64,
    /// Exponential moving average of observed traversal latency.
    pub latency_ms: f64,
    pub last_used: DateTime<Utc>,
    pub evaporation_rate: f64,
}

impl Trail {
    pub fn destination(&self) -> Option<&str> {
        self.path.last().map(String::as_str)
    }
}

/// Ant lifecycle while a routed request is in flight.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AntStatus {
    Foraging,
    Completed,
    Stuck,
}

/// An in-flight routed request traversing (or discovering) a trail.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ant {
    pub id: String,
    pub request_id: String,
    pub payload: Value,
    /// Hops visited so far, in order.
    pub path: Vec<String>,
    pub destination: String,
    pub status: AntStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Trail followed, if the router found one at spawn time.
    pub trail_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_id_basics() {
        let id = ThreadId::new("thr-1");
        assert_eq!(id.as_str(), "thr-1");
        assert_eq!(format!("{}", id), "thr-1");
    }

    #[test]
    fn thread_id_derive_uses_signal_prefix() {
        let at = Utc::now();
        let id = ThreadId::derive("ab12cd34-5678-90ef", at);
        assert!(id.as_str().starts_with("thr-ab12cd34-"));
    }

    #[test]
    fn status_transitions_are_one_directional() {
        use ThreadStatus::*;
        assert!(Pending.can_advance_to(InProgress));
        assert!(InProgress.can_advance_to(Completed));
        assert!(InProgress.can_advance_to(Failed));
        assert!(!Completed.can_advance_to(Pending));
        assert!(!Failed.can_advance_to(InProgress));
        assert!(!InProgress.can_advance_to(Pending));
        assert!(!Completed.can_advance_to(Failed));
    }

    #[test]
    fn terminal_statuses() {
        assert!(ThreadStatus::Completed.is_terminal());
        assert!(ThreadStatus::Failed.is_terminal());
        assert!(!ThreadStatus::Pending.is_terminal());
        assert!(!ThreadStatus::InProgress.is_terminal());
    }

    #[test]
    fn payload_parse_extracts_schema_fields() {
        let raw = serde_json::json!({"type": "funding", "verified": true, "amount": 250});
        let payload = Payload::parse(raw);
        assert_eq!(payload.event, Some(WebhookEvent::Funding));
        assert!(payload.verified);
        assert_eq!(payload.data["amount"], 250);
    }

    #[test]
    fn payload_parse_is_total() {
        let payload = Payload::parse(serde_json::json!("not an object"));
        assert_eq!(payload.event, None);
        assert!(!payload.verified);

        let payload = Payload::parse(serde_json::json!({"type": 42, "verified": "yes"}));
        assert_eq!(payload.event, None);
        assert!(!payload.verified);
    }

    #[test]
    fn thread_kind_round_trips_kebab_strings() {
        assert_eq!(ThreadKind::WolfWinStory.as_str(), "wolf-win-story");
        assert_eq!(ThreadKind::parse("status-broadcast"), ThreadKind::StatusBroadcast);
        assert_eq!(
            ThreadKind::parse("something-new"),
            ThreadKind::Other("something-new".into())
        );
    }

    #[test]
    fn plan_orders_steps_by_order_field() {
        let t = NodeRef::channel("c");
        let plan = ExecutionPlan::new(vec![
            PlanStep::new("b", t.clone(), Value::Null, 2),
            PlanStep::new("a", t.clone(), Value::Null, 1),
            PlanStep::new("c", t, Value::Null, 3),
        ]);
        let names: Vec<_> = plan.ordered_steps().iter().map(|s| s.action.clone()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn priority_rank_order() {
        assert!(Priority::Critical < Priority::High);
        assert!(Priority::High < Priority::Medium);
        assert!(Priority::Medium < Priority::Low);
    }
}
