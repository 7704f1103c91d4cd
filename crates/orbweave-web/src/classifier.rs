//! Signal classifier and stickiness gate
//!
//! Pure decision logic. `should_stick` decides whether a signal is worth
//! converting into a thread; `classify` maps a signal to a thread shape.
//! Both are total functions — no input ever raises, unrecognized shapes fall
//! through to the default bucket.

use chrono::Utc;
use orbweave_core::{
    NodeKind, NodeRef, Priority, Signal, SignalKind, Thread, ThreadId, ThreadKind, WebhookEvent,
};

/// The thread shape a signal classifies into.
#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    pub kind: ThreadKind,
    pub priority: Priority,
    pub targets: Vec<NodeRef>,
}

/// Priority assumed at ingress when the caller does not pass one.
/// Machine-origin kinds default hotter than conversational ones.
pub fn default_priority(kind: SignalKind) -> Priority {
    match kind {
        SignalKind::Alert => Priority::Critical,
        SignalKind::Webhook | SignalKind::Mention => Priority::High,
        SignalKind::Message | SignalKind::Transaction => Priority::Medium,
        SignalKind::Other => Priority::Low,
    }
}

/// Node kind a signal source resolves to at ingress.
pub fn source_kind(kind: SignalKind) -> NodeKind {
    match kind {
        SignalKind::Message => NodeKind::Channel,
        SignalKind::Mention => NodeKind::Feed,
        SignalKind::Transaction => NodeKind::Ledger,
        SignalKind::Webhook | SignalKind::Alert | SignalKind::Other => NodeKind::Service,
    }
}

/// Whether a signal is worth converting into a thread.
///
/// Critical/high always stick. Medium sticks when the source is systemic
/// (prefix match), the signal is explicitly sticky, or the payload carries a
/// verified flag. Low sticks only when explicitly sticky or re-entering an
/// existing thread.
pub fn should_stick(signal: &Signal, systemic_prefixes: &[String]) -> bool {
    match signal.priority {
        Priority::Critical | Priority::High => true,
        Priority::Medium => {
            signal.sticky
                || signal.payload.verified
                || systemic_prefixes
                    .iter()
                    .any(|prefix| signal.source.id.starts_with(prefix.as_str()))
        }
        Priority::Low => signal.sticky || signal.thread_id.is_some(),
    }
}

/// Fixed decision table keyed on signal kind and, for webhooks, the parsed
/// payload sub-type. Pure: the same signal always classifies the same way.
pub fn classify(signal: &Signal) -> Classification {
    match signal.kind {
        SignalKind::Alert => Classification {
            kind: ThreadKind::StatusBroadcast,
            priority: Priority::Critical,
            targets: vec![
                NodeRef::channel("ops"),
                NodeRef::feed("status"),
                NodeRef::service("pager"),
            ],
        },
        SignalKind::Webhook => match signal.payload.event {
            Some(WebhookEvent::Funding) => Classification {
                kind: ThreadKind::WolfWinStory,
                priority: Priority::High,
                targets: vec![NodeRef::channel("announcements"), NodeRef::feed("stories")],
            },
            Some(WebhookEvent::Governance) => Classification {
                kind: ThreadKind::GovernanceBrief,
                priority: Priority::Medium,
                targets: vec![NodeRef::channel("governance")],
            },
            _ => default_bucket(),
        },
        SignalKind::Message => Classification {
            kind: ThreadKind::Reply,
            // Replies inherit the signal's urgency but never sink below medium.
            priority: signal.priority.min(Priority::Medium),
            targets: vec![signal.source.clone()],
        },
        SignalKind::Mention => Classification {
            kind: ThreadKind::Engage,
            priority: Priority::High,
            targets: vec![NodeRef::feed("social")],
        },
        SignalKind::Transaction => Classification {
            kind: ThreadKind::LedgerNote,
            priority: Priority::Medium,
            targets: vec![NodeRef::ledger("treasury")],
        },
        SignalKind::Other => default_bucket(),
    }
}

/// Where unrecognized inputs land. Always resolves — classification never
/// raises.
fn default_bucket() -> Classification {
    Classification {
        kind: ThreadKind::Triage,
        priority: Priority::Low,
        targets: vec![NodeRef::channel("ops")],
    }
}

/// Build the pending thread a sticky signal becomes. The thread id derives
/// from the signal id and the catch timestamp.
pub fn thread_for(signal: &Signal) -> Thread {
    let class = classify(signal);
    let id = ThreadId::derive(&signal.id, Utc::now());
    Thread::new(
        id,
        signal.source.clone(),
        class.targets,
        class.kind,
        signal.payload.clone(),
        class.priority,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbweave_core::Payload;

    fn signal(kind: SignalKind, priority: Priority, sticky: bool) -> Signal {
        Signal::new(
            kind,
            NodeRef::new("src", source_kind(kind)),
            Payload::empty(),
            priority,
            sticky,
        )
    }

    #[test]
    fn critical_and_high_always_stick() {
        let prefixes = vec![];
        for kind in [SignalKind::Message, SignalKind::Other, SignalKind::Alert] {
            assert!(should_stick(&signal(kind, Priority::Critical, false), &prefixes));
            assert!(should_stick(&signal(kind, Priority::High, false), &prefixes));
        }
    }

    #[test]
    fn low_sticks_only_when_sticky_or_reentrant() {
        let prefixes = vec!["system".to_string()];
        assert!(!should_stick(&signal(SignalKind::Message, Priority::Low, false), &prefixes));
        assert!(should_stick(&signal(SignalKind::Message, Priority::Low, true), &prefixes));

        let mut reentrant = signal(SignalKind::Message, Priority::Low, false);
        reentrant.thread_id = Some(ThreadId::new("thr-existing"));
        assert!(should_stick(&reentrant, &prefixes));
    }

    #[test]
    fn medium_sticks_on_systemic_prefix_or_verified() {
        let prefixes = vec!["health-check".to_string()];
        let plain = signal(SignalKind::Message, Priority::Medium, false);
        assert!(!should_stick(&plain, &prefixes));

        let mut systemic = plain.clone();
        systemic.source.id = "health-check-7".to_string();
        assert!(should_stick(&systemic, &prefixes));

        let mut verified = plain.clone();
        verified.payload.verified = true;
        assert!(should_stick(&verified, &prefixes));

        let sticky = signal(SignalKind::Message, Priority::Medium, true);
        assert!(should_stick(&sticky, &prefixes));
    }

    #[test]
    fn classify_is_pure() {
        let s = signal(SignalKind::Alert, Priority::Critical, false);
        assert_eq!(classify(&s), classify(&s));
    }

    #[test]
    fn alerts_broadcast_at_critical() {
        let class = classify(&signal(SignalKind::Alert, Priority::Critical, false));
        assert_eq!(class.kind, ThreadKind::StatusBroadcast);
        assert_eq!(class.priority, Priority::Critical);
        assert!(class.targets.len() > 1);
    }

    #[test]
    fn funding_webhooks_fan_out_to_two_targets() {
        let mut s = signal(SignalKind::Webhook, Priority::High, false);
        s.payload = Payload::parse(serde_json::json!({"type": "funding"}));
        let class = classify(&s);
        assert_eq!(class.kind, ThreadKind::WolfWinStory);
        assert_eq!(class.priority, Priority::High);
        assert_eq!(class.targets.len(), 2);
        assert_ne!(class.targets[0], class.targets[1]);
    }

    #[test]
    fn unknown_webhook_events_fall_through_to_triage() {
        let mut s = signal(SignalKind::Webhook, Priority::Medium, false);
        s.payload = Payload::parse(serde_json::json!({"type": "mystery"}));
        let class = classify(&s);
        assert_eq!(class.kind, ThreadKind::Triage);
        assert_eq!(class.priority, Priority::Low);
        assert_eq!(class.targets.len(), 1);
    }

    #[test]
    fn unknown_kind_resolves_to_default_bucket() {
        let class = classify(&signal(SignalKind::Other, Priority::Low, false));
        assert_eq!(class.kind, ThreadKind::Triage);
    }

    #[test]
    fn thread_for_links_shape_and_starts_pending() {
        let s = signal(SignalKind::Mention, Priority::High, false);
        let thread = thread_for(&s);
        assert_eq!(thread.kind, ThreadKind::Engage);
        assert_eq!(thread.status, orbweave_core::ThreadStatus::Pending);
        assert_eq!(thread.source, s.source);
        assert!(!thread.executable);
        assert!(thread.plan.is_none());
    }

    #[test]
    fn ingress_defaults_scale_with_kind() {
        assert_eq!(default_priority(SignalKind::Alert), Priority::Critical);
        assert_eq!(default_priority(SignalKind::Webhook), Priority::High);
        assert_eq!(default_priority(SignalKind::Message), Priority::Medium);
        assert_eq!(default_priority(SignalKind::Other), Priority::Low);
    }
}
