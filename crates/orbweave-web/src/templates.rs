//! Template registry and matcher
//!
//! Templates are long-lived, shared read-only execution plans matched
//! against thread shape. Applying one always hands the thread its own deep
//! copy of the plan — a thread never holds a reference into the registry.

use crate::store::ThreadStore;
use dashmap::DashMap;
use orbweave_core::{
    ExecutionPlan, NodeKind, NodeRef, PlanStep, Priority, Result, Template, Thread, ThreadId,
    ThreadKind,
};
use std::sync::Mutex;
use tracing::{debug, info};

/// EMA weight for template success-rate samples.
const OUTCOME_EMA_WEIGHT: f64 = 0.1;

pub struct TemplateRegistry {
    templates: DashMap<String, Template>,
    /// Registration order. Matching walks this so the first registered
    /// template wins among equally valid matches.
    order: Mutex<Vec<String>>,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self {
            templates: DashMap::new(),
            order: Mutex::new(Vec::new()),
        }
    }

    /// Register a template. Returns its id.
    pub fn register(&self, template: Template) -> String {
        let id = template.id.clone();
        self.order.lock().expect("template order lock").push(id.clone());
        self.templates.insert(id.clone(), template);
        id
    }

    pub fn get(&self, id: &str) -> Option<Template> {
        self.templates.get(id).map(|t| t.clone())
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Seed the canonical templates. Idempotent: does nothing once any
    /// template is registered.
    pub fn ensure_defaults(&self) {
        if !self.is_empty() {
            return;
        }
        for template in default_templates() {
            self.register(template);
        }
        info!("seeded {} default templates", self.len());
    }

    /// Find the template matching a thread: same kind, same source kind, and
    /// at least one target kind in common.
    ///
    /// Multiple matches resolve by registration order — first registered
    /// wins. There is no scoring among equally valid matches; a known
    /// limitation of the matching design.
    pub fn find(&self, thread: &Thread) -> Option<Template> {
        let order = self.order.lock().expect("template order lock");
        for id in order.iter() {
            let Some(template) = self.templates.get(id) else {
                continue;
            };
            if template.kind != thread.kind {
                continue;
            }
            if template.source_pattern != thread.source.kind {
                continue;
            }
            let overlaps = template
                .target_patterns
                .iter()
                .any(|pattern| thread.targets.iter().any(|t| t.kind == *pattern));
            if overlaps {
                return Some(template.clone());
            }
        }
        None
    }

    /// Attach a template to a thread: deep-copies the plan, marks the thread
    /// executable, and overrides the classifier-assigned priority with the
    /// template's priority. The override is deliberate — templates encode the
    /// authoritative urgency for the work they describe.
    pub fn apply(
        &self,
        store: &ThreadStore,
        thread_id: &ThreadId,
        template: &Template,
    ) -> Result<Thread> {
        let plan = instantiate(&template.plan);
        let updated = store.attach_plan(
            thread_id,
            plan,
            template.id.clone(),
            template.priority,
        )?;
        debug!(
            "applied template '{}' to thread {} ({} steps)",
            template.name,
            thread_id,
            updated.plan.as_ref().map(|p| p.steps.len()).unwrap_or(0)
        );
        Ok(updated)
    }

    /// Record an execution outcome for a template: bumps usage and moves the
    /// success-rate EMA toward the observed result.
    pub fn record_outcome(&self, template_id: &str, success: bool) {
        if let Some(mut template) = self.templates.get_mut(template_id) {
            template.usage_count += 1;
            let sample = if success { 1.0 } else { 0.0 };
            template.success_rate =
                template.success_rate * (1.0 - OUTCOME_EMA_WEIGHT) + sample * OUTCOME_EMA_WEIGHT;
        }
    }
}

/// Fresh step ids per application so step results stay distinct per thread.
/// Everything else copies over verbatim.
fn instantiate(plan: &ExecutionPlan) -> ExecutionPlan {
    ExecutionPlan::new(
        plan.steps
            .iter()
            .map(|step| PlanStep {
                id: uuid::Uuid::new_v4().to_string(),
                ..step.clone()
            })
            .collect(),
    )
}

/// The canonical template set.
fn default_templates() -> Vec<Template> {
    vec![
        Template::new(
            "win-story-fanout",
            ThreadKind::WolfWinStory,
            NodeKind::Service,
            vec![NodeKind::Channel, NodeKind::Feed],
            ExecutionPlan::new(vec![
                PlanStep::new(
                    "post",
                    NodeRef::feed("stories"),
                    serde_json::json!({"format": "story"}),
                    1,
                ),
                PlanStep::new(
                    "post",
                    NodeRef::channel("announcements"),
                    serde_json::json!({"format": "announcement"}),
                    2,
                ),
                PlanStep::new("record", NodeRef::ledger("treasury"), serde_json::json!({}), 3),
            ]),
            Priority::High,
        ),
        Template::new(
            "status-broadcast",
            ThreadKind::StatusBroadcast,
            NodeKind::Service,
            vec![NodeKind::Channel, NodeKind::Feed, NodeKind::Service],
            ExecutionPlan::new(vec![
                PlanStep::new(
                    "post",
                    NodeRef::channel("ops"),
                    serde_json::json!({"format": "status"}),
                    1,
                ),
                PlanStep::new(
                    "post",
                    NodeRef::feed("status"),
                    serde_json::json!({"format": "status"}),
                    2,
                ),
                PlanStep::new("page", NodeRef::service("pager"), serde_json::json!({}), 3),
            ]),
            Priority::Critical,
        ),
        Template::new(
            "governance-brief",
            ThreadKind::GovernanceBrief,
            NodeKind::Service,
            vec![NodeKind::Channel],
            ExecutionPlan::new(vec![PlanStep::new(
                "post",
                NodeRef::channel("governance"),
                serde_json::json!({"format": "brief"}),
                1,
            )]),
            Priority::Medium,
        ),
        Template::new(
            "reply",
            ThreadKind::Reply,
            NodeKind::Channel,
            vec![NodeKind::Channel],
            ExecutionPlan::new(vec![PlanStep::new(
                "post",
                NodeRef::channel("origin"),
                serde_json::json!({"format": "reply"}),
                1,
            )]),
            Priority::Medium,
        ),
        Template::new(
            "engage-mention",
            ThreadKind::Engage,
            NodeKind::Feed,
            vec![NodeKind::Feed],
            ExecutionPlan::new(vec![PlanStep::new(
                "post",
                NodeRef::feed("social"),
                serde_json::json!({"format": "engagement"}),
                1,
            )]),
            Priority::High,
        ),
        Template::new(
            "ledger-note",
            ThreadKind::LedgerNote,
            NodeKind::Ledger,
            vec![NodeKind::Ledger],
            ExecutionPlan::new(vec![PlanStep::new(
                "record",
                NodeRef::ledger("treasury"),
                serde_json::json!({}),
                1,
            )]),
            Priority::Medium,
        ),
    ]
}
