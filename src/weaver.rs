//! The Weaver - one explicit instance owning every store
//!
//! Construct one per process and pass it around; nothing in the system is a
//! module-scoped global. The cycle driver moves work through the pipeline:
//! unprocessed signals are caught into threads, pending threads get
//! templates, executable threads run, trails evaporate, and the bus pumps
//! one tick.

use crate::observe::{CycleContext, ObservedEvent};
use orbweave_bus::{BusEvent, BusHandler, DispatchBus, TickSummary};
use orbweave_core::{
    Error, NodeRef, Payload, Priority, Signal, SignalKind, Thread, ThreadId, ThreadStatus,
    WeaverConfig,
};
use orbweave_engine::{ActionRegistry, ExecutionEngine};
use orbweave_trails::{PathRouter, TrailStore};
use orbweave_web::{classifier, SignalStore, TemplateRegistry, ThreadStore};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Channel collaborators publish to when they want the bus to drive
/// execution instead of calling the engine directly.
pub const EXECUTE_CHANNEL: &str = "threads.execute";

/// Channel the cycle driver publishes thread lifecycle events on.
pub const LIFECYCLE_CHANNEL: &str = "threads.lifecycle";

/// What one cycle did.
#[derive(Clone, Copy, Debug, Default)]
pub struct CycleStatus {
    pub caught: usize,
    pub bounced: usize,
    pub matched: usize,
    pub executed: usize,
    pub completed: usize,
    pub failed: usize,
    pub trails_pruned: usize,
    pub bus: TickSummary,
}

/// Read-only view for an external observability/UI layer. Serializes with
/// the camelCase field names that layer expects.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub thread_count: usize,
    pub pending_count: usize,
    pub in_progress_count: usize,
    pub completed_count: usize,
    pub failed_count: usize,
    pub success_rate: f64,
    pub avg_execution_time: f64,
    pub signal_count: usize,
    pub bounced_count: u64,
    pub active_trail_count: usize,
    pub template_count: usize,
    pub sample_threads: Vec<Thread>,
    pub sample_signals: Vec<Signal>,
}

pub struct Weaver {
    config: WeaverConfig,
    signals: Arc<SignalStore>,
    threads: Arc<ThreadStore>,
    templates: Arc<TemplateRegistry>,
    engine: Arc<ExecutionEngine>,
    bus: Arc<DispatchBus>,
    trails: Arc<TrailStore>,
    router: PathRouter,
    bounced: AtomicU64,
}

impl Weaver {
    pub fn new(config: WeaverConfig) -> Self {
        Self::with_registry(config, ActionRegistry::new())
    }

    /// Build a weaver around a caller-supplied action registry. The engine
    /// is also subscribed on [`EXECUTE_CHANNEL`] so bus events can trigger
    /// execution.
    pub fn with_registry(config: WeaverConfig, actions: ActionRegistry) -> Self {
        let signals = Arc::new(SignalStore::new(config.signals.history_window));
        let threads = Arc::new(ThreadStore::new());
        let templates = Arc::new(TemplateRegistry::new());
        let engine = Arc::new(ExecutionEngine::new(threads.clone(), Arc::new(actions)));
        let bus = Arc::new(DispatchBus::new(config.bus.clone()));
        let trails = Arc::new(TrailStore::new(config.trails.clone()));
        let router = PathRouter::new(trails.clone());

        bus.subscribe(
            EXECUTE_CHANNEL,
            Arc::new(ExecutionTrigger {
                engine: engine.clone(),
            }),
        );

        Self {
            config,
            signals,
            threads,
            templates,
            engine,
            bus,
            trails,
            router,
            bounced: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &WeaverConfig {
        &self.config
    }

    pub fn signals(&self) -> &SignalStore {
        &self.signals
    }

    pub fn threads(&self) -> &ThreadStore {
        &self.threads
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    pub fn bus(&self) -> &Arc<DispatchBus> {
        &self.bus
    }

    pub fn trails(&self) -> &TrailStore {
        &self.trails
    }

    pub fn router(&self) -> &PathRouter {
        &self.router
    }

    /// Ingress. The raw payload is validated into the typed [`Payload`]
    /// here; priority defaults from the signal kind when the caller passes
    /// none, and signals are never sticky unless asked.
    pub fn submit_signal(
        &self,
        kind: SignalKind,
        source: &str,
        raw_payload: Value,
        priority: Option<Priority>,
        sticky: Option<bool>,
    ) -> Signal {
        let payload = Payload::parse(raw_payload);
        let priority = priority.unwrap_or_else(|| classifier::default_priority(kind));
        let source = NodeRef::new(source, classifier::source_kind(kind));
        let signal = Signal::new(kind, source, payload, priority, sticky.unwrap_or(false));
        info!(
            "signal {} submitted: {:?} from '{}' at {}",
            signal.id, signal.kind, signal.source.id, signal.priority
        );
        self.signals.insert(signal.clone());
        signal
    }

    /// Stickiness gate and conversion. A bounce leaves the signal
    /// unprocessed and returns `None`; a stick persists the thread, links
    /// the signal to it, and marks the signal processed.
    pub fn catch(&self, signal_id: &str) -> Option<Thread> {
        let signal = self.signals.get(signal_id)?;
        if signal.processed {
            return None;
        }
        if !classifier::should_stick(&signal, &self.config.signals.systemic_prefixes) {
            self.bounced.fetch_add(1, Ordering::Relaxed);
            debug!("signal {} bounced ({:?} {})", signal.id, signal.kind, signal.priority);
            return None;
        }
        let thread = classifier::thread_for(&signal);
        self.threads.insert(thread.clone());
        self.signals.mark_processed(&signal.id, thread.id.clone());
        info!(
            "signal {} stuck: thread {} ({}, {})",
            signal.id, thread.id, thread.kind, thread.priority
        );
        Some(thread)
    }

    /// Drive one full cycle. Every collaborator on the context is optional;
    /// the cycle never depends on a sink being real.
    pub async fn run_cycle(&self, ctx: &CycleContext) -> CycleStatus {
        let mut status = CycleStatus::default();

        // 1. Catch unprocessed signals.
        for signal in self.signals.unprocessed() {
            match self.catch(&signal.id) {
                Some(thread) => {
                    status.caught += 1;
                    ctx.remember(ObservedEvent::SignalCaught {
                        signal_id: signal.id.clone(),
                        thread_id: thread.id.clone(),
                    });
                    self.bus
                        .publish(
                            LIFECYCLE_CHANNEL,
                            json!({"threadId": thread.id.as_str(), "phase": "caught"}),
                            thread.priority,
                        )
                        .await;
                }
                None => {
                    status.bounced += 1;
                    ctx.remember(ObservedEvent::SignalBounced {
                        signal_id: signal.id.clone(),
                    });
                }
            }
        }

        // 2. Attach templates to pending threads that lack a plan.
        self.templates.ensure_defaults();
        for thread in self.threads.by_status(ThreadStatus::Pending) {
            if thread.executable {
                continue;
            }
            let Some(template) = self.templates.find(&thread) else {
                continue;
            };
            match self.templates.apply(&self.threads, &thread.id, &template) {
                Ok(_) => {
                    status.matched += 1;
                    ctx.remember(ObservedEvent::TemplateApplied {
                        thread_id: thread.id.clone(),
                        template: template.name.clone(),
                    });
                }
                Err(e) => warn!("template apply failed for {}: {}", thread.id, e),
            }
        }

        // 3. Execute, most urgent priority first.
        for priority in Priority::ALL {
            for thread in self.threads.by_priority(priority) {
                if !ExecutionEngine::can_execute(&thread) {
                    continue;
                }
                match self.engine.execute(&thread.id).await {
                    Ok(report) => {
                        if let Some(template_id) = &thread.template_id {
                            self.templates.record_outcome(template_id, report.success);
                        }
                        status.executed += 1;
                        if report.success {
                            status.completed += 1;
                        } else {
                            status.failed += 1;
                        }
                        ctx.remember(ObservedEvent::ThreadExecuted {
                            thread_id: thread.id.clone(),
                            success: report.success,
                        });
                        self.bus
                            .publish(
                                LIFECYCLE_CHANNEL,
                                json!({
                                    "threadId": thread.id.as_str(),
                                    "phase": if report.success { "completed" } else { "failed" },
                                }),
                                thread.priority,
                            )
                            .await;
                    }
                    Err(e) => warn!("execution of {} failed to start: {}", thread.id, e),
                }
            }
        }

        // 4. Evaporate trails.
        status.trails_pruned = self.trails.evaporate();
        if status.trails_pruned > 0 {
            ctx.remember(ObservedEvent::TrailsEvaporated {
                pruned: status.trails_pruned,
            });
        }

        // 5. Pump the bus once.
        status.bus = self.bus.tick().await;

        debug!(
            "cycle: {} caught, {} bounced, {} matched, {} executed ({} ok / {} failed)",
            status.caught, status.bounced, status.matched, status.executed, status.completed,
            status.failed
        );
        status
    }

    /// Read-only status snapshot.
    pub fn status(&self) -> StatusSnapshot {
        let sample = self.config.cycle.sample_size;
        StatusSnapshot {
            thread_count: self.threads.len(),
            pending_count: self.threads.count_by_status(ThreadStatus::Pending),
            in_progress_count: self.threads.count_by_status(ThreadStatus::InProgress),
            completed_count: self.threads.count_by_status(ThreadStatus::Completed),
            failed_count: self.threads.count_by_status(ThreadStatus::Failed),
            success_rate: self.engine.success_rate(),
            avg_execution_time: self.engine.avg_execution_ms(),
            signal_count: self.signals.len(),
            bounced_count: self.bounced.load(Ordering::Relaxed),
            active_trail_count: self.trails.active().len(),
            template_count: self.templates.len(),
            sample_threads: self.threads.sample(sample),
            sample_signals: self.signals.sample(sample),
        }
    }
}

/// Bus handler that runs the thread named in the event payload. Subscribe
/// it on [`EXECUTE_CHANNEL`] to let collaborators trigger execution by
/// publishing instead of holding an engine reference.
pub struct ExecutionTrigger {
    engine: Arc<ExecutionEngine>,
}

impl ExecutionTrigger {
    pub fn new(engine: Arc<ExecutionEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait::async_trait]
impl BusHandler for ExecutionTrigger {
    fn name(&self) -> &str {
        "execution-trigger"
    }

    async fn handle(&self, event: &BusEvent) -> orbweave_core::Result<()> {
        let Some(thread_id) = event.payload.get("threadId").and_then(Value::as_str) else {
            debug!("execution trigger event {} without threadId, ignoring", event.id);
            return Ok(());
        };
        match self.engine.execute(&ThreadId::new(thread_id)).await {
            Ok(report) => {
                debug!(
                    "bus-triggered execution of {}: {}",
                    thread_id,
                    if report.success { "completed" } else { "failed" }
                );
                Ok(())
            }
            // A thread that already ran is fine here: at-most-once execution
            // wins over the trigger.
            Err(Error::NotExecutable { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
