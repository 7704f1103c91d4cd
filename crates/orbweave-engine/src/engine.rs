//! Thread execution
//!
//! Steps run strictly in ascending order, one at a time — a step must fully
//! resolve before the next begins, so side-effect ordering inside a thread
//! holds (post first, then update the record). The first failing step skips
//! the rest and fails the thread; partial results are retained. Failed
//! threads are terminal — recovery is a fresh signal producing a fresh
//! thread, never a retry here.

use crate::action::ActionRegistry;
use orbweave_core::{Error, Result, Thread, ThreadId, ThreadStatus};
use orbweave_web::ThreadStore;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Outcome of one plan step.
#[derive(Clone, Debug, Serialize)]
pub struct StepResult {
    pub step_id: String,
    pub action: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of one thread execution.
#[derive(Clone, Debug, Serialize)]
pub struct ExecutionReport {
    pub thread_id: ThreadId,
    pub success: bool,
    /// One entry per step that ran. Steps after the first failure never ran
    /// and have no entry.
    pub results: Vec<StepResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Runs executable threads to a terminal state.
pub struct ExecutionEngine {
    store: Arc<ThreadStore>,
    actions: Arc<ActionRegistry>,
    executions: AtomicU64,
    successes: AtomicU64,
    total_duration_ms: AtomicU64,
}

impl ExecutionEngine {
    pub fn new(store: Arc<ThreadStore>, actions: Arc<ActionRegistry>) -> Self {
        Self {
            store,
            actions,
            executions: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            total_duration_ms: AtomicU64::new(0),
        }
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    /// True iff the thread is executable, still pending, and has a plan.
    pub fn can_execute(thread: &Thread) -> bool {
        thread.executable && thread.status == ThreadStatus::Pending && thread.plan.is_some()
    }

    /// Execute a thread's plan. Terminal or otherwise non-executable threads
    /// return a typed error and the store is left untouched.
    pub async fn execute(&self, id: &ThreadId) -> Result<ExecutionReport> {
        let thread = self
            .store
            .get(id)
            .ok_or_else(|| Error::ThreadNotFound(id.clone()))?;

        if !thread.executable || thread.status != ThreadStatus::Pending {
            return Err(Error::not_executable(id.clone(), thread.status));
        }
        let plan = thread.plan.as_ref().ok_or_else(|| Error::PlanMissing(id.clone()))?;

        self.store.advance_status(id, ThreadStatus::InProgress)?;
        let started = Instant::now();
        let mut results = Vec::new();
        let mut failure: Option<String> = None;

        for step in plan.ordered_steps() {
            match self.actions.run(&step.action, &step.params, &step.target).await {
                Ok(output) => {
                    debug!("thread {} step '{}' ok", id, step.action);
                    results.push(StepResult {
                        step_id: step.id,
                        action: step.action,
                        success: true,
                        output: Some(output),
                        error: None,
                    });
                }
                Err(e) => {
                    warn!("thread {} step '{}' failed: {}", id, step.action, e);
                    let message = e.to_string();
                    results.push(StepResult {
                        step_id: step.id,
                        action: step.action,
                        success: false,
                        output: None,
                        error: Some(message.clone()),
                    });
                    failure = Some(message);
                    break;
                }
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        let success = failure.is_none();
        let terminal = if success {
            ThreadStatus::Completed
        } else {
            ThreadStatus::Failed
        };
        self.store.advance_status(id, terminal)?;

        self.executions.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        }
        self.total_duration_ms.fetch_add(duration_ms, Ordering::Relaxed);

        Ok(ExecutionReport {
            thread_id: id.clone(),
            success,
            results,
            error: failure,
            duration_ms,
        })
    }

    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    /// Fraction of executions that completed, 1.0 when none ran yet.
    pub fn success_rate(&self) -> f64 {
        let total = self.executions.load(Ordering::Relaxed);
        if total == 0 {
            return 1.0;
        }
        self.successes.load(Ordering::Relaxed) as f64 / total as f64
    }

    /// Mean wall-clock duration per execution in milliseconds.
    pub fn avg_execution_ms(&self) -> f64 {
        let total = self.executions.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        self.total_duration_ms.load(Ordering::Relaxed) as f64 / total as f64
    }
}
