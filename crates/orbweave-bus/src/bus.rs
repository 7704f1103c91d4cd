//! Priority dispatch bus
//!
//! Four FIFO priority lanes plus a high-throughput batch lane, drained on a
//! fixed tick. Per tick: the batch lane drains fully in fixed-size
//! concurrent chunks, critical drains completely (no cap — producers are
//! trusted to keep critical volume low, and a sustained critical flood WILL
//! starve lower tiers), then high/normal/low drain up to strictly
//! decreasing caps so no tier is fully starved.
//!
//! A middleware chain runs per event before delivery and may halt it.
//! Delivery is per-channel, at-most-once per registered handler per event;
//! a handler error is logged and isolated from sibling handlers.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use orbweave_core::{BusConfig, Priority, Result};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Dispatch tier. `Batch` bypasses per-tier fairness caps entirely.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lane {
    Critical,
    High,
    Normal,
    Low,
    Batch,
}

impl From<Priority> for Lane {
    fn from(priority: Priority) -> Self {
        match priority {
            Priority::Critical => Lane::Critical,
            Priority::High => Lane::High,
            Priority::Medium => Lane::Normal,
            Priority::Low => Lane::Low,
        }
    }
}

/// An event in flight on the bus.
#[derive(Clone, Debug)]
pub struct BusEvent {
    pub id: String,
    pub channel: String,
    pub payload: Value,
    pub lane: Lane,
    pub enqueued_at: DateTime<Utc>,
}

impl BusEvent {
    pub fn new(channel: impl Into<String>, payload: Value, lane: Lane) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            channel: channel.into(),
            payload,
            lane,
            enqueued_at: Utc::now(),
        }
    }
}

/// A delivery target, registered per channel.
#[async_trait::async_trait]
pub trait BusHandler: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(&self, event: &BusEvent) -> Result<()>;
}

/// Middleware decision. `Halt` short-circuits: the event is dropped before
/// any handler sees it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Halt,
}

/// Runs per event before delivery; may rewrite the event or halt it.
#[async_trait::async_trait]
pub trait Middleware: Send + Sync {
    async fn intercept(&self, event: &mut BusEvent) -> Verdict;
}

/// What one tick did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Events that reached their handlers.
    pub delivered: usize,
    /// Events halted by middleware.
    pub halted: usize,
    /// Handler invocations that returned an error.
    pub handler_errors: usize,
}

#[derive(Default)]
struct LaneQueues {
    critical: VecDeque<BusEvent>,
    high: VecDeque<BusEvent>,
    normal: VecDeque<BusEvent>,
    low: VecDeque<BusEvent>,
    batch: VecDeque<BusEvent>,
}

impl LaneQueues {
    fn queue_mut(&mut self, lane: Lane) -> &mut VecDeque<BusEvent> {
        match lane {
            Lane::Critical => &mut self.critical,
            Lane::High => &mut self.high,
            Lane::Normal => &mut self.normal,
            Lane::Low => &mut self.low,
            Lane::Batch => &mut self.batch,
        }
    }

    /// Pop up to `cap` events. `None` means drain everything.
    fn drain(&mut self, lane: Lane, cap: Option<usize>) -> Vec<BusEvent> {
        let queue = self.queue_mut(lane);
        let take = cap.unwrap_or(queue.len()).min(queue.len());
        queue.drain(..take).collect()
    }
}

pub struct DispatchBus {
    queues: Mutex<LaneQueues>,
    handlers: DashMap<String, Vec<Arc<dyn BusHandler>>>,
    middleware: RwLock<Vec<Arc<dyn Middleware>>>,
    config: BusConfig,
}

impl DispatchBus {
    pub fn new(config: BusConfig) -> Self {
        Self {
            queues: Mutex::new(LaneQueues::default()),
            handlers: DashMap::new(),
            middleware: RwLock::new(Vec::new()),
            config,
        }
    }

    /// Register a handler on a channel. One event is delivered at most once
    /// to each handler registered here.
    pub fn subscribe(&self, channel: impl Into<String>, handler: Arc<dyn BusHandler>) {
        self.handlers.entry(channel.into()).or_default().push(handler);
    }

    /// Append to the middleware chain. Middleware runs in registration order.
    pub fn add_middleware(&self, middleware: Arc<dyn Middleware>) {
        self.middleware
            .write()
            .expect("middleware chain lock")
            .push(middleware);
    }

    /// Enqueue on the lane matching the given priority.
    pub async fn publish(&self, channel: impl Into<String>, payload: Value, priority: Priority) {
        self.enqueue(BusEvent::new(channel, payload, Lane::from(priority)))
            .await;
    }

    /// Enqueue on the batch lane, bypassing tier fairness.
    pub async fn publish_batch(&self, channel: impl Into<String>, payload: Value) {
        self.enqueue(BusEvent::new(channel, payload, Lane::Batch)).await;
    }

    pub async fn enqueue(&self, event: BusEvent) {
        let mut queues = self.queues.lock().await;
        queues.queue_mut(event.lane).push_back(event);
    }

    pub async fn depth(&self, lane: Lane) -> usize {
        let mut queues = self.queues.lock().await;
        queues.queue_mut(lane).len()
    }

    /// Drain the lanes once. Batch first (fully, in concurrent chunks), then
    /// critical (fully), then high/normal/low up to their caps.
    pub async fn tick(&self) -> TickSummary {
        let (batch, critical, high, normal, low) = {
            let mut queues = self.queues.lock().await;
            (
                queues.drain(Lane::Batch, None),
                queues.drain(Lane::Critical, None),
                queues.drain(Lane::High, Some(self.config.high_cap)),
                queues.drain(Lane::Normal, Some(self.config.normal_cap)),
                queues.drain(Lane::Low, Some(self.config.low_cap)),
            )
        };

        let mut summary = TickSummary::default();

        for chunk in batch.chunks(self.config.batch_size.max(1)) {
            let deliveries =
                futures::future::join_all(chunk.iter().map(|event| self.deliver(event.clone())))
                    .await;
            for delivery in deliveries {
                summary.absorb(delivery);
            }
        }

        for event in critical.into_iter().chain(high).chain(normal).chain(low) {
            let delivery = self.deliver(event).await;
            summary.absorb(delivery);
        }

        if summary.delivered > 0 || summary.halted > 0 {
            debug!(
                "tick: {} delivered, {} halted, {} handler errors",
                summary.delivered, summary.halted, summary.handler_errors
            );
        }
        summary
    }

    /// Fixed-tick pump. Runs until the token is cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_millis(self.config.tick_ms.max(1)));
        info!("dispatch bus started ({}ms tick)", self.config.tick_ms);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("dispatch bus stopping");
                    break;
                }
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    async fn deliver(&self, mut event: BusEvent) -> TickSummary {
        let chain: Vec<Arc<dyn Middleware>> = self
            .middleware
            .read()
            .expect("middleware chain lock")
            .clone();
        for middleware in chain {
            if middleware.intercept(&mut event).await == Verdict::Halt {
                debug!("event {} halted by middleware", event.id);
                return TickSummary {
                    delivered: 0,
                    halted: 1,
                    handler_errors: 0,
                };
            }
        }

        let targets: Vec<Arc<dyn BusHandler>> = self
            .handlers
            .get(&event.channel)
            .map(|h| h.clone())
            .unwrap_or_default();

        let mut handler_errors = 0;
        for handler in targets {
            if let Err(e) = handler.handle(&event).await {
                warn!(
                    "handler '{}' failed on channel '{}': {}",
                    handler.name(),
                    event.channel,
                    e
                );
                handler_errors += 1;
            }
        }

        TickSummary {
            delivered: 1,
            halted: 0,
            handler_errors,
        }
    }
}

impl TickSummary {
    fn absorb(&mut self, other: TickSummary) {
        self.delivered += other.delivered;
        self.halted += other.halted;
        self.handler_errors += other.handler_errors;
    }
}
