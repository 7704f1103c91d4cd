//! Ant lifecycle and best-path selection
//!
//! An ant is spawned per routed request. If a usable trail already ends at
//! the destination the ant follows it; otherwise it forages. The caller
//! drives the actual traversal and reports hops and the final outcome back
//! here, which feeds the trail store: reinforce on success over a known
//! trail, discover a new trail on success over a novel path, weaken on
//! failure.

use crate::trail::TrailStore;
use chrono::Utc;
use dashmap::DashMap;
use orbweave_core::{Ant, AntStatus, Trail};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub struct PathRouter {
    trails: Arc<TrailStore>,
    /// Ants still foraging. Completed or stuck ants leave this set.
    ants: DashMap<String, Ant>,
}

impl PathRouter {
    pub fn new(trails: Arc<TrailStore>) -> Self {
        Self {
            trails,
            ants: DashMap::new(),
        }
    }

    pub fn trails(&self) -> &TrailStore {
        &self.trails
    }

    /// Strongest usable trail ending at the destination, if any.
    pub fn find_best(&self, destination: &str) -> Option<Trail> {
        self.trails.best_for(destination)
    }

    /// Start routing a request. Consults the trail store; the returned ant
    /// carries the trail it should follow, or none when foraging.
    pub fn spawn(&self, request_id: impl Into<String>, payload: Value, destination: impl Into<String>) -> Ant {
        let destination = destination.into();
        let trail = self.find_best(&destination);
        let ant = Ant {
            id: uuid::Uuid::new_v4().to_string(),
            request_id: request_id.into(),
            payload,
            path: Vec::new(),
            destination,
            status: AntStatus::Foraging,
            started_at: Utc::now(),
            completed_at: None,
            trail_id: trail.as_ref().map(|t| t.id.clone()),
        };
        debug!(
            "ant {} spawned for '{}' ({})",
            ant.id,
            ant.destination,
            if ant.trail_id.is_some() { "following trail" } else { "foraging" }
        );
        self.ants.insert(ant.id.clone(), ant.clone());
        ant
    }

    /// Append a hop to an ant's path. No-op for unknown or finished ants.
    pub fn record_hop(&self, ant_id: &str, hop: impl Into<String>) {
        if let Some(mut ant) = self.ants.get_mut(ant_id) {
            ant.path.push(hop.into());
        }
    }

    /// The ant reached its destination. Reinforces the trail it followed, or
    /// records a new one when the path was novel. Returns the trail the
    /// outcome landed on, and removes the ant from the active set.
    pub fn complete(&self, ant_id: &str, latency_ms: f64) -> Option<Trail> {
        let (_, mut ant) = self.ants.remove(ant_id)?;
        ant.status = AntStatus::Completed;
        ant.completed_at = Some(Utc::now());

        if let Some(trail_id) = &ant.trail_id {
            self.trails.reinforce(trail_id, latency_ms);
            return self.trails.get(trail_id);
        }

        // Novel-path discovery: only a successful traversal that followed no
        // existing trail creates one.
        if ant.path.is_empty() {
            debug!("ant {} completed without hops, nothing to record", ant_id);
            return None;
        }
        Some(self.trails.create(ant.path, latency_ms))
    }

    /// The ant gave up. Weakens the trail it was following (foraging
    /// failures leave no record) and removes it from the active set.
    pub fn fail(&self, ant_id: &str) {
        let Some((_, mut ant)) = self.ants.remove(ant_id) else {
            return;
        };
        ant.status = AntStatus::Stuck;
        ant.completed_at = Some(Utc::now());
        if let Some(trail_id) = &ant.trail_id {
            self.trails.weaken(trail_id);
        }
        debug!("ant {} stuck short of '{}'", ant_id, ant.destination);
    }

    pub fn active_ants(&self) -> Vec<Ant> {
        self.ants.iter().map(|a| a.clone()).collect()
    }

    pub fn active_count(&self) -> usize {
        self.ants.len()
    }
}
