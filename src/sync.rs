//! Driver-side collection events recorded before the store confirmed them.
//!
//! A device keeps scanning bins while offline; each scan is queued here and
//! later replayed through the [`LifecycleController`]. Replaying is
//! idempotent: an event the store already holds is simply dropped.

use std::collections::VecDeque;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::PlannerError;
use crate::lifecycle::LifecycleController;
use crate::model::{BinRef, RouteId, ScheduleId};
use crate::traits::Store;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCollection {
    pub bin: BinRef,
    pub schedule_id: ScheduleId,
    pub route_id: Option<RouteId>,
    pub observed_at: Timestamp,
}

#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Entries that changed the store in this run, including replays that
    /// finished a route an earlier attempt left incomplete.
    pub applied: usize,
    /// Entries the store already had.
    pub already_synced: usize,
    /// Entries the store can never accept, with the reason.
    pub rejected: Vec<(PendingCollection, String)>,
    /// Entries kept for the next run after a store failure.
    pub retained: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PendingSyncQueue {
    entries: VecDeque<PendingCollection>,
}

impl PendingSyncQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a scan. Returns `false` when the same bin is already queued
    /// for the same schedule.
    pub fn enqueue(&mut self, entry: PendingCollection) -> bool {
        let duplicate = self
            .entries
            .iter()
            .any(|queued| queued.bin == entry.bin && queued.schedule_id == entry.schedule_id);
        if duplicate {
            return false;
        }
        self.entries.push_back(entry);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when the bin has a collection waiting to be synced; lets a UI
    /// show it as collected before the store confirms.
    pub fn is_pending(&self, bin: &BinRef, schedule_id: ScheduleId) -> bool {
        self.entries
            .iter()
            .any(|entry| &entry.bin == bin && entry.schedule_id == schedule_id)
    }

    /// Replays queued scans in order.
    pub fn reconcile<S: Store + ?Sized>(
        &mut self,
        controller: &LifecycleController<'_, S>,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let mut kept = VecDeque::new();

        while let Some(entry) = self.entries.pop_front() {
            let result = controller.mark_bin_collected_at(
                &entry.bin,
                entry.schedule_id,
                entry.route_id,
                entry.observed_at,
            );
            match result {
                Ok(outcome)
                    if outcome.already_collected
                        && !outcome.route_completed
                        && !outcome.schedule_completed =>
                {
                    report.already_synced += 1
                }
                Ok(_) => report.applied += 1,
                Err(err @ (PlannerError::NotFound(_) | PlannerError::InvalidInput(_))) => {
                    warn!(bin = %entry.bin, schedule_id = %entry.schedule_id, error = %err, "dropping unsyncable collection");
                    report.rejected.push((entry, err.to_string()));
                }
                Err(err) => {
                    debug!(bin = %entry.bin, error = %err, "collection sync deferred");
                    kept.push_back(entry);
                }
            }
        }

        report.retained = kept.len();
        self.entries = kept;
        report
    }
}
