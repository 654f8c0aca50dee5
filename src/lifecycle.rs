//! Route and schedule status transitions driven by operators and by
//! collection events from the field.
//!
//! Route: `pending --start--> in_progress --complete--> completed`. A route
//! whose assignments are all collected completes on its own, and a schedule
//! completes once every one of its routes has.
//!
//! Events touching the same route are serialized by a per-route lock, so the
//! "all collected" check and the completion it triggers happen exactly once.
//! Locks are always taken route first, then schedule.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use jiff::Timestamp;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::{PlannerError, Result};
use crate::model::{
    Assignment, AssignmentStatus, BinRef, Route, RouteId, RouteStatus, Schedule, ScheduleId,
    ScheduleStatus,
};
use crate::traits::Store;

/// One mutex per key, created on first use.
///
/// Entries nobody else holds a handle to are dropped on the next lookup, so
/// the map only grows with the number of keys in use at once.
struct KeyedLocks<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K: Eq + Hash + Copy> KeyedLocks<K> {
    fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, key: K) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        // Handles are only cloned under the map lock, so a count of 1 means idle.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(key).or_default().clone()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionOutcome {
    pub assignment: Assignment,
    /// The assignment was already collected; nothing was changed.
    pub already_collected: bool,
    /// This event completed the route.
    pub route_completed: bool,
    /// This event completed the schedule.
    pub schedule_completed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteCompletion {
    pub route: Route,
    pub schedule_completed: bool,
}

pub struct LifecycleController<'a, S: Store + ?Sized> {
    store: &'a S,
    route_locks: KeyedLocks<RouteId>,
    schedule_locks: KeyedLocks<ScheduleId>,
}

impl<'a, S: Store + ?Sized> LifecycleController<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            route_locks: KeyedLocks::new(),
            schedule_locks: KeyedLocks::new(),
        }
    }

    /// `pending -> in_progress`. Also moves a pending schedule to in_progress.
    pub fn start_route(&self, route_id: RouteId) -> Result<Route> {
        let lock = self.route_locks.lock_for(route_id);
        let _guard = lock.lock();

        let mut route = self.load_route(route_id)?;
        if route.status != RouteStatus::Pending {
            return Err(route_transition_error(&route, "start"));
        }

        let now = Timestamp::now();
        self.store
            .update_route_status(route_id, RouteStatus::InProgress, now)?;
        route.status = RouteStatus::InProgress;
        route.started_at = Some(now);
        info!(%route_id, schedule_id = %route.schedule_id, "route started");

        self.mark_schedule_started(route.schedule_id, now)?;
        Ok(route)
    }

    /// `in_progress -> completed`, followed by the schedule completion check.
    pub fn complete_route(&self, route_id: RouteId) -> Result<RouteCompletion> {
        let lock = self.route_locks.lock_for(route_id);
        let _guard = lock.lock();

        let mut route = self.load_route(route_id)?;
        if route.status != RouteStatus::InProgress {
            return Err(route_transition_error(&route, "complete"));
        }

        let now = Timestamp::now();
        self.store
            .update_route_status(route_id, RouteStatus::Completed, now)?;
        route.status = RouteStatus::Completed;
        route.completed_at = Some(now);
        info!(%route_id, schedule_id = %route.schedule_id, "route completed");

        let schedule_completed = self.complete_schedule_if_done(route.schedule_id, now)?;
        Ok(RouteCompletion {
            route,
            schedule_completed,
        })
    }

    pub fn mark_bin_collected(
        &self,
        bin: &BinRef,
        schedule_id: ScheduleId,
        route_id: Option<RouteId>,
    ) -> Result<CollectionOutcome> {
        self.mark_bin_collected_at(bin, schedule_id, route_id, Timestamp::now())
    }

    /// Records a collection observed at `at`.
    ///
    /// Fails with `NotFound` without touching the store when the bin, the
    /// schedule or a matching assignment does not exist. Collecting an
    /// already-collected bin writes nothing new but still finishes a route
    /// left incomplete by an earlier failed attempt.
    pub fn mark_bin_collected_at(
        &self,
        bin: &BinRef,
        schedule_id: ScheduleId,
        route_id: Option<RouteId>,
        at: Timestamp,
    ) -> Result<CollectionOutcome> {
        let not_found = |what: &str| {
            let route = route_id.map(|id| format!(" route {}", id)).unwrap_or_default();
            PlannerError::NotFound(format!(
                "{} for {}{} in schedule {}",
                what, bin, route, schedule_id
            ))
        };

        let bin_record = self
            .store
            .list_bins()?
            .into_iter()
            .find(|candidate| bin.matches(candidate))
            .ok_or_else(|| not_found("no bin"))?;
        let schedule = self
            .store
            .get_schedule(schedule_id)?
            .ok_or_else(|| not_found("no schedule"))?;
        let assignment = self
            .store
            .list_assignments(schedule.date)?
            .into_iter()
            .find(|a| a.schedule_id == schedule_id && a.bin_id == bin_record.id)
            .ok_or_else(|| not_found("no assignment"))?;
        if route_id.is_some_and(|id| id != assignment.route_id) {
            return Err(not_found("no assignment"));
        }

        let lock = self.route_locks.lock_for(assignment.route_id);
        let _guard = lock.lock();

        // Re-read under the lock; earlier reads may predate a concurrent event.
        let route_assignments = self.store.list_route_assignments(assignment.route_id)?;
        let mut assignment = route_assignments
            .iter()
            .find(|a| a.id == assignment.id)
            .cloned()
            .ok_or_else(|| not_found("no assignment"))?;

        let already_collected = assignment.is_collected();
        if already_collected {
            debug!(assignment_id = %assignment.id, "bin already collected");
        } else {
            self.store.update_assignment_collected(assignment.id, at)?;
            assignment.status = AssignmentStatus::Collected;
            assignment.collected_at = Some(at);
            info!(
                assignment_id = %assignment.id,
                bin_id = %assignment.bin_id,
                route_id = %assignment.route_id,
                "bin collected"
            );
        }

        // Repeats still run the completion checks: an earlier attempt may have
        // written the collection and failed before completing the route.
        let all_collected = route_assignments
            .iter()
            .all(|a| a.id == assignment.id || a.is_collected());
        let (route_completed, schedule_completed) = if all_collected {
            self.finish_collected_route(assignment.route_id, at)?
        } else {
            (false, false)
        };

        Ok(CollectionOutcome {
            assignment,
            already_collected,
            route_completed,
            schedule_completed,
        })
    }

    /// Completes a route whose bins are all collected, then its schedule if
    /// that was the last route. Caller holds the route lock.
    fn finish_collected_route(&self, route_id: RouteId, at: Timestamp) -> Result<(bool, bool)> {
        let route = self.load_route(route_id)?;
        let mut route_completed = false;
        if route.status != RouteStatus::Completed {
            self.store
                .update_route_status(route.id, RouteStatus::Completed, at)?;
            route_completed = true;
            info!(route_id = %route.id, "every bin collected, route completed");
        }
        let schedule_completed = self.complete_schedule_if_done(route.schedule_id, at)?;
        Ok((route_completed, schedule_completed))
    }

    /// Manual override: completes every unfinished route of the schedule,
    /// then the schedule itself.
    pub fn complete_schedule(&self, schedule_id: ScheduleId) -> Result<Schedule> {
        let schedule = self.load_schedule(schedule_id)?;
        if schedule.status == ScheduleStatus::Completed {
            return Err(PlannerError::InvalidTransition {
                entity: "schedule",
                id: schedule_id.0,
                from: schedule.status.to_string(),
                event: "complete",
            });
        }

        let now = Timestamp::now();
        for route in self.store.list_routes(schedule_id)? {
            let lock = self.route_locks.lock_for(route.id);
            let _guard = lock.lock();
            let current = self.load_route(route.id)?;
            if current.status != RouteStatus::Completed {
                self.store
                    .update_route_status(route.id, RouteStatus::Completed, now)?;
                info!(route_id = %route.id, %schedule_id, "route force-completed");
            }
        }

        let lock = self.schedule_locks.lock_for(schedule_id);
        let _guard = lock.lock();
        let schedule = self.load_schedule(schedule_id)?;
        if schedule.status != ScheduleStatus::Completed {
            self.store
                .update_schedule_status(schedule_id, ScheduleStatus::Completed, now)?;
            info!(%schedule_id, "schedule completed manually");
        }
        self.load_schedule(schedule_id)
    }

    fn mark_schedule_started(&self, schedule_id: ScheduleId, at: Timestamp) -> Result<()> {
        let lock = self.schedule_locks.lock_for(schedule_id);
        let _guard = lock.lock();

        let schedule = self.load_schedule(schedule_id)?;
        if schedule.status == ScheduleStatus::Pending {
            self.store
                .update_schedule_status(schedule_id, ScheduleStatus::InProgress, at)?;
            info!(%schedule_id, "schedule started");
        }
        Ok(())
    }

    /// Completes the schedule if all of its routes are completed. Returns
    /// whether this call performed the transition.
    fn complete_schedule_if_done(&self, schedule_id: ScheduleId, at: Timestamp) -> Result<bool> {
        let lock = self.schedule_locks.lock_for(schedule_id);
        let _guard = lock.lock();

        let schedule = self.load_schedule(schedule_id)?;
        if schedule.status == ScheduleStatus::Completed {
            return Ok(false);
        }

        let routes = self.store.list_routes(schedule_id)?;
        let done = !routes.is_empty() && routes.iter().all(|r| r.status == RouteStatus::Completed);
        if !done {
            return Ok(false);
        }

        self.store
            .update_schedule_status(schedule_id, ScheduleStatus::Completed, at)?;
        info!(%schedule_id, routes = routes.len(), "every route completed, schedule completed");
        Ok(true)
    }

    fn load_route(&self, route_id: RouteId) -> Result<Route> {
        self.store
            .get_route(route_id)?
            .ok_or_else(|| PlannerError::NotFound(format!("route {}", route_id)))
    }

    fn load_schedule(&self, schedule_id: ScheduleId) -> Result<Schedule> {
        self.store
            .get_schedule(schedule_id)?
            .ok_or_else(|| PlannerError::NotFound(format!("schedule {}", schedule_id)))
    }
}

fn route_transition_error(route: &Route, event: &'static str) -> PlannerError {
    PlannerError::InvalidTransition {
        entity: "route",
        id: route.id.0,
        from: route.status.to_string(),
        event,
    }
}
