//! Store wrapper that rejects route completions a set number of times.

use std::sync::atomic::{AtomicUsize, Ordering};

use bin_route_planner::error::StoreError;
use bin_route_planner::memory_store::InMemoryStore;
use bin_route_planner::model::{
    Assignment, AssignmentId, Bin, NewAssignment, NewRoute, NewSchedule, Route, RouteId,
    RouteStatus, Schedule, ScheduleId, ScheduleStatus, Truck,
};
use bin_route_planner::traits::Store;
use jiff::Timestamp;
use jiff::civil::Date;

pub struct FailingCompletionStore {
    pub inner: InMemoryStore,
    failures_left: AtomicUsize,
}

impl FailingCompletionStore {
    /// The next `failures` writes of `RouteStatus::Completed` fail.
    pub fn new(inner: InMemoryStore, failures: usize) -> Self {
        Self {
            inner,
            failures_left: AtomicUsize::new(failures),
        }
    }

    pub fn failures_left(&self) -> usize {
        self.failures_left.load(Ordering::SeqCst)
    }
}

impl Store for FailingCompletionStore {
    fn list_bins(&self) -> Result<Vec<Bin>, StoreError> {
        self.inner.list_bins()
    }

    fn list_trucks(&self) -> Result<Vec<Truck>, StoreError> {
        self.inner.list_trucks()
    }

    fn list_assignments(&self, date: Date) -> Result<Vec<Assignment>, StoreError> {
        self.inner.list_assignments(date)
    }

    fn list_routes(&self, schedule_id: ScheduleId) -> Result<Vec<Route>, StoreError> {
        self.inner.list_routes(schedule_id)
    }

    fn list_route_assignments(&self, route_id: RouteId) -> Result<Vec<Assignment>, StoreError> {
        self.inner.list_route_assignments(route_id)
    }

    fn get_route(&self, route_id: RouteId) -> Result<Option<Route>, StoreError> {
        self.inner.get_route(route_id)
    }

    fn get_schedule(&self, schedule_id: ScheduleId) -> Result<Option<Schedule>, StoreError> {
        self.inner.get_schedule(schedule_id)
    }

    fn insert_schedule(&self, schedule: NewSchedule) -> Result<Schedule, StoreError> {
        self.inner.insert_schedule(schedule)
    }

    fn insert_routes(&self, routes: Vec<NewRoute>) -> Result<Vec<Route>, StoreError> {
        self.inner.insert_routes(routes)
    }

    fn insert_assignments(&self, assignments: Vec<NewAssignment>) -> Result<(), StoreError> {
        self.inner.insert_assignments(assignments)
    }

    fn update_route_status(
        &self,
        route_id: RouteId,
        status: RouteStatus,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        if status == RouteStatus::Completed {
            let failed = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if failed {
                return Err(StoreError::Backend("transient".to_string()));
            }
        }
        self.inner.update_route_status(route_id, status, at)
    }

    fn update_schedule_status(
        &self,
        schedule_id: ScheduleId,
        status: ScheduleStatus,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        self.inner.update_schedule_status(schedule_id, status, at)
    }

    fn update_assignment_collected(
        &self,
        assignment_id: AssignmentId,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        self.inner.update_assignment_collected(assignment_id, at)
    }

    fn delete_schedule(&self, schedule_id: ScheduleId) -> Result<(), StoreError> {
        self.inner.delete_schedule(schedule_id)
    }
}
