//! Collaborator interfaces for the planner.
//!
//! The engine never talks to a database or a map service directly. Concrete
//! apps implement these traits for their own backends.

use jiff::Timestamp;
use jiff::civil::Date;

use crate::error::{DirectionsError, StoreError};
use crate::model::{
    Assignment, AssignmentId, Bin, NewAssignment, NewRoute, NewSchedule, Route, RouteId,
    RouteStatus, Schedule, ScheduleId, ScheduleStatus, Truck,
};
use crate::polyline::Polyline;

/// Anything with a fixed position.
pub trait Located {
    /// Location coordinates (lat, lng).
    fn location(&self) -> (f64, f64);
}

impl Located for (f64, f64) {
    fn location(&self) -> (f64, f64) {
        *self
    }
}

impl<T: Located + ?Sized> Located for &T {
    fn location(&self) -> (f64, f64) {
        (**self).location()
    }
}

/// Persistent store holding bins, trucks, schedules, routes and assignments.
///
/// Implementations must be safe to share between threads; the engine is not
/// assumed to be the only writer.
pub trait Store: Send + Sync {
    fn list_bins(&self) -> Result<Vec<Bin>, StoreError>;

    fn list_trucks(&self) -> Result<Vec<Truck>, StoreError>;

    /// All assignments scheduled on `date`, collected or not.
    fn list_assignments(&self, date: Date) -> Result<Vec<Assignment>, StoreError>;

    fn list_routes(&self, schedule_id: ScheduleId) -> Result<Vec<Route>, StoreError>;

    fn list_route_assignments(&self, route_id: RouteId) -> Result<Vec<Assignment>, StoreError>;

    fn get_route(&self, route_id: RouteId) -> Result<Option<Route>, StoreError>;

    fn get_schedule(&self, schedule_id: ScheduleId) -> Result<Option<Schedule>, StoreError>;

    fn insert_schedule(&self, schedule: NewSchedule) -> Result<Schedule, StoreError>;

    /// Inserts routes and returns them with generated ids, in input order.
    fn insert_routes(&self, routes: Vec<NewRoute>) -> Result<Vec<Route>, StoreError>;

    fn insert_assignments(&self, assignments: Vec<NewAssignment>) -> Result<(), StoreError>;

    /// Sets the route status; `at` is recorded as started/completed time.
    fn update_route_status(
        &self,
        route_id: RouteId,
        status: RouteStatus,
        at: Timestamp,
    ) -> Result<(), StoreError>;

    fn update_schedule_status(
        &self,
        schedule_id: ScheduleId,
        status: ScheduleStatus,
        at: Timestamp,
    ) -> Result<(), StoreError>;

    fn update_assignment_collected(
        &self,
        assignment_id: AssignmentId,
        at: Timestamp,
    ) -> Result<(), StoreError>;

    /// Deletes a schedule with its routes and assignments.
    fn delete_schedule(&self, schedule_id: ScheduleId) -> Result<(), StoreError>;
}

/// Provides a distance matrix in kilometers for a set of locations.
///
/// The matrix is indexed by the provided location order.
pub trait DistanceMatrixProvider {
    fn matrix_for(&self, locations: &[(f64, f64)]) -> Vec<Vec<f64>>;
}

/// Road-following path lookup. Only used to draw routes on a map.
pub trait DirectionsProvider {
    fn driving_path(&self, points: &[(f64, f64)]) -> Result<Polyline, DirectionsError>;
}
