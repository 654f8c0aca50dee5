//! Schedule creation tests against the in-memory store.

mod fixtures;

use std::collections::{HashMap, HashSet};

use jiff::Timestamp;
use jiff::civil::Date;

use bin_route_planner::error::{PersistStage, PlannerError, StoreError};
use bin_route_planner::haversine::haversine_km;
use bin_route_planner::lifecycle::LifecycleController;
use bin_route_planner::memory_store::InMemoryStore;
use bin_route_planner::model::{
    Assignment, AssignmentId, AssignmentStatus, Bin, BinRef, NewAssignment, NewRoute, NewSchedule,
    Route, RouteId, RouteStatus, Schedule, ScheduleId, ScheduleStatus, Truck, TruckId,
};
use bin_route_planner::polyline::PathSource;
use bin_route_planner::scheduler::{PlannerConfig, SchedulingEngine};
use bin_route_planner::traits::Store;

use fixtures::{DEPOT, interleaved_bins, service_date, store_with};

// ============================================================================
// Failure Injection
// ============================================================================

/// Delegates to an in-memory store but fails one kind of write.
struct FlakyStore {
    inner: InMemoryStore,
    fail_on: PersistStage,
    fail_rollback: bool,
}

impl FlakyStore {
    fn failure(&self, stage: PersistStage) -> Result<(), StoreError> {
        if self.fail_on == stage {
            Err(StoreError::Backend(format!("injected {} failure", stage)))
        } else {
            Ok(())
        }
    }
}

impl Store for FlakyStore {
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
        self.failure(PersistStage::Schedule)?;
        self.inner.insert_schedule(schedule)
    }

    fn insert_routes(&self, routes: Vec<NewRoute>) -> Result<Vec<Route>, StoreError> {
        self.failure(PersistStage::Routes)?;
        self.inner.insert_routes(routes)
    }

    fn insert_assignments(&self, assignments: Vec<NewAssignment>) -> Result<(), StoreError> {
        self.failure(PersistStage::Assignments)?;
        self.inner.insert_assignments(assignments)
    }

    fn update_route_status(
        &self,
        route_id: RouteId,
        status: RouteStatus,
        at: Timestamp,
    ) -> Result<(), StoreError> {
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
        if self.fail_rollback {
            return Err(StoreError::Backend("delete refused".to_string()));
        }
        self.inner.delete_schedule(schedule_id)
    }
}

fn engine(store: &InMemoryStore) -> SchedulingEngine<'_, InMemoryStore> {
    SchedulingEngine::new(store, PlannerConfig::default())
}

// ============================================================================
// Schedule Creation
// ============================================================================

#[test]
fn ten_bins_two_trucks() {
    let store = store_with(interleaved_bins(10), 2);

    let created = engine(&store)
        .create_schedule(service_date(), &[TruckId(1), TruckId(2)])
        .unwrap();

    assert_eq!(store.schedules().len(), 1);
    assert_eq!(store.all_routes().len(), 2);
    assert_eq!(store.all_assignments().len(), 10);

    assert_eq!(created.schedule.total_bins, 10);
    assert_eq!(created.schedule.total_routes, 2);
    assert_eq!(created.schedule.total_trucks, 2);
    assert_eq!(created.schedule.status, ScheduleStatus::Pending);
    assert_eq!(created.unassigned_bins, 0);

    let routes: HashMap<RouteId, Route> =
        store.all_routes().into_iter().map(|r| (r.id, r)).collect();
    for assignment in store.all_assignments() {
        let route = &routes[&assignment.route_id];
        assert_eq!(route.truck_id, assignment.truck_id);
        assert_eq!(route.schedule_id, assignment.schedule_id);
        assert_eq!(assignment.schedule_id, created.schedule.id);
        assert_eq!(assignment.status, AssignmentStatus::Assigned);
        assert_eq!(assignment.date, service_date());
    }

    for route in routes.values() {
        assert_eq!(route.status, RouteStatus::Pending);
        let stops = store.list_route_assignments(route.id).unwrap();
        assert_eq!(route.bin_count, stops.len());
        let sequence: Vec<usize> = stops.iter().map(|a| a.sequence).collect();
        assert_eq!(sequence, (1..=stops.len()).collect::<Vec<_>>());
    }
}

#[test]
fn neighbourhoods_go_to_separate_trucks() {
    let store = store_with(interleaved_bins(10), 2);

    let created = engine(&store)
        .create_schedule(service_date(), &[TruckId(1), TruckId(2)])
        .unwrap();

    let bins: HashMap<_, _> = store
        .list_bins()
        .unwrap()
        .into_iter()
        .map(|b| (b.id, b))
        .collect();
    for planned in &created.routes {
        let areas: HashSet<&str> = planned
            .assignments
            .iter()
            .filter_map(|a| bins[&a.bin_id].area.as_deref())
            .collect();
        assert_eq!(areas.len(), 1, "route {} mixes areas {:?}", planned.route.name, areas);
    }
}

#[test]
fn no_unassigned_bins_is_no_work() {
    let store = store_with(interleaved_bins(4), 1);
    let planner = engine(&store);
    planner.create_schedule(service_date(), &[TruckId(1)]).unwrap();

    let err = planner
        .create_schedule(service_date(), &[TruckId(1)])
        .unwrap_err();

    assert!(matches!(err, PlannerError::NoWorkAvailable { date } if date == service_date()));
    assert_eq!(store.schedules().len(), 1);
    assert_eq!(store.all_assignments().len(), 4);
}

#[test]
fn other_dates_do_not_block_planning() {
    let store = store_with(interleaved_bins(4), 1);
    let planner = engine(&store);
    planner.create_schedule(service_date(), &[TruckId(1)]).unwrap();

    let next_day = service_date().tomorrow().unwrap();
    let created = planner.create_schedule(next_day, &[TruckId(1)]).unwrap();

    assert_eq!(created.schedule.total_bins, 4);
}

#[test]
fn rerun_plans_only_leftover_bins() {
    let store = store_with(interleaved_bins(4), 2);
    let planner = engine(&store);
    let first = planner.create_schedule(service_date(), &[TruckId(1)]).unwrap();

    for bin in fixtures::interleaved_bins(7).into_iter().skip(4) {
        store.add_bin(bin);
    }
    let second = planner.create_schedule(service_date(), &[TruckId(2)]).unwrap();

    assert_ne!(first.schedule.id, second.schedule.id);
    assert_eq!(second.schedule.total_bins, 3);

    let mut per_bin: HashMap<_, usize> = HashMap::new();
    for assignment in store.all_assignments() {
        *per_bin.entry(assignment.bin_id).or_default() += 1;
    }
    assert_eq!(per_bin.len(), 7);
    assert!(per_bin.values().all(|&count| count == 1));
}

#[test]
fn more_trucks_than_groups_skips_empty_clusters() {
    let location = &fixtures::TAMAN_UNIVERSITI[1];
    let bins = vec![fixtures::bin_at(1, location), fixtures::bin_at(2, location)];
    let store = store_with(bins, 3);

    let created = engine(&store)
        .create_schedule(service_date(), &[TruckId(1), TruckId(2), TruckId(3)])
        .unwrap();

    assert_eq!(created.routes.len(), created.schedule.total_routes);
    assert!(created.routes.len() < 3);
    assert_eq!(created.schedule.total_bins, 2);
    assert!(created.routes.iter().all(|r| r.route.bin_count > 0));
}

// ============================================================================
// Input Validation
// ============================================================================

#[test]
fn empty_truck_selection_rejected() {
    let store = store_with(interleaved_bins(4), 1);

    let err = engine(&store).create_schedule(service_date(), &[]).unwrap_err();

    assert!(matches!(err, PlannerError::InvalidInput(ref msg) if msg.contains("no active trucks")));
    assert!(store.schedules().is_empty());
}

#[test]
fn inactive_truck_rejected_with_unassigned_count() {
    let mut inactive = fixtures::truck(9, "JTA 9009");
    inactive.active = false;
    let store = InMemoryStore::new(interleaved_bins(5), vec![fixtures::truck(1, "JTA 1001"), inactive]);

    let err = engine(&store)
        .create_schedule(service_date(), &[TruckId(1), TruckId(9)])
        .unwrap_err();

    match err {
        PlannerError::InvalidInput(msg) => {
            assert!(msg.contains("truck 9"));
            assert!(msg.contains("5 bins remain unassigned"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(store.schedules().is_empty());
}

#[test]
fn duplicate_truck_rejected() {
    let store = store_with(interleaved_bins(4), 2);

    let err = engine(&store)
        .create_schedule(service_date(), &[TruckId(1), TruckId(1)])
        .unwrap_err();

    assert!(matches!(err, PlannerError::InvalidInput(_)));
}

#[test]
fn malformed_bin_coordinate_rejected_before_persisting() {
    let mut bins = interleaved_bins(3);
    bins[1].location = (f64::NAN, 103.62);
    let store = store_with(bins, 1);

    let err = engine(&store)
        .create_schedule(service_date(), &[TruckId(1)])
        .unwrap_err();

    assert!(matches!(err, PlannerError::InvalidInput(_)));
    assert!(store.schedules().is_empty());
}

// ============================================================================
// Partial Failure
// ============================================================================

fn flaky(fail_on: PersistStage, fail_rollback: bool) -> FlakyStore {
    FlakyStore {
        inner: store_with(interleaved_bins(6), 2),
        fail_on,
        fail_rollback,
    }
}

#[test]
fn route_failure_rolls_back_schedule() {
    let store = flaky(PersistStage::Routes, false);
    let planner = SchedulingEngine::new(&store, PlannerConfig::default());

    let err = planner
        .create_schedule(service_date(), &[TruckId(1), TruckId(2)])
        .unwrap_err();

    match err {
        PlannerError::Persistence {
            stage,
            persisted,
            rolled_back,
            unassigned_bins,
            ..
        } => {
            assert_eq!(stage, PersistStage::Routes);
            assert!(persisted.schedule.is_some());
            assert!(persisted.routes.is_empty());
            assert!(rolled_back);
            assert_eq!(unassigned_bins, 6);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(store.inner.schedules().is_empty());
}

#[test]
fn assignment_failure_rolls_back_routes_too() {
    let store = flaky(PersistStage::Assignments, false);
    let planner = SchedulingEngine::new(&store, PlannerConfig::default());

    let err = planner
        .create_schedule(service_date(), &[TruckId(1), TruckId(2)])
        .unwrap_err();

    match err {
        PlannerError::Persistence {
            stage,
            persisted,
            rolled_back,
            ..
        } => {
            assert_eq!(stage, PersistStage::Assignments);
            assert_eq!(persisted.routes.len(), 2);
            assert!(rolled_back);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(store.inner.schedules().is_empty());
    assert!(store.inner.all_routes().is_empty());
    assert!(store.inner.all_assignments().is_empty());
}

#[test]
fn failed_rollback_is_reported() {
    let store = flaky(PersistStage::Assignments, true);
    let planner = SchedulingEngine::new(&store, PlannerConfig::default());

    let err = planner
        .create_schedule(service_date(), &[TruckId(1), TruckId(2)])
        .unwrap_err();

    match err {
        PlannerError::Persistence {
            rolled_back,
            persisted,
            ..
        } => {
            assert!(!rolled_back);
            let schedule_id = persisted.schedule.unwrap();
            assert!(store.inner.get_schedule(schedule_id).unwrap().is_some());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn schedule_insert_failure_writes_nothing() {
    let store = flaky(PersistStage::Schedule, false);
    let planner = SchedulingEngine::new(&store, PlannerConfig::default());

    let err = planner
        .create_schedule(service_date(), &[TruckId(1)])
        .unwrap_err();

    assert!(matches!(
        err,
        PlannerError::Persistence { stage: PersistStage::Schedule, rolled_back: true, .. }
    ));
    assert!(store.inner.schedules().is_empty());
}

// ============================================================================
// Remaining Order
// ============================================================================

#[test]
fn remaining_order_skips_collected_bins() {
    let store = store_with(interleaved_bins(6), 1);
    let planner = engine(&store);
    let created = planner.create_schedule(service_date(), &[TruckId(1)]).unwrap();
    let route_id = created.routes[0].route.id;

    let first_bin = created.routes[0].assignments[0].bin_id;
    LifecycleController::new(&store)
        .mark_bin_collected(&BinRef::Id(first_bin), created.schedule.id, Some(route_id))
        .unwrap();

    let remaining = planner.recompute_remaining_order(route_id, None).unwrap();

    assert_eq!(remaining.len(), 5);
    assert!(remaining.iter().all(|stop| stop.bin_id != first_bin));
    assert_eq!(
        remaining.iter().map(|s| s.order).collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5]
    );
    assert_eq!(
        remaining[0].distance_from_previous_km,
        haversine_km(DEPOT.coords(), remaining[0].location)
    );
}

#[test]
fn remaining_order_from_current_position() {
    let store = store_with(interleaved_bins(6), 1);
    let planner = engine(&store);
    let created = planner.create_schedule(service_date(), &[TruckId(1)]).unwrap();
    let route_id = created.routes[0].route.id;

    // Standing at a Skudai bin, the next stop must be in Skudai too.
    let here = fixtures::SKUDAI[0].coords();
    let remaining = planner.recompute_remaining_order(route_id, Some(here)).unwrap();

    assert_eq!(remaining[0].location, here);
    assert_eq!(remaining[0].distance_from_previous_km, 0.0);
}

#[test]
fn remaining_order_for_unknown_route() {
    let store = store_with(interleaved_bins(2), 1);

    let err = engine(&store)
        .recompute_remaining_order(RouteId(999), None)
        .unwrap_err();

    assert!(matches!(err, PlannerError::NotFound(_)));
}

#[test]
fn route_path_falls_back_to_straight_line() {
    use bin_route_planner::error::DirectionsError;
    use bin_route_planner::polyline::Polyline;
    use bin_route_planner::traits::DirectionsProvider;

    struct Offline;

    impl DirectionsProvider for Offline {
        fn driving_path(&self, _points: &[(f64, f64)]) -> Result<Polyline, DirectionsError> {
            Err(DirectionsError::NoRoute("offline".to_string()))
        }
    }

    let store = store_with(interleaved_bins(4), 1);
    let planner = engine(&store);
    let created = planner.create_schedule(service_date(), &[TruckId(1)]).unwrap();

    let path = planner.route_path(created.routes[0].route.id, &Offline).unwrap();

    assert_eq!(path.source(), PathSource::StraightLine);
    assert_eq!(path.points().len(), 6);
    assert_eq!(path.points()[0], DEPOT.coords());
    assert_eq!(path.points()[5], DEPOT.coords());
}
