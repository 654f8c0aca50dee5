//! Day planning: cluster unassigned bins across the selected trucks,
//! sequence each cluster, and persist the schedule with its routes and
//! assignments.

use std::collections::{HashMap, HashSet};

use jiff::civil::Date;
use rayon::prelude::*;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::cluster::{ClusterOptions, assign_clusters};
use crate::error::{PersistStage, PersistedEntities, PlannerError, Result, StoreError};
use crate::model::{
    Assignment, AssignmentId, AssignmentStatus, Bin, BinId, NewAssignment, NewRoute, NewSchedule,
    Route, RouteId, RouteStatus, Schedule, ScheduleStatus, Truck, TruckId,
};
use crate::osrm::driving_path_or_straight;
use crate::polyline::Polyline;
use crate::sequencer::{SequenceOptions, nearest_neighbor_order, optimize_route};
use crate::traits::{DirectionsProvider, Located, Store};

/// Depot in Taman Universiti, Johor.
pub const DEFAULT_COLLECTION_CENTER: (f64, f64) = (1.5341, 103.6217);

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Start and end point of every route.
    pub collection_center: (f64, f64),
    pub cluster: ClusterOptions,
    pub sequence: SequenceOptions,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            collection_center: DEFAULT_COLLECTION_CENTER,
            cluster: ClusterOptions::default(),
            sequence: SequenceOptions::default(),
        }
    }
}

/// A persisted route with the assignments written for it, in stop order.
#[derive(Debug, Clone)]
pub struct PlannedRoute {
    pub route: Route,
    pub assignments: Vec<NewAssignment>,
}

#[derive(Debug, Clone)]
pub struct CreatedSchedule {
    pub schedule: Schedule,
    pub routes: Vec<PlannedRoute>,
    /// Bins for the date that are still without an assignment.
    pub unassigned_bins: usize,
}

/// A not-yet-collected stop in recomputed order.
#[derive(Debug, Clone, PartialEq)]
pub struct RemainingStop {
    pub assignment_id: AssignmentId,
    pub bin_id: BinId,
    pub plate: String,
    pub location: (f64, f64),
    pub order: usize,
    pub distance_from_previous_km: f64,
}

/// Parses a `YYYY-MM-DD` service date.
pub fn parse_service_date(raw: &str) -> Result<Date> {
    raw.trim()
        .parse::<Date>()
        .map_err(|err| PlannerError::InvalidInput(format!("malformed date {:?}: {}", raw, err)))
}

pub struct SchedulingEngine<'a, S: Store + ?Sized> {
    store: &'a S,
    config: PlannerConfig,
}

struct TruckPlan<'b> {
    truck: &'b Truck,
    stops: Vec<&'b Bin>,
}

impl<'a, S: Store + ?Sized> SchedulingEngine<'a, S> {
    pub fn new(store: &'a S, config: PlannerConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plans every bin without an assignment on `date` across `truck_ids`.
    ///
    /// Not idempotent: a second call for the same date plans whatever bins
    /// are still unassigned into a new, disjoint schedule.
    pub fn create_schedule(&self, date: Date, truck_ids: &[TruckId]) -> Result<CreatedSchedule> {
        let name = format!("Collection {}", date);
        self.create_schedule_named(date, truck_ids, name, String::new())
    }

    pub fn create_schedule_named(
        &self,
        date: Date,
        truck_ids: &[TruckId],
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<CreatedSchedule> {
        if truck_ids.is_empty() {
            return Err(PlannerError::InvalidInput(
                "no active trucks selected".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = truck_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(PlannerError::InvalidInput(format!(
                "truck {} selected more than once",
                duplicate
            )));
        }

        // Point-in-time snapshot; other writers may change bins afterwards.
        let bins = self.store.list_bins()?;
        let trucks = self.store.list_trucks()?;
        let assigned: HashSet<BinId> = self
            .store
            .list_assignments(date)?
            .into_iter()
            .map(|a| a.bin_id)
            .collect();
        let unassigned: Vec<Bin> = bins
            .into_iter()
            .filter(|bin| !assigned.contains(&bin.id))
            .collect();

        if unassigned.is_empty() {
            return Err(PlannerError::NoWorkAvailable { date });
        }

        let selected = resolve_trucks(&trucks, truck_ids, unassigned.len(), date)?;

        let center = self.config.collection_center;
        let clusters = assign_clusters(&unassigned, selected.len(), center, &self.config.cluster)?;

        // Order of `clusters` is preserved by the indexed parallel collect.
        let sequence_options = &self.config.sequence;
        let ordered: Vec<Vec<&Bin>> = clusters
            .par_iter()
            .map(|cluster| {
                optimize_route(cluster, center, sequence_options)
                    .map(|stops| stops.into_iter().copied().collect::<Vec<&Bin>>())
            })
            .collect::<Result<_>>()?;

        let plans: Vec<TruckPlan<'_>> = selected
            .into_iter()
            .zip(ordered)
            .filter(|(_, stops)| !stops.is_empty())
            .map(|(truck, stops)| TruckPlan { truck, stops })
            .collect();

        let total_bins: usize = plans.iter().map(|plan| plan.stops.len()).sum();
        let unassigned_after = unassigned.len() - total_bins;

        self.persist(date, name.into(), description.into(), plans, total_bins, unassigned_after)
    }

    fn persist(
        &self,
        date: Date,
        name: String,
        description: String,
        plans: Vec<TruckPlan<'_>>,
        total_bins: usize,
        unassigned_bins: usize,
    ) -> Result<CreatedSchedule> {
        let pending_bins = unassigned_bins + total_bins;

        let schedule = self
            .store
            .insert_schedule(NewSchedule {
                name,
                date,
                total_trucks: plans.len(),
                total_bins,
                total_routes: plans.len(),
                description,
                status: ScheduleStatus::Pending,
            })
            .map_err(|source| PlannerError::Persistence {
                stage: PersistStage::Schedule,
                persisted: PersistedEntities::default(),
                rolled_back: true,
                unassigned_bins: pending_bins,
                source,
            })?;

        let mut persisted = PersistedEntities {
            schedule: Some(schedule.id),
            routes: Vec::new(),
        };

        let new_routes: Vec<NewRoute> = plans
            .iter()
            .map(|plan| NewRoute {
                name: format!("Route {} {}", date, plan.truck.plate_no),
                truck_id: plan.truck.id,
                schedule_id: schedule.id,
                date,
                status: RouteStatus::Pending,
                bin_count: plan.stops.len(),
            })
            .collect();

        let routes = match self.store.insert_routes(new_routes) {
            Ok(routes) if routes.len() == plans.len() => routes,
            Ok(routes) => {
                persisted.routes = routes.iter().map(|r| r.id).collect();
                let source = StoreError::Backend(format!(
                    "store returned {} routes for {} inserts",
                    routes.len(),
                    plans.len()
                ));
                return Err(self.roll_back(PersistStage::Routes, persisted, pending_bins, source));
            }
            Err(source) => {
                return Err(self.roll_back(PersistStage::Routes, persisted, pending_bins, source));
            }
        };
        persisted.routes = routes.iter().map(|r| r.id).collect();

        let mut planned = Vec::with_capacity(routes.len());
        let mut new_assignments = Vec::with_capacity(total_bins);
        for (route, plan) in routes.into_iter().zip(&plans) {
            let assignments: Vec<NewAssignment> = plan
                .stops
                .iter()
                .enumerate()
                .map(|(index, bin)| NewAssignment {
                    truck_id: route.truck_id,
                    bin_id: bin.id,
                    date,
                    schedule_id: schedule.id,
                    route_id: route.id,
                    sequence: index + 1,
                    status: AssignmentStatus::Assigned,
                })
                .collect();
            new_assignments.extend(assignments.iter().cloned());
            planned.push(PlannedRoute { route, assignments });
        }

        if let Err(source) = self.store.insert_assignments(new_assignments) {
            return Err(self.roll_back(PersistStage::Assignments, persisted, pending_bins, source));
        }

        info!(
            schedule_id = %schedule.id,
            %date,
            routes = planned.len(),
            bins = total_bins,
            unassigned = unassigned_bins,
            "schedule created"
        );

        Ok(CreatedSchedule {
            schedule,
            routes: planned,
            unassigned_bins,
        })
    }

    /// Deletes a partially written plan so no orphaned schedule is left.
    fn roll_back(
        &self,
        stage: PersistStage,
        persisted: PersistedEntities,
        unassigned_bins: usize,
        source: StoreError,
    ) -> PlannerError {
        let rolled_back = match persisted.schedule {
            None => true,
            Some(schedule_id) => match self.store.delete_schedule(schedule_id) {
                Ok(()) => {
                    warn!(%schedule_id, %stage, error = %source, "schedule rolled back");
                    true
                }
                Err(rollback_err) => {
                    error!(
                        %schedule_id,
                        %stage,
                        error = %source,
                        rollback_error = %rollback_err,
                        "rollback failed, partial schedule left in store"
                    );
                    false
                }
            },
        };

        PlannerError::Persistence {
            stage,
            persisted,
            rolled_back,
            unassigned_bins,
            source,
        }
    }

    /// Nearest-neighbor order of the route's uncollected stops, starting at
    /// `current_position` (the collection center when `None`).
    pub fn recompute_remaining_order(
        &self,
        route_id: RouteId,
        current_position: Option<(f64, f64)>,
    ) -> Result<Vec<RemainingStop>> {
        let open = self.open_stops(route_id)?;
        let start = current_position.unwrap_or(self.config.collection_center);

        let ordered = nearest_neighbor_order(&open, start)?;
        Ok(ordered
            .into_iter()
            .map(|stop| RemainingStop {
                assignment_id: stop.item.assignment.id,
                bin_id: stop.item.bin.id,
                plate: stop.item.bin.plate.clone(),
                location: stop.item.bin.location,
                order: stop.order,
                distance_from_previous_km: stop.distance_from_previous_km,
            })
            .collect())
    }

    /// Map geometry for a route: center, stops in planned order, center.
    pub fn route_path<D: DirectionsProvider + ?Sized>(
        &self,
        route_id: RouteId,
        directions: &D,
    ) -> Result<Polyline> {
        let stops = self.route_stops(route_id, true)?;
        let center = self.config.collection_center;

        let mut points = Vec::with_capacity(stops.len() + 2);
        points.push(center);
        points.extend(stops.iter().map(|stop| stop.bin.location));
        points.push(center);

        Ok(driving_path_or_straight(directions, &points))
    }

    fn open_stops(&self, route_id: RouteId) -> Result<Vec<OpenStop>> {
        self.route_stops(route_id, false)
    }

    fn route_stops(&self, route_id: RouteId, include_collected: bool) -> Result<Vec<OpenStop>> {
        if self.store.get_route(route_id)?.is_none() {
            return Err(PlannerError::NotFound(format!("route {}", route_id)));
        }

        let mut assignments = self.store.list_route_assignments(route_id)?;
        assignments.sort_by_key(|a| a.sequence);

        let bins: HashMap<BinId, Bin> = self
            .store
            .list_bins()?
            .into_iter()
            .map(|bin| (bin.id, bin))
            .collect();

        let mut stops = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            if assignment.is_collected() && !include_collected {
                continue;
            }
            match bins.get(&assignment.bin_id) {
                Some(bin) => stops.push(OpenStop {
                    bin: bin.clone(),
                    assignment,
                }),
                None => warn!(
                    %route_id,
                    bin_id = %assignment.bin_id,
                    "assigned bin no longer exists, skipping"
                ),
            }
        }
        Ok(stops)
    }
}

struct OpenStop {
    assignment: Assignment,
    bin: Bin,
}

impl Located for OpenStop {
    fn location(&self) -> (f64, f64) {
        self.bin.location
    }
}

/// Looks up every selected truck, requiring it to exist and be active.
fn resolve_trucks<'t>(
    trucks: &'t [Truck],
    truck_ids: &[TruckId],
    unassigned_bins: usize,
    date: Date,
) -> Result<Vec<&'t Truck>> {
    truck_ids
        .iter()
        .map(|id| match trucks.iter().find(|truck| truck.id == *id) {
            Some(truck) if truck.active => Ok(truck),
            Some(_) => Err(PlannerError::InvalidInput(format!(
                "truck {} is not active; {} bins remain unassigned for {}",
                id, unassigned_bins, date
            ))),
            None => Err(PlannerError::InvalidInput(format!(
                "truck {} does not exist; {} bins remain unassigned for {}",
                id, unassigned_bins, date
            ))),
        })
        .collect()
}
