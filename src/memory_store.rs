//! In-process [`Store`] backed by plain vectors behind a lock.
//!
//! Useful for tests and for embedding the planner without a database.

use jiff::Timestamp;
use jiff::civil::Date;
use parking_lot::RwLock;

use crate::error::StoreError;
use crate::model::{
    Assignment, AssignmentId, AssignmentStatus, Bin, BinId, NewAssignment, NewRoute, NewSchedule,
    Route, RouteId, RouteStatus, Schedule, ScheduleId, ScheduleStatus, Truck,
};
use crate::traits::Store;

#[derive(Debug, Default)]
struct Tables {
    bins: Vec<Bin>,
    trucks: Vec<Truck>,
    schedules: Vec<Schedule>,
    routes: Vec<Route>,
    assignments: Vec<Assignment>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new(bins: Vec<Bin>, trucks: Vec<Truck>) -> Self {
        Self {
            tables: RwLock::new(Tables {
                bins,
                trucks,
                ..Tables::default()
            }),
        }
    }

    pub fn add_bin(&self, bin: Bin) {
        self.tables.write().bins.push(bin);
    }

    pub fn remove_bin(&self, bin_id: BinId) {
        self.tables.write().bins.retain(|b| b.id != bin_id);
    }

    pub fn schedules(&self) -> Vec<Schedule> {
        self.tables.read().schedules.clone()
    }

    pub fn all_routes(&self) -> Vec<Route> {
        self.tables.read().routes.clone()
    }

    pub fn all_assignments(&self) -> Vec<Assignment> {
        self.tables.read().assignments.clone()
    }
}

impl Store for InMemoryStore {
    fn list_bins(&self) -> Result<Vec<Bin>, StoreError> {
        Ok(self.tables.read().bins.clone())
    }

    fn list_trucks(&self) -> Result<Vec<Truck>, StoreError> {
        Ok(self.tables.read().trucks.clone())
    }

    fn list_assignments(&self, date: Date) -> Result<Vec<Assignment>, StoreError> {
        Ok(self
            .tables
            .read()
            .assignments
            .iter()
            .filter(|a| a.date == date)
            .cloned()
            .collect())
    }

    fn list_routes(&self, schedule_id: ScheduleId) -> Result<Vec<Route>, StoreError> {
        Ok(self
            .tables
            .read()
            .routes
            .iter()
            .filter(|r| r.schedule_id == schedule_id)
            .cloned()
            .collect())
    }

    fn list_route_assignments(&self, route_id: RouteId) -> Result<Vec<Assignment>, StoreError> {
        let mut assignments: Vec<Assignment> = self
            .tables
            .read()
            .assignments
            .iter()
            .filter(|a| a.route_id == route_id)
            .cloned()
            .collect();
        assignments.sort_by_key(|a| a.sequence);
        Ok(assignments)
    }

    fn get_route(&self, route_id: RouteId) -> Result<Option<Route>, StoreError> {
        Ok(self
            .tables
            .read()
            .routes
            .iter()
            .find(|r| r.id == route_id)
            .cloned())
    }

    fn get_schedule(&self, schedule_id: ScheduleId) -> Result<Option<Schedule>, StoreError> {
        Ok(self
            .tables
            .read()
            .schedules
            .iter()
            .find(|s| s.id == schedule_id)
            .cloned())
    }

    fn insert_schedule(&self, schedule: NewSchedule) -> Result<Schedule, StoreError> {
        let mut tables = self.tables.write();
        let record = Schedule {
            id: ScheduleId(tables.next_id()),
            name: schedule.name,
            date: schedule.date,
            total_trucks: schedule.total_trucks,
            total_bins: schedule.total_bins,
            total_routes: schedule.total_routes,
            description: schedule.description,
            status: schedule.status,
            created_at: Timestamp::now(),
            completed_at: None,
        };
        tables.schedules.push(record.clone());
        Ok(record)
    }

    fn insert_routes(&self, routes: Vec<NewRoute>) -> Result<Vec<Route>, StoreError> {
        let mut tables = self.tables.write();
        for route in &routes {
            if !tables.schedules.iter().any(|s| s.id == route.schedule_id) {
                return Err(StoreError::Missing {
                    entity: "schedule",
                    id: route.schedule_id.0,
                });
            }
        }

        let mut inserted = Vec::with_capacity(routes.len());
        for route in routes {
            let record = Route {
                id: RouteId(tables.next_id()),
                name: route.name,
                truck_id: route.truck_id,
                schedule_id: route.schedule_id,
                date: route.date,
                status: route.status,
                bin_count: route.bin_count,
                started_at: None,
                completed_at: None,
            };
            tables.routes.push(record.clone());
            inserted.push(record);
        }
        Ok(inserted)
    }

    fn insert_assignments(&self, assignments: Vec<NewAssignment>) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        for assignment in &assignments {
            if !tables.routes.iter().any(|r| r.id == assignment.route_id) {
                return Err(StoreError::Missing {
                    entity: "route",
                    id: assignment.route_id.0,
                });
            }
        }

        for assignment in assignments {
            let record = Assignment {
                id: AssignmentId(tables.next_id()),
                truck_id: assignment.truck_id,
                bin_id: assignment.bin_id,
                date: assignment.date,
                schedule_id: assignment.schedule_id,
                route_id: assignment.route_id,
                sequence: assignment.sequence,
                status: assignment.status,
                collected_at: None,
            };
            tables.assignments.push(record);
        }
        Ok(())
    }

    fn update_route_status(
        &self,
        route_id: RouteId,
        status: RouteStatus,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let route = tables
            .routes
            .iter_mut()
            .find(|r| r.id == route_id)
            .ok_or(StoreError::Missing {
                entity: "route",
                id: route_id.0,
            })?;
        route.status = status;
        match status {
            RouteStatus::Pending => {}
            RouteStatus::InProgress => route.started_at = Some(at),
            RouteStatus::Completed => route.completed_at = Some(at),
        }
        Ok(())
    }

    fn update_schedule_status(
        &self,
        schedule_id: ScheduleId,
        status: ScheduleStatus,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let schedule = tables
            .schedules
            .iter_mut()
            .find(|s| s.id == schedule_id)
            .ok_or(StoreError::Missing {
                entity: "schedule",
                id: schedule_id.0,
            })?;
        schedule.status = status;
        if status == ScheduleStatus::Completed {
            schedule.completed_at = Some(at);
        }
        Ok(())
    }

    fn update_assignment_collected(
        &self,
        assignment_id: AssignmentId,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let assignment = tables
            .assignments
            .iter_mut()
            .find(|a| a.id == assignment_id)
            .ok_or(StoreError::Missing {
                entity: "assignment",
                id: assignment_id.0,
            })?;
        assignment.status = AssignmentStatus::Collected;
        assignment.collected_at = Some(at);
        Ok(())
    }

    fn delete_schedule(&self, schedule_id: ScheduleId) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        tables.assignments.retain(|a| a.schedule_id != schedule_id);
        tables.routes.retain(|r| r.schedule_id != schedule_id);
        tables.schedules.retain(|s| s.id != schedule_id);
        Ok(())
    }
}
