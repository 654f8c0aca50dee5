//! Records read from and written to the store.
//!
//! Coordinates are `(latitude, longitude)` in degrees throughout the crate.

use std::fmt;
use std::str::FromStr;

use jiff::Timestamp;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use crate::error::UnknownStatus;
use crate::traits::Located;

macro_rules! id_type {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(pub i64);

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

id_type!(BinId, TruckId, DriverId, ScheduleId, RouteId, AssignmentId);

/// A physical collection point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub id: BinId,
    pub label: String,
    /// Tag read by the plate-recognition camera.
    pub plate: String,
    pub location: (f64, f64),
    pub status_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub area: Option<String>,
}

impl Located for Bin {
    fn location(&self) -> (f64, f64) {
        self.location
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Truck {
    pub id: TruckId,
    pub plate_no: String,
    pub driver_id: Option<DriverId>,
    pub active: bool,
    pub location: Option<(f64, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Assigned,
    Collected,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Pending => "pending",
            ScheduleStatus::InProgress => "in_progress",
            ScheduleStatus::Completed => "completed",
        }
    }
}

impl RouteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteStatus::Pending => "pending",
            RouteStatus::InProgress => "in_progress",
            RouteStatus::Completed => "completed",
        }
    }
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Assigned => "assigned",
            AssignmentStatus::Collected => "collected",
        }
    }
}

impl FromStr for ScheduleStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScheduleStatus::Pending),
            "in_progress" => Ok(ScheduleStatus::InProgress),
            "completed" => Ok(ScheduleStatus::Completed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl FromStr for RouteStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RouteStatus::Pending),
            "in_progress" => Ok(RouteStatus::InProgress),
            "completed" => Ok(RouteStatus::Completed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl FromStr for AssignmentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "assigned" => Ok(AssignmentStatus::Assigned),
            "collected" => Ok(AssignmentStatus::Collected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for RouteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One planning run for one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub name: String,
    pub date: Date,
    pub total_trucks: usize,
    pub total_bins: usize,
    pub total_routes: usize,
    pub description: String,
    pub status: ScheduleStatus,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub name: String,
    pub truck_id: TruckId,
    pub schedule_id: ScheduleId,
    pub date: Date,
    pub status: RouteStatus,
    pub bin_count: usize,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub truck_id: TruckId,
    pub bin_id: BinId,
    pub date: Date,
    pub schedule_id: ScheduleId,
    pub route_id: RouteId,
    /// 1-based stop position in the planned order.
    pub sequence: usize,
    pub status: AssignmentStatus,
    pub collected_at: Option<Timestamp>,
}

impl Assignment {
    pub fn is_collected(&self) -> bool {
        self.status == AssignmentStatus::Collected
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSchedule {
    pub name: String,
    pub date: Date,
    pub total_trucks: usize,
    pub total_bins: usize,
    pub total_routes: usize,
    pub description: String,
    pub status: ScheduleStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRoute {
    pub name: String,
    pub truck_id: TruckId,
    pub schedule_id: ScheduleId,
    pub date: Date,
    pub status: RouteStatus,
    pub bin_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAssignment {
    pub truck_id: TruckId,
    pub bin_id: BinId,
    pub date: Date,
    pub schedule_id: ScheduleId,
    pub route_id: RouteId,
    pub sequence: usize,
    pub status: AssignmentStatus,
}

/// How a field collection event identifies its bin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinRef {
    Id(BinId),
    Plate(String),
}

impl BinRef {
    pub fn matches(&self, bin: &Bin) -> bool {
        match self {
            BinRef::Id(id) => bin.id == *id,
            BinRef::Plate(plate) => bin.plate.eq_ignore_ascii_case(plate.trim()),
        }
    }
}

impl fmt::Display for BinRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinRef::Id(id) => write!(f, "bin {}", id),
            BinRef::Plate(plate) => write!(f, "bin plate {}", plate),
        }
    }
}
