//! bin-route-planner core
//!
//! Assigns waste-collection bins to trucks for a day, orders each truck's
//! stops, and tracks the resulting schedule as bins are collected.

pub mod error;
pub mod model;
pub mod traits;
pub mod haversine;
pub mod cluster;
pub mod sequencer;
pub mod scheduler;
pub mod lifecycle;
pub mod sync;
pub mod memory_store;
pub mod osrm;
pub mod polyline;
