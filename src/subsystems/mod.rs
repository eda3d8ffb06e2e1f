//! # Vehicle subsystems
//!
//! The MAVLink protocol is organized in micro-protocols that are greatly independent from each other: missions,
//! commands, parameters, telemetry streams. Each of them is implemented on the vehicle side by the autopilot and
//! on the ground side by a module of this lib.
//!
//! Modules here implement the Rust API for the different micro-protocols, they are the main way to communicate and
//! interact with the vehicle.

pub mod action;
pub mod mission;
pub mod telemetry;
