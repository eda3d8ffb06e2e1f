//! # MAVLink ground-control client library
//!
//! This crate implements a ground-control-station side client for autonomous
//! vehicles speaking the MAVLink v2 protocol. It allows to connect a MAVLink
//! autopilot, upload and download flight missions, control mission execution
//! and observe telemetry and mission progress.
//!
//! The crate is architectured around the [Drone] struct: connecting to a
//! vehicle creates a `Drone` object which gives access to the protocol
//! subsystems:
//!
//! ```no_run
//! use futures::StreamExt;
//! use mavgcs::{Drone, MissionItem};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let drone = Drone::connect("udpin:0.0.0.0:14540").await?;
//!
//! let items = vec![
//!     MissionItem::new()
//!         .with_position(47.398170, 8.545649)
//!         .with_relative_altitude(10.0),
//! ];
//!
//! drone.mission.upload_mission(items).await?;
//!
//! let mut progress = drone.mission.subscribe_progress().await;
//! drone.mission.start_mission().await?;
//!
//! while let Some(update) = progress.next().await {
//!     println!("Mission progress: {}/{}", update.current, update.total);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Communication architecture
//!
//! Outgoing messages are pushed to an uplink queue consumed by a writer task.
//! Incoming messages are read by a dispatcher task and routed to the
//! subsystem that registered for them. Each subsystem so gets its own
//! incoming message channel and shares the uplink sender, which keeps the
//! subsystems independent from each other and from the link implementation.
//!
//! The mission subsystem is the most involved one: it drives the MAVLink
//! mission micro-protocol (upload and download handshakes, acks, timeouts
//! and retries) as a state machine serialized behind a single lock. See the
//! [subsystems::mission] module documentation.

mod drone;
mod error;
mod mav_utils;
pub mod subsystems;
mod timeout;

pub use crate::drone::Drone;
pub use crate::error::{Error, Result};
pub use crate::subsystems::action::FlightMode;
pub use crate::subsystems::mission::{CameraAction, MissionItem, MissionProgress};
