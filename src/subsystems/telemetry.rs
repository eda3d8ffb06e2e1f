//! # Telemetry subsystem
//!
//! The autopilot periodically streams its state to the ground. This
//! subsystem decodes the streamed messages and exposes them in two ways:
//! the latest value of each stream can be queried at any time, and
//! subscription streams deliver every update as it arrives.

use crate::mav_utils::MavFrameRx;
use crate::subsystems::action::{decode_px4_mode, FlightMode};
use async_broadcast::{broadcast, Receiver as BroadcastReceiver};
use futures::lock::Mutex;
use futures::Stream;
use mavlink::common::{MavMessage, MavModeFlag};
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::Arc;

/// Global position of the vehicle as reported by the autopilot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// Latitude in degrees
    pub latitude_deg: f64,
    /// Longitude in degrees
    pub longitude_deg: f64,
    /// Altitude above mean sea level [m]
    pub absolute_altitude_m: f32,
    /// Altitude above the takeoff position [m]
    pub relative_altitude_m: f32,
}

/// Battery state of the vehicle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Battery {
    /// Battery voltage [V]
    pub voltage_v: f32,
    /// Remaining battery charge, 0.0 to 1.0. Negative if unknown.
    pub remaining: f32,
}

/// # Access to the vehicle telemetry
///
/// See the [telemetry module documentation](crate::subsystems::telemetry)
/// for more context and information.
pub struct Telemetry {
    armed: Arc<AtomicBool>,
    flight_mode: Arc<Mutex<Option<FlightMode>>>,
    position: Arc<Mutex<Option<Position>>>,
    battery: Arc<Mutex<Option<Battery>>>,
    position_receiver: BroadcastReceiver<Position>,
    battery_receiver: BroadcastReceiver<Battery>,
}

impl Telemetry {
    pub(crate) fn new(downlink: MavFrameRx) -> Self {
        let armed = Arc::new(AtomicBool::new(false));
        let flight_mode: Arc<Mutex<Option<FlightMode>>> = Arc::new(Mutex::new(None));
        let position: Arc<Mutex<Option<Position>>> = Arc::new(Mutex::new(None));
        let battery: Arc<Mutex<Option<Battery>>> = Arc::new(Mutex::new(None));

        let (mut position_broadcast, position_receiver) = broadcast(100);
        let (mut battery_broadcast, battery_receiver) = broadcast(10);

        // Enable overflow mode so old samples are dropped instead of blocking
        position_broadcast.set_overflow(true);
        battery_broadcast.set_overflow(true);

        let task_armed = armed.clone();
        let task_flight_mode = flight_mode.clone();
        let task_position = position.clone();
        let task_battery = battery.clone();

        tokio::spawn(async move {
            while let Ok((_, message)) = downlink.recv_async().await {
                match message {
                    MavMessage::HEARTBEAT(heartbeat) => {
                        let is_armed = heartbeat
                            .base_mode
                            .contains(MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED);
                        task_armed.store(is_armed, Relaxed);

                        *task_flight_mode.lock().await =
                            decode_px4_mode(heartbeat.base_mode, heartbeat.custom_mode);
                    }
                    MavMessage::GLOBAL_POSITION_INT(data) => {
                        let sample = Position {
                            latitude_deg: f64::from(data.lat) * 1e-7,
                            longitude_deg: f64::from(data.lon) * 1e-7,
                            absolute_altitude_m: data.alt as f32 * 1e-3,
                            relative_altitude_m: data.relative_alt as f32 * 1e-3,
                        };
                        *task_position.lock().await = Some(sample);
                        let _ = position_broadcast.broadcast(sample).await;
                    }
                    MavMessage::SYS_STATUS(data) => {
                        let sample = Battery {
                            voltage_v: f32::from(data.voltage_battery) * 1e-3,
                            remaining: f32::from(data.battery_remaining) * 1e-2,
                        };
                        *task_battery.lock().await = Some(sample);
                        let _ = battery_broadcast.broadcast(sample).await;
                    }
                    _ => {}
                }
            }
        });

        Self {
            armed,
            flight_mode,
            position,
            battery,
            position_receiver,
            battery_receiver,
        }
    }

    /// Return true if the vehicle is currently armed.
    pub fn armed(&self) -> bool {
        self.armed.load(Relaxed)
    }

    /// Flight mode reported by the autopilot. `None` before the first
    /// heartbeat and while the autopilot is in a mode that cannot be
    /// requested through [crate::subsystems::action::Action], manual flight
    /// for example.
    pub async fn flight_mode(&self) -> Option<FlightMode> {
        *self.flight_mode.lock().await
    }

    /// Latest received global position, or `None` if nothing was received yet.
    pub async fn position(&self) -> Option<Position> {
        *self.position.lock().await
    }

    /// Latest received battery state, or `None` if nothing was received yet.
    pub async fn battery(&self) -> Option<Battery> {
        *self.battery.lock().await
    }

    /// Get a stream of position updates.
    pub async fn position_stream(&self) -> impl Stream<Item = Position> + use<> {
        self.position_receiver.clone()
    }

    /// Get a stream of battery updates.
    pub async fn battery_stream(&self) -> impl Stream<Item = Battery> + use<> {
        self.battery_receiver.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use mavlink::common::{GLOBAL_POSITION_INT_DATA, HEARTBEAT_DATA, SYS_STATUS_DATA};
    use mavlink::MavHeader;

    fn vehicle_header() -> MavHeader {
        MavHeader {
            system_id: 1,
            component_id: 1,
            sequence: 0,
        }
    }

    #[tokio::test]
    async fn position_is_latched_and_streamed() {
        let (tx, rx) = flume::unbounded();
        let telemetry = Telemetry::new(rx);
        let mut stream = telemetry.position_stream().await;

        tx.send((
            vehicle_header(),
            MavMessage::GLOBAL_POSITION_INT(GLOBAL_POSITION_INT_DATA {
                lat: 473981700,
                lon: 85456490,
                alt: 500_000,
                relative_alt: 10_000,
                ..Default::default()
            }),
        ))
        .unwrap();

        let sample = stream.next().await.unwrap();
        assert!((sample.latitude_deg - 47.39817).abs() < 1e-9);
        assert!((sample.longitude_deg - 8.545649).abs() < 1e-9);
        assert!((sample.relative_altitude_m - 10.0).abs() < 1e-6);

        assert_eq!(telemetry.position().await, Some(sample));
    }

    #[tokio::test]
    async fn armed_follows_the_heartbeat() {
        let (tx, rx) = flume::unbounded();
        let telemetry = Telemetry::new(rx);

        assert!(!telemetry.armed());

        tx.send((
            vehicle_header(),
            MavMessage::HEARTBEAT(HEARTBEAT_DATA {
                base_mode: MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED
                    | MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED,
                ..Default::default()
            }),
        ))
        .unwrap();

        // Give the decoding task a chance to run
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(telemetry.armed());
    }

    #[tokio::test]
    async fn flight_mode_follows_the_heartbeat_custom_mode() {
        use crate::subsystems::action::{PX4_MAIN_MODE_AUTO, PX4_SUB_MODE_AUTO_MISSION};

        let (tx, rx) = flume::unbounded();
        let telemetry = Telemetry::new(rx);

        assert_eq!(telemetry.flight_mode().await, None);

        tx.send((
            vehicle_header(),
            MavMessage::HEARTBEAT(HEARTBEAT_DATA {
                base_mode: MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED,
                custom_mode: (u32::from(PX4_SUB_MODE_AUTO_MISSION) << 24)
                    | (u32::from(PX4_MAIN_MODE_AUTO) << 16),
                ..Default::default()
            }),
        ))
        .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(telemetry.flight_mode().await, Some(FlightMode::Mission));

        // Dropping back to manual flight clears the reported mode
        tx.send((
            vehicle_header(),
            MavMessage::HEARTBEAT(HEARTBEAT_DATA {
                base_mode: MavModeFlag::empty(),
                custom_mode: 0,
                ..Default::default()
            }),
        ))
        .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(telemetry.flight_mode().await, None);
    }

    #[tokio::test]
    async fn battery_values_are_scaled() {
        let (tx, rx) = flume::unbounded();
        let telemetry = Telemetry::new(rx);
        let mut stream = telemetry.battery_stream().await;

        tx.send((
            vehicle_header(),
            MavMessage::SYS_STATUS(SYS_STATUS_DATA {
                voltage_battery: 12_600,
                battery_remaining: 87,
                ..Default::default()
            }),
        ))
        .unwrap();

        let sample = stream.next().await.unwrap();
        assert!((sample.voltage_v - 12.6).abs() < 1e-3);
        assert!((sample.remaining - 0.87).abs() < 1e-3);
    }
}
