//! # Action subsystem
//!
//! The action subsystem sends flight commands to the vehicle. Commands are
//! sent as `COMMAND_LONG` messages and acknowledged by the autopilot with a
//! `COMMAND_ACK`, so each method sends the command and waits for the
//! matching ack.
//!
//! The mission subsystem uses this subsystem to switch the autopilot in and
//! out of mission execution.

use crate::drone::SystemInfo;
use crate::mav_utils::{MavFrameRx, WaitForMessage};
use crate::{Error, Result};
use flume::Sender;
use futures::lock::Mutex;
use mavlink::common::{COMMAND_LONG_DATA, MavCmd, MavMessage, MavModeFlag, MavResult};
use std::sync::Arc;
use std::time::Duration;

/// How long to wait for a COMMAND_ACK before giving up.
const COMMAND_ACK_TIMEOUT: Duration = Duration::from_millis(500);

// PX4 custom mode encoding: the flight mode is a main mode and a sub mode,
// selected with DO_SET_MODE and reported in the heartbeat custom_mode as
// bytes 2 and 3.
pub(crate) const PX4_MAIN_MODE_AUTO: u8 = 4;
pub(crate) const PX4_SUB_MODE_AUTO_LOITER: u8 = 3;
pub(crate) const PX4_SUB_MODE_AUTO_MISSION: u8 = 4;
pub(crate) const PX4_SUB_MODE_AUTO_RTL: u8 = 5;

/// Autopilot flight modes that can be requested from the ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightMode {
    /// Execute the stored mission.
    Mission,
    /// Hold position (pauses a running mission).
    Hold,
    /// Fly back to the launch position.
    ReturnToLaunch,
}

/// Decode the mode reported in a heartbeat. Returns `None` for modes that
/// cannot be requested through [FlightMode], manual flight for example.
pub(crate) fn decode_px4_mode(base_mode: MavModeFlag, custom_mode: u32) -> Option<FlightMode> {
    if !base_mode.contains(MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED) {
        return None;
    }

    let main_mode = (custom_mode >> 16) as u8;
    let sub_mode = (custom_mode >> 24) as u8;

    if main_mode != PX4_MAIN_MODE_AUTO {
        return None;
    }

    match sub_mode {
        PX4_SUB_MODE_AUTO_MISSION => Some(FlightMode::Mission),
        PX4_SUB_MODE_AUTO_LOITER => Some(FlightMode::Hold),
        PX4_SUB_MODE_AUTO_RTL => Some(FlightMode::ReturnToLaunch),
        _ => None,
    }
}

#[derive(Debug)]
struct ActionInner {
    uplink: Sender<MavMessage>,
    ack_downlink: Mutex<MavFrameRx>,
    info: Arc<SystemInfo>,
}

/// # Access to the vehicle flight commands
///
/// See the [action module documentation](crate::subsystems::action) for more
/// context and information.
#[derive(Debug, Clone)]
pub struct Action {
    inner: Arc<ActionInner>,
}

impl Action {
    pub(crate) fn new(
        uplink: Sender<MavMessage>,
        ack_downlink: MavFrameRx,
        info: Arc<SystemInfo>,
    ) -> Self {
        Self {
            inner: Arc::new(ActionInner {
                uplink,
                ack_downlink: Mutex::new(ack_downlink),
                info,
            }),
        }
    }

    /// Request an autopilot flight mode.
    ///
    /// The request is acknowledged by the autopilot; any ack result other
    /// than accepted is reported as an error.
    pub async fn set_flight_mode(&self, flight_mode: FlightMode) -> Result<()> {
        let sub_mode = match flight_mode {
            FlightMode::Mission => PX4_SUB_MODE_AUTO_MISSION,
            FlightMode::Hold => PX4_SUB_MODE_AUTO_LOITER,
            FlightMode::ReturnToLaunch => PX4_SUB_MODE_AUTO_RTL,
        };

        let message = MavMessage::COMMAND_LONG(COMMAND_LONG_DATA {
            param1: MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED.bits() as f32,
            param2: f32::from(PX4_MAIN_MODE_AUTO),
            param3: f32::from(sub_mode),
            param4: 0.0,
            param5: 0.0,
            param6: 0.0,
            param7: 0.0,
            command: MavCmd::MAV_CMD_DO_SET_MODE,
            target_system: self.inner.info.vehicle_system_id(),
            target_component: self.inner.info.vehicle_component_id(),
            confirmation: 0,
        });

        // Lock before sending to prevent interleaving concurrent commands
        let downlink = self.inner.ack_downlink.lock().await;

        self.inner
            .uplink
            .send_async(message)
            .await
            .map_err(|_| Error::Disconnected)?;

        let wait_for_ack = downlink.wait_message(|message| {
            matches!(message, MavMessage::COMMAND_ACK(ack) if ack.command == MavCmd::MAV_CMD_DO_SET_MODE)
        });

        match tokio::time::timeout(COMMAND_ACK_TIMEOUT, wait_for_ack).await {
            Ok(Ok((_, MavMessage::COMMAND_ACK(ack)))) => match ack.result {
                MavResult::MAV_RESULT_ACCEPTED => Ok(()),
                other => Err(Error::ProtocolError(format!(
                    "Set flight mode rejected: {:?}",
                    other
                ))),
            },
            Ok(Ok(_)) => unreachable!("wait_message only matches COMMAND_ACK"),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mavlink::common::COMMAND_ACK_DATA;
    use mavlink::MavHeader;

    fn vehicle_header() -> MavHeader {
        MavHeader {
            system_id: 1,
            component_id: 1,
            sequence: 0,
        }
    }

    fn test_action() -> (Action, flume::Receiver<MavMessage>, Sender<(MavHeader, MavMessage)>) {
        let (uplink_tx, uplink_rx) = flume::unbounded();
        let (downlink_tx, downlink_rx) = flume::unbounded();
        let action = Action::new(uplink_tx, downlink_rx, SystemInfo::new());
        (action, uplink_rx, downlink_tx)
    }

    #[tokio::test]
    async fn set_flight_mode_sends_do_set_mode_and_waits_for_ack() {
        let (action, uplink, downlink) = test_action();

        let task = tokio::spawn(async move { action.set_flight_mode(FlightMode::Mission).await });

        let sent = uplink.recv_async().await.unwrap();
        let MavMessage::COMMAND_LONG(command) = sent else {
            panic!("Expected COMMAND_LONG, got {:?}", sent);
        };
        assert_eq!(command.command, MavCmd::MAV_CMD_DO_SET_MODE);
        assert_eq!(command.param2, f32::from(PX4_MAIN_MODE_AUTO));
        assert_eq!(command.param3, f32::from(PX4_SUB_MODE_AUTO_MISSION));

        downlink
            .send((
                vehicle_header(),
                MavMessage::COMMAND_ACK(COMMAND_ACK_DATA {
                    command: MavCmd::MAV_CMD_DO_SET_MODE,
                    result: MavResult::MAV_RESULT_ACCEPTED,
                    ..Default::default()
                }),
            ))
            .unwrap();

        assert_eq!(task.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn rejected_mode_change_is_an_error() {
        let (action, uplink, downlink) = test_action();

        let task = tokio::spawn(async move { action.set_flight_mode(FlightMode::Hold).await });

        let _ = uplink.recv_async().await.unwrap();
        downlink
            .send((
                vehicle_header(),
                MavMessage::COMMAND_ACK(COMMAND_ACK_DATA {
                    command: MavCmd::MAV_CMD_DO_SET_MODE,
                    result: MavResult::MAV_RESULT_DENIED,
                    ..Default::default()
                }),
            ))
            .unwrap();

        assert!(matches!(task.await.unwrap(), Err(Error::ProtocolError(_))));
    }

    #[tokio::test]
    async fn missing_ack_times_out() {
        let (action, _uplink, _downlink) = test_action();

        assert_eq!(
            action.set_flight_mode(FlightMode::Hold).await,
            Err(Error::Timeout)
        );
    }

    #[test]
    fn heartbeat_modes_decode_back_to_flight_modes() {
        let custom_mode = |sub: u8| (u32::from(sub) << 24) | (u32::from(PX4_MAIN_MODE_AUTO) << 16);
        let custom = MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED;

        assert_eq!(
            decode_px4_mode(custom, custom_mode(PX4_SUB_MODE_AUTO_MISSION)),
            Some(FlightMode::Mission)
        );
        assert_eq!(
            decode_px4_mode(custom, custom_mode(PX4_SUB_MODE_AUTO_LOITER)),
            Some(FlightMode::Hold)
        );
        assert_eq!(
            decode_px4_mode(custom, custom_mode(PX4_SUB_MODE_AUTO_RTL)),
            Some(FlightMode::ReturnToLaunch)
        );

        // Manual flight carries no custom mode flag
        assert_eq!(decode_px4_mode(MavModeFlag::empty(), 0), None);
        // Stabilized is a main mode this lib does not request
        assert_eq!(decode_px4_mode(custom, 7 << 16), None);
    }
}
