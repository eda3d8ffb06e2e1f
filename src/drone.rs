use crate::mav_utils::MavDispatch;
use crate::subsystems::action::Action;
use crate::subsystems::mission::Mission;
use crate::subsystems::telemetry::Telemetry;

use crate::{Error, Result};
use flume as channel;
use futures::lock::Mutex;
use log::warn;
use mavlink::common::{COMMAND_LONG_DATA, MavCmd, MavMessage};
use mavlink::{MavConnection, MavHeader};
use std::sync::atomic::Ordering::Relaxed;
use std::sync::atomic::{AtomicBool, AtomicU8};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

// MAVLink message ids
pub(crate) const HEARTBEAT_ID: u32 = 0;
pub(crate) const SYS_STATUS_ID: u32 = 1;
pub(crate) const GLOBAL_POSITION_INT_ID: u32 = 33;
pub(crate) const MISSION_REQUEST_ID: u32 = 40;
pub(crate) const MISSION_CURRENT_ID: u32 = 42;
pub(crate) const MISSION_COUNT_ID: u32 = 44;
pub(crate) const MISSION_ITEM_REACHED_ID: u32 = 46;
pub(crate) const MISSION_ACK_ID: u32 = 47;
pub(crate) const MISSION_REQUEST_INT_ID: u32 = 51;
pub(crate) const MISSION_ITEM_INT_ID: u32 = 73;
pub(crate) const COMMAND_ACK_ID: u32 = 77;

/// System id used by this ground station as the source of all sent messages.
pub(crate) const GCS_SYSTEM_ID: u8 = 245;
/// Component id used by this ground station (MAV_COMP_ID_MISSIONPLANNER).
pub(crate) const GCS_COMPONENT_ID: u8 = 190;

/// Vehicle addressing and capabilities, learned passively from the traffic.
///
/// The vehicle ids default to 1/1 (the conventional autopilot addressing)
/// until the first autopilot heartbeat is seen. Mission-int support is
/// assumed until an AUTOPILOT_VERSION message says otherwise.
#[derive(Debug)]
pub(crate) struct SystemInfo {
    system_id: AtomicU8,
    component_id: AtomicU8,
    mission_int_supported: AtomicBool,
}

impl SystemInfo {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            system_id: AtomicU8::new(1),
            component_id: AtomicU8::new(1),
            mission_int_supported: AtomicBool::new(true),
        })
    }

    pub(crate) fn record_vehicle(&self, system_id: u8, component_id: u8) {
        self.system_id.store(system_id, Relaxed);
        self.component_id.store(component_id, Relaxed);
    }

    pub(crate) fn record_mission_int_support(&self, supported: bool) {
        self.mission_int_supported.store(supported, Relaxed);
    }

    pub(crate) fn vehicle_system_id(&self) -> u8 {
        self.system_id.load(Relaxed)
    }

    pub(crate) fn vehicle_component_id(&self) -> u8 {
        self.component_id.load(Relaxed)
    }

    pub(crate) fn supports_mission_int(&self) -> bool {
        self.mission_int_supported.load(Relaxed)
    }
}

/// # The Drone
///
/// This struct is one-time use: creating it will connect to a vehicle and
/// once disconnected, either as requested by the lib user or as a result of a
/// link loss, the object cannot be reconnected. A new one needs to be created
/// to connect again.
///
/// See the [crate root documentation](crate) for more context and information.
pub struct Drone {
    /// Mission subsystem access
    pub mission: Mission,
    /// Flight mode and command access
    pub action: Action,
    /// Telemetry subsystem access
    pub telemetry: Telemetry,
    uplink_task: Mutex<Option<JoinHandle<()>>>,
    dispatch_task: Mutex<Option<JoinHandle<()>>>,
    disconnect: Arc<AtomicBool>,
}

impl Drone {
    /// Open a connection to a vehicle at the given MAVLink address
    ///
    /// The address uses the `mavlink` crate connection string format, for
    /// example `"udpin:0.0.0.0:14540"` or `"tcpout:192.168.1.12:5760"`.
    ///
    /// An error is returned if the link cannot be opened.
    pub async fn connect(address: &str) -> Result<Self> {
        let address = address.to_owned();
        let connection = tokio::task::spawn_blocking(move || {
            mavlink::connect::<MavMessage>(&address)
        })
        .await
        .map_err(|e| Error::LinkError(format!("{:?}", e)))??;

        Self::from_connection(connection)
    }

    /// Connect a Drone using an already opened MAVLink connection
    pub fn from_connection(
        mut connection: Box<dyn MavConnection<MavMessage> + Send + Sync>,
    ) -> Result<Self> {
        connection.set_protocol_version(mavlink::MavlinkVersion::V2);
        let connection = Arc::new(connection);

        let disconnect = Arc::new(AtomicBool::new(false));
        let info = SystemInfo::new();

        // Downlink dispatcher
        let mut dispatcher = MavDispatch::new(connection.clone(), info.clone(), disconnect.clone());

        // Uplink queue
        let (uplink, rx) = channel::unbounded::<MavMessage>();
        let disconnect_uplink = disconnect.clone();
        let connection_uplink = connection.clone();
        let uplink_task = tokio::task::spawn_blocking(move || {
            let mut sequence: u8 = 0;
            while !disconnect_uplink.load(Relaxed) {
                match rx.recv_timeout(Duration::from_millis(100)) {
                    Ok(message) => {
                        let header = MavHeader {
                            system_id: GCS_SYSTEM_ID,
                            component_id: GCS_COMPONENT_ID,
                            sequence,
                        };
                        sequence = sequence.wrapping_add(1);
                        if let Err(e) = connection_uplink.send(&header, &message) {
                            warn!("MAVLink send failed, stopping uplink: {:?}", e);
                            return;
                        }
                    }
                    Err(channel::RecvTimeoutError::Timeout) => (),
                    Err(channel::RecvTimeoutError::Disconnected) => return,
                }
            }
        });

        // Downlink dispatch
        // The get_message_receiver calls are guaranteed to work as long as
        // no message id is claimed twice.
        let mission_downlink = dispatcher
            .get_message_receiver(&[
                MISSION_REQUEST_ID,
                MISSION_CURRENT_ID,
                MISSION_COUNT_ID,
                MISSION_ITEM_REACHED_ID,
                MISSION_ACK_ID,
                MISSION_REQUEST_INT_ID,
                MISSION_ITEM_INT_ID,
            ])
            .unwrap();
        let action_downlink = dispatcher.get_message_receiver(&[COMMAND_ACK_ID]).unwrap();
        let telemetry_downlink = dispatcher
            .get_message_receiver(&[HEARTBEAT_ID, SYS_STATUS_ID, GLOBAL_POSITION_INT_ID])
            .unwrap();

        // Start the downlink message dispatcher
        let dispatch_task = dispatcher.run();

        // Create subsystems. The action subsystem doubles as the flight mode
        // collaborator of the mission engine.
        let action = Action::new(uplink.clone(), action_downlink, info.clone());
        let mission = Mission::new(mission_downlink, uplink.clone(), action.clone(), info.clone());
        let telemetry = Telemetry::new(telemetry_downlink);

        // Ask for the autopilot capabilities so that mission-int support is
        // known before the first upload. The answer is picked up by the
        // dispatcher, no need to wait for it here.
        let _ = uplink.send(request_capabilities_message(&info));

        Ok(Drone {
            mission,
            action,
            telemetry,
            uplink_task: Mutex::new(Some(uplink_task)),
            dispatch_task: Mutex::new(Some(dispatch_task)),
            disconnect,
        })
    }

    /// Disconnect the Drone
    ///
    /// The connection can be ended in two ways: either by dropping the
    /// [Drone] object or by calling this disconnect() function. Once this
    /// function returns, the vehicle is fully disconnected.
    ///
    /// Once disconnected, any method that uses the communication to the
    /// vehicle will return the error [Error::Disconnected].
    pub async fn disconnect(&self) {
        // Set disconnect to true, will make both uplink and dispatcher task quit
        self.disconnect.store(true, Relaxed);

        self.mission.stop().await;

        // Wait for both tasks to finish
        if let Some(uplink_task) = self.uplink_task.lock().await.take() {
            let _ = uplink_task.await;
        }
        if let Some(dispatch_task) = self.dispatch_task.lock().await.take() {
            let _ = dispatch_task.await;
        }
    }
}

impl Drop for Drone {
    fn drop(&mut self) {
        self.disconnect.store(true, Relaxed);
    }
}

// MAV_CMD_REQUEST_AUTOPILOT_CAPABILITIES is deprecated in favour of
// MAV_CMD_REQUEST_MESSAGE but remains what autopilots actually answer to.
#[allow(deprecated)]
fn request_capabilities_message(info: &SystemInfo) -> MavMessage {
    MavMessage::COMMAND_LONG(COMMAND_LONG_DATA {
        param1: 1.0,
        param2: 0.0,
        param3: 0.0,
        param4: 0.0,
        param5: 0.0,
        param6: 0.0,
        param7: 0.0,
        command: MavCmd::MAV_CMD_REQUEST_AUTOPILOT_CAPABILITIES,
        target_system: info.vehicle_system_id(),
        target_component: info.vehicle_component_id(),
        confirmation: 0,
    })
}
