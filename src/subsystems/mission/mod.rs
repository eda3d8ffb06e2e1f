//! # Mission subsystem
//!
//! This subsystem manages flight missions: ordered lists of waypoints with
//! attached actions (speed changes, gimbal pose, loiter, camera control). It
//! allows to upload a mission to the vehicle, download the mission currently
//! held by the vehicle, start and pause the execution, select the active
//! mission item and observe execution progress.
//!
//! On the wire a mission travels as a flat sequence of `MISSION_ITEM_INT`
//! rows exchanged with the micro-protocol below. The subsystem translates
//! between that representation and [MissionItem] in both directions: one
//! mission item may expand to several wire items, so the subsystem also
//! keeps the mapping between both index spaces for progress reporting.
//!
//! ## Mission upload (us → autopilot)
//!
//! 1. We send MISSION_COUNT with the number of wire items
//! 2. Autopilot requests each item with MISSION_REQUEST_INT
//! 3. We answer each request with the MISSION_ITEM_INT
//! 4. Autopilot sends MISSION_ACK with the result
//!
//! ## Mission download (autopilot → us)
//!
//! 1. We send MISSION_REQUEST_LIST
//! 2. Autopilot answers with MISSION_COUNT
//! 3. We request each item with MISSION_REQUEST_INT
//! 4. Autopilot answers each request with the MISSION_ITEM_INT
//! 5. We send MISSION_ACK
//!
//! Lost messages are handled with timeouts: item requests during a download
//! are retried a few times, an upload as a whole is covered by one longer
//! timeout since the autopilot is the one pulling the items.
//!
//! Only one mission operation can be in flight at a time; starting a second
//! one fails immediately with [Error::Busy].

mod item;
mod lowering;
mod plan;
mod progress;
mod raising;
mod wire;

pub use item::{CameraAction, MissionItem};
pub use progress::MissionProgress;

use crate::drone::{SystemInfo, GCS_COMPONENT_ID, GCS_SYSTEM_ID};
use crate::mav_utils::MavFrameRx;
use crate::subsystems::action::{Action, FlightMode};
use crate::timeout::{TimeoutCookie, Timeouts};
use crate::{Error, Result};
use flume::Sender;
use futures::channel::oneshot;
use futures::lock::Mutex;
use futures::Stream;
use log::{debug, info, warn};
use lowering::lower;
use mavlink::common::{
    MavMessage, MavMissionResult, MavMissionType, MISSION_ACK_DATA, MISSION_COUNT_DATA,
    MISSION_CURRENT_DATA, MISSION_ITEM_INT_DATA, MISSION_ITEM_REACHED_DATA, MISSION_REQUEST_DATA,
    MISSION_REQUEST_INT_DATA, MISSION_REQUEST_LIST_DATA, MISSION_SET_CURRENT_DATA,
};
use mavlink::{MavHeader, Message};
use progress::ProgressTracker;
use raising::raise;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use wire::WireItem;

/// Timeout of a single request/answer cycle, retried a few times.
const RETRY_TIMEOUT: Duration = Duration::from_millis(250);
/// Timeout of a whole upload. The autopilot pulls the items at its own pace
/// so this one is longer and not retried.
const PROCESS_TIMEOUT: Duration = Duration::from_millis(1500);
/// How often a lost item request is retried before giving up.
const MAX_RETRIES: u16 = 3;

/// The one operation the engine is currently driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activity {
    None,
    SetMission,
    GetMission,
    SetCurrent,
    SendCommand,
}

/// Completion channel of the operation in flight.
enum PendingRequest {
    Result(oneshot::Sender<Result<()>>),
    Items(oneshot::Sender<Result<Vec<MissionItem>>>),
}

impl PendingRequest {
    fn complete(self, result: Result<()>) {
        match self {
            PendingRequest::Result(tx) => {
                let _ = tx.send(result);
            }
            PendingRequest::Items(tx) => {
                let _ = tx.send(result.map(|()| Vec::new()));
            }
        }
    }

    fn complete_items(self, result: Result<Vec<MissionItem>>) {
        match self {
            PendingRequest::Result(tx) => {
                let _ = tx.send(result.map(|_| ()));
            }
            PendingRequest::Items(tx) => {
                let _ = tx.send(result);
            }
        }
    }
}

struct EngineState {
    activity: Activity,
    /// The mission as the application knows it: set by the last upload or
    /// the last successful download.
    items: Vec<MissionItem>,
    /// The lowered mission of the last upload, also used to translate
    /// progress reports.
    wire_items: Vec<WireItem>,
    /// Wire sequence number to mission item index.
    index_map: BTreeMap<u16, usize>,
    download_buffer: Vec<WireItem>,
    expected_next_seq: u16,
    total_to_download: u16,
    retries: u16,
    timeout_cookie: Option<TimeoutCookie>,
    /// Wire sequence number a SetCurrent operation is waiting to see.
    target_current_seq: u16,
    progress: ProgressTracker,
    pending: Option<PendingRequest>,
}

impl EngineState {
    fn new() -> Self {
        Self {
            activity: Activity::None,
            items: Vec::new(),
            wire_items: Vec::new(),
            index_map: BTreeMap::new(),
            download_buffer: Vec::new(),
            expected_next_seq: 0,
            total_to_download: 0,
            retries: 0,
            timeout_cookie: None,
            target_current_seq: 0,
            progress: ProgressTracker::new(),
            pending: None,
        }
    }
}

/// External events serialized into the engine task.
enum Event {
    Message(MavHeader, MavMessage),
    Timeout(TimeoutCookie),
}

struct Engine {
    state: Mutex<EngineState>,
    uplink: Sender<MavMessage>,
    timeouts: Arc<Timeouts>,
    info: Arc<SystemInfo>,
    action: Action,
    progress_sender: async_broadcast::Sender<MissionProgress>,
    progress_receiver: async_broadcast::Receiver<MissionProgress>,
}

/// # Access to the vehicle mission subsystem
///
/// See the [mission module documentation](crate::subsystems::mission) for
/// more context and information.
#[derive(Clone)]
pub struct Mission {
    engine: Arc<Engine>,
}

impl Mission {
    pub(crate) fn new(
        downlink: MavFrameRx,
        uplink: Sender<MavMessage>,
        action: Action,
        info: Arc<SystemInfo>,
    ) -> Self {
        let (event_tx, event_rx) = flume::unbounded();

        let (fired_tx, fired_rx) = flume::unbounded();
        let timeouts = Timeouts::new(fired_tx);

        let (mut progress_sender, progress_receiver) = async_broadcast::broadcast(64);
        // Slow subscribers lose old updates instead of blocking the engine
        progress_sender.set_overflow(true);

        let engine = Arc::new(Engine {
            state: Mutex::new(EngineState::new()),
            uplink,
            timeouts,
            info,
            action,
            progress_sender,
            progress_receiver,
        });

        // Feed incoming mission messages into the engine event queue
        let message_events = event_tx.clone();
        tokio::spawn(async move {
            while let Ok((header, message)) = downlink.recv_async().await {
                if message_events
                    .send_async(Event::Message(header, message))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        // Feed expired timeouts into the same queue
        let timeout_events = event_tx;
        let fired = fired_rx;
        tokio::spawn(async move {
            while let Ok(cookie) = fired.recv_async().await {
                if timeout_events
                    .send_async(Event::Timeout(cookie))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        // The engine task: the single consumer of all external events
        let task_engine = engine.clone();
        tokio::spawn(async move {
            while let Ok(event) = event_rx.recv_async().await {
                match event {
                    Event::Message(_, message) => task_engine.handle_message(message).await,
                    Event::Timeout(cookie) => task_engine.handle_timeout(cookie).await,
                }
            }
        });

        Self { engine }
    }

    /// Upload a mission to the vehicle.
    ///
    /// The mission items are lowered to their wire representation and the
    /// autopilot pulls them one by one. The returned future completes when
    /// the autopilot acknowledges the whole mission (or the handshake
    /// fails).
    pub async fn upload_mission(&self, items: Vec<MissionItem>) -> Result<()> {
        let completion = {
            let mut state = self.engine.state.lock().await;

            if state.activity != Activity::None {
                return Err(Error::Busy);
            }

            if !self.engine.info.supports_mission_int() {
                warn!("Mission int messages not supported by the vehicle");
                return Err(Error::ProtocolError(
                    "Vehicle does not support mission int messages".to_owned(),
                ));
            }

            let lowered = lower(&items);
            state.items = items;
            state.wire_items = lowered.wire_items;
            state.index_map = lowered.index_map;

            self.engine.send_message(MavMessage::MISSION_COUNT(MISSION_COUNT_DATA {
                target_system: self.engine.info.vehicle_system_id(),
                target_component: self.engine.info.vehicle_component_id(),
                count: state.wire_items.len() as u16,
                mission_type: MavMissionType::MAV_MISSION_TYPE_MISSION,
                ..Default::default()
            }))?;

            // The autopilot pulls the items up, so the longer timeout
            // covers the whole transfer.
            state.timeout_cookie = Some(self.engine.timeouts.register(PROCESS_TIMEOUT));
            state.activity = Activity::SetMission;

            let (tx, rx) = oneshot::channel();
            state.pending = Some(PendingRequest::Result(tx));
            rx
        };

        completion.await.unwrap_or(Err(Error::Disconnected))
    }

    /// Download the mission currently held by the vehicle.
    pub async fn download_mission(&self) -> Result<Vec<MissionItem>> {
        let completion = {
            let mut state = self.engine.state.lock().await;

            if state.activity != Activity::None {
                return Err(Error::Busy);
            }

            self.engine
                .send_message(MavMessage::MISSION_REQUEST_LIST(MISSION_REQUEST_LIST_DATA {
                    target_system: self.engine.info.vehicle_system_id(),
                    target_component: self.engine.info.vehicle_component_id(),
                    ..Default::default()
                }))?;

            state.download_buffer.clear();
            state.expected_next_seq = 0;
            state.total_to_download = 0;
            state.retries = 0;
            state.timeout_cookie = Some(self.engine.timeouts.register(RETRY_TIMEOUT));
            state.activity = Activity::GetMission;

            let (tx, rx) = oneshot::channel();
            state.pending = Some(PendingRequest::Items(tx));
            rx
        };

        completion.await.unwrap_or(Err(Error::Disconnected))
    }

    /// Start executing the uploaded mission.
    pub async fn start_mission(&self) -> Result<()> {
        self.run_flight_mode_command(FlightMode::Mission).await
    }

    /// Pause mission execution. The vehicle holds its position; the mission
    /// resumes from the active item with [start_mission](Mission::start_mission).
    pub async fn pause_mission(&self) -> Result<()> {
        self.run_flight_mode_command(FlightMode::Hold).await
    }

    /// Make the given mission item the active one.
    ///
    /// Fails with [Error::InvalidArgument] if the index does not belong to
    /// the uploaded mission.
    pub async fn set_current_mission_item(&self, index: usize) -> Result<()> {
        let completion = {
            let mut state = self.engine.state.lock().await;

            if state.activity != Activity::None {
                return Err(Error::Busy);
            }

            // The smallest wire seq belonging to the requested item.
            let seq = state
                .index_map
                .iter()
                .find(|(_, item_index)| **item_index == index)
                .map(|(seq, _)| *seq);

            let Some(seq) = seq else {
                return Err(Error::InvalidArgument(format!(
                    "No mission item with index {}",
                    index
                )));
            };

            self.engine
                .send_message(MavMessage::MISSION_SET_CURRENT(MISSION_SET_CURRENT_DATA {
                    target_system: self.engine.info.vehicle_system_id(),
                    target_component: self.engine.info.vehicle_component_id(),
                    seq,
                }))?;

            state.target_current_seq = seq;
            state.timeout_cookie = Some(self.engine.timeouts.register(RETRY_TIMEOUT));
            state.activity = Activity::SetCurrent;

            let (tx, rx) = oneshot::channel();
            state.pending = Some(PendingRequest::Result(tx));
            rx
        };

        completion.await.unwrap_or(Err(Error::Disconnected))
    }

    /// Get a stream of mission progress updates.
    ///
    /// An update is delivered whenever the autopilot reports a change of the
    /// active or the last reached mission item.
    pub async fn subscribe_progress(&self) -> impl Stream<Item = MissionProgress> + use<> {
        self.engine.progress_receiver.clone()
    }

    /// Index of the active mission item, -1 when unknown. Equal to
    /// [total_mission_items](Mission::total_mission_items) once the mission
    /// is finished.
    pub async fn current_mission_item(&self) -> i32 {
        let state = self.engine.state.lock().await;
        state
            .progress
            .current_item(&state.index_map, state.items.len(), state.wire_items.len())
    }

    /// Number of items of the current mission.
    pub async fn total_mission_items(&self) -> usize {
        self.engine.state.lock().await.items.len()
    }

    /// Return true once every item of the uploaded mission has been reached.
    pub async fn is_mission_finished(&self) -> bool {
        let state = self.engine.state.lock().await;
        state.progress.is_finished(state.wire_items.len())
    }

    /// Import the mission items of a QGroundControl `.plan` file.
    pub fn import_qgroundcontrol_mission(path: impl AsRef<Path>) -> Result<Vec<MissionItem>> {
        plan::import_qgroundcontrol_mission(path.as_ref())
    }

    /// Tear down whatever operation is in flight.
    ///
    /// The pending operation, if any, completes with [Error::Cancelled] and
    /// progress subscriptions end. Used to wind the subsystem down before
    /// disconnecting.
    pub async fn stop(&self) {
        let pending = {
            let mut state = self.engine.state.lock().await;
            if let Some(cookie) = state.timeout_cookie.take() {
                self.engine.timeouts.unregister(cookie);
            }
            state.activity = Activity::None;
            state.pending.take()
        };

        if let Some(pending) = pending {
            pending.complete(Err(Error::Cancelled));
        }

        self.engine.progress_sender.close();
    }

    async fn run_flight_mode_command(&self, flight_mode: FlightMode) -> Result<()> {
        {
            let mut state = self.engine.state.lock().await;
            if state.activity != Activity::None {
                return Err(Error::Busy);
            }
            state.activity = Activity::SendCommand;
        }

        let result = self.engine.action.set_flight_mode(flight_mode).await;

        {
            let mut state = self.engine.state.lock().await;
            if state.activity == Activity::SendCommand {
                state.activity = Activity::None;
            }
        }

        result.map_err(|_| Error::ProtocolError("Failed to switch flight mode".to_owned()))
    }
}

impl Engine {
    fn send_message(&self, message: MavMessage) -> Result<()> {
        self.uplink.send(message).map_err(|_| Error::Disconnected)
    }

    /// Messages carrying a target that is not us belong to another GCS.
    fn for_us(&self, target_system: u8, target_component: u8) -> bool {
        target_system == GCS_SYSTEM_ID && target_component == GCS_COMPONENT_ID
    }

    fn ack_message(&self, result: MavMissionResult) -> MavMessage {
        MavMessage::MISSION_ACK(MISSION_ACK_DATA {
            target_system: self.info.vehicle_system_id(),
            target_component: self.info.vehicle_component_id(),
            mavtype: result,
            mission_type: MavMissionType::MAV_MISSION_TYPE_MISSION,
            ..Default::default()
        })
    }

    fn request_int_message(&self, seq: u16) -> MavMessage {
        MavMessage::MISSION_REQUEST_INT(MISSION_REQUEST_INT_DATA {
            target_system: self.info.vehicle_system_id(),
            target_component: self.info.vehicle_component_id(),
            seq,
            ..Default::default()
        })
    }

    fn progress_of(&self, state: &EngineState) -> MissionProgress {
        MissionProgress {
            current: state
                .progress
                .current_item(&state.index_map, state.items.len(), state.wire_items.len()),
            total: state.items.len() as i32,
        }
    }

    async fn handle_message(&self, message: MavMessage) {
        match message {
            MavMessage::MISSION_REQUEST(data) => self.process_mission_request(data).await,
            MavMessage::MISSION_REQUEST_INT(data) => self.process_mission_request_int(data).await,
            MavMessage::MISSION_ACK(data) => self.process_mission_ack(data).await,
            MavMessage::MISSION_CURRENT(data) => self.process_mission_current(data).await,
            MavMessage::MISSION_ITEM_REACHED(data) => {
                self.process_mission_item_reached(data).await
            }
            MavMessage::MISSION_COUNT(data) => self.process_mission_count(data).await,
            MavMessage::MISSION_ITEM_INT(data) => self.process_mission_item_int(data).await,
            other => debug!("Ignoring unexpected message {}", other.message_name()),
        }
    }

    /// The peer fell back to the legacy float protocol. We only support the
    /// int variant, so we nack and thus tell the autopilot to use int.
    async fn process_mission_request(&self, data: MISSION_REQUEST_DATA) {
        if !self.for_us(data.target_system, data.target_component) {
            debug!("Ignore mission request that is not for us");
            return;
        }

        let state = self.state.lock().await;

        if state.activity != Activity::SetMission {
            warn!("Ignoring mission request, no upload in progress");
            return;
        }

        let _ = self.send_message(self.ack_message(MavMissionResult::MAV_MISSION_UNSUPPORTED));

        // We're still communicating, the transfer is alive.
        if let Some(cookie) = state.timeout_cookie {
            self.timeouts.refresh(cookie);
        }
    }

    async fn process_mission_request_int(&self, data: MISSION_REQUEST_INT_DATA) {
        if !self.for_us(data.target_system, data.target_component) {
            debug!("Ignore mission request int that is not for us");
            return;
        }

        let state = self.state.lock().await;

        if state.activity != Activity::SetMission {
            warn!("Ignoring mission request int, no upload in progress");
            return;
        }

        match state.wire_items.get(usize::from(data.seq)) {
            Some(wire_item) => {
                debug!("Sending mission item {}", data.seq);
                let _ = self.send_message(MavMessage::MISSION_ITEM_INT(
                    wire_item.to_mission_item_int(
                        self.info.vehicle_system_id(),
                        self.info.vehicle_component_id(),
                    ),
                ));
            }
            None => {
                warn!("Mission item {} requested out of bounds", data.seq);
            }
        }

        if let Some(cookie) = state.timeout_cookie {
            self.timeouts.refresh(cookie);
        }
    }

    async fn process_mission_ack(&self, data: MISSION_ACK_DATA) {
        if !self.for_us(data.target_system, data.target_component) {
            debug!("Ignore mission ack that is not for us");
            return;
        }

        let (pending, result) = {
            let mut state = self.state.lock().await;

            if state.activity != Activity::SetMission {
                warn!("Ignoring unexpected mission ack");
                return;
            }

            // We got an answer, so it wasn't a timeout.
            if let Some(cookie) = state.timeout_cookie.take() {
                self.timeouts.unregister(cookie);
            }

            state.activity = Activity::None;

            let result = match data.mavtype {
                MavMissionResult::MAV_MISSION_ACCEPTED => {
                    // Reset current and reached; we don't want to get
                    // confused by reports about the earlier mission.
                    state.progress.reset();
                    info!("Mission accepted");
                    Ok(())
                }
                MavMissionResult::MAV_MISSION_NO_SPACE => {
                    warn!("Mission upload rejected: too many mission items");
                    Err(Error::TooManyMissionItems)
                }
                other => {
                    warn!("Mission upload failed with ack {:?}", other);
                    Err(Error::ProtocolError(format!(
                        "Unexpected mission ack: {:?}",
                        other
                    )))
                }
            };

            (state.pending.take(), result)
        };

        // Completed outside the lock: the waiting caller may immediately
        // call back into the engine.
        match pending {
            Some(pending) => pending.complete(result),
            None => warn!("Mission ack without a pending operation"),
        }
    }

    async fn process_mission_current(&self, data: MISSION_CURRENT_DATA) {
        let (update, pending) = {
            let mut state = self.state.lock().await;

            let update = state
                .progress
                .record_current(data.seq)
                .then(|| self.progress_of(&state));

            let mut pending = None;
            if state.activity == Activity::SetCurrent && data.seq == state.target_current_seq {
                if let Some(cookie) = state.timeout_cookie.take() {
                    self.timeouts.unregister(cookie);
                }
                state.activity = Activity::None;
                pending = state.pending.take();
            }

            (update, pending)
        };

        if let Some(update) = update {
            let _ = self.progress_sender.try_broadcast(update);
        }

        if let Some(pending) = pending {
            pending.complete(Ok(()));
        }
    }

    async fn process_mission_item_reached(&self, data: MISSION_ITEM_REACHED_DATA) {
        let update = {
            let mut state = self.state.lock().await;
            state
                .progress
                .record_reached(data.seq)
                .then(|| self.progress_of(&state))
        };

        if let Some(update) = update {
            let _ = self.progress_sender.try_broadcast(update);
        }
    }

    async fn process_mission_count(&self, data: MISSION_COUNT_DATA) {
        if !self.for_us(data.target_system, data.target_component) {
            debug!("Ignore mission count that is not for us");
            return;
        }

        let pending = {
            let mut state = self.state.lock().await;

            if state.activity != Activity::GetMission {
                debug!("Ignoring mission count, no download in progress");
                return;
            }

            if data.count == 0 {
                // Nothing to pull. Close the handshake and report.
                if let Some(cookie) = state.timeout_cookie.take() {
                    self.timeouts.unregister(cookie);
                }
                let _ = self.send_message(self.ack_message(MavMissionResult::MAV_MISSION_ACCEPTED));
                state.activity = Activity::None;
                state.pending.take()
            } else {
                state.total_to_download = data.count;
                state.expected_next_seq = 0;
                if let Some(cookie) = state.timeout_cookie {
                    self.timeouts.refresh(cookie);
                }
                debug!("Requesting mission item 0 of {}", data.count);
                let _ = self.send_message(self.request_int_message(0));
                None
            }
        };

        if let Some(pending) = pending {
            pending.complete_items(Err(Error::NoMissionAvailable));
        }
    }

    async fn process_mission_item_int(&self, data: MISSION_ITEM_INT_DATA) {
        if !self.for_us(data.target_system, data.target_component) {
            debug!("Ignore mission item that is not for us");
            return;
        }

        let completion = {
            let mut state = self.state.lock().await;

            if state.activity != Activity::GetMission {
                debug!("Ignoring mission item, no download in progress");
                return;
            }

            if data.seq != state.expected_next_seq {
                debug!(
                    "Received mission item {} instead of {} (ignored)",
                    data.seq, state.expected_next_seq
                );

                // We at least still seem to be talking to a live peer, and
                // our request may have been the lost message.
                if let Some(cookie) = state.timeout_cookie {
                    self.timeouts.refresh(cookie);
                }
                let _ = self.send_message(self.request_int_message(state.expected_next_seq));
                return;
            }

            debug!("Received mission item {}", data.seq);
            state.download_buffer.push(WireItem::from_mission_item_int(&data));
            state.retries = 0;

            if state.expected_next_seq + 1 == state.total_to_download {
                // Wrap things up, we're finished.
                if let Some(cookie) = state.timeout_cookie.take() {
                    self.timeouts.unregister(cookie);
                }

                let _ = self.send_message(self.ack_message(MavMissionResult::MAV_MISSION_ACCEPTED));

                let result = raise(&state.download_buffer);
                if let Ok(items) = &result {
                    state.items = items.clone();
                }

                state.activity = Activity::None;
                state.pending.take().map(|pending| (pending, result))
            } else {
                state.expected_next_seq += 1;
                if let Some(cookie) = state.timeout_cookie {
                    self.timeouts.refresh(cookie);
                }
                let _ = self.send_message(self.request_int_message(state.expected_next_seq));
                None
            }
        };

        if let Some((pending, result)) = completion {
            pending.complete_items(result);
        }
    }

    async fn handle_timeout(&self, cookie: TimeoutCookie) {
        let completion = {
            let mut state = self.state.lock().await;

            if state.timeout_cookie != Some(cookie) {
                debug!("Ignoring stale timeout");
                return;
            }
            state.timeout_cookie = None;

            match state.activity {
                Activity::SetMission => {
                    // No retry here: the autopilot is the one requesting
                    // the items.
                    warn!("Mission handling timed out while uploading mission");
                    state.activity = Activity::None;
                    state.pending.take()
                }
                Activity::GetMission => {
                    if state.retries >= MAX_RETRIES {
                        warn!("Mission handling timed out while downloading mission");
                        state.activity = Activity::None;
                        state.retries = 0;
                        state.pending.take()
                    } else {
                        state.retries += 1;
                        debug!("Retrying mission item request ({})", state.retries);
                        state.timeout_cookie = Some(self.timeouts.register(RETRY_TIMEOUT));
                        let _ =
                            self.send_message(self.request_int_message(state.expected_next_seq));
                        None
                    }
                }
                Activity::SetCurrent => {
                    warn!("Timed out waiting for the mission current confirmation");
                    state.activity = Activity::None;
                    state.pending.take()
                }
                Activity::SendCommand | Activity::None => {
                    debug!("Spurious mission timeout");
                    None
                }
            }
        };

        if let Some(pending) = completion {
            pending.complete(Err(Error::Timeout));
        }
    }
}
