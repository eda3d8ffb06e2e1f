//! Various MAVLink plumbing utils used by the lib
//!
//! These functionalities are currently all private, some might be useful for the user code as well, lets make them
//! public when needed.

use crate::drone::SystemInfo;
use crate::{Error, Result};
use async_trait::async_trait;
use flume as channel;
use flume::{Receiver, Sender};
use log::{debug, warn};
use mavlink::common::{MavMessage, MavProtocolCapability};
use mavlink::{MavConnection, MavHeader, Message};
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// MAVLink autopilot component id, the source of the messages we care about.
const AUTOPILOT_COMPONENT_ID: u8 = 1;

pub(crate) type MavFrameRx = Receiver<(MavHeader, MavMessage)>;

/// Dispatches incoming MAVLink messages to per-subsystem channels, keyed by
/// message id. Plays the role of the message-handler registry: a subsystem
/// claims the message ids it consumes before the dispatcher is started.
pub(crate) struct MavDispatch {
    connection: Arc<Box<dyn MavConnection<MavMessage> + Send + Sync>>,
    message_channels: BTreeMap<u32, Sender<(MavHeader, MavMessage)>>,
    info: Arc<SystemInfo>,
    disconnect: Arc<AtomicBool>,
}

impl MavDispatch {
    pub(crate) fn new(
        connection: Arc<Box<dyn MavConnection<MavMessage> + Send + Sync>>,
        info: Arc<SystemInfo>,
        disconnect: Arc<AtomicBool>,
    ) -> Self {
        MavDispatch {
            connection,
            message_channels: BTreeMap::new(),
            info,
            disconnect,
        }
    }

    /// Claim a set of message ids. All messages with one of these ids will be
    /// sent to the returned channel. Returns `None` if any of the ids has
    /// already been claimed.
    pub(crate) fn get_message_receiver(&mut self, message_ids: &[u32]) -> Option<MavFrameRx> {
        if message_ids
            .iter()
            .any(|id| self.message_channels.contains_key(id))
        {
            None
        } else {
            let (tx, rx) = channel::unbounded();
            for id in message_ids {
                self.message_channels.insert(*id, tx.clone());
            }
            Some(rx)
        }
    }

    pub(crate) fn run(self) -> JoinHandle<()> {
        tokio::task::spawn_blocking(move || {
            while !self.disconnect.load(Relaxed) {
                match self.connection.recv() {
                    Ok((header, message)) => {
                        self.update_system_info(&header, &message);

                        if let Some(tx) = self.message_channels.get(&message.message_id()) {
                            let _ = tx.send((header, message));
                        }
                    }
                    Err(mavlink::error::MessageReadError::Io(e))
                        if e.kind() == std::io::ErrorKind::WouldBlock
                            || e.kind() == std::io::ErrorKind::TimedOut =>
                    {
                        continue;
                    }
                    Err(mavlink::error::MessageReadError::Parse(e)) => {
                        debug!("Dropping unparseable MAVLink frame: {:?}", e);
                        continue;
                    }
                    Err(e) => {
                        warn!("MAVLink receive failed, stopping dispatcher: {:?}", e);
                        return;
                    }
                }
            }
        })
    }

    /// The vehicle addressing and capabilities are learned passively from
    /// the traffic rather than configured.
    fn update_system_info(&self, header: &MavHeader, message: &MavMessage) {
        match message {
            MavMessage::HEARTBEAT(_) if header.component_id == AUTOPILOT_COMPONENT_ID => {
                self.info.record_vehicle(header.system_id, header.component_id);
            }
            MavMessage::AUTOPILOT_VERSION(version) => {
                let mission_int = version
                    .capabilities
                    .contains(MavProtocolCapability::MAV_PROTOCOL_CAPABILITY_MISSION_INT);
                self.info.record_mission_int_support(mission_int);
            }
            _ => {}
        }
    }
}

#[async_trait]
pub(crate) trait WaitForMessage {
    /// Wait for the next incoming message matching the predicate, skipping
    /// everything else.
    async fn wait_message<F>(&self, predicate: F) -> Result<(MavHeader, MavMessage)>
    where
        F: Fn(&MavMessage) -> bool + Send;
}

#[async_trait]
impl WaitForMessage for MavFrameRx {
    async fn wait_message<F>(&self, predicate: F) -> Result<(MavHeader, MavMessage)>
    where
        F: Fn(&MavMessage) -> bool + Send,
    {
        loop {
            let (header, message) = self
                .recv_async()
                .await
                .ok()
                .ok_or(Error::Disconnected)?;

            if predicate(&message) {
                return Ok((header, message));
            }
        }
    }
}
