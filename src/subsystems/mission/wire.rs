//! Wire-level mission item model.

use mavlink::common::{MavCmd, MavFrame, MavMissionType, MISSION_ITEM_INT_DATA};

/// One row of the mission as it travels on the wire, mirroring
/// `MISSION_ITEM_INT` without the addressing fields. The seven generic
/// parameters have command-specific meanings.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WireItem {
    pub seq: u16,
    pub frame: MavFrame,
    pub command: MavCmd,
    pub current: u8,
    pub autocontinue: u8,
    pub param1: f32,
    pub param2: f32,
    pub param3: f32,
    pub param4: f32,
    pub x: i32,
    pub y: i32,
    pub z: f32,
    pub mission_type: MavMissionType,
}

impl WireItem {
    pub(crate) fn to_mission_item_int(
        &self,
        target_system: u8,
        target_component: u8,
    ) -> MISSION_ITEM_INT_DATA {
        MISSION_ITEM_INT_DATA {
            target_system,
            target_component,
            seq: self.seq,
            frame: self.frame,
            command: self.command,
            current: self.current,
            autocontinue: self.autocontinue,
            param1: self.param1,
            param2: self.param2,
            param3: self.param3,
            param4: self.param4,
            x: self.x,
            y: self.y,
            z: self.z,
            mission_type: self.mission_type,
        }
    }

    pub(crate) fn from_mission_item_int(data: &MISSION_ITEM_INT_DATA) -> Self {
        Self {
            seq: data.seq,
            frame: data.frame,
            command: data.command,
            current: data.current,
            autocontinue: data.autocontinue,
            param1: data.param1,
            param2: data.param2,
            param3: data.param3,
            param4: data.param4,
            x: data.x,
            y: data.y,
            z: data.z,
            mission_type: data.mission_type,
        }
    }
}
