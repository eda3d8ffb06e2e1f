//! Lowering of mission items to wire items.
//!
//! One application-level mission item can expand into several wire items:
//! the waypoint itself plus one item per attached action (speed change,
//! gimbal pose, loiter, camera). The emit order decides what a strict
//! autopilot executes, so it is fixed: waypoint, speed, gimbal, loiter,
//! camera.

use super::item::{CameraAction, MissionItem};
use super::wire::WireItem;
use log::warn;
use mavlink::common::{MavCmd, MavFrame, MavMissionType, MavMountMode};
use std::collections::BTreeMap;

/// Waypoint acceptance radius sent when the vehicle should stop at the
/// waypoint. The raising side only cares about the sign: a positive value
/// means "stop", zero means "fly through".
const ACCEPTANCE_RADIUS_M: f32 = 1.0;

/// A lowered mission: the flat wire item sequence plus the map from wire
/// sequence numbers back to the mission item each wire item came from.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct LoweredMission {
    pub wire_items: Vec<WireItem>,
    pub index_map: BTreeMap<u16, usize>,
}

impl LoweredMission {
    fn push(&mut self, item_index: usize, mut wire_item: WireItem) {
        let seq = self.wire_items.len() as u16;
        wire_item.seq = seq;
        // Current is the 0th wire item
        wire_item.current = u8::from(seq == 0);
        self.index_map.insert(seq, item_index);
        self.wire_items.push(wire_item);
    }
}

fn wire_item(command: MavCmd, frame: MavFrame) -> WireItem {
    WireItem {
        seq: 0,
        frame,
        command,
        current: 0,
        autocontinue: 1,
        param1: f32::NAN,
        param2: f32::NAN,
        param3: f32::NAN,
        param4: f32::NAN,
        x: 0,
        y: 0,
        z: f32::NAN,
        mission_type: MavMissionType::MAV_MISSION_TYPE_MISSION,
    }
}

/// Expand a mission into its wire representation.
pub(crate) fn lower(items: &[MissionItem]) -> LoweredMission {
    let mut lowered = LoweredMission::default();

    // Last emitted waypoint position, to give a loiter item valid x/y.
    let mut last_position: Option<(MavFrame, i32, i32, f32)> = None;

    for (item_index, item) in items.iter().enumerate() {
        if item.position_finite() {
            let frame = MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT;
            let x = (item.latitude_deg.unwrap() * 1e7).round() as i32;
            let y = (item.longitude_deg.unwrap() * 1e7).round() as i32;
            let z = item.relative_altitude_m.unwrap_or(f32::NAN);

            lowered.push(
                item_index,
                WireItem {
                    // param1 > 0 makes the autopilot stop at the waypoint
                    param1: if item.fly_through { 0.0 } else { ACCEPTANCE_RADIUS_M },
                    param2: 0.0,
                    param3: 0.0,
                    x,
                    y,
                    z,
                    ..wire_item(MavCmd::MAV_CMD_NAV_WAYPOINT, frame)
                },
            );

            last_position = Some((frame, x, y, z));
        }

        if item.speed_m_s.is_some_and(f32::is_finite) {
            lowered.push(
                item_index,
                WireItem {
                    param1: 1.0,  // ground speed
                    param2: item.speed_m_s.unwrap(),
                    param3: -1.0, // no throttle change
                    param4: 0.0,  // absolute
                    ..wire_item(
                        MavCmd::MAV_CMD_DO_CHANGE_SPEED,
                        MavFrame::MAV_FRAME_MISSION,
                    )
                },
            );
        }

        if item.gimbal_pitch_deg.is_some_and(f32::is_finite)
            || item.gimbal_yaw_deg.is_some_and(f32::is_finite)
        {
            lowered.push(
                item_index,
                WireItem {
                    param1: item.gimbal_pitch_deg.unwrap_or(f32::NAN),
                    param2: 0.0, // roll (yes it is a weird order)
                    param3: item.gimbal_yaw_deg.unwrap_or(f32::NAN),
                    z: MavMountMode::MAV_MOUNT_MODE_MAVLINK_TARGETING as i32 as f32,
                    ..wire_item(
                        MavCmd::MAV_CMD_DO_MOUNT_CONTROL,
                        MavFrame::MAV_FRAME_MISSION,
                    )
                },
            );
        }

        if let Some(loiter_time_s) = item.loiter_time_s {
            // A loiter is flown at a position, so it can only follow a
            // waypoint emitted earlier in this pass.
            match last_position {
                None => {
                    warn!("Dropping loiter time without a previous position");
                }
                Some((frame, x, y, z)) => {
                    lowered.push(
                        item_index,
                        WireItem {
                            param1: loiter_time_s,
                            param3: 0.0, // radius around the waypoint
                            param4: 0.0, // loiter at the center
                            x,
                            y,
                            z,
                            ..wire_item(MavCmd::MAV_CMD_NAV_LOITER_TIME, frame)
                        },
                    );
                }
            }
        }

        if item.camera_action != CameraAction::None {
            let interval_s = item.camera_photo_interval_s.unwrap_or(1.0) as f32;

            let (command, param1, param2, param3) = match item.camera_action {
                // param1 is the camera id, 0 meaning all cameras
                CameraAction::TakePhoto => {
                    (MavCmd::MAV_CMD_IMAGE_START_CAPTURE, 0.0, 0.0, 1.0)
                }
                CameraAction::StartPhotoInterval => {
                    (MavCmd::MAV_CMD_IMAGE_START_CAPTURE, 0.0, interval_s, 0.0)
                }
                CameraAction::StopPhotoInterval => {
                    (MavCmd::MAV_CMD_IMAGE_STOP_CAPTURE, 0.0, f32::NAN, f32::NAN)
                }
                CameraAction::StartVideo => {
                    (MavCmd::MAV_CMD_VIDEO_START_CAPTURE, 0.0, f32::NAN, f32::NAN)
                }
                CameraAction::StopVideo => {
                    (MavCmd::MAV_CMD_VIDEO_STOP_CAPTURE, 0.0, f32::NAN, f32::NAN)
                }
                CameraAction::None => unreachable!(),
            };

            lowered.push(
                item_index,
                WireItem {
                    param1,
                    param2,
                    param3,
                    ..wire_item(command, MavFrame::MAV_FRAME_MISSION)
                },
            );
        }
    }

    lowered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_waypoint_with_all_actions_expands_in_order() {
        let items = vec![MissionItem::new()
            .with_position(47.398170, 8.545649)
            .with_relative_altitude(20.0)
            .with_speed(5.0)
            .with_gimbal(-30.0, 90.0)
            .with_camera_action(CameraAction::TakePhoto)];

        let lowered = lower(&items);

        let commands: Vec<MavCmd> = lowered.wire_items.iter().map(|w| w.command).collect();
        assert_eq!(
            commands,
            vec![
                MavCmd::MAV_CMD_NAV_WAYPOINT,
                MavCmd::MAV_CMD_DO_CHANGE_SPEED,
                MavCmd::MAV_CMD_DO_MOUNT_CONTROL,
                MavCmd::MAV_CMD_IMAGE_START_CAPTURE,
            ]
        );

        // Every wire item maps back to the single mission item
        assert_eq!(
            lowered.index_map,
            BTreeMap::from([(0, 0), (1, 0), (2, 0), (3, 0)])
        );

        // Only the first wire item is marked current
        let currents: Vec<u8> = lowered.wire_items.iter().map(|w| w.current).collect();
        assert_eq!(currents, vec![1, 0, 0, 0]);

        // Sequence numbers are consecutive
        let seqs: Vec<u16> = lowered.wire_items.iter().map(|w| w.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
    }

    #[test]
    fn waypoint_encoding() {
        let items = vec![MissionItem::new()
            .with_position(41.848695, 75.132751)
            .with_relative_altitude(50.3)];

        let lowered = lower(&items);

        assert_eq!(lowered.wire_items.len(), 1);
        let wp = &lowered.wire_items[0];
        assert_eq!(wp.frame, MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT);
        assert_eq!(wp.x, 418486950);
        assert_eq!(wp.y, 751327510);
        assert!((wp.z - 50.3).abs() < 1e-5);
        assert_eq!(wp.autocontinue, 1);
        // Not fly-through: the vehicle must stop at the waypoint
        assert!(wp.param1 > 0.0);
    }

    #[test]
    fn fly_through_is_encoded_in_param1() {
        let items = vec![MissionItem::new()
            .with_position(1.0, 2.0)
            .with_fly_through(true)];

        let lowered = lower(&items);
        assert_eq!(lowered.wire_items[0].param1, 0.0);
    }

    #[test]
    fn loiter_reuses_the_last_waypoint_position() {
        let items = vec![
            MissionItem::new()
                .with_position(47.0, 8.0)
                .with_relative_altitude(10.0),
            MissionItem::new()
                .with_position(47.1, 8.1)
                .with_relative_altitude(20.0)
                .with_loiter_time(10.0),
        ];

        let lowered = lower(&items);

        assert_eq!(lowered.wire_items.len(), 3);
        let waypoint_b = &lowered.wire_items[1];
        let loiter = &lowered.wire_items[2];
        assert_eq!(loiter.command, MavCmd::MAV_CMD_NAV_LOITER_TIME);
        assert_eq!(loiter.param1, 10.0);
        assert_eq!(
            (loiter.frame, loiter.x, loiter.y, loiter.z),
            (waypoint_b.frame, waypoint_b.x, waypoint_b.y, waypoint_b.z)
        );
        assert_eq!(lowered.index_map, BTreeMap::from([(0, 0), (1, 1), (2, 1)]));
    }

    #[test]
    fn loiter_without_any_position_is_dropped() {
        let items = vec![MissionItem::new().with_loiter_time(5.0)];

        let lowered = lower(&items);
        assert!(lowered.wire_items.is_empty());
        assert!(lowered.index_map.is_empty());
    }

    #[test]
    fn photo_interval_encoding() {
        let items = vec![MissionItem::new()
            .with_position(1.0, 2.0)
            .with_camera_action(CameraAction::StartPhotoInterval)
            .with_camera_photo_interval(2.5)];

        let lowered = lower(&items);
        let camera = &lowered.wire_items[1];
        assert_eq!(camera.command, MavCmd::MAV_CMD_IMAGE_START_CAPTURE);
        assert_eq!(camera.param2, 2.5);
        assert_eq!(camera.param3, 0.0);
    }
}
