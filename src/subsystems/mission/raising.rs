//! Raising of wire items back to mission items.
//!
//! The inverse of lowering: walks the flat wire item sequence and folds
//! auxiliary commands onto the waypoint they follow. The command set is
//! matched exhaustively so that anything this library cannot express is
//! reported instead of silently skipped.

use super::item::{CameraAction, MissionItem};
use super::wire::WireItem;
use crate::{Error, Result};
use mavlink::common::{MavCmd, MavFrame, MavMountMode};

fn finite(value: f32) -> Option<f32> {
    value.is_finite().then_some(value)
}

/// Fold a downloaded wire item sequence into mission items.
pub(crate) fn raise(wire_items: &[WireItem]) -> Result<Vec<MissionItem>> {
    if wire_items.is_empty() {
        return Err(Error::NoMissionAvailable);
    }

    // The first wire item needs to be a waypoint with a position.
    if wire_items[0].command != MavCmd::MAV_CMD_NAV_WAYPOINT {
        return Err(Error::Unsupported);
    }

    let mut items = Vec::new();
    let mut current_item = MissionItem::new();
    let mut have_position = false;

    for wire_item in wire_items {
        match wire_item.command {
            MavCmd::MAV_CMD_NAV_WAYPOINT => {
                if wire_item.frame != MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT {
                    return Err(Error::Unsupported);
                }

                if have_position {
                    // A new position starts the next mission item.
                    items.push(std::mem::take(&mut current_item));
                }

                current_item.latitude_deg = Some(f64::from(wire_item.x) * 1e-7);
                current_item.longitude_deg = Some(f64::from(wire_item.y) * 1e-7);
                current_item.relative_altitude_m = finite(wire_item.z);
                current_item.fly_through = !(wire_item.param1 > 0.0);
                have_position = true;
            }

            MavCmd::MAV_CMD_DO_MOUNT_CONTROL => {
                if wire_item.z as i32 != MavMountMode::MAV_MOUNT_MODE_MAVLINK_TARGETING as i32 {
                    return Err(Error::Unsupported);
                }

                current_item.gimbal_pitch_deg = finite(wire_item.param1);
                current_item.gimbal_yaw_deg = finite(wire_item.param3);
            }

            MavCmd::MAV_CMD_IMAGE_START_CAPTURE => {
                if wire_item.param2 > 0.0 && wire_item.param3 as i32 == 0 {
                    current_item.camera_action = CameraAction::StartPhotoInterval;
                    current_item.camera_photo_interval_s = Some(f64::from(wire_item.param2));
                } else if wire_item.param2 as i32 == 0 && wire_item.param3 as i32 == 1 {
                    current_item.camera_action = CameraAction::TakePhoto;
                } else {
                    return Err(Error::Unsupported);
                }
            }

            MavCmd::MAV_CMD_IMAGE_STOP_CAPTURE => {
                current_item.camera_action = CameraAction::StopPhotoInterval;
            }

            MavCmd::MAV_CMD_VIDEO_START_CAPTURE => {
                current_item.camera_action = CameraAction::StartVideo;
            }

            MavCmd::MAV_CMD_VIDEO_STOP_CAPTURE => {
                current_item.camera_action = CameraAction::StopVideo;
            }

            MavCmd::MAV_CMD_DO_CHANGE_SPEED => {
                let is_ground_speed = wire_item.param1 as i32 == 1;
                let no_throttle_change = wire_item.param3 < 0.0;
                let is_absolute = wire_item.param4 as i32 == 0;

                if is_ground_speed && no_throttle_change && is_absolute {
                    current_item.speed_m_s = Some(wire_item.param2);
                } else {
                    return Err(Error::Unsupported);
                }
            }

            MavCmd::MAV_CMD_NAV_LOITER_TIME => {
                current_item.loiter_time_s = Some(wire_item.param1);
            }

            _ => {
                return Err(Error::Unsupported);
            }
        }
    }

    // The last item may carry only terminal actions, push it unconditionally.
    items.push(current_item);

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::super::lowering::lower;
    use super::*;
    use mavlink::common::MavMissionType;

    fn wire(command: MavCmd, frame: MavFrame) -> WireItem {
        WireItem {
            seq: 0,
            frame,
            command,
            current: 0,
            autocontinue: 1,
            param1: 0.0,
            param2: 0.0,
            param3: 0.0,
            param4: 0.0,
            x: 0,
            y: 0,
            z: 0.0,
            mission_type: MavMissionType::MAV_MISSION_TYPE_MISSION,
        }
    }

    #[test]
    fn empty_buffer_means_no_mission() {
        assert_eq!(raise(&[]), Err(Error::NoMissionAvailable));
    }

    #[test]
    fn first_item_must_be_a_waypoint() {
        let items = [wire(
            MavCmd::MAV_CMD_VIDEO_START_CAPTURE,
            MavFrame::MAV_FRAME_MISSION,
        )];
        assert_eq!(raise(&items), Err(Error::Unsupported));
    }

    #[test]
    fn unsupported_waypoint_frame_is_reported() {
        let items = [wire(
            MavCmd::MAV_CMD_NAV_WAYPOINT,
            MavFrame::MAV_FRAME_GLOBAL,
        )];
        assert_eq!(raise(&items), Err(Error::Unsupported));
    }

    #[test]
    fn terminal_video_action_folds_onto_the_waypoint() {
        let waypoint = WireItem {
            param1: 1.0,
            x: 418486950,
            y: 751327510,
            z: 50.0,
            ..wire(
                MavCmd::MAV_CMD_NAV_WAYPOINT,
                MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT,
            )
        };
        let video = wire(
            MavCmd::MAV_CMD_VIDEO_START_CAPTURE,
            MavFrame::MAV_FRAME_MISSION,
        );

        let items = raise(&[waypoint, video]).unwrap();

        assert_eq!(items.len(), 1);
        assert!(items[0].position_finite());
        assert!(!items[0].fly_through);
        assert_eq!(items[0].camera_action, CameraAction::StartVideo);
    }

    #[test]
    fn unknown_command_is_unsupported() {
        let waypoint = WireItem {
            x: 10_000_000,
            y: 20_000_000,
            ..wire(
                MavCmd::MAV_CMD_NAV_WAYPOINT,
                MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT,
            )
        };
        let other = wire(MavCmd::MAV_CMD_NAV_LAND, MavFrame::MAV_FRAME_MISSION);

        assert_eq!(raise(&[waypoint, other]), Err(Error::Unsupported));
    }

    #[test]
    fn lower_then_raise_is_identity_for_waypoint_missions() {
        // Plain waypoint missions must survive the wire representation
        // unchanged.
        let mut missions = Vec::new();
        for n in 1..6 {
            let mission: Vec<MissionItem> = (0..n)
                .map(|i| {
                    MissionItem::new()
                        .with_position(47.0 + f64::from(i) * 0.001, 8.0 - f64::from(i) * 0.002)
                        .with_relative_altitude(10.0 + i as f32)
                        .with_fly_through(i % 2 == 0)
                })
                .collect();
            missions.push(mission);
        }

        for mission in missions {
            let lowered = lower(&mission);
            assert_eq!(raise(&lowered.wire_items).unwrap(), mission);
        }
    }

    #[test]
    fn lower_then_raise_preserves_attached_actions() {
        let mission = vec![
            MissionItem::new()
                .with_position(47.398170, 8.545649)
                .with_relative_altitude(10.0)
                .with_speed(5.0)
                .with_gimbal(-30.0, 90.0),
            MissionItem::new()
                .with_position(47.398254, 8.545760)
                .with_relative_altitude(10.0)
                .with_loiter_time(10.0)
                .with_camera_action(CameraAction::StartPhotoInterval)
                .with_camera_photo_interval(2.0),
        ];

        let lowered = lower(&mission);
        assert_eq!(raise(&lowered.wire_items).unwrap(), mission);
    }
}
