//! QGroundControl plan file import.
//!
//! A QGC `.plan` file is a JSON document whose `mission.items` array lists
//! raw MAVLink commands with their seven parameters. The import walks the
//! items with the same per-command builder shape as the raising of a
//! downloaded mission, it only differs in where the numbers come from.

use super::item::{CameraAction, MissionItem};
use crate::{Error, Result};
use log::warn;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

// Commands as they appear numerically in plan files.
const CMD_NAV_WAYPOINT: u16 = 16;
const CMD_NAV_LOITER_TIME: u16 = 19;
const CMD_NAV_LAND: u16 = 21;
const CMD_NAV_TAKEOFF: u16 = 22;
const CMD_DO_CHANGE_SPEED: u16 = 178;
const CMD_DO_MOUNT_CONTROL: u16 = 205;
const CMD_IMAGE_START_CAPTURE: u16 = 2000;
const CMD_IMAGE_STOP_CAPTURE: u16 = 2001;
const CMD_VIDEO_START_CAPTURE: u16 = 2500;
const CMD_VIDEO_STOP_CAPTURE: u16 = 2501;

#[derive(Debug, Deserialize)]
struct QgcPlan {
    mission: QgcMission,
}

#[derive(Debug, Deserialize)]
struct QgcMission {
    #[serde(default)]
    items: Vec<QgcItem>,
}

#[derive(Debug, Deserialize)]
struct QgcItem {
    command: u16,
    // QGC writes null for unused parameters.
    #[serde(default)]
    params: Vec<Option<f64>>,
}

/// Import the mission items of a QGroundControl plan file.
pub(crate) fn import_qgroundcontrol_mission(path: &Path) -> Result<Vec<MissionItem>> {
    let file = File::open(path).map_err(|_| Error::FailedToOpenQgcPlan)?;

    let plan: QgcPlan =
        serde_json::from_reader(BufReader::new(file)).map_err(|_| Error::FailedToParseQgcPlan)?;

    let mut items = Vec::new();
    let mut current_item = MissionItem::new();

    for plan_item in &plan.mission.items {
        let params: Vec<f64> = plan_item.params.iter().map(|p| p.unwrap_or(0.0)).collect();
        build_mission_item(plan_item.command, &params, &mut current_item, &mut items)?;
    }

    // Don't forget the last item which possibly didn't have a position set.
    items.push(current_item);

    Ok(items)
}

/// Fold one plan command into the rolling mission item, flushing the item
/// to `items` when a new position-bearing command starts the next one.
fn build_mission_item(
    command: u16,
    params: &[f64],
    current_item: &mut MissionItem,
    items: &mut Vec<MissionItem>,
) -> Result<()> {
    let known = matches!(
        command,
        CMD_NAV_WAYPOINT
            | CMD_NAV_LOITER_TIME
            | CMD_NAV_LAND
            | CMD_NAV_TAKEOFF
            | CMD_DO_CHANGE_SPEED
            | CMD_DO_MOUNT_CONTROL
            | CMD_IMAGE_START_CAPTURE
            | CMD_IMAGE_STOP_CAPTURE
            | CMD_VIDEO_START_CAPTURE
            | CMD_VIDEO_STOP_CAPTURE
    );

    if known && params.len() < 7 {
        return Err(Error::FailedToParseQgcPlan);
    }

    match command {
        CMD_NAV_WAYPOINT | CMD_NAV_TAKEOFF | CMD_NAV_LAND => {
            if current_item.has_position() {
                items.push(std::mem::take(current_item));
            }

            if command == CMD_NAV_WAYPOINT {
                current_item.fly_through = !(params[0] > 0.0);
            }

            current_item.latitude_deg = Some(params[4]);
            current_item.longitude_deg = Some(params[5]);
            current_item.relative_altitude_m = Some(params[6] as f32);
        }

        CMD_DO_MOUNT_CONTROL => {
            current_item.gimbal_pitch_deg = Some(params[0] as f32);
            current_item.gimbal_yaw_deg = Some(params[2] as f32);
        }

        CMD_NAV_LOITER_TIME => {
            current_item.loiter_time_s = Some(params[0] as f32);
        }

        CMD_IMAGE_START_CAPTURE => {
            let photo_interval = params[1] as i64;
            let photo_count = params[2] as i64;

            if photo_interval > 0 && photo_count == 0 {
                current_item.camera_action = CameraAction::StartPhotoInterval;
                current_item.camera_photo_interval_s = Some(photo_interval as f64);
            } else if photo_interval == 0 && photo_count == 1 {
                current_item.camera_action = CameraAction::TakePhoto;
            } else {
                return Err(Error::Unsupported);
            }
        }

        CMD_IMAGE_STOP_CAPTURE => {
            current_item.camera_action = CameraAction::StopPhotoInterval;
        }

        CMD_VIDEO_START_CAPTURE => {
            current_item.camera_action = CameraAction::StartVideo;
        }

        CMD_VIDEO_STOP_CAPTURE => {
            current_item.camera_action = CameraAction::StopVideo;
        }

        CMD_DO_CHANGE_SPEED => {
            let is_ground_speed = params[0] as i64 == 1;
            let throttle = params[2];
            let is_absolute = params[3] == 0.0;

            if is_ground_speed && throttle < 0.0 && is_absolute {
                current_item.speed_m_s = Some(params[1] as f32);
            } else {
                return Err(Error::Unsupported);
            }
        }

        unknown => {
            warn!("Ignoring unsupported command {} in plan file", unknown);
        }
    }

    Ok(())
}
