// Import a QGroundControl plan file through the public API

use mavgcs::subsystems::mission::Mission;
use mavgcs::{CameraAction, Error};
use std::io::Write;

const SURVEY_PLAN: &str = r#"{
    "fileType": "Plan",
    "geoFence": { "circles": [], "polygons": [], "version": 2 },
    "groundStation": "QGroundControl",
    "mission": {
        "cruiseSpeed": 15,
        "firmwareType": 12,
        "items": [
            {
                "autoContinue": true,
                "command": 22,
                "frame": 3,
                "params": [15, 0, 0, null, 47.3977419, 8.5455938, 15],
                "type": "SimpleItem"
            },
            {
                "autoContinue": true,
                "command": 16,
                "frame": 3,
                "params": [0, 0, 0, null, 47.3980398, 8.5450725, 15],
                "type": "SimpleItem"
            },
            {
                "autoContinue": true,
                "command": 2000,
                "frame": 2,
                "params": [0, 3, 0, null, 0, 0, 0],
                "type": "SimpleItem"
            },
            {
                "autoContinue": true,
                "command": 16,
                "frame": 3,
                "params": [1, 0, 0, null, 47.3982688, 8.5458420, 15],
                "type": "SimpleItem"
            },
            {
                "autoContinue": true,
                "command": 2001,
                "frame": 2,
                "params": [0, 0, 0, null, 0, 0, 0],
                "type": "SimpleItem"
            }
        ],
        "plannedHomePosition": [47.3977419, 8.5455938, 488],
        "vehicleType": 2,
        "version": 2
    },
    "rallyPoints": { "points": [], "version": 2 },
    "version": 1
}"#;

#[test]
fn survey_plan_imports_as_three_items() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SURVEY_PLAN.as_bytes()).unwrap();

    let items = Mission::import_qgroundcontrol_mission(file.path()).unwrap();

    assert_eq!(items.len(), 3);

    // Takeoff
    assert!(items[0].position_finite());
    assert_eq!(items[0].relative_altitude_m, Some(15.0));

    // First waypoint starts the photo interval
    assert!(items[1].fly_through);
    assert_eq!(items[1].camera_action, CameraAction::StartPhotoInterval);
    assert_eq!(items[1].camera_photo_interval_s, Some(3.0));

    // Second waypoint stops it, and the vehicle stops there
    assert!(!items[2].fly_through);
    assert_eq!(items[2].camera_action, CameraAction::StopPhotoInterval);
}

#[test]
fn missing_plan_file_is_reported() {
    let result = Mission::import_qgroundcontrol_mission("/definitely/not/here.plan");
    assert_eq!(result, Err(Error::FailedToOpenQgcPlan));
}
