//! Application-level mission item model.

/// Camera action to trigger when the waypoint is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraAction {
    /// No camera action
    #[default]
    None,
    /// Take a single photo
    TakePhoto,
    /// Start taking photos at a fixed interval
    StartPhotoInterval,
    /// Stop taking photos at a fixed interval
    StopPhotoInterval,
    /// Start video recording
    StartVideo,
    /// Stop video recording
    StopVideo,
}

/// # A mission item
///
/// A mission item describes one step of a flight mission: a waypoint to fly
/// to together with the actions to perform there. An item without a position
/// is a continuation: its actions apply at the waypoint of the previous item.
///
/// Items are built with the `with_*` methods:
///
/// ```
/// use mavgcs::{CameraAction, MissionItem};
///
/// let item = MissionItem::new()
///     .with_position(47.398170, 8.545649)
///     .with_relative_altitude(10.0)
///     .with_speed(5.0)
///     .with_camera_action(CameraAction::TakePhoto);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MissionItem {
    /// Latitude of the waypoint in degrees
    pub latitude_deg: Option<f64>,
    /// Longitude of the waypoint in degrees
    pub longitude_deg: Option<f64>,
    /// Altitude relative to the takeoff altitude [m]
    pub relative_altitude_m: Option<f32>,
    /// If false the vehicle stops at the waypoint, if true it keeps flying
    /// through it
    pub fly_through: bool,
    /// Requested ground speed from this item onwards [m/s]
    pub speed_m_s: Option<f32>,
    /// Gimbal pitch at the waypoint [deg]
    pub gimbal_pitch_deg: Option<f32>,
    /// Gimbal yaw at the waypoint [deg]
    pub gimbal_yaw_deg: Option<f32>,
    /// Time to loiter at the waypoint [s]
    pub loiter_time_s: Option<f32>,
    /// Camera action to trigger at the waypoint
    pub camera_action: CameraAction,
    /// Photo interval, required for [CameraAction::StartPhotoInterval] [s]
    pub camera_photo_interval_s: Option<f64>,
}

impl MissionItem {
    /// Create an empty mission item
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the waypoint position
    pub fn with_position(mut self, latitude_deg: f64, longitude_deg: f64) -> Self {
        self.latitude_deg = Some(latitude_deg);
        self.longitude_deg = Some(longitude_deg);
        self
    }

    /// Set the altitude relative to the takeoff altitude
    pub fn with_relative_altitude(mut self, altitude_m: f32) -> Self {
        self.relative_altitude_m = Some(altitude_m);
        self
    }

    /// Set whether the vehicle should fly through the waypoint without
    /// stopping
    pub fn with_fly_through(mut self, fly_through: bool) -> Self {
        self.fly_through = fly_through;
        self
    }

    /// Set the ground speed to fly at from this item onwards
    pub fn with_speed(mut self, speed_m_s: f32) -> Self {
        self.speed_m_s = Some(speed_m_s);
        self
    }

    /// Set the gimbal attitude at the waypoint
    pub fn with_gimbal(mut self, pitch_deg: f32, yaw_deg: f32) -> Self {
        self.gimbal_pitch_deg = Some(pitch_deg);
        self.gimbal_yaw_deg = Some(yaw_deg);
        self
    }

    /// Set the time to loiter at the waypoint
    pub fn with_loiter_time(mut self, loiter_time_s: f32) -> Self {
        self.loiter_time_s = Some(loiter_time_s);
        self
    }

    /// Set the camera action to trigger at the waypoint
    pub fn with_camera_action(mut self, action: CameraAction) -> Self {
        self.camera_action = action;
        self
    }

    /// Set the photo interval used by [CameraAction::StartPhotoInterval]
    pub fn with_camera_photo_interval(mut self, interval_s: f64) -> Self {
        self.camera_photo_interval_s = Some(interval_s);
        self
    }

    /// Return true if both latitude and longitude are set
    pub fn has_position(&self) -> bool {
        self.latitude_deg.is_some() && self.longitude_deg.is_some()
    }

    /// Return true if both latitude and longitude are set and finite
    pub fn position_finite(&self) -> bool {
        self.latitude_deg.is_some_and(f64::is_finite)
            && self.longitude_deg.is_some_and(f64::is_finite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_item_has_no_position() {
        let item = MissionItem::new();
        assert!(!item.has_position());
        assert!(!item.position_finite());
        assert_eq!(item.camera_action, CameraAction::None);
        assert!(!item.fly_through);
    }

    #[test]
    fn position_predicates() {
        let item = MissionItem::new().with_position(47.398170, 8.545649);
        assert!(item.has_position());
        assert!(item.position_finite());

        let item = MissionItem::new().with_position(f64::NAN, 8.545649);
        assert!(item.has_position());
        assert!(!item.position_finite());
    }

    #[test]
    fn equality_is_field_wise() {
        let a = MissionItem::new().with_position(1.0, 2.0).with_speed(5.0);
        let b = MissionItem::new().with_position(1.0, 2.0).with_speed(5.0);
        assert_eq!(a, b);
        assert_ne!(a, b.clone().with_fly_through(true));
    }
}
