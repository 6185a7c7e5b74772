//! Tuning constants for the viewer.
//!
//! Every sensitivity, speed, clamp bound and deadzone the controllers use
//! lives here with its default. A config can be loaded from a RON file where
//! any omitted field keeps its default value:
//!
//! ```ron
//! (
//!     camera: (mouse_sensitivity: 0.3),
//!     entity: (move_speed: 3.0, transition: (mode: Snap)),
//! )
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Pitch and distance bounds of the orbit camera. Angles are in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraLimits {
    pub min_pitch: f32,
    pub max_pitch: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for CameraLimits {
    fn default() -> Self {
        Self {
            // Keeps `front` away from `world_up` so `right` never degenerates
            min_pitch: -89.0,
            max_pitch: 89.0,
            min_distance: 2.0,
            max_distance: 10.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub target: [f32; 3],
    pub distance: f32,
    /// Degrees.
    pub yaw: f32,
    /// Degrees.
    pub pitch: f32,
    pub world_up: [f32; 3],
    /// Degrees per pixel of mouse motion.
    pub mouse_sensitivity: f32,
    /// Distance change per scroll event.
    pub zoom_step: f32,
    pub limits: CameraLimits,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            target: [0.0, 2.0, 10.0],
            distance: 4.0,
            yaw: -90.0,
            pitch: 15.0,
            world_up: [0.0, 1.0, 0.0],
            mouse_sensitivity: 0.2,
            zoom_step: 0.2,
            limits: CameraLimits::default(),
        }
    }
}

/// How the camera target follows a change of the entity's follow mode.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum TransitionMode {
    /// Exponential ease: every tick closes `1 - e^(-smoothing * dt)` of the gap.
    Smooth { smoothing: f32 },
    /// Jump straight to the new target.
    Snap,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    pub mode: TransitionMode,
    /// The transition ends once the target is closer than this.
    pub arrival_threshold: f32,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            mode: TransitionMode::Smooth { smoothing: 6.0 },
            arrival_threshold: 0.15,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityConfig {
    /// World units per second.
    pub move_speed: f32,
    /// Fraction of the remaining yaw closed per second.
    pub rotation_speed: f32,
    /// Radians. Smaller yaw differences are left alone.
    pub yaw_deadzone: f32,
    /// How far ahead of the entity the spotlight view looks, in units of `front`.
    pub spotlight_lead: f32,
    /// The spotlight target is additionally shifted by
    /// `spotlight_offset_scale * (front.x, -spotlight_drop, 0)`.
    pub spotlight_drop: f32,
    pub spotlight_offset_scale: f32,
    pub spotlight_limits: CameraLimits,
    pub spotlight_engaged: bool,
    pub transition: TransitionConfig,
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            move_speed: 1.5,
            rotation_speed: 0.7,
            yaw_deadzone: 1e-2,
            spotlight_lead: 4.5,
            spotlight_drop: 5.3,
            spotlight_offset_scale: 0.1,
            spotlight_limits: CameraLimits {
                min_pitch: -25.0,
                max_pitch: 20.0,
                min_distance: 5.5,
                max_distance: 5.5,
            },
            spotlight_engaged: true,
            transition: TransitionConfig::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Vertical field of view in degrees.
    pub fovy: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            fovy: 45.0,
            znear: 0.1,
            zfar: 100.0,
        }
    }
}

/// The single directional light of the scene.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub direction: [f32; 3],
    pub color: [f32; 3],
    pub intensity: f32,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            direction: [-0.5, -1.0, -0.5],
            color: [1.0, 1.0, 1.0],
            intensity: 1.2,
        }
    }
}

/// Key bindings. Keys are lowercase key names as produced by [`crate::input::key_name`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub forward: String,
    pub back: String,
    pub left: String,
    pub right: String,
    pub up: String,
    pub down: String,
    pub toggle_spotlight: String,
    pub release_pointer: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            forward: "w".into(),
            back: "s".into(),
            left: "a".into(),
            right: "d".into(),
            up: "q".into(),
            down: "e".into(),
            toggle_spotlight: "l".into(),
            release_pointer: "escape".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub title: String,
    pub clear_colour: [f64; 4],
    pub camera: CameraConfig,
    pub entity: EntityConfig,
    pub projection: ProjectionConfig,
    pub light: LightConfig,
    pub input: InputConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "skyview".into(),
            clear_colour: [0.1, 0.1, 0.1, 1.0],
            camera: CameraConfig::default(),
            entity: EntityConfig::default(),
            projection: ProjectionConfig::default(),
            light: LightConfig::default(),
            input: InputConfig::default(),
        }
    }
}

impl ViewerConfig {
    pub fn from_ron_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(contents)?)
    }

    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    pub fn to_ron_string(&self) -> String {
        // Plain data, serialization cannot fail
        ron::ser::to_string_pretty(self, Default::default()).unwrap_or_default()
    }
}
