// Define message types for the runtime

use serde::{Deserialize, Serialize};

// Command from the chassis controller -> module runtime
// Velocities are logical axis rates; the runtime decouples them.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ModuleCommand {
    pub azimuth_velocity: f64,
    pub wheel_velocity: f64,
    // Re-zero the azimuth axis to this position before actuating
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibrate_azimuth: Option<f64>,
}

/// Sensed module state published every cycle
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ModuleState {
    pub azimuth_position: f64,
    pub azimuth_velocity: f64,
    pub wheel_position: f64,
    pub wheel_velocity: f64,
    /// [positive, negative] physical motor velocities
    pub motor_velocities: [f64; 2],
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}
