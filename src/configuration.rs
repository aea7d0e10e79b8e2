// Module configuration: location, differential matrix, wheel size and the
// controller gains for the azimuth and wheel axes.
//
// Loaded from a JSON file with kebab-case keys. The differential matrix is
// kept as an untyped value during parsing so that each structural problem
// gets its own error.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::motor::CouplingMatrix;
use crate::sync::{TablePopulator, TableScope};

/// Error types for module configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Could not read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Differential matrix is not a list")]
    NotAList,

    #[error("Differential matrix does not have height 2 (found {found} rows)")]
    WrongHeight { found: usize },

    #[error("Differential matrix is not a list of lists (row {row})")]
    RowNotAList { row: usize },

    #[error("Differential matrix does not have width 2 (row {row} has {found} columns)")]
    WrongWidth { row: usize, found: usize },

    #[error("Differential matrix contains a non-numeric element at [{row}][{col}]")]
    NonNumericElement { row: usize, col: usize },

    #[error("Differential matrix is singular (determinant {determinant})")]
    SingularMatrix { determinant: f64 },
}

/// Module location relative to the robot center, in inches
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
}

/// PID gains
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PidConfiguration {
    pub kp: f64,
    #[serde(default)]
    pub ki: f64,
    #[serde(default)]
    pub kd: f64,
    #[serde(default)]
    pub kf: f64,
    #[serde(default)]
    pub i_zone: f64,
    #[serde(skip, default = "first_call")]
    first_table_call: bool,
}

/// Azimuth position controller: PID plus trapezoidal profile limits
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AzimuthControllerConfiguration {
    #[serde(flatten)]
    pub pid: PidConfiguration,
    pub max_speed: f64,
    pub max_acceleration: f64,
    #[serde(skip, default = "first_call")]
    first_table_call: bool,
}

fn first_call() -> bool {
    true
}

/// On-disk shape of a module configuration
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawModuleConfiguration {
    location_inches: Location,
    differential_matrix: Value,
    wheel_diameter_inches: f64,
    azimuth_controller: AzimuthControllerConfiguration,
    wheel_controller: PidConfiguration,
}

/// Everything needed to build one swerve module
#[derive(Debug, Clone)]
pub struct ModuleConfiguration {
    location: Location,
    coupling: CouplingMatrix,
    wheel_diameter: f64,
    azimuth_controller: AzimuthControllerConfiguration,
    wheel_controller: PidConfiguration,
    first_table_call: bool,
}

impl ModuleConfiguration {
    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        info!("Loaded module configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigurationError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    pub fn from_value(value: Value) -> Result<Self, ConfigurationError> {
        let raw: RawModuleConfiguration = serde_json::from_value(value)?;
        let coupling = CouplingMatrix::from_value(&raw.differential_matrix)?;

        Ok(Self {
            location: raw.location_inches,
            coupling,
            wheel_diameter: raw.wheel_diameter_inches,
            azimuth_controller: raw.azimuth_controller,
            wheel_controller: raw.wheel_controller,
            first_table_call: true,
        })
    }

    /// Location of the module, in inches
    pub fn location(&self) -> Location {
        self.location
    }

    /// Forward matrix maps [motor0, motor1] to [azimuth, wheel] rates;
    /// the inverse maps back
    pub fn coupling(&self) -> &CouplingMatrix {
        &self.coupling
    }

    /// Wheel diameter, in inches
    pub fn wheel_diameter(&self) -> f64 {
        self.wheel_diameter
    }

    pub fn azimuth_controller(&self) -> &AzimuthControllerConfiguration {
        &self.azimuth_controller
    }

    pub fn wheel_controller(&self) -> &PidConfiguration {
        &self.wheel_controller
    }
}

impl TablePopulator for PidConfiguration {
    fn populate_table(&mut self, table: &mut TableScope<'_>) {
        if self.first_table_call {
            self.first_table_call = false;
            table.set_f64("kP", self.kp);
            table.set_f64("kI", self.ki);
            table.set_f64("kD", self.kd);
            table.set_f64("kF", self.kf);
            table.set_f64("iZone", self.i_zone);
        } else {
            self.kp = table.get_f64("kP", self.kp);
            self.ki = table.get_f64("kI", self.ki);
            self.kd = table.get_f64("kD", self.kd);
            self.kf = table.get_f64("kF", self.kf);
            self.i_zone = table.get_f64("iZone", self.i_zone);
        }
    }
}

impl TablePopulator for AzimuthControllerConfiguration {
    fn populate_table(&mut self, table: &mut TableScope<'_>) {
        self.pid.populate_table(table);
        if self.first_table_call {
            self.first_table_call = false;
            table.set_f64("maxSpeed", self.max_speed);
            table.set_f64("maxAcceleration", self.max_acceleration);
        } else {
            self.max_speed = table.get_f64("maxSpeed", self.max_speed);
            self.max_acceleration = table.get_f64("maxAcceleration", self.max_acceleration);
        }
    }
}

// The coupling matrix stays out of the table; it is fixed once loaded.
impl TablePopulator for ModuleConfiguration {
    fn populate_table(&mut self, table: &mut TableScope<'_>) {
        self.wheel_controller
            .populate_table(&mut table.subtable("wheelController"));
        self.azimuth_controller
            .populate_table(&mut table.subtable("azimuthController"));

        if self.first_table_call {
            self.first_table_call = false;
            table.set_f64("wheelDiameter", self.wheel_diameter);
            table.set_f64("locationX", self.location.x);
            table.set_f64("locationY", self.location.y);
        } else {
            self.wheel_diameter = table.get_f64("wheelDiameter", self.wheel_diameter);
            self.location = Location {
                x: table.get_f64("locationX", self.location.x),
                y: table.get_f64("locationY", self.location.y),
            };
        }
    }
}
