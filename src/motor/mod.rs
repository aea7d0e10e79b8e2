// Motor layer for a differential swerve module
//
// Provides:
// - The sensed/actuated motor capability shared by physical and virtual motors
// - Differential coupling matrix (physical rates <-> logical rates)
// - Differential mechanism and the virtual sum/difference motors built on it
// - A simulated physical motor for running without hardware

pub mod coupling;
mod differential;
pub mod sim;
mod virtual_motor;

pub use coupling::{CouplingMatrix, Matrix2};
pub use differential::{lock, Axis, DifferentialMechanism, SharedMechanism};
pub use sim::SimulatedMotor;
pub use virtual_motor::VirtualMotor;

/// A motor that can be sensed and driven at a velocity
///
/// Units are whatever the implementation reports (rotations, rotations/sec,
/// ...) and must agree between the two motors of a differential.
pub trait SensedMotor: Send {
    /// Current position, including any calibration offset
    fn position(&self) -> f64;

    /// Current velocity
    fn velocity(&self) -> f64;

    /// Offset the position reading so the current position becomes `position`
    fn calibrate_position(&mut self, position: f64);

    /// Command a velocity
    fn set_velocity(&mut self, velocity: f64);
}

#[cfg(test)]
pub(crate) mod testing {
    use super::SensedMotor;

    /// Motor with directly settable sensor state that records every command
    #[derive(Debug, Default)]
    pub struct RecordingMotor {
        pub position: f64,
        pub velocity: f64,
        pub offset: f64,
        pub commands: Vec<f64>,
    }

    impl RecordingMotor {
        pub fn at(position: f64, velocity: f64) -> Self {
            Self {
                position,
                velocity,
                ..Self::default()
            }
        }
    }

    impl SensedMotor for RecordingMotor {
        fn position(&self) -> f64 {
            self.position + self.offset
        }

        fn velocity(&self) -> f64 {
            self.velocity
        }

        fn calibrate_position(&mut self, position: f64) {
            self.offset = position - self.position;
        }

        fn set_velocity(&mut self, velocity: f64) {
            self.commands.push(velocity);
        }
    }
}
