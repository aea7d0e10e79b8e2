// Differential mechanism for a two-motor swerve module
//
// Owns the coupling matrix and the last commanded logical rates, and turns a
// command on one logical axis into commands for both physical motors.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::coupling::CouplingMatrix;
use super::SensedMotor;

/// A mechanism shared by its virtual motors
///
/// One lock covers the cached-rate update and both physical writes, so a
/// command on one axis never interleaves with a command on the other.
pub type SharedMechanism<'m> = Mutex<DifferentialMechanism<'m>>;

/// Logical axes of the differential, in forward-matrix row order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Row 0: the "sum" of the two motors (azimuth)
    Sum = 0,
    /// Row 1: the "difference" of the two motors (wheel)
    Difference = 1,
}

impl Axis {
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Two physical motors joined by a differential
pub struct DifferentialMechanism<'m> {
    positive: &'m mut dyn SensedMotor,
    negative: &'m mut dyn SensedMotor,
    coupling: CouplingMatrix,
    last_logical: [f64; 2], // [sum, difference]
}

impl<'m> DifferentialMechanism<'m> {
    /// Create a mechanism over borrowed motors
    ///
    /// The positive motor is column 0 of the coupling, the negative motor
    /// column 1.
    pub fn new(
        positive: &'m mut dyn SensedMotor,
        negative: &'m mut dyn SensedMotor,
        coupling: CouplingMatrix,
    ) -> Self {
        Self {
            positive,
            negative,
            coupling,
            last_logical: [0.0; 2],
        }
    }

    /// Wrap in a lock so virtual motors can share it
    pub fn into_shared(self) -> SharedMechanism<'m> {
        Mutex::new(self)
    }

    pub fn positive_motor(&self) -> &dyn SensedMotor {
        &*self.positive
    }

    pub fn negative_motor(&self) -> &dyn SensedMotor {
        &*self.negative
    }

    pub fn coupling(&self) -> &CouplingMatrix {
        &self.coupling
    }

    /// Last commanded [sum, difference] rates
    pub fn last_commanded(&self) -> [f64; 2] {
        self.last_logical
    }

    /// Current physical [positive, negative] positions
    pub fn physical_positions(&self) -> [f64; 2] {
        [self.positive.position(), self.negative.position()]
    }

    /// Current physical [positive, negative] velocities
    pub fn physical_velocities(&self) -> [f64; 2] {
        [self.positive.velocity(), self.negative.velocity()]
    }

    /// Command one logical axis, holding the other at its last commanded rate
    pub fn set_axis_velocity(&mut self, axis: Axis, velocity: f64) {
        self.last_logical[axis.index()] = velocity;
        self.write_physical();
    }

    pub fn set_sum_velocity(&mut self, velocity: f64) {
        self.set_axis_velocity(Axis::Sum, velocity);
    }

    pub fn set_difference_velocity(&mut self, velocity: f64) {
        self.set_axis_velocity(Axis::Difference, velocity);
    }

    /// Zero both logical axes
    pub fn stop(&mut self) {
        self.last_logical = [0.0; 2];
        self.write_physical();
    }

    fn write_physical(&mut self) {
        let [positive, negative] = self.coupling.to_physical(self.last_logical);
        debug!(
            "Differential command: sum={}, difference={} -> positive={}, negative={}",
            self.last_logical[0], self.last_logical[1], positive, negative
        );

        self.positive.set_velocity(positive);
        self.negative.set_velocity(negative);
    }
}

/// Lock a shared mechanism, recovering from poisoning
///
/// The cached rates are written before the motors, so a panicking motor
/// leaves nothing half-updated.
pub fn lock<'a, 'm>(
    shared: &'a SharedMechanism<'m>,
) -> MutexGuard<'a, DifferentialMechanism<'m>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}
