// Virtual motor for one logical axis of a differential
//
// Senses by reading both physical motors through the forward matrix row for
// its axis; actuates by delegating to the shared mechanism.

use tracing::debug;

use super::coupling::dot;
use super::differential::{lock, Axis, SharedMechanism};
use super::SensedMotor;

/// One logical axis of a differential, usable anywhere a motor is expected
pub struct VirtualMotor<'a, 'm> {
    differential: &'a SharedMechanism<'m>,
    axis: Axis,
    offset: f64,
}

impl<'a, 'm> VirtualMotor<'a, 'm> {
    pub fn new(differential: &'a SharedMechanism<'m>, axis: Axis) -> Self {
        Self {
            differential,
            axis,
            offset: 0.0,
        }
    }

    /// Motor over forward-matrix row 0
    pub fn sum(differential: &'a SharedMechanism<'m>) -> Self {
        Self::new(differential, Axis::Sum)
    }

    /// Motor over forward-matrix row 1
    pub fn difference(differential: &'a SharedMechanism<'m>) -> Self {
        Self::new(differential, Axis::Difference)
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Position without the calibration offset
    fn raw_position(&self) -> f64 {
        let mechanism = lock(self.differential);
        let row = mechanism.coupling().forward().row(self.axis.index());
        dot(row, mechanism.physical_positions())
    }
}

impl SensedMotor for VirtualMotor<'_, '_> {
    fn position(&self) -> f64 {
        self.raw_position() + self.offset
    }

    fn velocity(&self) -> f64 {
        let mechanism = lock(self.differential);
        let row = mechanism.coupling().forward().row(self.axis.index());
        dot(row, mechanism.physical_velocities())
    }

    fn calibrate_position(&mut self, position: f64) {
        self.offset = position - self.raw_position();
        debug!("Calibrated {:?} axis: offset={}", self.axis, self.offset);
    }

    fn set_velocity(&mut self, velocity: f64) {
        lock(self.differential).set_axis_velocity(self.axis, velocity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::testing::RecordingMotor;
    use crate::motor::{CouplingMatrix, DifferentialMechanism};
    use approx::assert_abs_diff_eq;

    fn sum_difference() -> CouplingMatrix {
        CouplingMatrix::new([[1.0, 1.0], [1.0, -1.0]]).unwrap()
    }

    #[test]
    fn test_decoupled_positions() {
        let mut positive = RecordingMotor::at(3.0, 0.0);
        let mut negative = RecordingMotor::at(1.0, 0.0);
        let mechanism =
            DifferentialMechanism::new(&mut positive, &mut negative, sum_difference()).into_shared();

        let sum = VirtualMotor::sum(&mechanism);
        let difference = VirtualMotor::difference(&mechanism);
        assert_eq!(sum.position(), 4.0);
        assert_eq!(difference.position(), 2.0);
    }

    #[test]
    fn test_coefficients_come_from_forward_row() {
        // Gear-reduced coupling: not a plain sum or difference
        let coupling = CouplingMatrix::new([[0.25, 0.25], [0.5, -0.5]]).unwrap();
        let mut positive = RecordingMotor::at(8.0, 4.0);
        let mut negative = RecordingMotor::at(4.0, 2.0);
        let mechanism = DifferentialMechanism::new(&mut positive, &mut negative, coupling).into_shared();

        let sum = VirtualMotor::sum(&mechanism);
        let difference = VirtualMotor::difference(&mechanism);
        assert_abs_diff_eq!(sum.position(), 3.0);
        assert_abs_diff_eq!(difference.position(), 2.0);
        assert_abs_diff_eq!(sum.velocity(), 1.5);
        assert_abs_diff_eq!(difference.velocity(), 1.0);
    }

    #[test]
    fn test_calibration_is_idempotent() {
        let mut positive = RecordingMotor::at(3.75, 1.0);
        let mut negative = RecordingMotor::at(-1.25, 2.0);
        let mechanism =
            DifferentialMechanism::new(&mut positive, &mut negative, sum_difference()).into_shared();

        let mut sum = VirtualMotor::sum(&mechanism);
        sum.calibrate_position(10.0);
        assert_eq!(sum.position(), 10.0);

        sum.calibrate_position(10.0);
        assert_eq!(sum.position(), 10.0);

        sum.calibrate_position(-0.5);
        assert_eq!(sum.position(), -0.5);
    }

    #[test]
    fn test_calibration_leaves_physical_motors_alone() {
        let mut positive = RecordingMotor::at(3.0, 0.0);
        let mut negative = RecordingMotor::at(1.0, 0.0);
        {
            let mechanism = DifferentialMechanism::new(&mut positive, &mut negative, sum_difference())
                .into_shared();
            let mut difference = VirtualMotor::difference(&mechanism);
            difference.calibrate_position(0.0);

            // The other axis keeps its own zero
            let sum = VirtualMotor::sum(&mechanism);
            assert_eq!(sum.position(), 4.0);
        }

        assert_eq!(positive.offset, 0.0);
        assert_eq!(negative.offset, 0.0);
        assert!(positive.commands.is_empty());
    }

    #[test]
    fn test_velocity_ignores_calibration() {
        let mut positive = RecordingMotor::at(3.0, 1.5);
        let mut negative = RecordingMotor::at(1.0, 0.5);
        let mechanism =
            DifferentialMechanism::new(&mut positive, &mut negative, sum_difference()).into_shared();

        let mut sum = VirtualMotor::sum(&mechanism);
        let before = sum.velocity();
        sum.calibrate_position(123.0);
        assert_eq!(sum.velocity(), before);
        assert_eq!(before, 2.0);
    }

    #[test]
    fn test_independent_axis_commands_recombine() {
        let mut positive = RecordingMotor::default();
        let mut negative = RecordingMotor::default();
        {
            let mechanism = DifferentialMechanism::new(&mut positive, &mut negative, sum_difference())
                .into_shared();
            let mut sum = VirtualMotor::sum(&mechanism);
            let mut difference = VirtualMotor::difference(&mechanism);

            sum.set_velocity(5.0);
            difference.set_velocity(1.0);
        }

        assert_eq!(positive.commands.last(), Some(&3.0));
        assert_eq!(negative.commands.last(), Some(&2.0));
    }
}
