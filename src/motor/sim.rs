// Simulated physical motor
//
// Stands in for a hardware driver when running without motors attached.
// Velocity follows the command instantly; position integrates velocity over
// tokio time so a paused test clock drives it deterministically.

use tokio::time::Instant;
use tracing::debug;

use super::SensedMotor;

/// Default velocity limit for a simulated motor, in rotations/sec
pub const DEFAULT_MAX_VELOCITY: f64 = 100.0;

/// An ideal velocity-controlled motor
#[derive(Debug, Clone)]
pub struct SimulatedMotor {
    max_velocity: f64,
    velocity: f64,
    // Raw position at `anchored_at`
    anchor_position: f64,
    anchored_at: Instant,
    offset: f64,
}

impl SimulatedMotor {
    pub fn new(max_velocity: f64) -> Self {
        Self {
            max_velocity: max_velocity.abs(),
            velocity: 0.0,
            anchor_position: 0.0,
            anchored_at: Instant::now(),
            offset: 0.0,
        }
    }

    pub fn max_velocity(&self) -> f64 {
        self.max_velocity
    }

    fn raw_position(&self) -> f64 {
        self.anchor_position + self.velocity * self.anchored_at.elapsed().as_secs_f64()
    }
}

impl Default for SimulatedMotor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_VELOCITY)
    }
}

impl SensedMotor for SimulatedMotor {
    fn position(&self) -> f64 {
        self.raw_position() + self.offset
    }

    fn velocity(&self) -> f64 {
        self.velocity
    }

    fn calibrate_position(&mut self, position: f64) {
        self.offset = position - self.raw_position();
    }

    fn set_velocity(&mut self, velocity: f64) {
        let clamped = velocity.clamp(-self.max_velocity, self.max_velocity);
        if clamped != velocity {
            debug!("Clamped simulated motor command {} to {}", velocity, clamped);
        }

        // Re-anchor so the old velocity only applies up to now
        self.anchor_position = self.raw_position();
        self.anchored_at = Instant::now();
        self.velocity = clamped;
    }
}
