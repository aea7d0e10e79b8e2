// 50 Hz module loop with watchdog
// Each cycle: drain commands and config overrides, sync tunables, sense both
// logical axes, then actuate them through the differential.

use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{interval, Instant, Interval};
use tracing::{debug, info, warn};

// local imports
use crate::config::{
    module_topic, CMD_TIMEOUT, LOOP_HZ, TOPIC_CMD, TOPIC_CONFIG, TOPIC_CONFIG_OVERRIDE,
    TOPIC_HEALTH, TOPIC_STATE,
};
use crate::configuration::ModuleConfiguration;
use crate::messages::{ModuleCommand, ModuleState, RuntimeHealth};
use crate::motor::{
    lock, DifferentialMechanism, SensedMotor, SharedMechanism, SimulatedMotor, VirtualMotor,
};
use crate::sync::{ConfigTable, TablePopulator};

/// Startup options for [`run`]
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config_path: PathBuf,
    pub module: String,
    pub motor_max_velocity: f64,
}

pub struct Runtime {
    latest_cmd: Option<ModuleCommand>,
    cmd_received_at: Instant,
    pending_calibration: Option<f64>,
    health: RuntimeHealth,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            latest_cmd: None,
            cmd_received_at: Instant::now(),
            pending_calibration: None,
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
        }
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    /// Process incoming command
    fn on_command(&mut self, mut cmd: ModuleCommand) {
        debug!("Received command: {:?}", &cmd);
        if let Some(position) = cmd.calibrate_azimuth.take() {
            self.pending_calibration = Some(position);
        }
        self.latest_cmd = Some(cmd);
        self.cmd_received_at = Instant::now();
    }

    /// Azimuth calibration requested since the last call
    fn take_calibration(&mut self) -> Option<f64> {
        self.pending_calibration.take()
    }

    /// Compute logical axis velocities based on watchdog state
    fn compute_actuation(&mut self) -> ModuleCommand {
        let cmd_age = self.cmd_received_at.elapsed();

        if cmd_age > CMD_TIMEOUT {
            // Watchdog triggered - stop the module
            if self.health != RuntimeHealth::CmdStale {
                warn!("Command stale ({:?} old), stopping module", cmd_age);
            }
            self.health = RuntimeHealth::CmdStale;
            ModuleCommand::default()
        } else if let Some(ref cmd) = self.latest_cmd {
            self.health = RuntimeHealth::Ok;
            cmd.clone()
        } else {
            // No command ever received
            self.health = RuntimeHealth::CmdStale;
            ModuleCommand::default()
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// The azimuth (sum) and wheel (difference) axes of one module
pub struct ModuleAxes<'a, 'm> {
    differential: &'a SharedMechanism<'m>,
    azimuth: VirtualMotor<'a, 'm>,
    wheel: VirtualMotor<'a, 'm>,
}

impl<'a, 'm> ModuleAxes<'a, 'm> {
    pub fn new(differential: &'a SharedMechanism<'m>) -> Self {
        Self {
            differential,
            azimuth: VirtualMotor::sum(differential),
            wheel: VirtualMotor::difference(differential),
        }
    }

    pub fn calibrate_azimuth(&mut self, position: f64) {
        info!("Calibrating azimuth to {}", position);
        self.azimuth.calibrate_position(position);
    }

    pub fn sense(&self) -> ModuleState {
        ModuleState {
            azimuth_position: self.azimuth.position(),
            azimuth_velocity: self.azimuth.velocity(),
            wheel_position: self.wheel.position(),
            wheel_velocity: self.wheel.velocity(),
            motor_velocities: lock(self.differential).physical_velocities(),
        }
    }

    pub fn actuate(&mut self, cmd: &ModuleCommand) {
        self.azimuth.set_velocity(cmd.azimuth_velocity);
        self.wheel.set_velocity(cmd.wheel_velocity);
    }

    pub fn stop(&mut self) {
        lock(self.differential).stop();
    }
}

/// Strip the override prefix from a key expression
fn override_key<'k>(key_expr: &'k str, prefix: &str) -> Option<&'k str> {
    key_expr
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|key| !key.is_empty())
}

/// Wait for the next tick; `false` once `shutdown` has completed
///
/// `shutdown` lives across cycles, so a request made while the loop body
/// is busy is still seen here.
async fn next_cycle<F: Future>(tick: &mut Interval, shutdown: &mut Pin<&mut F>) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.as_mut() => false,
        _ = tick.tick() => true,
    }
}

pub async fn run(options: RunOptions) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut config = ModuleConfiguration::load(&options.config_path)?;
    let mut table = ConfigTable::new();

    let mut positive = SimulatedMotor::new(options.motor_max_velocity);
    let mut negative = SimulatedMotor::new(options.motor_max_velocity);
    let differential =
        DifferentialMechanism::new(&mut positive, &mut negative, config.coupling().clone())
            .into_shared();
    let mut axes = ModuleAxes::new(&differential);

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    let cmd_topic = module_topic(&options.module, TOPIC_CMD);
    let config_topic = module_topic(&options.module, TOPIC_CONFIG);
    let override_topic = module_topic(&options.module, TOPIC_CONFIG_OVERRIDE);
    let state_topic = module_topic(&options.module, TOPIC_STATE);
    let health_topic = module_topic(&options.module, TOPIC_HEALTH);

    info!("Setting up publishers and subscribers...");
    let cmd_subscriber = session.declare_subscriber(cmd_topic.as_str()).await?;
    let override_subscriber = session
        .declare_subscriber(format!("{}/**", override_topic))
        .await?;
    let pub_state = session.declare_publisher(state_topic.as_str()).await?;
    let pub_health = session.declare_publisher(health_topic.as_str()).await?;

    let mut runtime = Runtime::new();
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout",
        LOOP_HZ,
        CMD_TIMEOUT.as_millis()
    );
    info!("Subscribed to: {}, {}/**", cmd_topic, override_topic);
    info!("Publishing to: {}, {}, {}/*", state_topic, health_topic, config_topic);

    // Listen for Ctrl-C across the whole loop, not only while waiting on a tick
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        if !next_cycle(&mut tick, &mut ctrl_c).await {
            info!("Shutting down, stopping motors");
            axes.stop();
            return Ok(());
        }

        // 1. Drain all pending commands (non-blocking), keep latest
        while let Ok(Some(sample)) = cmd_subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<ModuleCommand>(&payload) {
                Ok(cmd) => runtime.on_command(cmd),
                Err(e) => warn!("Failed to parse command: {}", e),
            }
        }

        // 2. Drain config overrides into the table
        while let Ok(Some(sample)) = override_subscriber.try_recv() {
            let key_expr = sample.key_expr().as_str();
            let Some(key) = override_key(key_expr, &override_topic) else {
                warn!("Ignoring override on {}", key_expr);
                continue;
            };
            match serde_json::from_slice::<f64>(&sample.payload().to_bytes()) {
                Ok(value) => {
                    info!("Config override: {} = {}", key, value);
                    table.apply_remote(key, value);
                }
                Err(e) => warn!("Failed to parse override for {}: {}", key, e),
            }
        }

        // 3. Sync tunables and publish anything written locally
        config.populate_table(&mut table.root());
        for (key, value) in table.take_outgoing() {
            session
                .put(format!("{}/{}", config_topic, key), serde_json::to_string(&value)?)
                .await?;
        }

        // 4. Sense, then actuate (watchdog zeroes stale commands)
        if let Some(position) = runtime.take_calibration() {
            axes.calibrate_azimuth(position);
        }
        let state = axes.sense();
        let actuation = runtime.compute_actuation();
        axes.actuate(&actuation);

        // 5. Publish state and health
        pub_state.put(serde_json::to_string(&state)?).await?;
        pub_health.put(serde_json::to_string(&runtime.health())?).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::testing::RecordingMotor;
    use crate::motor::CouplingMatrix;

    fn command(azimuth: f64, wheel: f64) -> ModuleCommand {
        ModuleCommand {
            azimuth_velocity: azimuth,
            wheel_velocity: wheel,
            calibrate_azimuth: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_zeroes_stale_command() {
        let mut runtime = Runtime::new();
        assert_eq!(runtime.compute_actuation(), ModuleCommand::default());
        assert_eq!(runtime.health(), RuntimeHealth::CmdStale);

        runtime.on_command(command(1.0, 2.0));
        assert_eq!(runtime.compute_actuation(), command(1.0, 2.0));
        assert_eq!(runtime.health(), RuntimeHealth::Ok);

        tokio::time::advance(CMD_TIMEOUT + Duration::from_millis(1)).await;
        assert_eq!(runtime.compute_actuation(), ModuleCommand::default());
        assert_eq!(runtime.health(), RuntimeHealth::CmdStale);
    }

    #[tokio::test(start_paused = true)]
    async fn test_calibration_request_consumed_once() {
        let mut runtime = Runtime::new();
        runtime.on_command(ModuleCommand {
            calibrate_azimuth: Some(90.0),
            ..command(0.5, 0.0)
        });

        assert_eq!(runtime.take_calibration(), Some(90.0));
        assert_eq!(runtime.take_calibration(), None);
        // The calibration is not replayed with the held command
        assert_eq!(runtime.compute_actuation().calibrate_azimuth, None);
    }

    #[test]
    fn test_axes_sense_then_actuate() {
        let coupling = CouplingMatrix::new([[1.0, 1.0], [1.0, -1.0]]).unwrap();
        let mut positive = RecordingMotor::at(3.0, 0.25);
        let mut negative = RecordingMotor::at(1.0, 0.75);
        {
            let differential =
                DifferentialMechanism::new(&mut positive, &mut negative, coupling).into_shared();
            let mut axes = ModuleAxes::new(&differential);

            axes.calibrate_azimuth(0.0);
            let state = axes.sense();
            assert_eq!(state.azimuth_position, 0.0);
            assert_eq!(state.wheel_position, 2.0);
            assert_eq!(state.azimuth_velocity, 1.0);
            assert_eq!(state.wheel_velocity, -0.5);
            assert_eq!(state.motor_velocities, [0.25, 0.75]);

            axes.actuate(&command(5.0, 1.0));
            axes.stop();
        }

        // azimuth alone, azimuth + wheel, stop
        assert_eq!(positive.commands, vec![2.5, 3.0, 0.0]);
        assert_eq!(negative.commands, vec![2.5, 2.0, 0.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_seen_after_busy_cycle() {
        let mut tick = interval(Duration::from_millis(20));
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tokio::pin!(rx);

        assert!(next_cycle(&mut tick, &mut rx).await);

        // Requested while the loop body is running, not while waiting
        tx.send(()).unwrap();
        tokio::time::advance(Duration::from_millis(5)).await;
        assert!(!next_cycle(&mut tick, &mut rx).await);
    }

    #[test]
    fn test_override_key() {
        let prefix = "swerve/fl/config-override";
        assert_eq!(
            override_key("swerve/fl/config-override/wheelController/kP", prefix),
            Some("wheelController/kP")
        );
        assert_eq!(override_key("swerve/fl/config-override", prefix), None);
        assert_eq!(override_key("swerve/fr/config-override/kP", prefix), None);
    }
}
