// Loop rate, timeouts, topics, motor defaults
use std::time::Duration;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Default module configuration file
pub const DEFAULT_CONFIG_PATH: &str = "module.json";

// Default module name, used as the topic namespace
pub const DEFAULT_MODULE_NAME: &str = "front-left";

// Zenoh topics, relative to "swerve/<module>"
pub const TOPIC_CMD: &str = "cmd"; // logical axis commands
pub const TOPIC_STATE: &str = "state"; // sensed axis state
pub const TOPIC_HEALTH: &str = "health"; // health status
pub const TOPIC_CONFIG: &str = "config"; // published tunables
pub const TOPIC_CONFIG_OVERRIDE: &str = "config-override"; // incoming tunables

/// Full key expression for a module topic
pub fn module_topic(module: &str, topic: &str) -> String {
    format!("swerve/{}/{}", module, topic)
}
