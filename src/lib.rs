pub mod config;
pub mod configuration;
pub mod messages;
pub mod motor;
pub mod runtime;
pub mod sync;
