pub mod config;
pub mod health;
pub mod logging;
pub mod server;

pub use config::{Config, ConfigError};
pub use health::{CycleStatus, HealthChecker};
