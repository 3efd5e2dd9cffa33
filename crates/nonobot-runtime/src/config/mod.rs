//! Configuration module for the nonobot runtime.
//!
//! This module provides layered configuration loading (files, environment,
//! programmatic overrides) and validation for the bot, the realtime
//! adapter and logging.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigFile, ConfigFormat, ConfigLoader, Profile};
pub use schema::{
    BotConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, NonobotConfig, RealtimeConfig,
    SpanEventConfig,
};
pub use validation::validate_config;
