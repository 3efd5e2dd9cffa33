//! Configuration validation.
//!
//! Loading only checks that sources fit the schema; [`validate_config`]
//! checks that the values make sense together. Realtime settings are only
//! checked when the adapter is enabled.

use std::collections::HashSet;

use url::Url;

use super::error::{ConfigError, ConfigResult};
use super::schema::{BotConfig, LogOutput, LoggingConfig, NonobotConfig, RealtimeConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &NonobotConfig) -> ConfigResult<()> {
    validate_bot(&config.bot)?;
    validate_realtime(&config.realtime)?;
    validate_logging(&config.logging)?;
    Ok(())
}

fn validate_bot(bot: &BotConfig) -> ConfigResult<()> {
    check_name("bot.name", &bot.name)?;

    let mut seen = HashSet::from([bot.name.as_str()]);
    for alias in &bot.aliases {
        check_name("bot.aliases", alias)?;
        if !seen.insert(alias.as_str()) {
            return Err(ConfigError::invalid(
                "bot.aliases",
                format!("{alias:?} is already the bot's name or another alias"),
            ));
        }
    }

    if bot.reply_timeout_ms == 0 {
        return Err(ConfigError::invalid("bot.reply_timeout_ms", "must be positive"));
    }

    Ok(())
}

/// Names are matched as a prefix followed by `:` or whitespace, so they
/// cannot contain either; a leading `@` is part of the addressing syntax.
fn check_name(field: &'static str, name: &str) -> ConfigResult<()> {
    if name.is_empty() {
        return Err(ConfigError::missing(field));
    }

    if name.chars().any(|c| c.is_whitespace() || c == ':' || c == '@') {
        return Err(ConfigError::invalid(
            field,
            format!("{name:?} contains whitespace, ':' or '@'"),
        ));
    }

    Ok(())
}

fn validate_realtime(realtime: &RealtimeConfig) -> ConfigResult<()> {
    if !realtime.enabled {
        return Ok(());
    }

    if realtime.base_url.is_empty() {
        return Err(ConfigError::missing("realtime.base_url"));
    }
    let url = Url::parse(&realtime.base_url)
        .map_err(|e| ConfigError::invalid_url("realtime.base_url", &realtime.base_url, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid_url(
            "realtime.base_url",
            &realtime.base_url,
            "scheme must be http or https",
        ));
    }

    if realtime.token.is_empty() {
        return Err(ConfigError::missing("realtime.token"));
    }

    if !realtime.discovery_path.starts_with('/') {
        return Err(ConfigError::invalid(
            "realtime.discovery_path",
            "must start with '/'",
        ));
    }

    for (field, value) in [
        ("realtime.heartbeat_interval_ms", realtime.heartbeat_interval_ms),
        ("realtime.connect_timeout_ms", realtime.connect_timeout_ms),
        ("realtime.pending_frames", realtime.pending_frames as u64),
    ] {
        if value == 0 {
            return Err(ConfigError::invalid(field, "must be positive"));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing("logging.file_path"));
    }

    if let Some(target) = logging
        .filters
        .keys()
        .find(|t| t.is_empty() || t.contains(char::is_whitespace))
    {
        return Err(ConfigError::invalid(
            "logging.filters",
            format!("{target:?} is not a module path"),
        ));
    }

    Ok(())
}
