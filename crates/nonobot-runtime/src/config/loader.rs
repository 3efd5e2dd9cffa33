//! Configuration loading.
//!
//! # Sources (lowest to highest priority)
//!
//! 1. Built-in defaults
//! 2. Profile file (`nonobot.{profile}.toml`), merged just before its base file
//! 3. Base file (`nonobot.toml`, then `config.toml`), first hit per format wins
//! 4. Environment variables (`NONOBOT_*`, `__` between nested keys)
//! 5. Programmatic overrides ([`ConfigLoader::merge`])
//!
//! TOML files need the `toml-config` feature *(default)*, YAML files
//! (`.yaml`/`.yml`) need `yaml-config`. With both enabled, both are searched
//! and YAML is merged over TOML.
//!
//! | Variable | Key |
//! |----------|-----|
//! | `NONOBOT_BOT__NAME=r2` | `bot.name` |
//! | `NONOBOT_REALTIME__TOKEN=xxx` | `realtime.token` |
//! | `NONOBOT_LOGGING__LEVEL=debug` | `logging.level` |
//!
//! ```rust,ignore
//! use nonobot_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./config/nonobot.toml")
//!     .load()?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::NonobotConfig;

/// Environment variable selecting the profile.
pub const PROFILE_ENV: &str = "NONOBOT_PROFILE";

/// Prefix of environment overrides.
const ENV_PREFIX: &str = "NONOBOT_";

/// File stems searched in every search path, in order.
const FILE_STEMS: [&str; 2] = ["nonobot", "config"];

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    /// Development profile (default).
    #[default]
    Development,
    /// Production profile.
    Production,
    /// Any other name, lowercased.
    Custom(String),
}

impl Profile {
    /// Parses a profile name; `prod`/`dev` are accepted as short forms.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// The name used in profile file names.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Reads the profile from `NONOBOT_PROFILE`, defaulting to Development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_ENV)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// File formats
// =============================================================================

/// A configuration file format compiled into this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    #[cfg(feature = "toml-config")]
    Toml,
    #[cfg(feature = "yaml-config")]
    Yaml,
}

impl ConfigFormat {
    /// Enabled formats, in merge order.
    pub fn enabled() -> Vec<Self> {
        #[allow(unused_mut)]
        let mut formats = Vec::new();
        #[cfg(feature = "toml-config")]
        formats.push(Self::Toml);
        #[cfg(feature = "yaml-config")]
        formats.push(Self::Yaml);
        formats
    }

    /// File extensions of this format, preferred first.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => &["toml"],
            #[cfg(feature = "yaml-config")]
            Self::Yaml => &["yaml", "yml"],
        }
    }

    /// Picks the format from a file extension, if it is enabled.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::enabled()
            .into_iter()
            .find(|format| format.extensions().contains(&ext))
    }

    #[cfg_attr(
        not(any(feature = "toml-config", feature = "yaml-config")),
        allow(unused_variables)
    )]
    fn merge_into(self, figment: Figment, path: &Path) -> Figment {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => figment.merge(Toml::file(path)),
            #[cfg(feature = "yaml-config")]
            Self::Yaml => figment.merge(Yaml::file(path)),
        }
    }
}

/// A file found by [`ConfigLoader::discover`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    /// Location of the file.
    pub path: PathBuf,
    /// Its format.
    pub format: ConfigFormat,
    /// Whether this is a profile variant.
    pub profile: bool,
}

// =============================================================================
// ConfigLoader
// =============================================================================

/// Layered configuration loader.
pub struct ConfigLoader {
    profile: Profile,
    search_paths: Vec<PathBuf>,
    /// Explicit file; disables the search.
    file: Option<PathBuf>,
    env: bool,
    overrides: Figment,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader using the profile from `NONOBOT_PROFILE`.
    pub fn new() -> Self {
        Self {
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            file: None,
            env: true,
            overrides: Figment::new(),
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Profile::parse(&profile.into());
        self
    }

    /// Adds a directory to search for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds the current directory to the search paths.
    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Adds `<user config dir>/nonobot` to the search paths.
    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(dir) => self.search_path(dir.join("nonobot")),
            None => self,
        }
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables `NONOBOT_*` environment overrides (the default).
    pub fn with_env(mut self) -> Self {
        self.env = true;
        self
    }

    /// Disables environment overrides.
    pub fn without_env(mut self) -> Self {
        self.env = false;
        self
    }

    /// Merges `config` over every other source.
    pub fn merge(mut self, config: NonobotConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    /// Lists the files a search would merge, lowest priority first.
    ///
    /// Each format stops at its first base file; a profile variant next to
    /// it is merged just before it.
    pub fn discover(&self) -> Vec<ConfigFile> {
        let search_paths = self.effective_search_paths();
        let mut files = Vec::new();

        for format in ConfigFormat::enabled() {
            'format: for dir in &search_paths {
                for stem in FILE_STEMS {
                    for ext in format.extensions() {
                        let base = dir.join(format!("{stem}.{ext}"));
                        if !base.is_file() {
                            continue;
                        }

                        let variant = dir.join(format!("{stem}.{}.{ext}", self.profile));
                        if variant.is_file() {
                            files.push(ConfigFile {
                                path: variant,
                                format,
                                profile: true,
                            });
                        }
                        files.push(ConfigFile {
                            path: base,
                            format,
                            profile: false,
                        });
                        break 'format;
                    }
                }
            }
        }

        files
    }

    /// Loads the configuration.
    pub fn load(self) -> ConfigResult<NonobotConfig> {
        let config: NonobotConfig = self.figment()?.extract()?;

        debug!(
            profile = %self.profile,
            bot = %config.bot.name,
            realtime = config.realtime.enabled,
            log_level = %config.logging.level,
            "Configuration loaded"
        );

        Ok(config)
    }

    fn figment(&self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(NonobotConfig::default()));

        match &self.file {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigError::FileNotFound { path: path.clone() });
                }
                let format = ConfigFormat::from_path(path)
                    .ok_or_else(|| ConfigError::UnsupportedFormat { path: path.clone() })?;
                info!(path = %path.display(), "Loading configuration file");
                figment = format.merge_into(figment, path);
            }
            None => {
                let files = self.discover();
                if files.is_empty() {
                    warn!(profile = %self.profile, "No configuration file found, using defaults");
                }
                for file in files {
                    info!(
                        path = %file.path.display(),
                        profile = file.profile,
                        "Loading configuration file"
                    );
                    figment = file.format.merge_into(figment, &file.path);
                }
            }
        }

        if self.env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        Ok(figment.merge(self.overrides.clone()))
    }

    /// Search paths, defaulting to the current and user config directories.
    fn effective_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join("nonobot")))
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
