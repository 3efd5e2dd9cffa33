//! Logging setup for nonobot.
//!
//! A `tracing-subscriber` registry with an [`EnvFilter`] (honouring
//! `RUST_LOG`) and one boxed formatting layer whose writer is picked from
//! the configured output.
//!
//! ```rust,ignore
//! use nonobot_runtime::{config::ConfigLoader, logging};
//!
//! let config = ConfigLoader::new().load()?;
//! logging::init_from_config(&config.logging);
//! ```
//!
//! Or by hand:
//!
//! ```rust,ignore
//! use nonobot_runtime::logging::{LoggingBuilder, SpanEvents};
//!
//! LoggingBuilder::new()
//!     .directive("nonobot_adapter_realtime=trace")
//!     .span_events(SpanEvents::LIFECYCLE)
//!     .init();
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Registry, fmt};

use crate::config::{LogFormat, LogOutput, LoggingConfig, SpanEventConfig};

/// File name used when the configured path has none.
const DEFAULT_LOG_FILE: &str = "nonobot.log";

type BoxedLayer = Box<dyn tracing_subscriber::Layer<Registry> + Send + Sync>;

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanEvents {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

impl SpanEvents {
    /// No span events.
    pub const NONE: Self = Self {
        new: false,
        enter: false,
        exit: false,
        close: false,
    };

    /// Creation and close only.
    pub const LIFECYCLE: Self = Self {
        new: true,
        enter: false,
        exit: false,
        close: true,
    };

    /// Every span event.
    pub const FULL: Self = Self {
        new: true,
        enter: true,
        exit: true,
        close: true,
    };

    fn to_fmt_span(self) -> FmtSpan {
        [
            (self.new, FmtSpan::NEW),
            (self.enter, FmtSpan::ENTER),
            (self.exit, FmtSpan::EXIT),
            (self.close, FmtSpan::CLOSE),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .fold(FmtSpan::NONE, |acc, (_, span)| acc | span)
    }
}

impl From<&SpanEventConfig> for SpanEvents {
    fn from(config: &SpanEventConfig) -> Self {
        Self {
            new: config.new,
            enter: config.enter,
            exit: config.exit,
            close: config.close,
        }
    }
}

/// Initialize logging from a [`LoggingConfig`].
///
/// Does nothing if a global subscriber is already installed.
pub fn init_from_config(config: &LoggingConfig) {
    LoggingBuilder::from_config(config).init();
}

// =============================================================================
// LoggingBuilder
// =============================================================================

/// Builds and installs the global subscriber.
#[derive(Debug)]
pub struct LoggingBuilder {
    level: tracing::Level,
    directives: Vec<String>,
    span_events: SpanEvents,
    format: LogFormat,
    output: LogOutput,
    file_path: Option<PathBuf>,
    target: bool,
    thread_ids: bool,
    file_location: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    /// INFO level, compact format on stdout.
    pub fn new() -> Self {
        Self {
            level: tracing::Level::INFO,
            directives: Vec::new(),
            span_events: SpanEvents::NONE,
            format: LogFormat::default(),
            output: LogOutput::default(),
            file_path: None,
            target: true,
            thread_ids: false,
            file_location: false,
        }
    }

    /// Mirrors a [`LoggingConfig`]; per-module filters become directives,
    /// sorted by module so the result does not depend on map order.
    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut filters: Vec<_> = config.filters.iter().collect();
        filters.sort_by(|a, b| a.0.cmp(b.0));

        Self {
            level: config.level.to_tracing_level(),
            directives: filters
                .into_iter()
                .map(|(module, level)| format!("{module}={}", level.as_str()))
                .collect(),
            span_events: SpanEvents::from(&config.span_events),
            format: config.format,
            output: config.output,
            file_path: config.file_path.clone(),
            target: true,
            thread_ids: config.thread_ids,
            file_location: config.file_location,
        }
    }

    /// Sets the level used when `RUST_LOG` is unset.
    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = level;
        self
    }

    /// Adds a filter directive, e.g. `nonobot_framework=debug`.
    pub fn directive(mut self, directive: &str) -> Self {
        self.directives.push(directive.to_string());
        self
    }

    pub fn span_events(mut self, events: SpanEvents) -> Self {
        self.span_events = events;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Writes to `path` and switches the output to [`LogOutput::File`].
    pub fn file_path(mut self, path: PathBuf) -> Self {
        self.file_path = Some(path);
        self.output = LogOutput::File;
        self
    }

    /// Include the module path of each event.
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.target = enabled;
        self
    }

    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.thread_ids = enabled;
        self
    }

    /// Include source file and line of each event.
    pub fn with_file_location(mut self, enabled: bool) -> Self {
        self.file_location = enabled;
        self
    }

    /// The filter directives, in the order they are applied.
    pub fn directives(&self) -> &[String] {
        &self.directives
    }

    /// Installs the subscriber, ignoring an already installed one.
    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Installs the subscriber.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let filter = self.filter();
        tracing_subscriber::registry()
            .with(self.fmt_layer())
            .with(filter)
            .try_init()
    }

    fn filter(&self) -> EnvFilter {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_str().to_lowercase()));

        for directive in &self.directives {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(e) => eprintln!("Ignoring invalid log directive {directive:?}: {e}"),
            }
        }

        filter
    }

    /// The writer for the configured output; files are never rotated.
    fn writer(&self) -> BoxMakeWriter {
        match (self.output, &self.file_path) {
            (LogOutput::Stdout, _) => BoxMakeWriter::new(std::io::stdout),
            (LogOutput::Stderr, _) => BoxMakeWriter::new(std::io::stderr),
            (LogOutput::File, Some(path)) => {
                let dir = path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."));
                let file = path
                    .file_name()
                    .unwrap_or_else(|| OsStr::new(DEFAULT_LOG_FILE));
                BoxMakeWriter::new(tracing_appender::rolling::never(dir, file))
            }
            (LogOutput::File, None) => {
                eprintln!("File logging requested without a path, writing to stdout");
                BoxMakeWriter::new(std::io::stdout)
            }
        }
    }

    fn fmt_layer(&self) -> BoxedLayer {
        let layer = fmt::layer()
            .with_writer(self.writer())
            .with_ansi(self.output != LogOutput::File)
            .with_span_events(self.span_events.to_fmt_span())
            .with_target(self.target)
            .with_thread_ids(self.thread_ids)
            .with_file(self.file_location)
            .with_line_number(self.file_location);

        match self.format {
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Full => layer.boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            #[cfg(feature = "json-log")]
            LogFormat::Json => layer.json().boxed(),
            #[cfg(not(feature = "json-log"))]
            LogFormat::Json => {
                eprintln!("JSON logging requires the `json-log` feature, using full format");
                layer.boxed()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_span_events() {
        assert_eq!(SpanEvents::NONE.to_fmt_span(), FmtSpan::NONE);
        assert_eq!(
            SpanEvents::LIFECYCLE.to_fmt_span(),
            FmtSpan::NEW | FmtSpan::CLOSE
        );
        assert_eq!(SpanEvents::FULL.to_fmt_span(), FmtSpan::FULL);
    }

    #[test]
    fn test_from_config() {
        let mut config = LoggingConfig {
            level: LogLevel::Debug,
            thread_ids: true,
            ..Default::default()
        };
        config
            .filters
            .insert("nonobot_framework".into(), LogLevel::Trace);
        config
            .filters
            .insert("nonobot_adapter_realtime".into(), LogLevel::Warn);

        let builder = LoggingBuilder::from_config(&config);
        assert_eq!(builder.level, tracing::Level::DEBUG);
        assert!(builder.thread_ids);
        assert_eq!(
            builder.directives(),
            [
                "nonobot_adapter_realtime=warn".to_string(),
                "nonobot_framework=trace".to_string(),
            ]
        );
    }

    #[test]
    fn test_file_path_selects_file_output() {
        let builder = LoggingBuilder::new().file_path("logs/bot.log".into());
        assert_eq!(builder.output, LogOutput::File);
    }
}
