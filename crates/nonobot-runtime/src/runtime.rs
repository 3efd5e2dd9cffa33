//! Main runtime orchestration.
//!
//! The runtime owns the execution domain (an [`EventBus`]), the router
//! registry and the [`Bot`]. When the realtime backend is enabled it builds a
//! [`RealtimeAdapter`] from the configured transport capabilities and keeps it
//! connected until shutdown.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use nonobot_runtime::NonobotRuntime;
//!
//! // Auto-loads nonobot.toml from the current directory
//! let runtime = NonobotRuntime::new();
//!
//! runtime.chat_router().respond(r"echo (.+)", |msg| async move {
//!     let text = msg.matched_group(1).unwrap_or_default().to_string();
//!     msg.reply(text);
//! })?;
//!
//! runtime.run().await?;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use nonobot_adapter_realtime::RealtimeAdapter;
use nonobot_core::{
    BotClient, EventBus, HttpClientCapability, TransportError, WsClientCapability,
};
use nonobot_framework::{
    Bot, BusBotClient, ChatHandler, ChatRouter, RouterRegistry, install_builtin_handlers,
};
use parking_lot::Mutex;
use tokio::signal;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::config::{ConfigLoader, ConfigResult, NonobotConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// The nonobot runtime.
pub struct NonobotRuntime {
    config: NonobotConfig,
    bus: EventBus,
    registry: Arc<RouterRegistry>,
    bot: Bot,
    http: Option<Arc<dyn HttpClientCapability>>,
    ws: Option<Arc<dyn WsClientCapability>>,
    adapter: Mutex<Option<RealtimeAdapter>>,
    /// Signalled by the current adapter's close handler; replaced on every
    /// start so a close from an earlier run is not seen by a later one.
    adapter_closed: Mutex<Arc<Notify>>,
    builtins: Mutex<Vec<ChatHandler>>,
    clients: Mutex<Vec<BusBotClient>>,
    running: AtomicBool,
}

impl NonobotRuntime {
    /// Creates a runtime from `nonobot.toml` in the current directory.
    ///
    /// Falls back to defaults if the configuration cannot be loaded.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .load()
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                NonobotConfig::default()
            });

        Self::from_config(&config)
    }

    /// Creates a runtime builder for custom configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from configuration.
    ///
    /// Initializes logging and the transport capabilities enabled by cargo
    /// features.
    pub fn from_config(config: &NonobotConfig) -> Self {
        logging::init_from_config(&config.logging);

        let bus = EventBus::new();
        let registry = Arc::new(RouterRegistry::new());
        let bot = Bot::new(bus.clone(), registry.clone(), config.bot.to_options());
        let (http, ws) = Self::default_transports();

        info!(
            bot = %config.bot.name,
            bus = %bus.id(),
            realtime = config.realtime.enabled,
            log_level = %config.logging.level,
            "Runtime initialized from configuration"
        );

        Self {
            config: config.clone(),
            bus,
            registry,
            bot,
            http,
            ws,
            adapter: Mutex::new(None),
            adapter_closed: Mutex::new(Arc::new(Notify::new())),
            builtins: Mutex::new(Vec::new()),
            clients: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
        }
    }

    /// Transport capabilities compiled in through cargo features.
    #[allow(unused_mut)]
    fn default_transports() -> (
        Option<Arc<dyn HttpClientCapability>>,
        Option<Arc<dyn WsClientCapability>>,
    ) {
        let mut http: Option<Arc<dyn HttpClientCapability>> = None;
        let mut ws: Option<Arc<dyn WsClientCapability>> = None;

        #[cfg(feature = "http-client")]
        {
            match nonobot_transport::HttpClientCapabilityImpl::new() {
                Ok(client) => {
                    http = Some(Arc::new(client));
                    debug!("Registered HttpClient capability");
                }
                Err(e) => warn!(error = %e, "HttpClient capability unavailable"),
            }
        }

        #[cfg(feature = "ws-client")]
        {
            ws = Some(Arc::new(nonobot_transport::WsClientCapabilityImpl::new()));
            debug!("Registered WsClient capability");
        }

        (http, ws)
    }

    /// Replaces the HTTP client capability.
    pub fn with_http_client(mut self, http: Arc<dyn HttpClientCapability>) -> Self {
        self.http = Some(http);
        self
    }

    /// Replaces the push-connection capability.
    pub fn with_ws_client(mut self, ws: Arc<dyn WsClientCapability>) -> Self {
        self.ws = Some(ws);
        self
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &NonobotConfig {
        &self.config
    }

    /// The runtime's execution domain.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The router registry.
    pub fn registry(&self) -> &Arc<RouterRegistry> {
        &self.registry
    }

    /// The bot.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// The bot's router; register handlers here.
    pub fn chat_router(&self) -> ChatRouter {
        self.bot.chat_router()
    }

    /// The realtime adapter, once started.
    pub fn adapter(&self) -> Option<RealtimeAdapter> {
        self.adapter.lock().clone()
    }

    /// A ready client for the bot, closed when the runtime stops.
    pub async fn client(&self) -> RuntimeResult<BusBotClient> {
        let client = self.bot.create_client().await?;
        self.clients.lock().push(client.clone());
        Ok(client)
    }

    /// Returns whether the runtime is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Starts the runtime: installs the built-in handlers and connects the
    /// realtime adapter when enabled.
    pub async fn start(&self) -> RuntimeResult<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            warn!("Runtime is already running");
            return Ok(());
        }

        info!(bot = %self.bot.name(), "Starting nonobot runtime");

        if let Err(e) = self.start_inner().await {
            self.running.store(false, Ordering::Release);
            return Err(e);
        }

        info!("Runtime started");
        Ok(())
    }

    async fn start_inner(&self) -> RuntimeResult<()> {
        if self.config.bot.builtin_handlers && self.builtins.lock().is_empty() {
            let router = self.chat_router();
            let handlers = install_builtin_handlers(&router)?;
            debug!(count = handlers.len(), "Installed built-in handlers");
            *self.builtins.lock() = handlers;
        }

        let closed = Arc::new(Notify::new());
        *self.adapter_closed.lock() = closed.clone();

        if self.config.realtime.enabled {
            let adapter = self.build_adapter()?;
            adapter.close_handler(move || closed.notify_one());

            *self.adapter.lock() = Some(adapter.clone());
            adapter.connect()?.await?;
            info!(base_url = %self.config.realtime.base_url, "Realtime adapter connected");
        }

        Ok(())
    }

    fn build_adapter(&self) -> RuntimeResult<RealtimeAdapter> {
        let http = self.http.clone().ok_or(TransportError::NotAvailable {
            transport: "http-client",
        })?;
        let ws = self.ws.clone().ok_or(TransportError::NotAvailable {
            transport: "ws-client",
        })?;

        let options = self
            .config
            .realtime
            .to_options(self.config.bot.reply_timeout());
        Ok(RealtimeAdapter::new(
            options,
            http,
            ws,
            Arc::new(self.bot.clone()),
        ))
    }

    /// Stops the runtime: closes the adapter, the handed-out clients and the
    /// routers.
    pub async fn stop(&self) -> RuntimeResult<()> {
        if !self.running.swap(false, Ordering::AcqRel) {
            warn!("Runtime is not running");
            return Ok(());
        }

        info!("Stopping nonobot runtime");

        if let Some(adapter) = self.adapter.lock().take() {
            adapter.close();
        }
        for client in self.clients.lock().drain(..) {
            client.close();
        }
        for handler in self.builtins.lock().drain(..) {
            handler.close();
        }
        self.registry.close_all();

        info!("Runtime stopped");
        Ok(())
    }

    /// Runs until Ctrl+C, SIGTERM or the realtime connection closing.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.start().await?;

        info!("nonobot runtime is now running. Press Ctrl+C to stop.");

        let outcome = self.wait_for_shutdown().await;
        self.stop().await?;
        outcome
    }

    /// Runs until `shutdown` resolves or the realtime connection closes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;

        let closed = self.adapter_closed();
        tokio::select! {
            _ = shutdown => debug!("Shutdown requested"),
            _ = closed.notified() => {
                info!("Realtime connection closed, shutting down");
            }
        }

        self.stop().await
    }

    fn adapter_closed(&self) -> Arc<Notify> {
        self.adapter_closed.lock().clone()
    }

    /// Waits for shutdown signals or the adapter closing.
    async fn wait_for_shutdown(&self) -> RuntimeResult<()> {
        let closed = self.adapter_closed();

        #[cfg(unix)]
        {
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
                .map_err(RuntimeError::Signal)?;

            tokio::select! {
                result = signal::ctrl_c() => {
                    result.map_err(RuntimeError::Signal)?;
                    info!("Received Ctrl+C, shutting down");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down");
                }
                _ = closed.notified() => {
                    info!("Realtime connection closed, shutting down");
                }
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                result = signal::ctrl_c() => {
                    result.map_err(RuntimeError::Signal)?;
                    info!("Received Ctrl+C, shutting down");
                }
                _ = closed.notified() => {
                    info!("Realtime connection closed, shutting down");
                }
            }
        }

        Ok(())
    }
}

impl Default for NonobotRuntime {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for creating a [`NonobotRuntime`] with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// let runtime = NonobotRuntime::builder()
///     .config_file("config/nonobot.toml")
///     .profile("production")
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: NonobotConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Loads, validates and builds the runtime.
    pub fn build(self) -> ConfigResult<NonobotRuntime> {
        let config = self.config_loader.load()?;
        validate_config(&config)?;
        Ok(NonobotRuntime::from_config(&config))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
