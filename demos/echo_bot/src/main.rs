//! Echo Bot Example
//!
//! A small bot showing handler registration on the chat router.
//!
//! # Commands
//!
//! ```text
//! nono echo <text>     - replies with <text>
//! nono later <text>    - sends <text> as a proactive message a second later
//! nono ping / help     - built-in handlers
//! hello                - overheard greeting, no need to address the bot
//! ```
//!
//! # Usage
//!
//! Connect to the chat backend configured in `nonobot.toml`:
//!
//! ```bash
//! cargo run --package echo-bot -- --config nonobot.toml
//! ```
//!
//! Or talk to the bot from the terminal:
//!
//! ```bash
//! cargo run --package echo-bot -- --console
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use nonobot::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

/// Chat id used for the terminal session.
const CONSOLE_CHAT: &str = "console";

#[derive(Debug, Parser)]
#[command(name = "echo-bot", about = "A simple echo bot built on nonobot")]
struct Args {
    /// Configuration file to load.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile (development, production, ...).
    #[arg(short, long)]
    profile: Option<String>,

    /// Read messages from stdin instead of running until Ctrl+C.
    #[arg(long)]
    console: bool,
}

// ============================================================================
// Handlers
// ============================================================================

fn register_handlers(router: &ChatRouter) -> Result<()> {
    router.respond(r"^echo\s+(.+)$", |msg| async move {
        let text = msg.matched_group(1).unwrap_or_default().to_string();
        msg.reply(text);
    })?;

    let sender = router.clone();
    router.respond(r"^later\s+(.+)$", move |msg| {
        let sender = sender.clone();
        async move {
            let text = msg.matched_group(1).unwrap_or_default().to_string();
            let options = SendOptions::new(msg.chat_id());
            msg.reply("ok");

            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                if let Err(e) = sender.send_message(&options, text) {
                    error!("Failed to send delayed message: {e}");
                }
            });
        }
    })?;

    router.when(r"(?i)^hello\b", |msg| async move {
        msg.reply("hello!");
    })?;

    Ok(())
}

// ============================================================================
// Console mode
// ============================================================================

async fn run_console(runtime: &NonobotRuntime) -> Result<()> {
    runtime.start().await?;

    let client = runtime.client().await?;
    client.message_handler(Arc::new(|message: OutboundMessage| {
        if message.chat_id == CONSOLE_CHAT {
            println!("{}", message.body);
        }
    }));

    println!("Talking to {}. Press Ctrl+D to quit.", client.name());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match client
            .receive_message(ReceiveOptions::new(CONSOLE_CHAT), &line)
            .await
        {
            Ok(Some(reply)) => println!("{reply}"),
            Ok(None) => {}
            Err(e) => error!("Failed to process message: {e}"),
        }
    }

    client.close();
    runtime.stop().await?;
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = NonobotRuntime::builder();
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &args.profile {
        builder = builder.profile(profile.clone());
    }
    let runtime = builder.build()?;

    register_handlers(&runtime.chat_router())?;

    if args.console {
        run_console(&runtime).await
    } else {
        info!("Starting {}", runtime.config().bot.name);
        runtime.run().await?;
        Ok(())
    }
}
