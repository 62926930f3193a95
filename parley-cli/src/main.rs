mod terminal_renderer;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use parley_client::{ClientConfig, IceServerConfig, LifecycleController};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::terminal_renderer::TerminalRenderer;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Text and video chat room client")]
struct Cli {
    /// Relay WebSocket URL.
    #[arg(long, default_value = parley_client::DEFAULT_RELAY_URL)]
    relay: String,

    /// Display name; prompted for when missing.
    #[arg(short, long)]
    name: Option<String>,

    /// STUN server URL. Repeatable; replaces the default server.
    #[arg(long = "ice-server")]
    ice_servers: Vec<String>,

    #[arg(long, default_value_t = 3000)]
    shutdown_timeout_ms: u64,
}

impl Cli {
    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::default().with_relay_url(self.relay.clone());
        if !self.ice_servers.is_empty() {
            config.transport.ice_servers = self
                .ice_servers
                .iter()
                .map(|url| IceServerConfig::stun(url.clone()))
                .collect();
        }
        config.shutdown_timeout = Duration::from_millis(self.shutdown_timeout_ms);
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.client_config();

    let name = match cli.name {
        Some(name) => name,
        None => prompt_name().await?,
    };

    let controller = LifecycleController::standard(config, Arc::new(TerminalRenderer));
    controller
        .join(&name)
        .await
        .context("Failed to join the room")?;
    controller.install_shutdown_hook();

    println!(
        "{}",
        "Type to chat. /mic and /cam toggle your devices, /peers lists calls, /quit leaves."
            .dimmed()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = controller.wait_left() => break,

            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    controller.leave().await;
                    break;
                };
                handle_input(&controller, line.trim()).await;
            }
        }
    }

    controller.wait_left().await;
    info!("Bye");
    Ok(())
}

async fn handle_input(controller: &LifecycleController, line: &str) {
    match line {
        "/quit" => {
            controller.leave().await;
        }
        "/mic" => {
            let on = controller.toggle_microphone();
            println!("{}", format!("Microphone {}", if on { "on" } else { "muted" }).dimmed());
        }
        "/cam" => {
            let on = controller.toggle_camera();
            println!("{}", format!("Camera {}", if on { "on" } else { "off" }).dimmed());
        }
        "/peers" => {
            let sessions = controller.sessions().await;
            if sessions.is_empty() {
                println!("{}", "No calls".dimmed());
            }
            for session in sessions {
                println!(
                    "  {} ({}) {:?}",
                    session.display_name, session.peer_id, session.negotiation_state
                );
            }
        }
        text => {
            if let Err(e) = controller.send_chat(text).await {
                eprintln!("{} {}", "Message not sent:".red(), e);
            }
        }
    }
}

async fn prompt_name() -> Result<String> {
    tokio::task::spawn_blocking(|| {
        dialoguer::Input::<String>::new()
            .with_prompt("Your name")
            .validate_with(|input: &String| {
                if input.trim().is_empty() {
                    Err("Name must not be empty")
                } else {
                    Ok(())
                }
            })
            .interact_text()
    })
    .await
    .context("Name prompt panicked")?
    .context("Failed to read name")
}
