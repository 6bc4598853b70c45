//! Client listing and creation.

use anyhow::{Context, Result, bail};
use colored::Colorize;
use memoir_core::MemoryStore;
use memoir_core::types::Profile;

use super::client_id;
use crate::cli::{ClientsAction, ClientsCommand};
use crate::config::Config;

/// Execute clients command.
pub fn execute(cmd: ClientsCommand, config: &Config) -> Result<()> {
    match cmd.action {
        ClientsAction::List => list(config),
        ClientsAction::New { id } => {
            let id = new_client(id.as_deref(), config)?;
            println!("{} Created client {}", "✓".green(), id.cyan());
            Ok(())
        }
    }
}

fn list(config: &Config) -> Result<()> {
    let store = config.store();
    let clients = store.list_clients().context("Failed to list clients")?;

    if clients.is_empty() {
        println!(
            "{} No clients in {}",
            "⚠".yellow(),
            config.memoir.data_dir.display()
        );
        return Ok(());
    }

    println!("{} {} clients:", "✓".green(), clients.len());
    for client in &clients {
        let sessions = store
            .load_session_index(client)
            .map(|s| s.len().to_string())
            .unwrap_or_else(|e| format!("unreadable: {e}"));
        println!("  {} ({} sessions)", client.as_str().cyan(), sessions);
    }
    Ok(())
}

/// Create a client with an empty profile; the ID is generated when omitted.
pub fn new_client(id: Option<&str>, config: &Config) -> Result<String> {
    let id = match id {
        Some(id) => id.to_string(),
        None => format!("client_{}", &uuid::Uuid::new_v4().simple().to_string()[..8]),
    };
    let client = client_id(&id)?;
    let store = config.store();

    if store.list_clients()?.contains(&client) {
        bail!("Client already exists: {id}");
    }

    store
        .save_profile(&client, &Profile::empty(client.clone()))
        .context("Failed to create client profile")?;
    Ok(id)
}
