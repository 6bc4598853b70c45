//! Command implementations for the memoir CLI.
//!
//! Each submodule implements the logic for a command group.

pub mod clients;
pub mod context;
pub mod finalize;
pub mod show;

use anyhow::{Context, Result};
use memoir_core::reasoning::OpenAiReasoner;
use memoir_core::{ClientId, MemoryManager, ReasoningService};
use std::sync::Arc;

use crate::config::Config;

/// Parse and validate a client ID argument.
pub fn client_id(raw: &str) -> Result<ClientId> {
    ClientId::new(raw).with_context(|| format!("Invalid client ID: {raw}"))
}

/// Build a manager over the configured store with the given reasoning service.
pub fn manager_with(config: &Config, service: Arc<dyn ReasoningService>) -> MemoryManager {
    MemoryManager::new(
        Arc::new(config.store()),
        service,
        config.memoir.extraction.clone(),
    )
}

/// Build a manager backed by the OpenAI reasoning client.
pub fn manager(config: &Config) -> Result<MemoryManager> {
    let reasoner = OpenAiReasoner::from_config(&config.memoir.reasoning)
        .context("Failed to configure reasoning service")?;
    Ok(manager_with(config, Arc::new(reasoner)))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use memoir_core::MemoirConfig;
    use tempfile::TempDir;

    /// Config rooted at a fresh temp dir
    pub fn temp_config() -> (TempDir, Config) {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let config = Config {
            memoir: MemoirConfig::new(temp.path()),
            source: None,
        };
        (temp, config)
    }
}
