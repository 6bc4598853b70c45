//! Context preparation for a single message.

use anyhow::{Context, Result};
use memoir_core::prompts;
use memoir_core::types::ContextBundle;
use memoir_core::MemoryManager;
use std::time::Duration;

use super::{client_id, manager};
use crate::commands::show::print_json;
use crate::config::Config;

/// Execute context command.
pub async fn execute(client: &str, message: &str, json: bool, config: &Config) -> Result<()> {
    let manager = manager(config)?;
    let bundle = prepare(&manager, client, message, config.memoir.reasoning.timeout_secs).await?;

    if json {
        print_json(&bundle)
    } else {
        print!("{}", prompts::render_context(&bundle));
        Ok(())
    }
}

/// Run `prepare_context`, bounded by `timeout_secs` when set.
pub async fn prepare(
    manager: &MemoryManager,
    client: &str,
    message: &str,
    timeout_secs: Option<u64>,
) -> Result<ContextBundle> {
    let client = client_id(client)?;
    let operation = manager.prepare_context(&client, message);

    let bundle = match timeout_secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), operation)
            .await
            .with_context(|| format!("Context preparation timed out after {secs}s"))?,
        None => operation.await,
    };
    bundle.with_context(|| format!("Failed to prepare context for {client}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::manager_with;
    use crate::commands::test_support::temp_config;
    use memoir_core::reasoning::testing::ScriptedReasoner;
    use memoir_core::types::Profile;
    use memoir_core::{ClientId, MemoryStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_prepare_without_service_returns_profile() {
        let (_temp, config) = temp_config();
        let client = ClientId::new("alex").unwrap();
        let mut profile = Profile::empty(client.clone());
        profile.facts.insert("name".into(), "Alex".into());
        config.store().save_profile(&client, &profile).unwrap();

        let manager = manager_with(&config, Arc::new(ScriptedReasoner::unavailable()));
        let bundle = prepare(&manager, "alex", "hello", Some(5)).await.unwrap();

        assert_eq!(bundle.profile.fact("name"), Some("Alex"));
        assert!(prompts::render_context(&bundle).contains("- name: Alex"));
    }

    #[tokio::test]
    async fn test_prepare_rejects_invalid_client() {
        let (_temp, config) = temp_config();
        let manager = manager_with(&config, Arc::new(ScriptedReasoner::unavailable()));
        assert!(prepare(&manager, "a/b", "hello", None).await.is_err());
    }
}
