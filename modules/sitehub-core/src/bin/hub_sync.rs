//! One-shot profile sync for a single tenant. Dev/ops tool: resolves the
//! credential, forces a refresh, and prints the canonical profile as JSON.
//!
//! Environment: HUB_BASE_URL, HUB_FETCH_TIMEOUT_SECS (optional),
//! HUB_SITE_URL, HUB_CREDENTIAL, HUB_TENANT_NAME (optional).

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use site_client::{HubClient, SiteClient};
use sitehub_common::{Config, TenantRecord};
use sitehub_core::{HubService, MemoryProfileStore, ProfileAssembler, TenantRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env();
    let site_url = std::env::var("HUB_SITE_URL").context("HUB_SITE_URL is required")?;
    let credential = std::env::var("HUB_CREDENTIAL").context("HUB_CREDENTIAL is required")?;
    let name = std::env::var("HUB_TENANT_NAME").unwrap_or_else(|_| site_url.clone());

    let tenant = TenantRecord::new(&credential, &site_url, &name);
    let registry = TenantRegistry::new(vec![tenant]);

    let fetcher = Arc::new(SiteClient::new(config.fetch_timeout_secs));
    let aggregation = Arc::new(HubClient::new(&config.hub_base_url, config.fetch_timeout_secs));
    let assembler = ProfileAssembler::new(fetcher, aggregation);

    let service = HubService::new(registry, MemoryProfileStore::new(), assembler);
    let profile = service.get_or_refresh(&credential, true).await?;

    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}
