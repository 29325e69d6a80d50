//! Headless console: boots against the configured backend and reports what
//! the shell would show.

use std::sync::Arc;

use anyhow::Context;

use condo_console::{Console, ConsoleConfig, FileStorage, HttpBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConsoleConfig::from_env().context("invalid console configuration")?;
    condo_observability::init_with(config.log_format);

    let storage = FileStorage::open(&config.storage_path)
        .with_context(|| format!("opening storage at {}", config.storage_path.display()))?;
    let backend = HttpBackend::new(config.api_url.clone()).context("building http client")?;
    tracing::info!(api_url = %config.api_url, storage = %storage.path().display(), "starting console");

    let console = Console::boot(config, Arc::new(backend), Arc::new(storage)).await;

    if !console.session().state().is_authenticated() {
        if let (Ok(email), Ok(password)) = (std::env::var("CONDO_EMAIL"), std::env::var("CONDO_PASSWORD")) {
            let result = console.login(&email, &password).await;
            if let Some(message) = result.message() {
                tracing::warn!(%message, "sign-in failed");
            }
        }
    }

    let state = console.session().state();
    let Some(principal) = state.principal() else {
        tracing::info!(route = %console.router().current(), "no session");
        return Ok(());
    };

    tracing::info!(
        user = principal.display_name(),
        role = %principal.role(),
        route = %console.router().current(),
        "signed in"
    );

    let tenants = console.tenants();
    if tenants.should_show_selector() {
        match console.load_tenants().await {
            Ok(list) => tracing::info!(
                available = list.len(),
                selected = ?tenants.selected_tenant_id().map(String::from),
                "tenant selection"
            ),
            Err(e) => tracing::warn!(error = %e, "could not load tenants"),
        }
    }

    if principal.role().receives_notifications() {
        let unread = console.notification_badge().refresh().await;
        tracing::info!(unread, "notifications");
    }

    Ok(())
}
