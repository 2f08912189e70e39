// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `recap serve` command implementation.
//!
//! Runs the conversation front-end over Telegram and the event relay that
//! turns worker progress into status messages. Adapters are wired
//! explicitly here; there is no plugin registry.

use std::sync::Arc;
use std::time::Duration;

use recap_agent::{ConversationMachine, EventRelay, FrontendLoop, JobDispatcher, install_signal_handler};
use recap_config::RecapConfig;
use recap_core::error::RecapError;
use recap_core::traits::{ChannelAdapter, PluginAdapter, StateStore};
use recap_ledger::RequestLedger;
use recap_source::GatewaySource;
use recap_telegram::TelegramChannel;
use tracing::{error, info, warn};

/// How long the relay gets to finish its current event after shutdown.
const RELAY_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs the `recap serve` command until SIGINT/SIGTERM.
pub async fn run_serve(config: RecapConfig) -> Result<(), RecapError> {
    info!(name = %config.app.name, "starting recap serve");

    let store = crate::open_store(&config).await?;
    match store.purge_expired_pending().await {
        Ok(0) => {}
        Ok(purged) => info!(purged, "purged expired pending conversations"),
        Err(e) => warn!(error = %e, "failed to purge expired pending conversations"),
    }

    let source = Arc::new(GatewaySource::new(&config.source).map_err(|e| {
        error!(error = %e, "failed to initialize source gateway");
        e
    })?);

    let mut channel = TelegramChannel::new(config.telegram.clone())?;
    let delivery = Arc::new(channel.delivery());
    channel.connect().await?;
    let channel: Arc<dyn ChannelAdapter> = Arc::new(channel);

    let ledger = RequestLedger::new(store.clone());
    let dispatcher = JobDispatcher::new(
        store.clone(),
        store.clone(),
        ledger.clone(),
        config.source.session_credentials.clone(),
    );
    let machine = Arc::new(ConversationMachine::new(
        store.clone(),
        ledger.clone(),
        source,
        dispatcher,
        config.conversation.clone(),
    ));
    let relay = Arc::new(EventRelay::new(
        store.clone(),
        ledger,
        delivery,
        config.storage.event_retention(),
    ));

    let cancel = install_signal_handler();

    let relay_task = {
        let relay = relay.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { relay.run(cancel).await })
    };

    let frontend = FrontendLoop::new(channel.clone(), machine);
    let outcome = frontend.run(cancel.clone()).await;
    // The front-end may stop on its own (channel closed); take the relay down too.
    cancel.cancel();

    if tokio::time::timeout(RELAY_SHUTDOWN_TIMEOUT, relay_task)
        .await
        .is_err()
    {
        warn!("event relay did not stop in time");
    }

    if let Err(e) = channel.shutdown().await {
        warn!(error = %e, "channel shutdown failed");
    }
    store.close().await?;
    info!("recap serve stopped");
    outcome
}
