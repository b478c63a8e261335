mod badge;
mod config;
mod feed;
mod poller;
mod session;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::badge::Badge;
use crate::config::Config;
use crate::feed::HttpConversationFeed;
use crate::session::SessionContext;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Hirelink notifier v{}", env!("CARGO_PKG_VERSION"));

    let session =
        SessionContext::from_stored(config.session_token.clone(), config.session_user.clone());
    if !session.is_active() {
        info!("No stored session; the unread badge stays hidden");
    }

    let feed = Arc::new(HttpConversationFeed::new(&config.api_base_url));
    let handle = poller::spawn(feed, session, config.poll_interval);

    let mut updates = handle.updates();
    let mut badge = Badge::new();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                // A closed channel means the poller exited (signed-out start).
                if changed.is_err() {
                    break;
                }
                let outcome = updates.borrow_and_update().clone();
                if let Some(outcome) = outcome {
                    badge.apply(&outcome);
                    match badge.label() {
                        Some(label) => info!("Unread: {label}"),
                        None => info!("No unread messages"),
                    }
                }
            }
        }
    }

    handle.shutdown();
    handle.join().await;
    Ok(())
}
