#[macro_use]
extern crate rust_i18n;

mod commands;
mod shutdown;

use commands::CommandContext;
use kalenteri::components::{CalendarController, DateGrid, EventCacheHandle};
use kalenteri::startup;
use tokio::sync::oneshot;
use tracing::{error, info};

// Initialize i18n
i18n!("locales", fallback = "en");

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize logging
    startup::init_logging()?;

    info!("Starting Kalenteri");

    // Load configuration
    let config = startup::load_config()?;
    rust_i18n::set_locale(&config.locale);

    let session = startup::build_session(&config)?;
    let remote = startup::build_remote(&config, &session)?;
    let cache = EventCacheHandle::new(remote);
    let _session_watcher = startup::spawn_session_watcher(&session, cache.clone());

    // Restore the previous session in the background, the prompt reports
    // the loading state meanwhile
    let hydrating = session.clone();
    tokio::spawn(async move {
        if let Some(user) = hydrating.hydrate().await {
            println!("{}", t!("session_restored", email = user.email));
        }
    });

    let calendar = CalendarController::new(
        cache.clone(),
        DateGrid::new(config.week_starts_on),
        config.today(),
    );
    let ctx = CommandContext {
        config,
        session,
        calendar,
    };

    // Create shutdown channel and spawn signal handler task
    let (shutdown_send, shutdown_recv) = oneshot::channel();
    tokio::spawn(shutdown::handle_signals(shutdown_send, cache.clone()));

    tokio::select! {
        result = commands::run(ctx) => {
            if let Err(e) = &result {
                error!("Prompt failed: {:?}", e);
            }
            result?;
        }
        _ = shutdown_recv => {
            info!("Shutdown signal received");
        }
    }

    cache.shutdown().await?;
    info!("Kalenteri stopped");
    Ok(())
}
