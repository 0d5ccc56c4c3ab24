use crate::components::calendar::time::today_in;
use crate::components::calendar::{seed_days, HtmlCalendarSource, WatchLoop};
use crate::components::datastore::SupabaseActor;
use crate::config::Config;
use crate::error::Error;
use crate::shutdown;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{oneshot, RwLock};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,reqwest=warn,hyper=warn,html5ever=warn")
        }))
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load and initialize the application config
pub async fn load_config() -> miette::Result<Arc<RwLock<Config>>> {
    match Config::load() {
        Ok(config) => Ok(Arc::new(RwLock::new(config))),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Seed the upcoming days, then watch today's events until a shutdown signal
pub async fn start_harvester(config: Arc<RwLock<Config>>) -> miette::Result<()> {
    let (zone, target_timezone, days, poll_interval, trigger_window) = {
        let config_read = config.read().await;
        (
            config_read.target_tz()?,
            config_read.target_timezone.clone(),
            config_read.seed_days,
            config_read.poll_interval(),
            config_read.trigger_window(),
        )
    };

    let source = {
        let config_read = config.read().await;
        HtmlCalendarSource::new(&config_read)?
    };

    // Initialize datastore actor
    let (mut datastore_actor, datastore) = SupabaseActor::new(Arc::clone(&config));

    // Spawn datastore actor task
    tokio::spawn(async move {
        datastore_actor.run().await;
    });

    // Create shutdown channel
    let (shutdown_send, shutdown_recv) = oneshot::channel();

    // Clone datastore handle for shutdown handler
    let shutdown_datastore = datastore.clone();

    // Spawn signal handler task
    tokio::spawn(async move {
        shutdown::handle_signals(shutdown_send, shutdown_datastore).await;
    });

    let harvest = async {
        let today = today_in(&zone, Utc::now());
        let summary = seed_days(&source, &datastore, today, days, &target_timezone).await;
        if summary.seeded.is_empty() {
            warn!("No day could be seeded, watching whatever is already stored");
        }

        let mut watch = WatchLoop::new(&source, &datastore, zone, trigger_window, poll_interval);
        watch.run().await;
    };

    // Wait for either the harvest to end or a shutdown signal
    tokio::select! {
        _ = harvest => {
            info!("Harvester process ended");
            Ok(())
        }
        _ = shutdown_recv => {
            info!("Received shutdown signal, shutting down harvester...");
            Ok(())
        }
    }
}
