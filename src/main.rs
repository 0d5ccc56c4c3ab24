use forex_calendar_harvester::startup;
use tracing::info;

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize logging
    startup::init_logging()?;

    info!("Starting forex calendar harvester");

    // Load configuration
    let config = startup::load_config().await?;

    // Seed upcoming days, then watch today's events
    startup::start_harvester(config).await
}
