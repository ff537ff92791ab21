use anyhow::Result;
use kb_buyback::domain::FeedStatus;
use kb_buyback::{initialize_backend, AppConfig};
use shared::{AccessState, Timeframe};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting KB Gold buy-back terminal");
    let state = initialize_backend(config)?;
    let session = state.session.clone();

    let status = session.start().await;
    if let Some(error) = &status.last_error {
        warn!("Started with errors: {}", error);
    }

    match session.access().state() {
        AccessState::Halted => {
            warn!("Terminal is halted; the master reset code is required");
            if let Some(request) = session.access().reset_request() {
                info!(
                    "Reset request for {}: {}",
                    request.recipient.as_deref().unwrap_or("the owner"),
                    request.subject
                );
            }
        }
        state => info!("Terminal is {:?}", state),
    }

    if status.auth {
        session
            .transactions()
            .wait_for_feed(|feed| feed.status != FeedStatus::Idle)
            .await;
    }
    let dashboard = session.transactions().analytics(Timeframe::Monthly);
    info!(
        "📊 This month: ${:.2} spent, {:.2} g gold, {} purchases",
        dashboard.total_spent_period,
        dashboard.gold_grams(),
        dashboard.count
    );

    info!("Running; press Ctrl+C to exit");
    tokio::signal::ctrl_c().await?;

    session.end().await;
    Ok(())
}
