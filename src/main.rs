use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use timetable::api::router;
use timetable::clock::SystemClock;
use timetable::config::AppConfig;
use timetable::db;
use timetable::notify::LogNotificationSink;
use timetable::services::AutomationScheduler;
use timetable::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "timetable=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::new_from_env()?;
    let pool = db::connect(&config.database_url, config.db_max_connections).await?;

    let state = AppState::new(
        pool,
        Arc::new(LogNotificationSink),
        Arc::new(SystemClock),
        config.scheduling.clone(),
    );

    if config.automation_interval_secs > 0 {
        let scheduler = AutomationScheduler::new(state.clone(), config.automation_interval_secs);
        tokio::spawn(scheduler.start());
    } else {
        info!("automation scheduler disabled");
    }

    let app = router(state);

    info!("listening on http://{}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
