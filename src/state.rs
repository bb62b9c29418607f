use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::config::SchedulingSettings;
use crate::notify::NotificationSink;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub notifier: Arc<dyn NotificationSink>,
    pub clock: Arc<dyn Clock>,
    pub settings: SchedulingSettings,
    /// Held for the whole of a publication run; one run at a time.
    pub run_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        notifier: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        settings: SchedulingSettings,
    ) -> Self {
        Self {
            db,
            notifier,
            clock,
            settings,
            run_lock: Arc::new(Mutex::new(())),
        }
    }
}
