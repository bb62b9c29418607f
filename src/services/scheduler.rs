use std::time::Duration;

use tracing::{info, warn};

use crate::error::AppError;
use crate::services::automation::AutomationService;
use crate::services::conversion::ConversionService;
use crate::state::AppState;

/// 自動化スケジューラー
/// 定期的に空き時間の変換とセッションの公開を実行
pub struct AutomationScheduler {
    state: AppState,
    interval: Duration,
}

impl AutomationScheduler {
    pub fn new(state: AppState, interval_secs: u64) -> Self {
        Self {
            state,
            interval: Duration::from_secs(interval_secs),
        }
    }

    /// 自動化を無限ループで定期実行
    pub async fn start(self) {
        info!("Starting automation scheduler (interval: {:?})", self.interval);

        loop {
            // 最初は指定時間待機
            tokio::time::sleep(self.interval).await;

            // エラーが発生してもループは継続
            self.tick().await;
        }
    }

    /// 1 回分の実行
    /// 変換を先に行い、新しいセッションも同じ回で公開する
    pub async fn tick(&self) {
        // 空き時間を変換
        match ConversionService::new(&self.state).convert_pending().await {
            Ok(report) => info!(
                "Scheduled conversion: {} created, {} deferred",
                report.sessions.len(),
                report.deferred.len()
            ),
            Err(AppError::NoActiveYear) => warn!("Scheduled conversion skipped: no active academic year"),
            Err(e) => warn!("Scheduled conversion failed: {:?}", e),
        }

        // 検証済みセッションを公開
        match AutomationService::new(&self.state).publish_validated().await {
            Ok(report) => info!(
                "Scheduled publication: {} published, {} skipped",
                report.published,
                report.skipped.len()
            ),
            Err(AppError::Conflict(msg)) => info!("Scheduled publication skipped: {}", msg),
            Err(e) => warn!("Scheduled publication failed: {:?}", e),
        }
    }
}
