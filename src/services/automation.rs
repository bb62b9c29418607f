use std::sync::Arc;

use serde::Serialize;
use sqlx::{Connection, SqliteConnection, SqlitePool};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::SchedulingSettings;
use crate::db;
use crate::error::AppError;
use crate::models::{AutomationRun, Booking, Session, SessionStatus, SkipReason, SkippedSession, Subject};
use crate::notify::{self, Notification, NotificationKind, NotificationSink};
use crate::services::conflict;
use crate::services::quota::{self, ALERT_RATIO, QuotaTracker};
use crate::services::slot_search;
use crate::state::AppState;

/// Publishes validated sessions in one serialized batch.
pub struct AutomationService {
    db: SqlitePool,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    settings: SchedulingSettings,
    run_lock: Arc<Mutex<()>>,
    quota: QuotaTracker,
}

#[derive(Debug, Serialize)]
pub struct PublishReport {
    pub published: usize,
    pub skipped: Vec<SkippedSession>,
    pub run: AutomationRun,
}

enum Outcome {
    Published,
    Skipped(SkipReason),
}

#[derive(Default)]
struct RunTally {
    published: usize,
    skipped: Vec<SkippedSession>,
    conflicts: usize,
}

impl RunTally {
    fn skip(&mut self, session_id: i64, reason: SkipReason) {
        warn!("Skipping session {}: {}", session_id, reason);
        if reason.is_conflict() {
            self.conflicts += 1;
        }
        self.skipped.push(SkippedSession {
            session_id,
            reason: reason.to_string(),
        });
    }
}

impl AutomationService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db: state.db.clone(),
            notifier: state.notifier.clone(),
            clock: state.clock.clone(),
            settings: state.settings.clone(),
            run_lock: state.run_lock.clone(),
            quota: QuotaTracker::new(state.clock.clone()),
        }
    }

    /// Runs one publication batch. A second call while a batch is running is
    /// rejected with [`AppError::Conflict`].
    pub async fn publish_validated(&self) -> Result<PublishReport, AppError> {
        let _guard = self
            .run_lock
            .try_lock()
            .map_err(|_| AppError::Conflict("automation run already in progress".to_string()))?;

        info!("Starting automation run...");
        let mut conn = self.db.acquire().await?;
        let admins = db::users::fetch_admin_ids(&mut conn).await?;
        let mut tally = RunTally::default();

        let validated = db::sessions::fetch_by_status(&mut conn, SessionStatus::Validated).await?;
        info!("Step 1: checking {} validated sessions", validated.len());
        let mut retry_queue = Vec::new();
        for session in validated {
            match self.try_publish(&mut conn, &session, &admins, false).await? {
                Outcome::Published => tally.published += 1,
                Outcome::Skipped(reason) if reason.is_retryable() => {
                    info!("Session {} deferred to retry: {}", session.id, reason);
                    retry_queue.push((session.id, reason));
                }
                Outcome::Skipped(reason) => tally.skip(session.id, reason),
            }
        }

        info!("Step 2: retrying {} sessions", retry_queue.len());
        for (session_id, first_reason) in retry_queue {
            let Some(mut session) = db::sessions::find_session(&mut conn, session_id).await? else {
                info!("Session {} disappeared before retry", session_id);
                continue;
            };
            if session.status != SessionStatus::Validated {
                continue;
            }

            let mut relocated = false;
            if self.settings.reschedule_on_conflict && matches!(first_reason, SkipReason::Conflict(_)) {
                match self.free_slot_for(&mut conn, &session).await? {
                    Some(candidate) => {
                        session = candidate;
                        relocated = true;
                    }
                    None => {
                        tally.skip(session_id, SkipReason::NoFreeSlot);
                        continue;
                    }
                }
            }

            match self.try_publish(&mut conn, &session, &admins, relocated).await? {
                Outcome::Published => tally.published += 1,
                Outcome::Skipped(reason) => tally.skip(session_id, reason),
            }
        }

        info!("Step 3: checking quotas");
        let quota_alerts = self.alert_quotas(&mut conn, &admins).await?;

        info!("Step 4: recording run");
        let run = AutomationRun {
            id: Uuid::new_v4().to_string(),
            ran_at: self.clock.now(),
            published_count: tally.published as i64,
            skipped_count: tally.skipped.len() as i64,
            conflicts_count: tally.conflicts as i64,
            quota_alerts_count: quota_alerts as i64,
            skipped_details: tally.skipped.clone(),
        };
        db::runs::insert_run(&mut conn, &run).await?;

        if !admins.is_empty() {
            let summary = Notification::new(
                NotificationKind::AutomationCompleted,
                "Automation run completed",
                format!(
                    "{} published, {} skipped ({} conflicts), {} quota alerts",
                    run.published_count, run.skipped_count, run.conflicts_count, run.quota_alerts_count
                ),
            );
            self.notifier.notify(&admins, &summary).await;
        }

        info!(
            "Automation run {} completed: {} published, {} skipped",
            run.id, run.published_count, run.skipped_count
        );
        Ok(PublishReport {
            published: tally.published,
            skipped: tally.skipped,
            run,
        })
    }

    /// Checks then publishes one session. Verdicts are computed from reads
    /// only; the writes happen in a single transaction afterwards. With
    /// `relocated`, `session` carries a new slot that is stored in that same
    /// transaction.
    async fn try_publish(
        &self,
        conn: &mut SqliteConnection,
        session: &Session,
        admins: &[i64],
        relocated: bool,
    ) -> Result<Outcome, AppError> {
        let subject = db::subjects::find_subject(conn, session.subject_id).await?;
        let Some((subject, teacher_id)) = subject.and_then(|s| s.teacher_id.map(|t| (s, t))) else {
            return Ok(Outcome::Skipped(SkipReason::NoTeacherAttached));
        };

        let window = match session.window() {
            Ok(w) => w,
            Err(AppError::MalformedTime(value)) => {
                return Ok(Outcome::Skipped(SkipReason::MalformedTime(value)));
            }
            Err(e) => return Err(e),
        };

        if let Some(conflict) = conflict::check_session(conn, session, teacher_id, window).await? {
            return Ok(Outcome::Skipped(SkipReason::Conflict(conflict)));
        }

        let hours = quota::hours_for(window);
        if self.quota.is_exceeded(conn, &subject, teacher_id, hours).await? {
            return Ok(Outcome::Skipped(SkipReason::QuotaExceeded));
        }

        let mut attempt = 0;
        let published = loop {
            attempt += 1;
            match self.commit_publish(conn, session, &subject, teacher_id, relocated).await {
                Err(e) if e.is_transient() && attempt < db::MAX_TX_ATTEMPTS => db::backoff(attempt, &e).await,
                Err(AppError::QuotaExceeded { .. }) => return Ok(Outcome::Skipped(SkipReason::QuotaExceeded)),
                other => break other?,
            }
        };

        if !published {
            return Ok(Outcome::Skipped(SkipReason::NoLongerValidated));
        }

        info!("Published session {} ({} h)", session.id, hours);
        self.notify_published(&subject, teacher_id, session, admins).await;
        Ok(Outcome::Published)
    }

    async fn commit_publish(
        &self,
        conn: &mut SqliteConnection,
        session: &Session,
        subject: &Subject,
        teacher_id: i64,
        relocated: bool,
    ) -> Result<bool, AppError> {
        let mut tx = conn.begin().await?;

        let flipped = db::sessions::transition_status(
            &mut tx,
            session.id,
            SessionStatus::Validated,
            SessionStatus::Published,
        )
        .await?;
        if !flipped {
            tx.rollback().await?;
            return Ok(false);
        }

        if relocated {
            db::sessions::update_slot(
                &mut tx,
                session.id,
                session.day,
                &session.start_time,
                &session.end_time,
                session.room_id,
            )
            .await?;
        }

        // QuotaExceeded drops `tx`, which rolls the status flip back.
        self.quota.on_publish(&mut tx, session, subject, teacher_id).await?;
        tx.commit().await?;
        Ok(true)
    }

    /// The session placed in the next free catalogue slot, without storing
    /// anything. `None` once the week is exhausted.
    async fn free_slot_for(
        &self,
        conn: &mut SqliteConnection,
        session: &Session,
    ) -> Result<Option<Session>, AppError> {
        let Ok(window) = session.window() else {
            return Ok(None);
        };
        let teacher_id = db::subjects::find_subject(conn, session.subject_id)
            .await?
            .and_then(|s| s.teacher_id);

        let rows = db::sessions::fetch_bookings(conn, true, Some(session.id)).await?;
        let bookings = Booking::from_rows(rows);

        let Some((day, slot)) = slot_search::find_free_slot(
            &self.settings.catalogue,
            session.day,
            window,
            session.room_id,
            teacher_id,
            &bookings,
        ) else {
            return Ok(None);
        };

        info!("Session {} may move from {} {} to {} {}", session.id, session.day, window, day, slot);
        Ok(Some(Session {
            day,
            start_time: slot.start_str(),
            end_time: slot.end_str(),
            ..session.clone()
        }))
    }

    /// One alert per quota that is used up or nearly so. Returns the number
    /// of alerts sent, so a run without admins counts none.
    async fn alert_quotas(&self, conn: &mut SqliteConnection, admins: &[i64]) -> Result<usize, AppError> {
        let quotas = db::quotas::fetch_nearly_exhausted(conn, ALERT_RATIO).await?;
        if quotas.is_empty() {
            return Ok(0);
        }
        warn!("{} quotas at or below {}% remaining", quotas.len(), ALERT_RATIO * 100.0);
        if admins.is_empty() {
            warn!("No admin to alert about {} quotas", quotas.len());
            return Ok(0);
        }

        for q in &quotas {
            let name = db::subjects::find_subject(conn, q.subject_id)
                .await?
                .map(|s| s.name)
                .unwrap_or_else(|| format!("subject {}", q.subject_id));
            let notification = Notification::new(
                NotificationKind::QuotaAlert,
                "Teaching quota nearly exhausted",
                format!(
                    "{} (teacher {}): {:.2} h used of {:.2} h, {:.2} h remaining",
                    name, q.teacher_id, q.used_quota, q.total_quota, q.remaining_quota
                ),
            )
            .for_subject(q.subject_id);
            self.notifier.notify(admins, &notification).await;
        }
        Ok(quotas.len())
    }

    async fn notify_published(&self, subject: &Subject, teacher_id: i64, session: &Session, admins: &[i64]) {
        let recipients = notify::recipients(
            [Some(teacher_id), subject.programmer_id]
                .into_iter()
                .chain(admins.iter().copied().map(Some)),
        );
        let notification = Notification::new(
            NotificationKind::SessionPublished,
            "Session published",
            format!(
                "{} on {} from {} to {} is now published",
                subject.name, session.day, session.start_time, session.end_time
            ),
        )
        .for_session(session.id)
        .for_subject(subject.id);
        self.notifier.notify(&recipients, &notification).await;
    }
}
