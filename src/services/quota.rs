//! Teaching-hour budgets per (subject, teacher).
//!
//! The stored `used_quota` is a running cache maintained by explicit calls
//! from the services that publish, edit and delete sessions. Nothing here is
//! triggered by a write, so writing the session snapshot can never loop back
//! into another quota update. Status reporting ignores the cache and sums the
//! published sessions directly.

use std::sync::Arc;

use sqlx::SqliteConnection;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::db;
use crate::error::AppError;
use crate::models::{Quota, QuotaReport, QuotaStatus, Session, Subject};
use crate::timeslot::TimeWindow;

/// Rounding margin, in hours, allowed when comparing used against total.
pub const QUOTA_EPSILON: f64 = 0.01;

/// Share of the total below which admins are warned.
pub const ALERT_RATIO: f64 = 0.10;

/// Hours taught in `window`; zero for degenerate or inverted windows.
pub fn hours_for(window: TimeWindow) -> f64 {
    f64::from(window.duration_minutes()) / 60.0
}

pub fn hours_used(start_time: &str, end_time: &str) -> Result<f64, AppError> {
    Ok(hours_for(TimeWindow::parse(start_time, end_time)?))
}

pub fn exceeds(used: f64, additional: f64, total: f64) -> bool {
    used + additional > total + QUOTA_EPSILON
}

pub fn derive_status(used: f64, total: f64) -> QuotaStatus {
    if used <= QUOTA_EPSILON {
        QuotaStatus::NotProgrammed
    } else if used + QUOTA_EPSILON >= total {
        QuotaStatus::Completed
    } else {
        QuotaStatus::InProgress
    }
}

pub fn percentage(used: f64, total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    (used / total * 10000.0).round() / 100.0
}

pub struct QuotaTracker {
    clock: Arc<dyn Clock>,
}

impl QuotaTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Fetches the quota of the pair, creating it from the subject's
    /// configured hours. A stored total that drifted from the subject by more
    /// than [`QUOTA_EPSILON`] is brought back in line.
    pub async fn get_or_create(
        &self,
        conn: &mut SqliteConnection,
        subject: &Subject,
        teacher_id: i64,
    ) -> Result<Quota, AppError> {
        let now = self.clock.now();
        db::quotas::insert_if_missing(conn, subject.id, teacher_id, subject.total_hour, now).await?;

        let quota = db::quotas::find_quota(conn, subject.id, teacher_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if (quota.total_quota - subject.total_hour).abs() > QUOTA_EPSILON {
            info!(
                "resyncing quota {} total {} -> {} for subject {}",
                quota.id, quota.total_quota, subject.total_hour, subject.id
            );
            db::quotas::set_total(conn, quota.id, subject.total_hour, now).await?;
            return db::quotas::find_quota(conn, subject.id, teacher_id)
                .await?
                .ok_or(AppError::NotFound);
        }

        Ok(quota)
    }

    pub async fn is_exceeded(
        &self,
        conn: &mut SqliteConnection,
        subject: &Subject,
        teacher_id: i64,
        additional_hours: f64,
    ) -> Result<bool, AppError> {
        let quota = self.get_or_create(conn, subject, teacher_id).await?;
        Ok(exceeds(quota.used_quota, additional_hours, quota.total_quota))
    }

    /// Counts a freshly published session and stores its snapshot. Must run
    /// inside the transaction that publishes the session; a
    /// [`AppError::QuotaExceeded`] leaves the caller to roll back.
    pub async fn on_publish(
        &self,
        conn: &mut SqliteConnection,
        session: &Session,
        subject: &Subject,
        teacher_id: i64,
    ) -> Result<f64, AppError> {
        let hours = hours_for(session.window()?);
        self.get_or_create(conn, subject, teacher_id).await?;
        self.charge(conn, subject, teacher_id, hours).await?;
        db::sessions::set_hours_used(conn, session.id, hours).await?;
        Ok(hours)
    }

    /// Applies the difference between the session's new length and
    /// `old_hours`. `session` carries the edited times. Growth is refused
    /// with [`AppError::QuotaExceeded`] like a publication.
    pub async fn on_edit(
        &self,
        conn: &mut SqliteConnection,
        session: &Session,
        subject: &Subject,
        teacher_id: i64,
        old_hours: f64,
    ) -> Result<f64, AppError> {
        let new_hours = hours_for(session.window()?);
        let delta = new_hours - old_hours;
        self.get_or_create(conn, subject, teacher_id).await?;
        if delta > f64::EPSILON {
            self.charge(conn, subject, teacher_id, delta).await?;
        } else if delta < -f64::EPSILON {
            db::quotas::add_used(conn, subject.id, teacher_id, delta, self.clock.now()).await?;
        }
        db::sessions::set_hours_used(conn, session.id, new_hours).await?;
        Ok(new_hours)
    }

    /// Adds `hours` unless that passes the total. The limit is checked by the
    /// write itself.
    async fn charge(
        &self,
        conn: &mut SqliteConnection,
        subject: &Subject,
        teacher_id: i64,
        hours: f64,
    ) -> Result<(), AppError> {
        let charged = db::quotas::add_used_within(
            conn,
            subject.id,
            teacher_id,
            hours,
            QUOTA_EPSILON,
            self.clock.now(),
        )
        .await?;
        if !charged {
            warn!(
                "quota of subject {} / teacher {} cannot take {} more hours",
                subject.id, teacher_id, hours
            );
            return Err(AppError::QuotaExceeded { subject_id: subject.id });
        }
        Ok(())
    }

    /// Gives back the hours recorded on the session when it was published.
    pub async fn on_delete(
        &self,
        conn: &mut SqliteConnection,
        session: &Session,
        teacher_id: i64,
    ) -> Result<(), AppError> {
        let updated = db::quotas::add_used(
            conn,
            session.subject_id,
            teacher_id,
            -session.hours_used,
            self.clock.now(),
        )
        .await?;
        if !updated {
            warn!(
                "no quota row for subject {} / teacher {} while deleting session {}",
                session.subject_id, teacher_id, session.id
            );
        }
        Ok(())
    }

    /// Hours of every currently published session of the subject.
    pub async fn real_used_hours(&self, conn: &mut SqliteConnection, subject_id: i64) -> Result<f64, AppError> {
        let times = db::sessions::fetch_published_times(conn, subject_id).await?;
        let mut total = 0.0;
        for (start, end) in times {
            match hours_used(&start, &end) {
                Ok(h) => total += h,
                Err(e) => warn!("published session of subject {} has bad times: {}", subject_id, e),
            }
        }
        Ok(total)
    }

    pub async fn report(
        &self,
        conn: &mut SqliteConnection,
        subject: &Subject,
        teacher_id: i64,
    ) -> Result<QuotaReport, AppError> {
        let quota = self.get_or_create(conn, subject, teacher_id).await?;
        let used = self.real_used_hours(conn, subject.id).await?;

        Ok(QuotaReport {
            subject_id: subject.id,
            teacher_id,
            total: quota.total_quota,
            used,
            remaining: quota.total_quota - used,
            status: derive_status(used, quota.total_quota),
            percentage: percentage(used, quota.total_quota),
        })
    }

    /// Rewrites the cached used/remaining hours from the published sessions.
    pub async fn recompute(
        &self,
        conn: &mut SqliteConnection,
        subject: &Subject,
        teacher_id: i64,
    ) -> Result<Quota, AppError> {
        let quota = self.get_or_create(conn, subject, teacher_id).await?;
        let used = self.real_used_hours(conn, subject.id).await?;
        if (quota.used_quota - used).abs() > QUOTA_EPSILON {
            warn!(
                "quota {} cache drifted: stored {} vs published {}",
                quota.id, quota.used_quota, used
            );
        }
        db::quotas::set_used(conn, quota.id, used, self.clock.now()).await?;
        db::quotas::find_quota(conn, subject.id, teacher_id)
            .await?
            .ok_or(AppError::NotFound)
    }
}
