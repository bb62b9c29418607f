//! Manual scheduling: drafts, validation, edits and deletion. Publishing is
//! left to the automation run.

use std::sync::Arc;

use sqlx::{Connection, SqliteConnection, SqlitePool};
use tracing::info;

use crate::clock::Clock;
use crate::db;
use crate::db::sessions::NewSession;
use crate::error::AppError;
use crate::models::{NewSessionRequest, Session, SessionStatus, Subject, UpdateSessionRequest};
use crate::services::conflict::{self, Placement};
use crate::services::continuity;
use crate::services::quota::{self, QuotaTracker};
use crate::state::AppState;
use crate::timeslot::{Day, TimeWindow};

pub struct SessionService {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
    quota: QuotaTracker,
}

impl SessionService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db: state.db.clone(),
            clock: state.clock.clone(),
            quota: QuotaTracker::new(state.clock.clone()),
        }
    }

    pub async fn list(&self) -> Result<Vec<Session>, AppError> {
        let mut conn = self.db.acquire().await?;
        Ok(db::sessions::fetch_sessions(&mut conn).await?)
    }

    pub async fn create_draft(&self, req: NewSessionRequest) -> Result<Session, AppError> {
        let window = TimeWindow::parse_strict(&req.start_time, &req.end_time)?;
        let mut conn = self.db.acquire().await?;

        if db::subjects::find_subject(&mut conn, req.subject_id).await?.is_none() {
            return Err(AppError::BadRequest(format!("unknown subject {}", req.subject_id)));
        }
        if let Some(room_id) = req.room_id {
            if db::rooms::find_room(&mut conn, room_id).await?.is_none() {
                return Err(AppError::BadRequest(format!("unknown room {}", room_id)));
            }
        }
        let year = db::academic_years::find_active(&mut conn, self.clock.today()).await?;

        let session = db::sessions::insert_session(
            &mut conn,
            NewSession {
                subject_id: req.subject_id,
                room_id: req.room_id,
                academic_year_id: year.map(|y| y.id),
                availability_id: None,
                day: req.day,
                start_time: window.start_str(),
                end_time: window.end_str(),
                status: SessionStatus::Draft,
            },
            self.clock.now(),
        )
        .await?;

        info!("Created draft session {}", session.id);
        Ok(session)
    }

    /// Draft -> validated. A session without a room gets one through the
    /// continuity rule or best fit.
    pub async fn validate(&self, id: i64) -> Result<Session, AppError> {
        let mut conn = self.db.acquire().await?;
        let session = db::sessions::find_session(&mut conn, id)
            .await?
            .ok_or(AppError::NotFound)?;

        if session.status != SessionStatus::Draft {
            return Err(AppError::Conflict(format!("session {} is not a draft", id)));
        }

        let room_id = match session.room_id {
            Some(room_id) => room_id,
            None => {
                let subject = load_subject(&mut conn, session.subject_id).await?;
                let window = session.window()?;
                continuity::choose_room(&mut conn, &subject, session.day, window, None, Some(id))
                    .await?
                    .ok_or(AppError::NoRoomAvailable)?
                    .room_id
            }
        };

        let mut tx = conn.begin().await?;
        db::sessions::assign_room(&mut tx, id, room_id).await?;
        if !db::sessions::transition_status(&mut tx, id, SessionStatus::Draft, SessionStatus::Validated).await? {
            tx.rollback().await?;
            return Err(AppError::Conflict(format!("session {} is not a draft", id)));
        }
        tx.commit().await?;

        info!("Validated session {} in room {}", id, room_id);
        db::sessions::find_session(&mut conn, id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Moves a session. Published sessions are re-checked for conflicts and
    /// their quota is adjusted by the change in length.
    pub async fn update(&self, id: i64, req: UpdateSessionRequest) -> Result<Session, AppError> {
        let mut conn = self.db.acquire().await?;
        let current = db::sessions::find_session(&mut conn, id)
            .await?
            .ok_or(AppError::NotFound)?;

        let day = req.day.unwrap_or(current.day);
        let start = req.start_time.unwrap_or_else(|| current.start_time.clone());
        let end = req.end_time.unwrap_or_else(|| current.end_time.clone());
        let window = TimeWindow::parse_strict(&start, &end)?;
        let room_id = req.room_id.or(current.room_id);

        if let Some(room_id) = req.room_id {
            if db::rooms::find_room(&mut conn, room_id).await?.is_none() {
                return Err(AppError::BadRequest(format!("unknown room {}", room_id)));
            }
        }

        if current.status != SessionStatus::Published {
            db::sessions::update_slot(&mut conn, id, day, &window.start_str(), &window.end_str(), room_id).await?;
            return db::sessions::find_session(&mut conn, id)
                .await?
                .ok_or(AppError::NotFound);
        }

        let subject = load_subject(&mut conn, current.subject_id).await?;
        let teacher_id = subject
            .teacher_id
            .ok_or(AppError::NoTeacherAttached { subject_id: subject.id })?;

        let placement = Placement {
            session_id: Some(id),
            teacher_id: Some(teacher_id),
            room_id,
            day,
            window,
        };
        if let Some(kind) = conflict::check_placement(&mut conn, &placement).await? {
            return Err(AppError::Scheduling(kind));
        }

        let old_hours = current.hours_used;
        let delta = quota::hours_for(window) - old_hours;
        if delta > 0.0 && self.quota.is_exceeded(&mut conn, &subject, teacher_id, delta).await? {
            return Err(AppError::QuotaExceeded { subject_id: subject.id });
        }

        let mut attempt = 0;
        let updated = loop {
            attempt += 1;
            match self
                .commit_edit(&mut conn, &current, &subject, teacher_id, day, window, room_id)
                .await
            {
                Err(e) if e.is_transient() && attempt < db::MAX_TX_ATTEMPTS => db::backoff(attempt, &e).await,
                other => break other?,
            }
        };

        info!(
            "Edited published session {}: {} h -> {} h",
            id, old_hours, updated.hours_used
        );
        Ok(updated)
    }

    #[allow(clippy::too_many_arguments)]
    async fn commit_edit(
        &self,
        conn: &mut SqliteConnection,
        current: &Session,
        subject: &Subject,
        teacher_id: i64,
        day: Day,
        window: TimeWindow,
        room_id: Option<i64>,
    ) -> Result<Session, AppError> {
        let mut tx = conn.begin().await?;
        db::sessions::update_slot(&mut tx, current.id, day, &window.start_str(), &window.end_str(), room_id).await?;
        let edited = db::sessions::find_session(&mut tx, current.id)
            .await?
            .ok_or(AppError::NotFound)?;
        self.quota
            .on_edit(&mut tx, &edited, subject, teacher_id, current.hours_used)
            .await?;
        let edited = db::sessions::find_session(&mut tx, current.id)
            .await?
            .ok_or(AppError::NotFound)?;
        tx.commit().await?;
        Ok(edited)
    }

    /// Deletes a session, giving its hours back to the quota when it was
    /// published.
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        let mut conn = self.db.acquire().await?;
        let session = db::sessions::find_session(&mut conn, id)
            .await?
            .ok_or(AppError::NotFound)?;

        let teacher_id = db::subjects::find_subject(&mut conn, session.subject_id)
            .await?
            .and_then(|s| s.teacher_id);

        let mut tx = conn.begin().await?;
        if session.status == SessionStatus::Published {
            if let Some(teacher_id) = teacher_id {
                self.quota.on_delete(&mut tx, &session, teacher_id).await?;
            }
        }
        db::sessions::delete_session(&mut tx, id).await?;
        tx.commit().await?;

        info!("Deleted session {} ({:?}, {} h)", id, session.status, session.hours_used);
        Ok(())
    }
}

async fn load_subject(conn: &mut SqliteConnection, subject_id: i64) -> Result<Subject, AppError> {
    db::subjects::find_subject(conn, subject_id)
        .await?
        .ok_or(AppError::NotFound)
}
