use std::sync::Arc;

use serde::Serialize;
use sqlx::{Connection, SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::db;
use crate::db::sessions::NewSession;
use crate::error::AppError;
use crate::models::{AcademicYear, Availability, AvailabilityStatus, DeferredAvailability, Session, SessionStatus, Subject};
use crate::notify::{self, Notification, NotificationKind, NotificationSink};
use crate::services::continuity::{self, RoomChoice};
use crate::state::AppState;
use crate::timeslot::TimeWindow;

/// Turns pending teacher availabilities into validated sessions.
pub struct ConversionService {
    db: SqlitePool,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Serialize)]
pub struct ConversionReport {
    pub sessions: Vec<Session>,
    pub deferred: Vec<DeferredAvailability>,
}

enum Deferral {
    NoRoom,
    MalformedTime(String),
    MissingSubject,
}

impl Deferral {
    fn reason(&self) -> String {
        match self {
            Deferral::NoRoom => "no room available".to_string(),
            Deferral::MalformedTime(value) => format!("malformed time: {}", value),
            Deferral::MissingSubject => "subject not found".to_string(),
        }
    }

    fn into_error(self) -> AppError {
        match self {
            Deferral::NoRoom => AppError::NoRoomAvailable,
            Deferral::MalformedTime(value) => AppError::MalformedTime(value),
            Deferral::MissingSubject => AppError::NotFound,
        }
    }
}

enum Conversion {
    Created(Session),
    Deferred(Deferral),
    AlreadyUsed,
}

impl ConversionService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db: state.db.clone(),
            notifier: state.notifier.clone(),
            clock: state.clock.clone(),
        }
    }

    /// Converts every pending availability it can place. Availabilities
    /// without a room stay pending and are listed in `deferred`.
    pub async fn convert_pending(&self) -> Result<ConversionReport, AppError> {
        info!("Starting availability conversion...");
        let mut conn = self.db.acquire().await?;
        let year = self.active_year(&mut conn).await?;

        let pending = db::availabilities::fetch_pending(&mut conn).await?;
        info!("{} pending availabilities, academic year {}", pending.len(), year.label);

        let mut report = ConversionReport {
            sessions: Vec::new(),
            deferred: Vec::new(),
        };

        for availability in pending {
            match self.convert(&mut conn, &availability, &year).await? {
                Conversion::Created(session) => report.sessions.push(session),
                Conversion::Deferred(deferral) => {
                    warn!("Deferring availability {}: {}", availability.id, deferral.reason());
                    report.deferred.push(DeferredAvailability {
                        availability_id: availability.id,
                        reason: deferral.reason(),
                    });
                }
                Conversion::AlreadyUsed => {}
            }
        }

        info!(
            "Conversion completed: {} created, {} deferred",
            report.sessions.len(),
            report.deferred.len()
        );
        Ok(report)
    }

    /// Converts one availability. `Ok(None)` when it was already converted.
    pub async fn convert_one(&self, availability_id: i64) -> Result<Option<Session>, AppError> {
        let mut conn = self.db.acquire().await?;
        let availability = db::availabilities::find_availability(&mut conn, availability_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if availability.status == AvailabilityStatus::Used {
            return Ok(None);
        }

        let year = self.active_year(&mut conn).await?;
        match self.convert(&mut conn, &availability, &year).await? {
            Conversion::Created(session) => Ok(Some(session)),
            Conversion::AlreadyUsed => Ok(None),
            Conversion::Deferred(deferral) => Err(deferral.into_error()),
        }
    }

    async fn active_year(&self, conn: &mut SqliteConnection) -> Result<AcademicYear, AppError> {
        db::academic_years::find_active(conn, self.clock.today())
            .await?
            .ok_or(AppError::NoActiveYear)
    }

    async fn convert(
        &self,
        conn: &mut SqliteConnection,
        availability: &Availability,
        year: &AcademicYear,
    ) -> Result<Conversion, AppError> {
        let window = match availability.window() {
            Ok(w) => w,
            Err(AppError::MalformedTime(value)) => {
                return Ok(Conversion::Deferred(Deferral::MalformedTime(value)));
            }
            Err(e) => return Err(e),
        };

        let Some(subject) = db::subjects::find_subject(conn, availability.subject_id).await? else {
            return Ok(Conversion::Deferred(Deferral::MissingSubject));
        };

        let campuses = continuity::campus_scope(conn, availability.establishment_id).await?;
        let choice =
            continuity::choose_room(conn, &subject, availability.day, window, campuses.as_deref(), None).await?;
        let Some(choice) = choice else {
            return Ok(Conversion::Deferred(Deferral::NoRoom));
        };

        let mut attempt = 0;
        let created = loop {
            attempt += 1;
            match self.commit(conn, availability, year, window, choice).await {
                Err(e) if e.is_transient() && attempt < db::MAX_TX_ATTEMPTS => db::backoff(attempt, &e).await,
                other => break other?,
            }
        };

        let Some(session) = created else {
            info!("Availability {} was converted concurrently", availability.id);
            return Ok(Conversion::AlreadyUsed);
        };

        info!(
            "Availability {} -> session {} in room {} ({:?})",
            availability.id, session.id, choice.room_id, choice.source
        );
        self.notify_programmed(&subject, &session).await;
        Ok(Conversion::Created(session))
    }

    /// Marks the availability used and creates its session atomically.
    /// `None` when the availability is no longer pending.
    async fn commit(
        &self,
        conn: &mut SqliteConnection,
        availability: &Availability,
        year: &AcademicYear,
        window: TimeWindow,
        choice: RoomChoice,
    ) -> Result<Option<Session>, AppError> {
        let mut tx = conn.begin().await?;

        if !db::availabilities::mark_used(&mut tx, availability.id).await? {
            tx.rollback().await?;
            return Ok(None);
        }

        let session = db::sessions::insert_session(
            &mut tx,
            NewSession {
                subject_id: availability.subject_id,
                room_id: Some(choice.room_id),
                academic_year_id: Some(year.id),
                availability_id: Some(availability.id),
                day: availability.day,
                start_time: window.start_str(),
                end_time: window.end_str(),
                status: SessionStatus::Validated,
            },
            self.clock.now(),
        )
        .await?;

        tx.commit().await?;
        Ok(Some(session))
    }

    async fn notify_programmed(&self, subject: &Subject, session: &Session) {
        let recipients = notify::recipients([subject.teacher_id, subject.programmer_id]);
        if recipients.is_empty() {
            return;
        }
        let notification = Notification::new(
            NotificationKind::SessionProgrammed,
            "Session programmed",
            format!(
                "{} is scheduled on {} from {} to {}",
                subject.name, session.day, session.start_time, session.end_time
            ),
        )
        .for_session(session.id)
        .for_subject(subject.id);
        self.notifier.notify(&recipients, &notification).await;
    }
}
