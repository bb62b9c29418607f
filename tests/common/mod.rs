#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::SqlitePool;
use sqlx::pool::PoolConnection;
use sqlx::Sqlite;

use timetable::clock::{Clock, FixedClock};
use timetable::config::SchedulingSettings;
use timetable::db;
use timetable::db::rooms::NewRoom;
use timetable::db::sessions::NewSession;
use timetable::db::subjects::NewSubject;
use timetable::models::{
    AcademicYear, Availability, NewAvailabilityRequest, Role, Room, Session, SessionStatus, Subject,
};
use timetable::notify::RecordingNotificationSink;
use timetable::state::AppState;
use timetable::timeslot::Day;

pub struct Fixture {
    pub state: AppState,
    pub notifier: Arc<RecordingNotificationSink>,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_settings(SchedulingSettings::default()).await
    }

    /// In-memory database with the clock pinned to 2026-10-19. No academic
    /// year exists until [`Fixture::with_year`] is called.
    pub async fn with_settings(settings: SchedulingSettings) -> Self {
        let pool = db::connect_in_memory().await.expect("Failed to create database");
        let notifier = Arc::new(RecordingNotificationSink::new());
        let clock = FixedClock::on(2026, 10, 19).expect("valid date");
        let state = AppState::new(pool, notifier.clone(), Arc::new(clock), settings);
        Self { state, notifier }
    }

    /// File-backed database with a four-connection pool, for tests that
    /// need writers on separate connections.
    pub async fn on_file() -> Self {
        let path = std::env::temp_dir().join(format!("timetable-{}.db", uuid::Uuid::new_v4()));
        let url = format!("sqlite://{}", path.display());
        let pool = db::connect(&url, 4).await.expect("Failed to create database");
        let notifier = Arc::new(RecordingNotificationSink::new());
        let clock = FixedClock::on(2026, 10, 19).expect("valid date");
        let state = AppState::new(pool, notifier.clone(), Arc::new(clock), SchedulingSettings::default());
        Self { state, notifier }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.state.db
    }

    pub async fn conn(&self) -> PoolConnection<Sqlite> {
        self.state.db.acquire().await.expect("Failed to acquire connection")
    }

    pub async fn with_year(&self) -> AcademicYear {
        self.year(
            "2026-2027",
            NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            NaiveDate::from_ymd_opt(2027, 7, 31).unwrap(),
        )
        .await
    }

    pub async fn year(&self, label: &str, start: NaiveDate, end: NaiveDate) -> AcademicYear {
        let mut conn = self.conn().await;
        db::academic_years::insert_academic_year(&mut conn, label, start, end)
            .await
            .expect("Failed to insert academic year")
    }

    pub async fn user(&self, name: &str, role: Role) -> i64 {
        let mut conn = self.conn().await;
        db::users::insert_user(&mut conn, name, role)
            .await
            .expect("Failed to insert user")
            .id
    }

    pub async fn subject(&self, name: &str, teacher_id: Option<i64>, total_hour: f64) -> Subject {
        self.subject_with(NewSubject {
            name: name.to_string(),
            teacher_id,
            total_hour,
            ..Default::default()
        })
        .await
    }

    pub async fn subject_with(&self, subject: NewSubject) -> Subject {
        let mut conn = self.conn().await;
        db::subjects::insert_subject(&mut conn, subject)
            .await
            .expect("Failed to insert subject")
    }

    pub async fn room(&self, code: &str, capacity: i64, campus_id: Option<i64>) -> Room {
        let mut conn = self.conn().await;
        db::rooms::insert_room(
            &mut conn,
            NewRoom {
                code: code.to_string(),
                capacity,
                room_type: None,
                is_available: true,
                campus_id,
            },
        )
        .await
        .expect("Failed to insert room")
    }

    /// Establishment with one campus; returns `(establishment_id, campus_id)`.
    pub async fn establishment(&self, name: &str) -> (i64, i64) {
        let mut conn = self.conn().await;
        let establishment = db::rooms::insert_establishment(&mut conn, name)
            .await
            .expect("Failed to insert establishment");
        let campus = db::rooms::insert_campus(&mut conn, establishment, &format!("{} main", name))
            .await
            .expect("Failed to insert campus");
        (establishment, campus)
    }

    pub async fn session(
        &self,
        subject_id: i64,
        room_id: Option<i64>,
        day: Day,
        start: &str,
        end: &str,
        status: SessionStatus,
    ) -> Session {
        let mut conn = self.conn().await;
        db::sessions::insert_session(
            &mut conn,
            NewSession {
                subject_id,
                room_id,
                academic_year_id: None,
                availability_id: None,
                day,
                start_time: start.to_string(),
                end_time: end.to_string(),
                status,
            },
            self.state.clock.now(),
        )
        .await
        .expect("Failed to insert session")
    }

    pub async fn availability(
        &self,
        subject_id: i64,
        day: Day,
        start: &str,
        end: &str,
        establishment_id: Option<i64>,
    ) -> Availability {
        let mut conn = self.conn().await;
        let req = NewAvailabilityRequest {
            subject_id,
            day,
            start_time: start.to_string(),
            end_time: end.to_string(),
            establishment_id,
        };
        db::availabilities::insert_availability(&mut conn, &req, self.state.clock.now())
            .await
            .expect("Failed to insert availability")
    }

    pub async fn reload(&self, session_id: i64) -> Option<Session> {
        let mut conn = self.conn().await;
        db::sessions::find_session(&mut conn, session_id)
            .await
            .expect("Failed to load session")
    }

    pub async fn sessions(&self) -> Vec<Session> {
        let mut conn = self.conn().await;
        db::sessions::fetch_sessions(&mut conn)
            .await
            .expect("Failed to load sessions")
    }
}
