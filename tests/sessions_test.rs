mod common;

use common::Fixture;
use timetable::clock::Clock;
use timetable::db;
use timetable::error::AppError;
use timetable::models::{ConflictKind, NewSessionRequest, QuotaStatus, Role, SessionStatus, UpdateSessionRequest};
use timetable::services::{AutomationService, QuotaTracker, SessionService};
use timetable::timeslot::Day;

fn draft(subject_id: i64, day: Day, start: &str, end: &str) -> NewSessionRequest {
    NewSessionRequest {
        subject_id,
        day,
        start_time: start.to_string(),
        end_time: end.to_string(),
        room_id: None,
    }
}

async fn used_hours(fx: &Fixture, subject_id: i64, teacher_id: i64) -> f64 {
    let mut conn = fx.conn().await;
    db::quotas::find_quota(&mut conn, subject_id, teacher_id)
        .await
        .unwrap()
        .map(|q| q.used_quota)
        .unwrap_or(0.0)
}

#[tokio::test]
async fn test_draft_validate_publish_flow() {
    let fx = Fixture::new().await;
    let year = fx.with_year().await;
    let teacher = fx.user("T", Role::Teacher).await;
    let room = fx.room("R1", 30, None).await;
    let subject = fx.subject("X", Some(teacher), 20.0).await;
    let service = SessionService::new(&fx.state);

    let created = service
        .create_draft(draft(subject.id, Day::Monday, "08:00:00", "10:00"))
        .await
        .expect("draft");
    assert_eq!(created.status, SessionStatus::Draft);
    assert_eq!(created.start_time, "08:00");
    assert_eq!(created.academic_year_id, Some(year.id));
    assert_eq!(created.room_id, None);

    let validated = service.validate(created.id).await.expect("validate");
    assert_eq!(validated.status, SessionStatus::Validated);
    assert_eq!(validated.room_id, Some(room.id));

    let again = service.validate(created.id).await;
    assert!(matches!(again, Err(AppError::Conflict(_))));

    let report = AutomationService::new(&fx.state).publish_validated().await.unwrap();
    assert_eq!(report.published, 1);
    assert_eq!(used_hours(&fx, subject.id, teacher).await, 2.0);
}

#[tokio::test]
async fn test_draft_rejects_bad_input() {
    let fx = Fixture::new().await;
    let subject = fx.subject("X", None, 20.0).await;
    let service = SessionService::new(&fx.state);

    let inverted = service.create_draft(draft(subject.id, Day::Monday, "10:00", "08:00")).await;
    assert!(matches!(inverted, Err(AppError::BadRequest(_))));

    let malformed = service.create_draft(draft(subject.id, Day::Monday, "ten", "12:00")).await;
    assert!(matches!(malformed, Err(AppError::MalformedTime(_))));

    let unknown = service.create_draft(draft(4242, Day::Monday, "10:00", "12:00")).await;
    assert!(matches!(unknown, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn test_editing_published_session_applies_quota_delta() {
    let fx = Fixture::new().await;
    let teacher = fx.user("T", Role::Teacher).await;
    let subject = fx.subject("X", Some(teacher), 20.0).await;
    let session = fx
        .session(subject.id, None, Day::Monday, "08:00", "10:00", SessionStatus::Validated)
        .await;
    AutomationService::new(&fx.state).publish_validated().await.unwrap();
    assert_eq!(used_hours(&fx, subject.id, teacher).await, 2.0);

    let service = SessionService::new(&fx.state);
    let longer = service
        .update(
            session.id,
            UpdateSessionRequest {
                end_time: Some("11:00".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("edit");
    assert_eq!(longer.end_time, "11:00");
    assert_eq!(longer.hours_used, 3.0);
    assert_eq!(used_hours(&fx, subject.id, teacher).await, 3.0);

    let shorter = service
        .update(
            session.id,
            UpdateSessionRequest {
                day: Some(Day::Tuesday),
                start_time: Some("09:00".to_string()),
                end_time: Some("10:00".to_string()),
                ..Default::default()
            },
        )
        .await
        .expect("edit");
    assert_eq!(shorter.day, Day::Tuesday);
    assert_eq!(shorter.hours_used, 1.0);
    assert_eq!(used_hours(&fx, subject.id, teacher).await, 1.0);
}

#[tokio::test]
async fn test_edit_past_quota_is_refused() {
    let fx = Fixture::new().await;
    let teacher = fx.user("T", Role::Teacher).await;
    let subject = fx.subject("X", Some(teacher), 2.0).await;
    let session = fx
        .session(subject.id, None, Day::Monday, "08:00", "10:00", SessionStatus::Validated)
        .await;
    AutomationService::new(&fx.state).publish_validated().await.unwrap();

    let result = SessionService::new(&fx.state)
        .update(
            session.id,
            UpdateSessionRequest {
                end_time: Some("12:00".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::QuotaExceeded { subject_id }) if subject_id == subject.id));

    let unchanged = fx.reload(session.id).await.unwrap();
    assert_eq!(unchanged.end_time, "10:00");
    assert_eq!(used_hours(&fx, subject.id, teacher).await, 2.0);
}

#[tokio::test]
async fn test_edit_into_conflict_is_refused() {
    let fx = Fixture::new().await;
    let teacher = fx.user("T", Role::Teacher).await;
    let a = fx.subject("A", Some(teacher), 20.0).await;
    let b = fx.subject("B", Some(teacher), 20.0).await;
    let other = fx
        .session(a.id, None, Day::Monday, "10:00", "12:00", SessionStatus::Published)
        .await;
    let session = fx
        .session(b.id, None, Day::Monday, "08:00", "10:00", SessionStatus::Validated)
        .await;
    AutomationService::new(&fx.state).publish_validated().await.unwrap();

    let result = SessionService::new(&fx.state)
        .update(
            session.id,
            UpdateSessionRequest {
                end_time: Some("11:00".to_string()),
                ..Default::default()
            },
        )
        .await;
    match result {
        Err(AppError::Scheduling(ConflictKind::TeacherConflict { teacher_id, with_session })) => {
            assert_eq!(teacher_id, teacher);
            assert_eq!(with_session, other.id);
        }
        unexpected => panic!("expected a teacher conflict, got {:?}", unexpected),
    }
}

#[tokio::test]
async fn test_deleting_published_session_returns_hours() {
    let fx = Fixture::new().await;
    let teacher = fx.user("T", Role::Teacher).await;
    let subject = fx.subject("X", Some(teacher), 20.0).await;
    let kept = fx
        .session(subject.id, None, Day::Monday, "08:00", "10:00", SessionStatus::Validated)
        .await;
    let removed = fx
        .session(subject.id, None, Day::Tuesday, "08:00", "11:00", SessionStatus::Validated)
        .await;
    AutomationService::new(&fx.state).publish_validated().await.unwrap();
    assert_eq!(used_hours(&fx, subject.id, teacher).await, 5.0);

    let service = SessionService::new(&fx.state);
    service.delete(removed.id).await.expect("delete");
    assert!(fx.reload(removed.id).await.is_none());
    assert!(fx.reload(kept.id).await.is_some());
    assert_eq!(used_hours(&fx, subject.id, teacher).await, 2.0);

    assert!(matches!(service.delete(removed.id).await, Err(AppError::NotFound)));
}

#[tokio::test]
async fn test_quota_report_and_recompute() {
    let fx = Fixture::new().await;
    let teacher = fx.user("T", Role::Teacher).await;
    let subject = fx.subject("X", Some(teacher), 40.0).await;
    let tracker = QuotaTracker::new(fx.state.clock.clone());

    {
        let mut conn = fx.conn().await;
        let empty = tracker.report(&mut conn, &subject, teacher).await.unwrap();
        assert_eq!(empty.status, QuotaStatus::NotProgrammed);
        assert_eq!(empty.used, 0.0);
        assert_eq!(empty.remaining, 40.0);
        assert_eq!(empty.percentage, 0.0);
    }

    fx.session(subject.id, None, Day::Monday, "08:00", "12:00", SessionStatus::Validated)
        .await;
    AutomationService::new(&fx.state).publish_validated().await.unwrap();

    let mut conn = fx.conn().await;
    let quota = db::quotas::find_quota(&mut conn, subject.id, teacher)
        .await
        .unwrap()
        .unwrap();
    db::quotas::set_used(&mut conn, quota.id, 17.5, fx.state.clock.now()).await.unwrap();

    let report = tracker.report(&mut conn, &subject, teacher).await.unwrap();
    assert_eq!(report.used, 4.0);
    assert_eq!(report.percentage, 10.0);

    let fixed = tracker.recompute(&mut conn, &subject, teacher).await.unwrap();
    assert_eq!(fixed.used_quota, 4.0);
    assert_eq!(fixed.remaining_quota, 36.0);
}

#[tokio::test]
async fn test_quota_total_follows_subject_hours() {
    let fx = Fixture::new().await;
    let teacher = fx.user("T", Role::Teacher).await;
    let subject = fx.subject("X", Some(teacher), 40.0).await;
    let tracker = QuotaTracker::new(fx.state.clock.clone());

    let mut conn = fx.conn().await;
    let created = tracker.get_or_create(&mut conn, &subject, teacher).await.unwrap();
    assert_eq!(created.total_quota, 40.0);
    assert_eq!(created.remaining_quota, 40.0);

    db::subjects::update_total_hour(&mut conn, subject.id, 30.0).await.unwrap();
    let subject = db::subjects::find_subject(&mut conn, subject.id).await.unwrap().unwrap();
    let resynced = tracker.get_or_create(&mut conn, &subject, teacher).await.unwrap();
    assert_eq!(resynced.id, created.id);
    assert_eq!(resynced.total_quota, 30.0);
    assert_eq!(resynced.remaining_quota, 30.0);

    assert!(!tracker.is_exceeded(&mut conn, &subject, teacher, 30.0).await.unwrap());
    assert!(tracker.is_exceeded(&mut conn, &subject, teacher, 30.5).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_edits_cannot_overrun_quota() {
    let fx = Fixture::on_file().await;
    let teacher = fx.user("T", Role::Teacher).await;
    let subject = fx.subject("X", Some(teacher), 4.0).await;

    // 1 時間のセッションを 2 つ公開
    let monday = fx
        .session(subject.id, None, Day::Monday, "08:00", "09:00", SessionStatus::Validated)
        .await;
    let tuesday = fx
        .session(subject.id, None, Day::Tuesday, "08:00", "09:00", SessionStatus::Validated)
        .await;
    assert_eq!(
        AutomationService::new(&fx.state).publish_validated().await.unwrap().published,
        2
    );
    assert_eq!(used_hours(&fx, subject.id, teacher).await, 2.0);

    // 別々の接続から同時に 2.5 時間へ延長
    let edits = [monday.id, tuesday.id].map(|id| {
        let state = fx.state.clone();
        tokio::spawn(async move {
            SessionService::new(&state)
                .update(
                    id,
                    UpdateSessionRequest {
                        end_time: Some("10:30".to_string()),
                        ..Default::default()
                    },
                )
                .await
        })
    });
    let mut applied = 0;
    let mut refused = 0;
    for edit in edits {
        match edit.await.expect("edit task") {
            Ok(session) => {
                assert_eq!(session.hours_used, 2.5);
                applied += 1;
            }
            Err(AppError::QuotaExceeded { subject_id }) => {
                assert_eq!(subject_id, subject.id);
                refused += 1;
            }
            unexpected => panic!("expected an edit or a quota refusal, got {:?}", unexpected),
        }
    }
    assert_eq!((applied, refused), (1, 1));

    let used = used_hours(&fx, subject.id, teacher).await;
    assert_eq!(used, 3.5);
    assert!(used <= 4.0 + timetable::services::quota::QUOTA_EPSILON);

    let lengths: Vec<f64> = fx.sessions().await.iter().map(|s| s.hours_used).collect();
    assert_eq!(lengths.iter().sum::<f64>(), used);
}
