mod common;

use chrono::NaiveDate;
use common::Fixture;
use timetable::db;
use timetable::db::subjects::NewSubject;
use timetable::error::AppError;
use timetable::models::{AvailabilityStatus, Role, SessionStatus};
use timetable::notify::NotificationKind;
use timetable::services::ConversionService;
use timetable::timeslot::Day;

#[tokio::test]
async fn test_availability_becomes_validated_session() {
    let fx = Fixture::new().await;
    let year = fx.with_year().await;
    let teacher = fx.user("T", Role::Teacher).await;
    let (establishment, campus) = fx.establishment("E").await;
    let room = fx.room("C-101", 30, Some(campus)).await;
    let subject = fx
        .subject_with(NewSubject {
            name: "C".to_string(),
            teacher_id: Some(teacher),
            total_hour: 30.0,
            expected_students: 25,
            ..Default::default()
        })
        .await;
    let availability = fx
        .availability(subject.id, Day::Monday, "10:00", "12:00", Some(establishment))
        .await;

    let report = ConversionService::new(&fx.state)
        .convert_pending()
        .await
        .expect("conversion");

    assert!(report.deferred.is_empty());
    assert_eq!(report.sessions.len(), 1);
    let session = &report.sessions[0];
    assert_eq!(session.status, SessionStatus::Validated);
    assert_eq!(session.room_id, Some(room.id));
    assert_eq!(session.academic_year_id, Some(year.id));
    assert_eq!(session.availability_id, Some(availability.id));
    assert_eq!(session.day, Day::Monday);
    assert_eq!(session.start_time, "10:00");
    assert_eq!(session.end_time, "12:00");

    let mut conn = fx.conn().await;
    let stored = db::availabilities::find_availability(&mut conn, availability.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, AvailabilityStatus::Used);
    drop(conn);

    let sent = fx.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, vec![teacher]);
    assert_eq!(sent[0].1.kind, NotificationKind::SessionProgrammed);
}

#[tokio::test]
async fn test_conversion_happens_exactly_once() {
    let fx = Fixture::new().await;
    fx.with_year().await;
    let teacher = fx.user("T", Role::Teacher).await;
    fx.room("R1", 30, None).await;
    let subject = fx.subject("C", Some(teacher), 30.0).await;
    let availability = fx.availability(subject.id, Day::Tuesday, "08:00", "10:00", None).await;

    let service = ConversionService::new(&fx.state);
    assert_eq!(service.convert_pending().await.unwrap().sessions.len(), 1);
    assert!(service.convert_pending().await.unwrap().sessions.is_empty());
    assert!(service.convert_one(availability.id).await.unwrap().is_none());

    assert_eq!(fx.sessions().await.len(), 1);
}

#[tokio::test]
async fn test_convert_one_creates_session() {
    let fx = Fixture::new().await;
    fx.with_year().await;
    let teacher = fx.user("T", Role::Teacher).await;
    let room = fx.room("R1", 30, None).await;
    let subject = fx.subject("C", Some(teacher), 30.0).await;
    let availability = fx.availability(subject.id, Day::Friday, "13:00", "15:00", None).await;

    let session = ConversionService::new(&fx.state)
        .convert_one(availability.id)
        .await
        .unwrap()
        .expect("session created");
    assert_eq!(session.room_id, Some(room.id));

    let missing = ConversionService::new(&fx.state).convert_one(9999).await;
    assert!(matches!(missing, Err(AppError::NotFound)));
}

#[tokio::test]
async fn test_availability_without_room_stays_pending() {
    let fx = Fixture::new().await;
    fx.with_year().await;
    let teacher = fx.user("T", Role::Teacher).await;
    fx.room("Tiny", 10, None).await;
    let subject = fx
        .subject_with(NewSubject {
            name: "Big class".to_string(),
            teacher_id: Some(teacher),
            total_hour: 30.0,
            expected_students: 80,
            ..Default::default()
        })
        .await;
    let availability = fx.availability(subject.id, Day::Monday, "08:00", "10:00", None).await;

    let report = ConversionService::new(&fx.state).convert_pending().await.unwrap();
    assert!(report.sessions.is_empty());
    assert_eq!(report.deferred.len(), 1);
    assert_eq!(report.deferred[0].availability_id, availability.id);
    assert_eq!(report.deferred[0].reason, "no room available");

    let mut conn = fx.conn().await;
    let stored = db::availabilities::find_availability(&mut conn, availability.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, AvailabilityStatus::Pending);
    drop(conn);

    let single = ConversionService::new(&fx.state).convert_one(availability.id).await;
    assert!(matches!(single, Err(AppError::NoRoomAvailable)));
}

#[tokio::test]
async fn test_conversion_requires_active_year() {
    let fx = Fixture::new().await;
    let teacher = fx.user("T", Role::Teacher).await;
    fx.room("R1", 30, None).await;
    let subject = fx.subject("C", Some(teacher), 30.0).await;
    fx.availability(subject.id, Day::Monday, "08:00", "10:00", None).await;

    let result = ConversionService::new(&fx.state).convert_pending().await;
    assert!(matches!(result, Err(AppError::NoActiveYear)));
    assert!(fx.sessions().await.is_empty());
}

#[tokio::test]
async fn test_same_day_sessions_keep_their_room() {
    let fx = Fixture::new().await;
    fx.with_year().await;
    let teacher = fx.user("T", Role::Teacher).await;
    let small = fx.room("Small", 20, None).await;
    let large = fx.room("Large", 100, None).await;
    let subject = fx
        .subject_with(NewSubject {
            name: "C".to_string(),
            teacher_id: Some(teacher),
            total_hour: 30.0,
            expected_students: 15,
            ..Default::default()
        })
        .await;
    fx.session(subject.id, Some(large.id), Day::Wednesday, "08:00", "10:00", SessionStatus::Published)
        .await;
    fx.availability(subject.id, Day::Wednesday, "13:00", "15:00", None).await;
    fx.availability(subject.id, Day::Thursday, "13:00", "15:00", None).await;

    let report = ConversionService::new(&fx.state).convert_pending().await.unwrap();
    assert_eq!(report.sessions.len(), 2);
    assert_eq!(report.sessions[0].room_id, Some(large.id));
    assert_eq!(report.sessions[1].room_id, Some(small.id));
}

#[tokio::test]
async fn test_best_fit_is_scoped_to_the_establishment() {
    let fx = Fixture::new().await;
    fx.with_year().await;
    let teacher = fx.user("T", Role::Teacher).await;
    let (_, north_campus) = fx.establishment("North").await;
    let (south, south_campus) = fx.establishment("South").await;
    fx.room("N-1", 20, Some(north_campus)).await;
    let south_room = fx.room("S-1", 60, Some(south_campus)).await;
    let subject = fx
        .subject_with(NewSubject {
            name: "C".to_string(),
            teacher_id: Some(teacher),
            total_hour: 30.0,
            expected_students: 15,
            ..Default::default()
        })
        .await;
    fx.availability(subject.id, Day::Monday, "08:00", "10:00", Some(south)).await;

    let report = ConversionService::new(&fx.state).convert_pending().await.unwrap();
    assert_eq!(report.sessions.len(), 1);
    assert_eq!(report.sessions[0].room_id, Some(south_room.id));
}

#[tokio::test]
async fn test_booked_rooms_are_not_reused() {
    let fx = Fixture::new().await;
    fx.with_year().await;
    let t1 = fx.user("T1", Role::Teacher).await;
    let t2 = fx.user("T2", Role::Teacher).await;
    let r1 = fx.room("R1", 20, None).await;
    let r2 = fx.room("R2", 30, None).await;
    let a = fx.subject("A", Some(t1), 30.0).await;
    let b = fx.subject("B", Some(t2), 30.0).await;
    fx.availability(a.id, Day::Monday, "08:00", "10:00", None).await;
    fx.availability(b.id, Day::Monday, "09:00", "11:00", None).await;

    let report = ConversionService::new(&fx.state).convert_pending().await.unwrap();
    assert_eq!(report.sessions.len(), 2);
    assert_eq!(report.sessions[0].room_id, Some(r1.id));
    assert_eq!(report.sessions[1].room_id, Some(r2.id));
}

#[tokio::test]
async fn test_overlapping_years_pick_the_one_ending_last() {
    let fx = Fixture::new().await;
    // 終了日が遅い年度を先に登録
    let later = fx
        .year(
            "2026-2027",
            NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            NaiveDate::from_ymd_opt(2027, 7, 31).unwrap(),
        )
        .await;
    fx.year(
        "2026",
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
    )
    .await;
    let teacher = fx.user("T", Role::Teacher).await;
    fx.room("R1", 30, None).await;
    let subject = fx.subject("X", Some(teacher), 40.0).await;
    fx.availability(subject.id, Day::Monday, "08:00", "10:00", None).await;

    let report = ConversionService::new(&fx.state)
        .convert_pending()
        .await
        .expect("conversion");
    assert_eq!(report.sessions.len(), 1);
    assert_eq!(report.sessions[0].academic_year_id, Some(later.id));
}
