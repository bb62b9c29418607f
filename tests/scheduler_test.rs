mod common;

use std::time::Duration;

use common::Fixture;
use timetable::models::{Role, SessionStatus};
use timetable::services::AutomationScheduler;
use timetable::timeslot::Day;

#[tokio::test]
async fn test_tick_converts_then_publishes() {
    let fx = Fixture::new().await;
    fx.with_year().await;
    let teacher = fx.user("T", Role::Teacher).await;
    let room = fx.room("R1", 30, None).await;
    let subject = fx.subject("X", Some(teacher), 40.0).await;
    fx.availability(subject.id, Day::Thursday, "13:00", "15:00", None).await;

    let scheduler = AutomationScheduler::new(fx.state.clone(), 60);
    scheduler.tick().await;

    let sessions = fx.sessions().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].status, SessionStatus::Published);
    assert_eq!(sessions[0].room_id, Some(room.id));
    assert_eq!(sessions[0].hours_used, 2.0);
}

#[tokio::test]
async fn test_tick_survives_missing_academic_year() {
    let fx = Fixture::new().await;
    let teacher = fx.user("T", Role::Teacher).await;
    let subject = fx.subject("X", Some(teacher), 40.0).await;
    fx.availability(subject.id, Day::Monday, "08:00", "10:00", None).await;
    fx.session(subject.id, None, Day::Tuesday, "08:00", "10:00", SessionStatus::Validated)
        .await;

    AutomationScheduler::new(fx.state.clone(), 60).tick().await;

    let sessions = fx.sessions().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].status, SessionStatus::Published);
}

#[tokio::test]
async fn test_scheduler_runs_on_interval() {
    let fx = Fixture::new().await;
    let teacher = fx.user("T", Role::Teacher).await;
    let subject = fx.subject("X", Some(teacher), 40.0).await;
    fx.session(subject.id, None, Day::Monday, "08:00", "10:00", SessionStatus::Validated)
        .await;

    let scheduler = AutomationScheduler::new(fx.state.clone(), 1);
    let scheduler_task = tokio::spawn(async move {
        scheduler.start().await;
    });

    tokio::time::sleep(Duration::from_millis(1500)).await;
    scheduler_task.abort();

    let sessions = fx.sessions().await;
    assert_eq!(sessions[0].status, SessionStatus::Published);
}
