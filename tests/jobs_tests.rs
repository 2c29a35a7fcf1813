//! Tests for the background maintenance jobs.
//!
//! These tests require the `background-jobs` feature to be enabled.

#![cfg(all(feature = "background-jobs", feature = "sqlite"))]

mod common;

use chrono::{Duration, Utc};
use common::{seed_staff, setup_db, time};
use staffroom::jobs::{
    run_notification_purge, run_request_expiry, run_substitution_rollover, JobConfig,
    JobScheduler, MaintenanceJob,
};
use staffroom::roles::Role;
use staffroom::server::database::{new_id, now, Database, Notification, StaffMember, SubstitutionRequest};
use staffroom::substitution::RequestStatus;
use tokio_test::assert_ok;

async fn request_days_ago(
    db: &Database,
    requester: &StaffMember,
    candidate: &StaffMember,
    days_ago: i64,
) -> (SubstitutionRequest, String) {
    let at = now();
    let request = SubstitutionRequest {
        id: new_id(),
        requester_id: requester.id.clone(),
        department_id: None,
        timetable_entry_id: None,
        date: Utc::now().date_naive() - Duration::days(days_ago),
        start_time: time("13:00"),
        end_time: time("14:00"),
        reason: None,
        status: RequestStatus::Open.to_string(),
        substitute_id: None,
        accepted_invitation_id: None,
        created_by: None,
        created_at: at,
        updated_at: at,
        closed_at: None,
    };
    let invitations = db
        .create_request_with_invitations(&request, &[candidate.id.clone()])
        .await
        .unwrap();
    (request, invitations[0].id.clone())
}

#[tokio::test]
async fn rollover_closes_yesterdays_covers_only() {
    let db = setup_db().await;
    let requester = seed_staff(&db, "Requester", Role::Staff, None).await;
    let sub = seed_staff(&db, "Substitute", Role::Staff, None).await;

    let (yesterday, inv) = request_days_ago(&db, &requester, &sub, 1).await;
    db.accept_invitation(&inv, now()).await.unwrap();
    let (today, inv) = request_days_ago(&db, &requester, &sub, 0).await;
    db.accept_invitation(&inv, now()).await.unwrap();

    let rolled = assert_ok!(run_substitution_rollover(&db).await);
    assert_eq!(rolled, 1);

    let yesterday = db.get_request(&yesterday.id).await.unwrap().unwrap();
    assert_eq!(yesterday.status().unwrap(), RequestStatus::Closed);
    let today = db.get_request(&today.id).await.unwrap().unwrap();
    assert_eq!(today.status().unwrap(), RequestStatus::Filled);
    assert_eq!(db.substitution_counts(&sub.id).await.unwrap(), (1, 0));
}

#[tokio::test]
async fn expiry_skips_filled_requests() {
    let db = setup_db().await;
    let requester = seed_staff(&db, "Requester", Role::Staff, None).await;
    let sub = seed_staff(&db, "Substitute", Role::Staff, None).await;

    let (unfilled, _) = request_days_ago(&db, &requester, &sub, 3).await;
    let (filled, inv) = request_days_ago(&db, &requester, &sub, 3).await;
    db.accept_invitation(&inv, now()).await.unwrap();

    let expired = assert_ok!(run_request_expiry(&db).await);
    assert_eq!(expired, 1);

    let unfilled = db.get_request(&unfilled.id).await.unwrap().unwrap();
    assert_eq!(unfilled.status().unwrap(), RequestStatus::Expired);
    let filled = db.get_request(&filled.id).await.unwrap().unwrap();
    assert_eq!(filled.status().unwrap(), RequestStatus::Filled);
}

#[tokio::test]
async fn purge_respects_retention() {
    let db = setup_db().await;
    let member = seed_staff(&db, "Reader", Role::Staff, None).await;

    for (days_old, is_read) in [(40, true), (40, false), (10, true)] {
        db.insert_notification(&Notification {
            id: new_id(),
            recipient_id: member.id.clone(),
            kind: "general".to_string(),
            title: "Reminder".to_string(),
            body: "Reports are due".to_string(),
            reference_id: None,
            is_read,
            created_at: now() - Duration::days(days_old),
            read_at: None,
        })
        .await
        .unwrap();
    }

    assert_eq!(assert_ok!(run_notification_purge(&db, 30).await), 1);
    assert_eq!(assert_ok!(run_notification_purge(&db, 5).await), 1);
    assert_eq!(db.count_unread_notifications(&member.id).await.unwrap(), 1);
}

#[tokio::test]
async fn scheduler_runs_jobs_on_demand() {
    let db = setup_db().await;
    let scheduler = assert_ok!(JobScheduler::new(db, JobConfig::default()).await);

    for job in MaintenanceJob::ALL {
        assert_eq!(assert_ok!(scheduler.run_now(job).await), 0, "{}", job.name());
    }
}
