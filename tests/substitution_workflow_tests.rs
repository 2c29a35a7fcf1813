//! End-to-end cover workflow over HTTP: fan-out, first acceptance wins,
//! drop and reactivation, cancellation, closing into the history and
//! candidate suggestions.

#![cfg(feature = "sqlite")]

mod common;

use axum::http::StatusCode;
use common::{seed_department, seed_lesson, seed_staff, TestApp};
use serde_json::{json, Value};
use staffroom::config::SubstitutionConfig;
use staffroom::roles::Role;
use staffroom::server::database::StaffMember;

async fn raise(
    app: &TestApp,
    requester: &StaffMember,
    date: &str,
    candidates: &[&StaffMember],
) -> Value {
    let ids: Vec<&str> = candidates.iter().map(|m| m.id.as_str()).collect();
    let (status, body) = app
        .call(
            "POST",
            "/api/v1/substitutions/requests",
            Some(requester),
            Some(json!({
                "date": date,
                "start_time": "09:00",
                "end_time": "10:00",
                "reason": "Exam board meeting",
                "candidate_ids": ids,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

fn invitation_for(detail: &Value, candidate: &StaffMember) -> String {
    detail["invitations"]
        .as_array()
        .unwrap()
        .iter()
        .find(|i| i["candidate_id"] == candidate.id.as_str())
        .and_then(|i| i["id"].as_str())
        .unwrap()
        .to_string()
}

async fn respond(app: &TestApp, who: &StaffMember, invitation: &str, action: &str) -> (StatusCode, Value) {
    app.call(
        "POST",
        &format!("/api/v1/substitutions/invitations/{invitation}/{action}"),
        Some(who),
        None,
    )
    .await
}

async fn inbox_kinds(app: &TestApp, member: &StaffMember) -> Vec<String> {
    let (_, inbox) = app
        .call("GET", "/api/v1/notifications?per_page=100", Some(member), None)
        .await;
    inbox["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["kind"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn request_fans_out_to_distinct_candidates() {
    let app = TestApp::new().await;
    let requester = seed_staff(&app.db, "Requester", Role::Staff, None).await;
    let alice = seed_staff(&app.db, "Alice", Role::Staff, None).await;
    let bob = seed_staff(&app.db, "Bob", Role::Staff, None).await;

    let detail = raise(&app, &requester, "2030-01-01", &[&alice, &bob, &alice, &requester]).await;

    assert_eq!(detail["status"], "open");
    assert_eq!(detail["requester_id"], requester.id.as_str());
    let invitations = detail["invitations"].as_array().unwrap();
    assert_eq!(invitations.len(), 2);
    assert!(invitations.iter().all(|i| i["status"] == "pending"));

    assert_eq!(inbox_kinds(&app, &alice).await, vec!["substitution_invitation"]);
    assert_eq!(inbox_kinds(&app, &bob).await, vec!["substitution_invitation"]);

    let (_, mine) = app
        .call("GET", "/api/v1/substitutions/invitations", Some(&bob), None)
        .await;
    assert_eq!(mine["total"], 1);
}

#[tokio::test]
async fn request_validation() {
    let app = TestApp::new().await;
    let requester = seed_staff(&app.db, "Requester", Role::Staff, None).await;
    let other = seed_staff(&app.db, "Other", Role::Staff, None).await;
    let lesson = seed_lesson(&app.db, &other.id, 2, "09:00", "10:00").await;

    let (status, body) = app
        .call(
            "POST",
            "/api/v1/substitutions/requests",
            Some(&requester),
            Some(json!({ "date": "2030-01-01", "start_time": "09:00", "end_time": "10:00" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"]["field"], "candidate_ids");

    let (status, body) = app
        .call(
            "POST",
            "/api/v1/substitutions/requests",
            Some(&requester),
            Some(json!({ "date": "2030-01-01", "candidate_ids": [other.id] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MISSING_FIELD");

    let (status, body) = app
        .call(
            "POST",
            "/api/v1/substitutions/requests",
            Some(&requester),
            Some(json!({
                "date": "2030-01-01",
                "timetable_entry_id": lesson.id,
                "candidate_ids": [other.id],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["details"]["field"], "timetable_entry_id");

    // A plain staff member cannot raise cover on someone else's behalf
    let (status, _) = app
        .call(
            "POST",
            "/api/v1/substitutions/requests",
            Some(&requester),
            Some(json!({
                "requester_id": other.id,
                "date": "2030-01-01",
                "start_time": "09:00",
                "end_time": "10:00",
                "candidate_ids": [requester.id],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn lesson_fills_in_the_window() {
    let app = TestApp::new().await;
    let requester = seed_staff(&app.db, "Requester", Role::Staff, None).await;
    let alice = seed_staff(&app.db, "Alice", Role::Staff, None).await;
    let lesson = seed_lesson(&app.db, &requester.id, 2, "11:15", "12:05").await;

    let (status, detail) = app
        .call(
            "POST",
            "/api/v1/substitutions/requests",
            Some(&requester),
            Some(json!({
                "date": "2030-01-01",
                "timetable_entry_id": lesson.id,
                "candidate_ids": [alice.id],
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(detail["start_time"], "11:15:00");
    assert_eq!(detail["end_time"], "12:05:00");
    assert_eq!(detail["timetable_entry_id"], lesson.id.as_str());
}

#[tokio::test]
async fn only_the_first_acceptance_wins() {
    let app = TestApp::new().await;
    let requester = seed_staff(&app.db, "Requester", Role::Staff, None).await;
    let alice = seed_staff(&app.db, "Alice", Role::Staff, None).await;
    let bob = seed_staff(&app.db, "Bob", Role::Staff, None).await;

    let detail = raise(&app, &requester, "2030-01-01", &[&alice, &bob]).await;
    let alice_inv = invitation_for(&detail, &alice);
    let bob_inv = invitation_for(&detail, &bob);

    // Nobody accepts on someone else's behalf
    let (status, _) = respond(&app, &bob, &alice_inv, "accept").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, accepted) = respond(&app, &alice, &alice_inv, "accept").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["invitation"]["status"], "accepted");
    assert_eq!(accepted["request"]["status"], "filled");
    assert_eq!(accepted["request"]["substitute_id"], alice.id.as_str());

    let (status, body) = respond(&app, &bob, &bob_inv, "accept").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ALREADY_FILLED");

    let (_, current) = app
        .call(
            "GET",
            &format!("/api/v1/substitutions/requests/{}", detail["id"].as_str().unwrap()),
            Some(&requester),
            None,
        )
        .await;
    let bob_status = current["invitations"]
        .as_array()
        .unwrap()
        .iter()
        .find(|i| i["id"] == bob_inv.as_str())
        .map(|i| i["status"].clone())
        .unwrap();
    assert_eq!(bob_status, "disabled");

    assert!(inbox_kinds(&app, &requester)
        .await
        .contains(&"substitution_accepted".to_string()));
}

#[tokio::test]
async fn dropping_reopens_and_reinvites() {
    let app = TestApp::new().await;
    let requester = seed_staff(&app.db, "Requester", Role::Staff, None).await;
    let alice = seed_staff(&app.db, "Alice", Role::Staff, None).await;
    let bob = seed_staff(&app.db, "Bob", Role::Staff, None).await;

    let detail = raise(&app, &requester, "2030-01-01", &[&alice, &bob]).await;
    let alice_inv = invitation_for(&detail, &alice);
    let bob_inv = invitation_for(&detail, &bob);

    respond(&app, &alice, &alice_inv, "accept").await;

    // Only an accepted invitation can be dropped
    let (status, _) = respond(&app, &bob, &bob_inv, "drop").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, dropped) = respond(&app, &alice, &alice_inv, "drop").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dropped["invitation"]["status"], "dropped");
    assert_eq!(dropped["request"]["status"], "open");
    assert!(dropped["request"]["substitute_id"].is_null());

    assert!(inbox_kinds(&app, &bob)
        .await
        .contains(&"substitution_dropped".to_string()));

    let (status, accepted) = respond(&app, &bob, &bob_inv, "accept").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["request"]["substitute_id"], bob.id.as_str());
}

#[tokio::test]
async fn dropping_without_reactivation_leaves_others_disabled() {
    let app = TestApp::with_substitutions(SubstitutionConfig {
        reactivate_on_drop: false,
        ..SubstitutionConfig::default()
    })
    .await;
    let requester = seed_staff(&app.db, "Requester", Role::Staff, None).await;
    let alice = seed_staff(&app.db, "Alice", Role::Staff, None).await;
    let bob = seed_staff(&app.db, "Bob", Role::Staff, None).await;

    let detail = raise(&app, &requester, "2030-01-01", &[&alice, &bob]).await;
    let alice_inv = invitation_for(&detail, &alice);
    let bob_inv = invitation_for(&detail, &bob);

    respond(&app, &alice, &alice_inv, "accept").await;
    respond(&app, &alice, &alice_inv, "drop").await;

    let (status, body) = respond(&app, &bob, &bob_inv, "accept").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn declines_are_reported_to_the_requester() {
    let app = TestApp::new().await;
    let requester = seed_staff(&app.db, "Requester", Role::Staff, None).await;
    let alice = seed_staff(&app.db, "Alice", Role::Staff, None).await;
    let bob = seed_staff(&app.db, "Bob", Role::Staff, None).await;

    let detail = raise(&app, &requester, "2030-01-01", &[&alice, &bob]).await;

    let (status, declined) = respond(&app, &alice, &invitation_for(&detail, &alice), "decline").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(declined["invitation"]["status"], "declined");
    respond(&app, &bob, &invitation_for(&detail, &bob), "decline").await;

    let (_, inbox) = app
        .call("GET", "/api/v1/notifications", Some(&requester), None)
        .await;
    assert_eq!(inbox["total"], 2);
    let all_declined = inbox["items"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|n| {
            n["body"]
                .as_str()
                .is_some_and(|b| b.contains("Every candidate has now declined"))
        })
        .count();
    assert_eq!(all_declined, 1);

    // The request stays open so more candidates can be invited
    let carol = seed_staff(&app.db, "Carol", Role::Staff, None).await;
    let (status, created) = app
        .call(
            "POST",
            &format!("/api/v1/substitutions/requests/{}/invitations", detail["id"].as_str().unwrap()),
            Some(&requester),
            Some(json!({ "candidate_ids": [alice.id, carol.id] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let created = created.as_array().unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0]["candidate_id"], carol.id.as_str());
}

#[tokio::test]
async fn cancel_tells_live_candidates() {
    let app = TestApp::new().await;
    let requester = seed_staff(&app.db, "Requester", Role::Staff, None).await;
    let alice = seed_staff(&app.db, "Alice", Role::Staff, None).await;
    let bob = seed_staff(&app.db, "Bob", Role::Staff, None).await;

    let detail = raise(&app, &requester, "2030-01-01", &[&alice, &bob]).await;
    let id = detail["id"].as_str().unwrap();
    respond(&app, &bob, &invitation_for(&detail, &bob), "decline").await;

    let (status, _) = app
        .call("POST", &format!("/api/v1/substitutions/requests/{id}/cancel"), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, cancelled) = app
        .call("POST", &format!("/api/v1/substitutions/requests/{id}/cancel"), Some(&requester), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");

    assert!(inbox_kinds(&app, &alice)
        .await
        .contains(&"substitution_cancelled".to_string()));
    assert!(!inbox_kinds(&app, &bob)
        .await
        .contains(&"substitution_cancelled".to_string()));

    let (status, body) = app
        .call("POST", &format!("/api/v1/substitutions/requests/{id}/cancel"), Some(&requester), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn closing_builds_the_track_record() {
    let app = TestApp::new().await;
    let admin = seed_staff(&app.db, "Admin", Role::Admin, None).await;
    let requester = seed_staff(&app.db, "Requester", Role::Staff, None).await;
    let alice = seed_staff(&app.db, "Alice", Role::Staff, None).await;

    for (date, action, outcome) in [
        ("2030-01-01", "complete", "completed"),
        ("2030-01-02", "no-show", "no_show"),
    ] {
        let detail = raise(&app, &requester, date, &[&alice]).await;
        let id = detail["id"].as_str().unwrap();
        respond(&app, &alice, &invitation_for(&detail, &alice), "accept").await;

        let (status, _) = app
            .call("POST", &format!("/api/v1/substitutions/requests/{id}/{action}"), Some(&requester), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, closed) = app
            .call("POST", &format!("/api/v1/substitutions/requests/{id}/{action}"), Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(closed["request"]["status"], "closed");
        assert_eq!(closed["history"]["outcome"], outcome);
        assert_eq!(closed["history"]["substitute_id"], alice.id.as_str());
    }

    let (status, record) = app
        .call(
            "GET",
            &format!("/api/v1/substitutions/history/{}/summary", alice.id),
            Some(&requester),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["completed"], 1);
    assert_eq!(record["no_shows"], 1);

    let (_, history) = app
        .call("GET", "/api/v1/substitutions/history?outcome=no_show", Some(&admin), None)
        .await;
    assert_eq!(history["total"], 1);
    assert_eq!(history["items"][0]["date"], "2030-01-02");

    // An open request has nobody to close out
    let detail = raise(&app, &requester, "2030-01-03", &[&alice]).await;
    let (status, _) = app
        .call(
            "POST",
            &format!("/api/v1/substitutions/requests/{}/complete", detail["id"].as_str().unwrap()),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn suggestions_skip_unavailable_staff_and_rank_by_record() {
    let app = TestApp::new().await;
    let admin = seed_staff(&app.db, "Admin", Role::Admin, None).await;
    let dept = seed_department(&app.db, "MATH").await;
    let d = Some(dept.id.as_str());

    let requester = seed_staff(&app.db, "Rita", Role::Staff, d).await;
    let alice = seed_staff(&app.db, "Alice", Role::Staff, d).await;
    let bob = seed_staff(&app.db, "Bob", Role::Staff, d).await;
    let olga = seed_staff(&app.db, "Olga", Role::Staff, d).await;
    let teaching = seed_staff(&app.db, "Teaching", Role::Staff, d).await;
    let away = seed_staff(&app.db, "Away", Role::Staff, d).await;
    let invited = seed_staff(&app.db, "Invited", Role::Staff, d).await;
    let covering = seed_staff(&app.db, "Covering", Role::Staff, d).await;
    seed_staff(&app.db, "Elsewhere", Role::Staff, None).await;

    // Bob already covered once
    let earlier = raise(&app, &olga, "2029-12-11", &[&bob]).await;
    respond(&app, &bob, &invitation_for(&earlier, &bob), "accept").await;
    app.call(
        "POST",
        &format!("/api/v1/substitutions/requests/{}/complete", earlier["id"].as_str().unwrap()),
        Some(&admin),
        None,
    )
    .await;

    // Covering is booked for the same slot on another request
    let clash = raise(&app, &olga, "2030-01-01", &[&covering]).await;
    respond(&app, &covering, &invitation_for(&clash, &covering), "accept").await;

    // Tuesday lesson overlapping 09:00-10:00
    seed_lesson(&app.db, &teaching.id, 2, "09:30", "10:30").await;

    let (status, _) = app
        .call(
            "PUT",
            "/api/v1/attendance",
            Some(&admin),
            Some(json!({ "staff_id": away.id, "date": "2030-01-01", "status": "absent" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let detail = raise(&app, &requester, "2030-01-01", &[&invited]).await;

    let (status, suggestions) = app
        .call(
            "GET",
            &format!("/api/v1/substitutions/requests/{}/suggestions", detail["id"].as_str().unwrap()),
            Some(&requester),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let names: Vec<&str> = suggestions["candidates"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["full_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Alice", "Olga", "Bob"]);
    assert_eq!(suggestions["candidates"][2]["completed"], 1);
}

#[tokio::test]
async fn suggestions_leave_out_repeat_no_shows() {
    let app = TestApp::with_substitutions(SubstitutionConfig {
        no_show_exclusion_threshold: 1,
        ..SubstitutionConfig::default()
    })
    .await;
    let admin = seed_staff(&app.db, "Admin", Role::Admin, None).await;
    let requester = seed_staff(&app.db, "Requester", Role::Staff, None).await;
    let flaky = seed_staff(&app.db, "Flaky", Role::Staff, None).await;
    let steady = seed_staff(&app.db, "Steady", Role::Staff, None).await;

    let missed = raise(&app, &requester, "2029-11-05", &[&flaky]).await;
    respond(&app, &flaky, &invitation_for(&missed, &flaky), "accept").await;
    app.call(
        "POST",
        &format!("/api/v1/substitutions/requests/{}/no-show", missed["id"].as_str().unwrap()),
        Some(&admin),
        None,
    )
    .await;

    let detail = raise(&app, &requester, "2030-01-01", &[&admin]).await;
    let (_, suggestions) = app
        .call(
            "GET",
            &format!("/api/v1/substitutions/requests/{}/suggestions", detail["id"].as_str().unwrap()),
            Some(&requester),
            None,
        )
        .await;

    let ids: Vec<&str> = suggestions["candidates"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["staff_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![steady.id.as_str()]);
}

async fn invite(app: &TestApp, who: &StaffMember, request_id: &str, candidates: Value) -> (StatusCode, Value) {
    app.call(
        "POST",
        &format!("/api/v1/substitutions/requests/{request_id}/invitations"),
        Some(who),
        Some(json!({ "candidate_ids": candidates })),
    )
    .await
}

#[tokio::test]
async fn invitations_are_capped_per_request() {
    let app = TestApp::with_substitutions(SubstitutionConfig {
        max_candidates: 2,
        ..Default::default()
    })
    .await;
    let requester = seed_staff(&app.db, "Requester", Role::Staff, None).await;
    let alice = seed_staff(&app.db, "Alice", Role::Staff, None).await;
    let bob = seed_staff(&app.db, "Bob", Role::Staff, None).await;
    let carol = seed_staff(&app.db, "Carol", Role::Staff, None).await;

    let (status, body) = app
        .call(
            "POST",
            "/api/v1/substitutions/requests",
            Some(&requester),
            Some(json!({
                "date": "2030-01-01",
                "start_time": "09:00",
                "end_time": "10:00",
                "candidate_ids": [alice.id, bob.id, carol.id],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_FIELD");
    assert_eq!(body["error"]["details"]["field"], "candidate_ids");

    let detail = raise(&app, &requester, "2030-01-01", &[&alice, &bob]).await;
    let id = detail["id"].as_str().unwrap();

    // The payload is within bounds but the request already holds two
    let (status, body) = invite(&app, &requester, id, json!([carol.id])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");

    // Re-inviting someone already on the request adds nothing
    let (status, body) = invite(&app, &requester, id, json!([alice.id])).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body, json!([]));

    let (_, detail) = app
        .call("GET", &format!("/api/v1/substitutions/requests/{id}"), Some(&requester), None)
        .await;
    assert_eq!(detail["invitations"].as_array().unwrap().len(), 2);
    assert!(inbox_kinds(&app, &carol).await.is_empty());
}

#[tokio::test]
async fn inviting_needs_an_open_request() {
    let app = TestApp::new().await;
    let admin = seed_staff(&app.db, "Admin", Role::Admin, None).await;
    let requester = seed_staff(&app.db, "Requester", Role::Staff, None).await;
    let alice = seed_staff(&app.db, "Alice", Role::Staff, None).await;
    let bob = seed_staff(&app.db, "Bob", Role::Staff, None).await;

    let filled = raise(&app, &requester, "2030-01-01", &[&alice]).await;
    respond(&app, &alice, &invitation_for(&filled, &alice), "accept").await;

    let cancelled = raise(&app, &requester, "2030-01-02", &[&alice]).await;
    let (status, _) = app
        .call(
            "POST",
            &format!("/api/v1/substitutions/requests/{}/cancel", cancelled["id"].as_str().unwrap()),
            Some(&requester),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let closed = raise(&app, &requester, "2030-01-03", &[&alice]).await;
    respond(&app, &alice, &invitation_for(&closed, &alice), "accept").await;
    let (status, _) = app
        .call(
            "POST",
            &format!("/api/v1/substitutions/requests/{}/complete", closed["id"].as_str().unwrap()),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    for (label, detail) in [("filled", &filled), ("cancelled", &cancelled), ("closed", &closed)] {
        let id = detail["id"].as_str().unwrap();
        // The state is checked before the candidate list, so even a bad list
        // reports the transition
        for candidates in [json!([bob.id]), json!(["no-such-staff"]), json!([])] {
            let (status, body) = invite(&app, &requester, id, candidates).await;
            assert_eq!(status, StatusCode::CONFLICT, "{label}: {body}");
            assert_eq!(body["error"]["code"], "INVALID_TRANSITION", "{label}");
        }
    }
    assert!(inbox_kinds(&app, &bob).await.is_empty());
}
