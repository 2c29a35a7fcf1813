//! Timetable handlers with staff and room clash detection.
//!
//! # Endpoints
//!
//! - `POST /api/v1/timetable` - Create an entry
//! - `GET /api/v1/timetable?staff_id=&department_id=&day_of_week=` - List entries
//! - `GET /api/v1/timetable/{id}` - Get an entry
//! - `PATCH /api/v1/timetable/{id}` - Update an entry
//! - `DELETE /api/v1/timetable/{id}` - Delete an entry
//! - `GET /api/v1/staff/{id}/timetable?date=YYYY-MM-DD` - A staff member's day

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::schedule::{iso_weekday, validate_day_of_week, TimeWindow};
use crate::server::api_error::{ApiError, ErrorCode};
use crate::server::auth::Caller;
use crate::server::database::{new_id, now, TimetableEntry, TimetableFilter};
use crate::server::departments::{is_department_head, load_department};
use crate::server::handlers::{default_page, default_per_page, ApiResult, AppState, Paginated};
use crate::server::logging::{log_domain_event, DomainEvent};
use crate::server::staff::load_staff;
use crate::server::validation::{
    optional_text, parse_date, parse_optional_time, parse_time, required_text,
};

const MAX_SUBJECT_LEN: usize = 120;
const MAX_ROOM_LEN: usize = 40;

#[derive(Debug, Deserialize)]
pub struct CreateEntryRequest {
    pub staff_id: String,
    /// Defaults to the staff member's department
    pub department_id: Option<String>,
    pub day_of_week: i64,
    pub start_time: String,
    pub end_time: String,
    pub subject: String,
    pub room: Option<String>,
}

/// Partial update. An empty `room` clears it.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateEntryRequest {
    pub staff_id: Option<String>,
    pub department_id: Option<String>,
    pub day_of_week: Option<i64>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub subject: Option<String>,
    pub room: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListEntriesQuery {
    pub staff_id: Option<String>,
    pub department_id: Option<String>,
    pub day_of_week: Option<i64>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

#[derive(Debug, Deserialize)]
pub struct StaffDayQuery {
    pub date: String,
}

#[derive(Debug, Serialize)]
pub struct StaffDayResponse {
    pub staff_id: String,
    pub date: NaiveDate,
    pub day_of_week: i64,
    pub entries: Vec<TimetableEntry>,
}

/// What an entry collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClashKind {
    Staff,
    Room,
}

impl ClashKind {
    fn as_str(&self) -> &'static str {
        match self {
            ClashKind::Staff => "staff",
            ClashKind::Room => "room",
        }
    }
}

/// First entry in `existing` that overlaps `entry` on the same day.
///
/// The entry itself (same id) is ignored so updates do not clash with their
/// own previous version.
pub fn find_clash<'a>(
    entry: &TimetableEntry,
    existing: &'a [TimetableEntry],
) -> Option<&'a TimetableEntry> {
    let window = entry.window();
    existing.iter().find(|other| {
        other.id != entry.id
            && other.day_of_week == entry.day_of_week
            && window.overlaps(&other.window())
    })
}

fn clash_error(kind: ClashKind, clashing: &TimetableEntry) -> ApiError {
    let message = match kind {
        ClashKind::Staff => "staff member already has an entry at this time",
        ClashKind::Room => "room is already booked at this time",
    };
    ApiError::with_details(
        ErrorCode::Conflict,
        message,
        serde_json::json!({
            "clashing_entry_id": clashing.id,
            "kind": kind.as_str(),
        }),
    )
}

async fn check_clashes(state: &AppState, entry: &TimetableEntry) -> ApiResult<()> {
    let same_staff = state
        .db
        .timetable_for_staff_day(&entry.staff_id, entry.day_of_week)
        .await?;
    if let Some(clashing) = find_clash(entry, &same_staff) {
        return Err(clash_error(ClashKind::Staff, clashing));
    }

    if let Some(room) = &entry.room {
        let same_room = state
            .db
            .timetable_for_room_day(room, entry.day_of_week)
            .await?;
        if let Some(clashing) = find_clash(entry, &same_room) {
            return Err(clash_error(ClashKind::Room, clashing));
        }
    }
    Ok(())
}

/// Admins, or the head of the department the entry belongs to.
async fn require_timetable_manager(
    state: &AppState,
    caller: &Caller,
    department_id: Option<&str>,
) -> ApiResult<()> {
    if caller.is_admin() {
        return Ok(());
    }
    if let Some(department_id) = department_id {
        let department = load_department(state, department_id).await?;
        if is_department_head(state, caller, &department).await? {
            return Ok(());
        }
    }
    Err(ApiError::forbidden(
        "only administrators or the department head may manage this timetable",
    ))
}

async fn load_entry(state: &AppState, id: &str) -> ApiResult<TimetableEntry> {
    state
        .db
        .get_timetable_entry(id)
        .await?
        .ok_or_else(|| ApiError::not_found("timetable entry"))
}

/// Create a timetable entry.
///
/// `POST /api/v1/timetable`
pub async fn create_entry_handler(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<CreateEntryRequest>,
) -> ApiResult<(StatusCode, Json<TimetableEntry>)> {
    let staff = load_staff(&state, &payload.staff_id).await?;
    let department_id = match optional_text(payload.department_id.as_deref(), 64, "department_id")? {
        Some(id) => Some(load_department(&state, &id).await?.id),
        None => staff.department_id.clone(),
    };
    require_timetable_manager(&state, &caller, department_id.as_deref()).await?;

    validate_day_of_week(payload.day_of_week)?;
    let window = TimeWindow::new(
        parse_time(&payload.start_time, "start_time")?,
        parse_time(&payload.end_time, "end_time")?,
    )?;

    let at = now();
    let entry = TimetableEntry {
        id: new_id(),
        staff_id: staff.id,
        department_id,
        day_of_week: payload.day_of_week,
        start_time: window.start,
        end_time: window.end,
        subject: required_text(&payload.subject, MAX_SUBJECT_LEN, "subject")?,
        room: optional_text(payload.room.as_deref(), MAX_ROOM_LEN, "room")?,
        created_at: at,
        updated_at: at,
    };

    check_clashes(&state, &entry).await?;
    state.db.insert_timetable_entry(&entry).await?;
    log_domain_event(DomainEvent::Created, &entry.id, Some(&entry.subject));

    Ok((StatusCode::CREATED, Json(entry)))
}

/// `GET /api/v1/timetable?staff_id=&department_id=&day_of_week=`
pub async fn list_entries_handler(
    State(state): State<AppState>,
    _caller: Caller,
    Query(query): Query<ListEntriesQuery>,
) -> ApiResult<Json<Paginated<TimetableEntry>>> {
    if let Some(day) = query.day_of_week {
        validate_day_of_week(day)?;
    }
    let filter = TimetableFilter {
        staff_id: query.staff_id,
        department_id: query.department_id,
        day_of_week: query.day_of_week,
    };

    let (items, total) = state
        .db
        .list_timetable_entries(
            &filter,
            Paginated::<TimetableEntry>::window(query.page, query.per_page),
        )
        .await?;

    Ok(Json(Paginated::new(items, total, query.page, query.per_page)))
}

/// `GET /api/v1/timetable/{id}`
pub async fn get_entry_handler(
    State(state): State<AppState>,
    _caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<TimetableEntry>> {
    Ok(Json(load_entry(&state, &id).await?))
}

/// Partially update an entry. Clash rules are re-checked against the result.
///
/// `PATCH /api/v1/timetable/{id}`
pub async fn update_entry_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<UpdateEntryRequest>,
) -> ApiResult<Json<TimetableEntry>> {
    let mut entry = load_entry(&state, &id).await?;
    require_timetable_manager(&state, &caller, entry.department_id.as_deref()).await?;

    if let Some(staff_id) = payload.staff_id.as_deref() {
        entry.staff_id = load_staff(&state, staff_id).await?.id;
    }
    if let Some(department_id) = payload.department_id.as_deref() {
        entry.department_id = match optional_text(Some(department_id), 64, "department_id")? {
            Some(id) => Some(load_department(&state, &id).await?.id),
            None => None,
        };
        // Moving an entry also needs rights over the destination.
        require_timetable_manager(&state, &caller, entry.department_id.as_deref()).await?;
    }
    if let Some(day) = payload.day_of_week {
        validate_day_of_week(day)?;
        entry.day_of_week = day;
    }
    let start = parse_optional_time(payload.start_time.as_deref(), "start_time")?
        .unwrap_or(entry.start_time);
    let end =
        parse_optional_time(payload.end_time.as_deref(), "end_time")?.unwrap_or(entry.end_time);
    let window = TimeWindow::new(start, end)?;
    entry.start_time = window.start;
    entry.end_time = window.end;

    if let Some(subject) = payload.subject.as_deref() {
        entry.subject = required_text(subject, MAX_SUBJECT_LEN, "subject")?;
    }
    if let Some(room) = payload.room.as_deref() {
        entry.room = optional_text(Some(room), MAX_ROOM_LEN, "room")?;
    }
    entry.updated_at = now();

    check_clashes(&state, &entry).await?;
    if !state.db.update_timetable_entry(&entry).await? {
        return Err(ApiError::not_found("timetable entry"));
    }
    log_domain_event(DomainEvent::Updated, &entry.id, None);

    Ok(Json(entry))
}

/// `DELETE /api/v1/timetable/{id}`
pub async fn delete_entry_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let entry = load_entry(&state, &id).await?;
    require_timetable_manager(&state, &caller, entry.department_id.as_deref()).await?;

    if !state.db.delete_timetable_entry(&entry.id).await? {
        return Err(ApiError::not_found("timetable entry"));
    }
    log_domain_event(DomainEvent::Deleted, &entry.id, Some("timetable entry"));

    Ok(StatusCode::NO_CONTENT)
}

/// A staff member's entries for the weekday of `date`.
///
/// `GET /api/v1/staff/{id}/timetable?date=YYYY-MM-DD`
pub async fn staff_day_handler(
    State(state): State<AppState>,
    _caller: Caller,
    Path(staff_id): Path<String>,
    Query(query): Query<StaffDayQuery>,
) -> ApiResult<Json<StaffDayResponse>> {
    let staff = load_staff(&state, &staff_id).await?;
    let date = parse_date(&query.date, "date")?;
    let day_of_week = iso_weekday(date);
    let entries = state
        .db
        .timetable_for_staff_day(&staff.id, day_of_week)
        .await?;

    Ok(Json(StaffDayResponse {
        staff_id: staff.id,
        date,
        day_of_week,
        entries,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn entry(id: &str, day: i64, start: u32, end: u32) -> TimetableEntry {
        TimetableEntry {
            id: id.to_string(),
            staff_id: "s1".to_string(),
            department_id: None,
            day_of_week: day,
            start_time: NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
            subject: "Maths".to_string(),
            room: Some("B12".to_string()),
            created_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn overlapping_entry_clashes() {
        let existing = vec![entry("a", 1, 9, 10), entry("b", 1, 11, 12)];
        let clash = find_clash(&entry("new", 1, 9, 11), &existing).unwrap();
        assert_eq!(clash.id, "a");
    }

    #[test]
    fn touching_entries_do_not_clash() {
        let existing = vec![entry("a", 1, 9, 10), entry("b", 1, 11, 12)];
        assert!(find_clash(&entry("new", 1, 10, 11), &existing).is_none());
    }

    #[test]
    fn other_days_do_not_clash() {
        let existing = vec![entry("a", 2, 9, 10)];
        assert!(find_clash(&entry("new", 1, 9, 10), &existing).is_none());
    }

    #[test]
    fn entry_does_not_clash_with_itself() {
        let existing = vec![entry("a", 1, 9, 10)];
        assert!(find_clash(&entry("a", 1, 9, 11), &existing).is_none());
    }

    #[test]
    fn clash_error_names_entry_and_kind() {
        let err = clash_error(ClashKind::Room, &entry("a", 1, 9, 10));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        let details = err.error.details.unwrap();
        assert_eq!(details["clashing_entry_id"], "a");
        assert_eq!(details["kind"], "room");
    }
}
