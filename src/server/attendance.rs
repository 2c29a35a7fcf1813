//! Attendance handlers.
//!
//! # Endpoints
//!
//! - `PUT /api/v1/attendance` - Record the day (upsert on staff + date)
//! - `GET /api/v1/attendance?staff_id=&from=&to=&status=` - List records
//! - `GET /api/v1/attendance/summary?staff_id=&from=&to=` - Per-status counts
//! - `GET /api/v1/attendance/{id}` - Get a record
//! - `DELETE /api/v1/attendance/{id}` - Delete a record
//!
//! Admins, HR and heads work with anyone's records. Other staff only see and
//! record their own.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::attendance::{check_record, AttendanceStatus, AttendanceSummary};
use crate::server::api_error::ApiError;
use crate::server::auth::Caller;
use crate::server::database::{new_id, now, AttendanceFilter, AttendanceRecord};
use crate::server::handlers::{default_page, default_per_page, ApiResult, AppState, Paginated};
use crate::server::logging::{log_domain_event, DomainEvent};
use crate::server::staff::load_staff;
use crate::server::validation::{
    optional_text, parse_date, parse_enum, parse_optional_date, parse_optional_time,
    validate_date_range,
};

const MAX_NOTES_LEN: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct RecordAttendanceRequest {
    /// Defaults to the caller
    pub staff_id: Option<String>,
    pub date: String,
    pub status: String,
    pub check_in: Option<String>,
    pub check_out: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListAttendanceQuery {
    pub staff_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub status: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub staff_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub staff_id: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    #[serde(flatten)]
    pub counts: AttendanceSummary,
}

/// The staff id a read is restricted to.
///
/// Privileged callers get whatever they asked for (possibly everyone).
/// Others are pinned to their own id.
fn scope_staff_id(caller: &Caller, requested: Option<String>) -> ApiResult<Option<String>> {
    if caller.role.can_record_attendance() {
        return Ok(requested);
    }
    let own = caller.own_id()?;
    match requested {
        Some(id) if id != own => Err(ApiError::forbidden(
            "you may only view your own attendance",
        )),
        _ => Ok(Some(own.to_string())),
    }
}

fn parse_range(from: Option<&str>, to: Option<&str>) -> ApiResult<(Option<NaiveDate>, Option<NaiveDate>)> {
    let from = parse_optional_date(from, "from")?;
    let to = parse_optional_date(to, "to")?;
    validate_date_range(from, to)?;
    Ok((from, to))
}

/// Record attendance for a day. Returns 201 for a new record, 200 when the
/// existing record for that staff member and date was overwritten.
///
/// `PUT /api/v1/attendance`
pub async fn record_attendance_handler(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<RecordAttendanceRequest>,
) -> ApiResult<(StatusCode, Json<AttendanceRecord>)> {
    let staff_id = match payload.staff_id {
        Some(id) => id,
        None => caller.own_id()?.to_string(),
    };
    caller.require_self_or(
        &staff_id,
        caller.role.can_record_attendance(),
        "record this attendance",
    )?;
    let staff = load_staff(&state, &staff_id).await?;

    let date = parse_date(&payload.date, "date")?;
    let status: AttendanceStatus = parse_enum(&payload.status, "status")?;
    let check_in = parse_optional_time(payload.check_in.as_deref(), "check_in")?;
    let check_out = parse_optional_time(payload.check_out.as_deref(), "check_out")?;
    check_record(status, check_in, check_out)?;

    let at = now();
    let record = AttendanceRecord {
        id: new_id(),
        staff_id: staff.id,
        date,
        status: status.to_string(),
        check_in,
        check_out,
        notes: optional_text(payload.notes.as_deref(), MAX_NOTES_LEN, "notes")?,
        recorded_by: caller.id().map(str::to_string),
        created_at: at,
        updated_at: at,
    };

    let stored = state.db.upsert_attendance(&record).await?;
    let (code, event) = if stored.id == record.id {
        (StatusCode::CREATED, DomainEvent::Created)
    } else {
        (StatusCode::OK, DomainEvent::Updated)
    };
    log_domain_event(event, &stored.id, Some(&format!("{} {}", stored.date, stored.status)));

    Ok((code, Json(stored)))
}

/// `GET /api/v1/attendance?staff_id=&from=&to=&status=`
pub async fn list_attendance_handler(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListAttendanceQuery>,
) -> ApiResult<Json<Paginated<AttendanceRecord>>> {
    let (from, to) = parse_range(query.from.as_deref(), query.to.as_deref())?;
    let filter = AttendanceFilter {
        staff_id: scope_staff_id(&caller, query.staff_id)?,
        from,
        to,
        status: query
            .status
            .as_deref()
            .map(|s| parse_enum::<AttendanceStatus>(s, "status"))
            .transpose()?,
    };

    let (items, total) = state
        .db
        .list_attendance(
            &filter,
            Paginated::<AttendanceRecord>::window(query.page, query.per_page),
        )
        .await?;

    Ok(Json(Paginated::new(items, total, query.page, query.per_page)))
}

/// `GET /api/v1/attendance/{id}`
pub async fn get_attendance_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<AttendanceRecord>> {
    let record = state
        .db
        .get_attendance(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("attendance record"))?;
    caller.require_self_or(
        &record.staff_id,
        caller.role.can_record_attendance(),
        "view this attendance record",
    )?;
    Ok(Json(record))
}

/// `DELETE /api/v1/attendance/{id}`
pub async fn delete_attendance_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    caller.require(caller.role.can_delete_attendance(), "delete attendance records")?;

    if !state.db.delete_attendance(&id).await? {
        return Err(ApiError::not_found("attendance record"));
    }
    log_domain_event(DomainEvent::Deleted, &id, Some("attendance record"));

    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/v1/attendance/summary?staff_id=&from=&to=`
pub async fn attendance_summary_handler(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<Json<SummaryResponse>> {
    let (from, to) = parse_range(query.from.as_deref(), query.to.as_deref())?;
    let staff_id = scope_staff_id(&caller, query.staff_id)?;
    let filter = AttendanceFilter {
        staff_id: staff_id.clone(),
        from,
        to,
        status: None,
    };

    let counts = state.db.attendance_summary(&filter).await?;

    Ok(Json(SummaryResponse {
        staff_id,
        from,
        to,
        counts,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::Role;

    #[test]
    fn privileged_callers_keep_requested_scope() {
        let head = Caller::staff("h1", Role::Head);
        assert_eq!(scope_staff_id(&head, None).unwrap(), None);
        assert_eq!(
            scope_staff_id(&head, Some("s2".to_string())).unwrap(),
            Some("s2".to_string())
        );
    }

    #[test]
    fn staff_are_pinned_to_themselves() {
        let staff = Caller::staff("s1", Role::Staff);
        assert_eq!(
            scope_staff_id(&staff, None).unwrap(),
            Some("s1".to_string())
        );
        assert!(scope_staff_id(&staff, Some("s2".to_string())).is_err());
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert!(parse_range(Some("2025-02-01"), Some("2025-01-01")).is_err());
        assert!(parse_range(Some("2025-01-01"), None).is_ok());
    }
}
