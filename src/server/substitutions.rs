//! Substitution cover handlers.
//!
//! # Endpoints
//!
//! Requests:
//! - `POST /api/v1/substitutions/requests` - Raise a cover request and invite candidates
//! - `GET /api/v1/substitutions/requests?status=&requester_id=&date=` - List requests
//! - `GET /api/v1/substitutions/requests/{id}` - Request with its invitations
//! - `POST /api/v1/substitutions/requests/{id}/invitations` - Invite more candidates
//! - `GET /api/v1/substitutions/requests/{id}/suggestions` - Ranked free candidates
//! - `POST /api/v1/substitutions/requests/{id}/cancel` - Cancel
//! - `POST /api/v1/substitutions/requests/{id}/complete` - Close as covered
//! - `POST /api/v1/substitutions/requests/{id}/no-show` - Close as a no-show
//!
//! Invitations:
//! - `GET /api/v1/substitutions/invitations?candidate_id=&status=` - List invitations
//! - `POST /api/v1/substitutions/invitations/{id}/accept` - Accept (one winner per request)
//! - `POST /api/v1/substitutions/invitations/{id}/decline` - Decline
//! - `POST /api/v1/substitutions/invitations/{id}/drop` - Accepted substitute drops out
//!
//! History:
//! - `GET /api/v1/substitutions/history?substitute_id=&outcome=` - Closed covers
//! - `GET /api/v1/substitutions/history/{staff_id}/summary` - One substitute's record
//!
//! Every transition is applied by the database layer inside a transaction.
//! Notifications go out only after it commits.

use std::collections::{HashMap, HashSet};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::StaffroomError;
use crate::notification::NotificationKind;
use crate::schedule::{iso_weekday, TimeWindow};
use crate::server::api_error::ApiError;
use crate::server::auth::Caller;
use crate::server::database::{
    new_id, now, HistoryRecord, Invitation, RequestFilter, SubstitutionRequest, TimetableEntry,
};
use crate::server::handlers::{default_page, default_per_page, ApiResult, AppState, Paginated};
use crate::server::logging::{log_domain_event, DomainEvent};
use crate::server::notifications::{notify, notify_many, Outgoing};
use crate::server::staff::load_staff;
use crate::server::validation::{
    optional_text, parse_date, parse_enum, parse_optional_date, parse_optional_time,
};
use crate::substitution::{
    normalize_candidates, rank_candidates, CandidateProfile, HistoryOutcome, InvitationStatus,
    RequestAction, RequestStatus,
};

const MAX_REASON_LEN: usize = 1000;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateSubstitutionRequest {
    /// The absent staff member. Defaults to the caller.
    pub requester_id: Option<String>,
    pub department_id: Option<String>,
    /// Lesson being covered; fills in department and times when omitted
    pub timetable_entry_id: Option<String>,
    pub date: String,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub reason: Option<String>,
    #[serde(default)]
    pub candidate_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct InviteCandidatesRequest {
    pub candidate_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListRequestsQuery {
    pub status: Option<String>,
    pub requester_id: Option<String>,
    pub date: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

#[derive(Debug, Deserialize)]
pub struct ListInvitationsQuery {
    /// Defaults to the caller
    pub candidate_id: Option<String>,
    pub status: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

#[derive(Debug, Deserialize)]
pub struct ListHistoryQuery {
    pub substitute_id: Option<String>,
    pub outcome: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// A request together with every invitation sent for it.
#[derive(Debug, Serialize)]
pub struct RequestDetail {
    #[serde(flatten)]
    pub request: SubstitutionRequest,
    pub invitations: Vec<Invitation>,
}

/// State of both sides after an invitation changed.
#[derive(Debug, Serialize)]
pub struct InvitationResponse {
    pub invitation: Invitation,
    pub request: SubstitutionRequest,
}

#[derive(Debug, Serialize)]
pub struct CloseResponse {
    pub request: SubstitutionRequest,
    pub history: HistoryRecord,
}

#[derive(Debug, Serialize)]
pub struct SuggestionsResponse {
    pub request_id: String,
    pub candidates: Vec<CandidateProfile>,
}

#[derive(Debug, Serialize)]
pub struct StaffRecordResponse {
    pub staff_id: String,
    pub completed: i64,
    pub no_shows: i64,
}

// ============================================================================
// Helpers
// ============================================================================

async fn load_request(state: &AppState, id: &str) -> ApiResult<SubstitutionRequest> {
    state
        .db
        .get_request(id)
        .await?
        .ok_or_else(|| ApiError::not_found("substitution request"))
}

async fn load_invitation(state: &AppState, id: &str) -> ApiResult<Invitation> {
    state
        .db
        .get_invitation(id)
        .await?
        .ok_or_else(|| ApiError::not_found("invitation"))
}

/// The requester, or anyone who coordinates cover.
fn require_request_owner(caller: &Caller, request: &SubstitutionRequest) -> ApiResult<()> {
    caller.require_self_or(
        &request.requester_id,
        caller.role.can_coordinate_cover(),
        "manage this substitution request",
    )
}

/// The invited candidate, or an admin acting for them.
fn require_candidate(caller: &Caller, invitation: &Invitation) -> ApiResult<()> {
    caller.require_self_or(
        &invitation.candidate_id,
        caller.is_admin(),
        "respond to this invitation",
    )
}

/// Log a refused workflow step before handing the error back.
fn rejected(entity_id: &str, err: StaffroomError) -> ApiError {
    if matches!(
        err,
        StaffroomError::InvalidTransition(_)
            | StaffroomError::AlreadyFilled(_)
            | StaffroomError::Conflict(_)
    ) {
        log_domain_event(DomainEvent::TransitionRejected, entity_id, Some(&err.to_string()));
    }
    err.into()
}

/// Normalize a candidate list and check every entry is an active staff member.
async fn checked_candidates(
    state: &AppState,
    requester_id: &str,
    candidate_ids: &[String],
) -> ApiResult<Vec<String>> {
    let candidates = normalize_candidates(requester_id, candidate_ids);
    if candidates.is_empty() {
        return Err(ApiError::invalid_field(
            "candidate_ids",
            "at least one candidate other than the requester is required",
        ));
    }
    let max = state.substitutions.max_candidates as usize;
    if candidates.len() > max {
        return Err(ApiError::invalid_field(
            "candidate_ids",
            &format!("at most {max} candidates may be invited"),
        ));
    }

    let active: HashSet<String> = state
        .db
        .get_staff_many(&candidates)
        .await?
        .into_iter()
        .filter(|m| m.is_active)
        .map(|m| m.id)
        .collect();
    if let Some(unknown) = candidates.iter().find(|c| !active.contains(*c)) {
        return Err(ApiError::invalid_field(
            "candidate_ids",
            &format!("{unknown} is not an active staff member"),
        ));
    }
    Ok(candidates)
}

fn invitation_message(request: &SubstitutionRequest, requester_name: &str) -> Outgoing {
    Outgoing::new(
        NotificationKind::SubstitutionInvitation,
        format!("Cover needed on {}", request.date),
        format!(
            "Can you cover for {requester_name} on {} from {} to {}?",
            request.date,
            request.start_time.format("%H:%M"),
            request.end_time.format("%H:%M"),
        ),
    )
    .about(&request.id)
}

async fn staff_name(state: &AppState, staff_id: &str) -> String {
    match state.db.get_staff(staff_id).await {
        Ok(Some(member)) => member.full_name,
        _ => staff_id.to_string(),
    }
}

/// Staff who cannot take a window: they teach during it, or already cover
/// something overlapping it.
pub fn busy_staff(
    window: &TimeWindow,
    lessons: &[TimetableEntry],
    covers: &[(String, TimeWindow)],
) -> HashSet<String> {
    let teaching = lessons
        .iter()
        .filter(|entry| window.overlaps(&entry.window()))
        .map(|entry| entry.staff_id.clone());
    let covering = covers
        .iter()
        .filter(|(_, cover)| window.overlaps(cover))
        .map(|(staff_id, _)| staff_id.clone());
    teaching.chain(covering).collect()
}

// ============================================================================
// Request handlers
// ============================================================================

/// Raise a cover request and invite the candidates.
///
/// `POST /api/v1/substitutions/requests`
pub async fn create_request_handler(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<CreateSubstitutionRequest>,
) -> ApiResult<(StatusCode, Json<RequestDetail>)> {
    let requester_id = match payload.requester_id {
        Some(id) => id,
        None => caller.own_id()?.to_string(),
    };
    caller.require_self_or(
        &requester_id,
        caller.role.can_coordinate_cover(),
        "request cover for someone else",
    )?;
    let requester = load_staff(&state, &requester_id).await?;

    let date = parse_date(&payload.date, "date")?;
    let mut department_id = optional_text(payload.department_id.as_deref(), 64, "department_id")?;
    let mut start = parse_optional_time(payload.start_time.as_deref(), "start_time")?;
    let mut end = parse_optional_time(payload.end_time.as_deref(), "end_time")?;

    let timetable_entry_id =
        optional_text(payload.timetable_entry_id.as_deref(), 64, "timetable_entry_id")?;
    if let Some(entry_id) = &timetable_entry_id {
        let entry = state
            .db
            .get_timetable_entry(entry_id)
            .await?
            .ok_or_else(|| ApiError::invalid_field("timetable_entry_id", "no such entry"))?;
        if entry.staff_id != requester.id {
            return Err(ApiError::invalid_field(
                "timetable_entry_id",
                "entry belongs to another staff member",
            ));
        }
        department_id = department_id.or(entry.department_id);
        start = start.or(Some(entry.start_time));
        end = end.or(Some(entry.end_time));
    }

    if let Some(id) = &department_id {
        if state.db.get_department(id).await?.is_none() {
            return Err(ApiError::invalid_field("department_id", "no such department"));
        }
    }
    let start = start.ok_or_else(|| ApiError::missing_field("start_time"))?;
    let end = end.ok_or_else(|| ApiError::missing_field("end_time"))?;
    let window = TimeWindow::new(start, end)?;

    let candidates = checked_candidates(&state, &requester.id, &payload.candidate_ids).await?;

    let at = now();
    let request = SubstitutionRequest {
        id: new_id(),
        requester_id: requester.id.clone(),
        department_id,
        timetable_entry_id,
        date,
        start_time: window.start,
        end_time: window.end,
        reason: optional_text(payload.reason.as_deref(), MAX_REASON_LEN, "reason")?,
        status: RequestStatus::Open.to_string(),
        substitute_id: None,
        accepted_invitation_id: None,
        created_by: caller.id().map(str::to_string),
        created_at: at,
        updated_at: at,
        closed_at: None,
    };

    info!(
        "Creating substitution request for {} on {} with {} candidates",
        requester.id,
        date,
        candidates.len()
    );
    let invitations = state
        .db
        .create_request_with_invitations(&request, &candidates)
        .await?;

    log_domain_event(DomainEvent::Created, &request.id, Some(&request.date.to_string()));
    for invitation in &invitations {
        log_domain_event(DomainEvent::Invited, &invitation.id, Some(&invitation.candidate_id));
    }
    notify_many(
        &state.db,
        &candidates,
        &invitation_message(&request, &requester.full_name),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(RequestDetail {
            request,
            invitations,
        }),
    ))
}

/// `GET /api/v1/substitutions/requests?status=&requester_id=&date=`
pub async fn list_requests_handler(
    State(state): State<AppState>,
    _caller: Caller,
    Query(query): Query<ListRequestsQuery>,
) -> ApiResult<Json<Paginated<SubstitutionRequest>>> {
    let filter = RequestFilter {
        status: query
            .status
            .as_deref()
            .map(|s| parse_enum::<RequestStatus>(s, "status"))
            .transpose()?,
        requester_id: query.requester_id,
        date: parse_optional_date(query.date.as_deref(), "date")?,
    };

    let (items, total) = state
        .db
        .list_requests(
            &filter,
            Paginated::<SubstitutionRequest>::window(query.page, query.per_page),
        )
        .await?;

    Ok(Json(Paginated::new(items, total, query.page, query.per_page)))
}

/// `GET /api/v1/substitutions/requests/{id}`
pub async fn get_request_handler(
    State(state): State<AppState>,
    _caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<RequestDetail>> {
    let request = load_request(&state, &id).await?;
    let invitations = state.db.list_invitations_for_request(&request.id).await?;
    Ok(Json(RequestDetail {
        request,
        invitations,
    }))
}

/// Invite more candidates to an open request. Already-invited staff are skipped.
///
/// `POST /api/v1/substitutions/requests/{id}/invitations`
pub async fn invite_candidates_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<InviteCandidatesRequest>,
) -> ApiResult<(StatusCode, Json<Vec<Invitation>>)> {
    let request = load_request(&state, &id).await?;
    require_request_owner(&caller, &request)?;
    request
        .status()?
        .apply(RequestAction::Invite)
        .map_err(|e| rejected(&request.id, e))?;

    let candidates = checked_candidates(&state, &request.requester_id, &payload.candidate_ids).await?;
    let created = state
        .db
        .add_invitations(
            &request.id,
            &candidates,
            state.substitutions.max_candidates,
            now(),
        )
        .await
        .map_err(|e| rejected(&request.id, e))?;

    let invited: Vec<String> = created.iter().map(|i| i.candidate_id.clone()).collect();
    for invitation in &created {
        log_domain_event(DomainEvent::Invited, &invitation.id, Some(&invitation.candidate_id));
    }
    let requester_name = staff_name(&state, &request.requester_id).await;
    notify_many(&state.db, &invited, &invitation_message(&request, &requester_name)).await;

    Ok((StatusCode::CREATED, Json(created)))
}

/// Rank staff who are free to cover the request.
///
/// `GET /api/v1/substitutions/requests/{id}/suggestions`
pub async fn suggest_candidates_handler(
    State(state): State<AppState>,
    _caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<SuggestionsResponse>> {
    let request = load_request(&state, &id).await?;
    let window = request.window();

    let pool = match &request.department_id {
        Some(department_id) => state.db.list_active_in_department(department_id).await?,
        None => state.db.list_active_staff().await?,
    };

    let invited: HashSet<String> = state
        .db
        .list_invitations_for_request(&request.id)
        .await?
        .into_iter()
        .map(|i| i.candidate_id)
        .collect();
    let away: HashSet<String> = state
        .db
        .staff_away_on(request.date)
        .await?
        .into_iter()
        .collect();
    let lessons = state.db.timetable_on_day(iso_weekday(request.date)).await?;
    let covers = state.db.accepted_windows_on(request.date).await?;
    let busy = busy_staff(&window, &lessons, &covers);

    let mut record: HashMap<String, (i64, i64)> = HashMap::new();
    for (staff_id, outcome, count) in state.db.history_counts().await? {
        let entry = record.entry(staff_id).or_default();
        match outcome.parse::<HistoryOutcome>()? {
            HistoryOutcome::Completed => entry.0 = count,
            HistoryOutcome::NoShow => entry.1 = count,
        }
    }

    let profiles = pool
        .into_iter()
        .filter(|m| m.id != request.requester_id)
        .filter(|m| !invited.contains(&m.id) && !away.contains(&m.id) && !busy.contains(&m.id))
        .map(|m| {
            let (completed, no_shows) = record.get(&m.id).copied().unwrap_or_default();
            CandidateProfile {
                staff_id: m.id,
                full_name: m.full_name,
                completed,
                no_shows,
            }
        })
        .collect();

    Ok(Json(SuggestionsResponse {
        request_id: request.id,
        candidates: rank_candidates(profiles, state.substitutions.no_show_exclusion_threshold),
    }))
}

/// Cancel an open or filled request and tell everyone still involved.
///
/// `POST /api/v1/substitutions/requests/{id}/cancel`
pub async fn cancel_request_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<SubstitutionRequest>> {
    let request = load_request(&state, &id).await?;
    require_request_owner(&caller, &request)?;

    let outcome = state
        .db
        .cancel_request(&request.id, now())
        .await
        .map_err(|e| rejected(&request.id, e))?;
    log_domain_event(DomainEvent::Cancelled, &outcome.request.id, None);

    let message = Outgoing::new(
        NotificationKind::SubstitutionCancelled,
        format!("Cover on {} cancelled", outcome.request.date),
        format!(
            "The cover request for {} from {} to {} has been cancelled.",
            outcome.request.date,
            outcome.request.start_time.format("%H:%M"),
            outcome.request.end_time.format("%H:%M"),
        ),
    )
    .about(&outcome.request.id);
    notify_many(&state.db, &outcome.affected_candidates, &message).await;

    Ok(Json(outcome.request))
}

async fn close_with(
    state: &AppState,
    caller: &Caller,
    id: &str,
    outcome: HistoryOutcome,
) -> ApiResult<CloseResponse> {
    caller.require(caller.role.can_coordinate_cover(), "close substitution requests")?;
    let request = load_request(state, id).await?;

    let (request, history) = state
        .db
        .close_request(&request.id, outcome, now())
        .await
        .map_err(|e| rejected(&request.id, e))?;

    let event = match outcome {
        HistoryOutcome::Completed => DomainEvent::Completed,
        HistoryOutcome::NoShow => DomainEvent::NoShow,
    };
    log_domain_event(event, &request.id, Some(&history.substitute_id));

    Ok(CloseResponse { request, history })
}

/// The substitute covered the lesson.
///
/// `POST /api/v1/substitutions/requests/{id}/complete`
pub async fn complete_request_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<CloseResponse>> {
    Ok(Json(
        close_with(&state, &caller, &id, HistoryOutcome::Completed).await?,
    ))
}

/// The substitute never turned up.
///
/// `POST /api/v1/substitutions/requests/{id}/no-show`
pub async fn no_show_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<CloseResponse>> {
    Ok(Json(
        close_with(&state, &caller, &id, HistoryOutcome::NoShow).await?,
    ))
}

// ============================================================================
// Invitation handlers
// ============================================================================

/// `GET /api/v1/substitutions/invitations?candidate_id=&status=`
pub async fn list_invitations_handler(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListInvitationsQuery>,
) -> ApiResult<Json<Paginated<Invitation>>> {
    let candidate_id = query.candidate_id.or_else(|| caller.id().map(str::to_string));
    let status = query
        .status
        .as_deref()
        .map(|s| parse_enum::<InvitationStatus>(s, "status"))
        .transpose()?;

    let (items, total) = state
        .db
        .list_invitations(
            candidate_id.as_deref(),
            status,
            Paginated::<Invitation>::window(query.page, query.per_page),
        )
        .await?;

    Ok(Json(Paginated::new(items, total, query.page, query.per_page)))
}

/// Accept an invitation. Only the first acceptance on a request wins; the
/// rest get `409 ALREADY_FILLED`.
///
/// `POST /api/v1/substitutions/invitations/{id}/accept`
pub async fn accept_invitation_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<InvitationResponse>> {
    let invitation = load_invitation(&state, &id).await?;
    require_candidate(&caller, &invitation)?;

    let outcome = state
        .db
        .accept_invitation(&invitation.id, now())
        .await
        .map_err(|e| rejected(&invitation.id, e))?;
    log_domain_event(
        DomainEvent::Accepted,
        &outcome.invitation.id,
        Some(&format!(
            "request {} ({} others disabled)",
            outcome.request.id,
            outcome.disabled_candidates.len()
        )),
    );

    let substitute_name = staff_name(&state, &outcome.invitation.candidate_id).await;
    let message = Outgoing::new(
        NotificationKind::SubstitutionAccepted,
        format!("Cover found for {}", outcome.request.date),
        format!(
            "{substitute_name} will cover you on {} from {} to {}.",
            outcome.request.date,
            outcome.request.start_time.format("%H:%M"),
            outcome.request.end_time.format("%H:%M"),
        ),
    )
    .about(&outcome.request.id);
    notify(&state.db, &outcome.request.requester_id, &message).await;

    Ok(Json(InvitationResponse {
        invitation: outcome.invitation,
        request: outcome.request,
    }))
}

/// `POST /api/v1/substitutions/invitations/{id}/decline`
pub async fn decline_invitation_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<InvitationResponse>> {
    let invitation = load_invitation(&state, &id).await?;
    require_candidate(&caller, &invitation)?;

    let (invitation, request, still_pending) = state
        .db
        .decline_invitation(&invitation.id, now())
        .await
        .map_err(|e| rejected(&invitation.id, e))?;
    log_domain_event(DomainEvent::Declined, &invitation.id, Some(&request.id));

    let candidate_name = staff_name(&state, &invitation.candidate_id).await;
    let everyone_declined = still_pending == 0 && request.status()? == RequestStatus::Open;
    let body = if everyone_declined {
        format!(
            "{candidate_name} declined. Every candidate has now declined your cover request for {}.",
            request.date
        )
    } else {
        format!(
            "{candidate_name} declined your cover request for {}.",
            request.date
        )
    };
    let message = Outgoing::new(
        NotificationKind::SubstitutionDeclined,
        format!("Cover declined for {}", request.date),
        body,
    )
    .about(&request.id);
    notify(&state.db, &request.requester_id, &message).await;

    Ok(Json(InvitationResponse {
        invitation,
        request,
    }))
}

/// The accepted substitute drops out. The request reopens and, when
/// configured, the other candidates are invited again.
///
/// `POST /api/v1/substitutions/invitations/{id}/drop`
pub async fn drop_invitation_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<InvitationResponse>> {
    let invitation = load_invitation(&state, &id).await?;
    require_candidate(&caller, &invitation)?;

    let outcome = state
        .db
        .drop_invitation(
            &invitation.id,
            state.substitutions.reactivate_on_drop,
            now(),
        )
        .await
        .map_err(|e| rejected(&invitation.id, e))?;
    log_domain_event(
        DomainEvent::Dropped,
        &outcome.invitation.id,
        Some(&format!(
            "request {} reopened, {} reactivated",
            outcome.request.id,
            outcome.reactivated_candidates.len()
        )),
    );

    let request = &outcome.request;
    let substitute_name = staff_name(&state, &outcome.invitation.candidate_id).await;

    let to_requester = Outgoing::new(
        NotificationKind::SubstitutionDropped,
        format!("Cover dropped for {}", request.date),
        format!(
            "{substitute_name} can no longer cover you on {}. The request is open again.",
            request.date
        ),
    )
    .about(&request.id);
    notify(&state.db, &request.requester_id, &to_requester).await;

    if !outcome.reactivated_candidates.is_empty() {
        let to_candidates = Outgoing::new(
            NotificationKind::SubstitutionDropped,
            format!("Cover needed again on {}", request.date),
            format!(
                "The cover on {} from {} to {} is available again.",
                request.date,
                request.start_time.format("%H:%M"),
                request.end_time.format("%H:%M"),
            ),
        )
        .about(&request.id);
        notify_many(&state.db, &outcome.reactivated_candidates, &to_candidates).await;
    }

    Ok(Json(InvitationResponse {
        invitation: outcome.invitation,
        request: outcome.request,
    }))
}

// ============================================================================
// History handlers
// ============================================================================

/// `GET /api/v1/substitutions/history?substitute_id=&outcome=`
pub async fn list_history_handler(
    State(state): State<AppState>,
    _caller: Caller,
    Query(query): Query<ListHistoryQuery>,
) -> ApiResult<Json<Paginated<HistoryRecord>>> {
    let outcome = query
        .outcome
        .as_deref()
        .map(|o| parse_enum::<HistoryOutcome>(o, "outcome"))
        .transpose()?;

    let (items, total) = state
        .db
        .list_history(
            query.substitute_id.as_deref(),
            outcome,
            Paginated::<HistoryRecord>::window(query.page, query.per_page),
        )
        .await?;

    Ok(Json(Paginated::new(items, total, query.page, query.per_page)))
}

/// `GET /api/v1/substitutions/history/{staff_id}/summary`
pub async fn staff_record_handler(
    State(state): State<AppState>,
    _caller: Caller,
    Path(staff_id): Path<String>,
) -> ApiResult<Json<StaffRecordResponse>> {
    let staff = load_staff(&state, &staff_id).await?;
    let (completed, no_shows) = state.db.substitution_counts(&staff.id).await?;

    Ok(Json(StaffRecordResponse {
        staff_id: staff.id,
        completed,
        no_shows,
    }))
}
