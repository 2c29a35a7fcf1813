//! Department management handlers.
//!
//! # Endpoints
//!
//! - `POST /api/v1/departments` - Create a department
//! - `GET /api/v1/departments` - List departments
//! - `GET /api/v1/departments/{id}` - Get a department
//! - `PATCH /api/v1/departments/{id}` - Update a department
//! - `DELETE /api/v1/departments/{id}` - Delete an empty department
//! - `GET /api/v1/departments/{id}/staff` - Active members

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::roles::Role;
use crate::server::api_error::{ApiError, ErrorCode};
use crate::server::auth::Caller;
use crate::server::database::{new_id, now, Department, StaffMember};
use crate::server::handlers::{ApiResult, AppState, PageQuery, Paginated};
use crate::server::logging::{log_domain_event, DomainEvent};
use crate::server::validation::{optional_text, required_text, validate_department_code};

const MAX_NAME_LEN: usize = 120;
const MAX_DESCRIPTION_LEN: usize = 2000;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateDepartmentRequest {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub head_staff_id: Option<String>,
}

/// Partial update. An empty string clears `description` or `head_staff_id`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateDepartmentRequest {
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub head_staff_id: Option<String>,
}

// ============================================================================
// Shared helpers
// ============================================================================

pub(crate) async fn load_department(state: &AppState, id: &str) -> ApiResult<Department> {
    state
        .db
        .get_department(id)
        .await?
        .ok_or_else(|| ApiError::not_found("department"))
}

/// Whether the caller heads `department`.
///
/// Admins always count. Otherwise the caller must be the department's named
/// head, or hold the `head` role and belong to the department.
pub(crate) async fn is_department_head(
    state: &AppState,
    caller: &Caller,
    department: &Department,
) -> ApiResult<bool> {
    if caller.is_admin() {
        return Ok(true);
    }
    let Some(caller_id) = caller.id() else {
        return Ok(false);
    };
    if department.head_staff_id.as_deref() == Some(caller_id) {
        return Ok(true);
    }
    if caller.role != Role::Head {
        return Ok(false);
    }
    let member = state.db.get_staff(caller_id).await?;
    Ok(member
        .map(|m| m.is_active && m.department_id.as_deref() == Some(department.id.as_str()))
        .unwrap_or(false))
}

async fn check_head_candidate(state: &AppState, head_staff_id: &str) -> ApiResult<()> {
    match state.db.get_staff(head_staff_id).await? {
        Some(member) if member.is_active => Ok(()),
        Some(_) => Err(ApiError::invalid_field(
            "head_staff_id",
            "staff member is inactive",
        )),
        None => Err(ApiError::invalid_field(
            "head_staff_id",
            "no such staff member",
        )),
    }
}

async fn ensure_code_free(state: &AppState, code: &str, except_id: Option<&str>) -> ApiResult<()> {
    if let Some(existing) = state.db.get_department_by_code(code).await? {
        if except_id != Some(existing.id.as_str()) {
            return Err(ApiError::conflict(format!(
                "department code '{code}' is already in use"
            )));
        }
    }
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a department.
///
/// `POST /api/v1/departments`
pub async fn create_department_handler(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<CreateDepartmentRequest>,
) -> ApiResult<(StatusCode, Json<Department>)> {
    caller.require(caller.role.can_manage_departments(), "manage departments")?;

    let code = validate_department_code(&payload.code, "code")?;
    let name = required_text(&payload.name, MAX_NAME_LEN, "name")?;
    let description = optional_text(
        payload.description.as_deref(),
        MAX_DESCRIPTION_LEN,
        "description",
    )?;
    let head_staff_id = optional_text(payload.head_staff_id.as_deref(), 64, "head_staff_id")?;

    ensure_code_free(&state, &code, None).await?;
    if let Some(head) = &head_staff_id {
        check_head_candidate(&state, head).await?;
    }

    let at = now();
    let department = Department {
        id: new_id(),
        code,
        name,
        description,
        head_staff_id,
        created_at: at,
        updated_at: at,
    };

    info!("Creating department {}", department.code);
    state.db.insert_department(&department).await?;
    log_domain_event(DomainEvent::Created, &department.id, Some(&department.code));

    Ok((StatusCode::CREATED, Json(department)))
}

/// List departments, ordered by code.
///
/// `GET /api/v1/departments`
pub async fn list_departments_handler(
    State(state): State<AppState>,
    _caller: Caller,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Paginated<Department>>> {
    let (items, total) = state
        .db
        .list_departments(Paginated::<Department>::window(query.page, query.per_page))
        .await?;

    Ok(Json(Paginated::new(items, total, query.page, query.per_page)))
}

/// `GET /api/v1/departments/{id}`
pub async fn get_department_handler(
    State(state): State<AppState>,
    _caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Department>> {
    Ok(Json(load_department(&state, &id).await?))
}

/// Partially update a department.
///
/// `PATCH /api/v1/departments/{id}`
pub async fn update_department_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<UpdateDepartmentRequest>,
) -> ApiResult<Json<Department>> {
    caller.require(caller.role.can_manage_departments(), "manage departments")?;

    let mut department = load_department(&state, &id).await?;

    if let Some(code) = payload.code.as_deref() {
        let code = validate_department_code(code, "code")?;
        ensure_code_free(&state, &code, Some(&department.id)).await?;
        department.code = code;
    }
    if let Some(name) = payload.name.as_deref() {
        department.name = required_text(name, MAX_NAME_LEN, "name")?;
    }
    if let Some(description) = payload.description.as_deref() {
        department.description =
            optional_text(Some(description), MAX_DESCRIPTION_LEN, "description")?;
    }
    if let Some(head) = payload.head_staff_id.as_deref() {
        let head = optional_text(Some(head), 64, "head_staff_id")?;
        if let Some(head) = &head {
            check_head_candidate(&state, head).await?;
        }
        department.head_staff_id = head;
    }
    department.updated_at = now();

    if !state.db.update_department(&department).await? {
        return Err(ApiError::not_found("department"));
    }
    log_domain_event(DomainEvent::Updated, &department.id, Some(&department.code));

    Ok(Json(department))
}

/// Delete a department with no staff assigned.
///
/// `DELETE /api/v1/departments/{id}`
pub async fn delete_department_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    caller.require(caller.role.can_manage_departments(), "manage departments")?;

    let department = load_department(&state, &id).await?;
    let staff_count = state.db.count_staff_in_department(&department.id).await?;
    if staff_count > 0 {
        return Err(ApiError::with_details(
            ErrorCode::Conflict,
            "department still has staff assigned",
            serde_json::json!({ "staff_count": staff_count }),
        ));
    }

    if !state.db.delete_department(&department.id).await? {
        return Err(ApiError::not_found("department"));
    }
    log_domain_event(DomainEvent::Deleted, &department.id, Some(&department.code));

    Ok(StatusCode::NO_CONTENT)
}

/// Active staff of a department.
///
/// `GET /api/v1/departments/{id}/staff`
pub async fn department_members_handler(
    State(state): State<AppState>,
    _caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<StaffMember>>> {
    let department = load_department(&state, &id).await?;
    let members = state.db.list_active_in_department(&department.id).await?;
    Ok(Json(members))
}
