//! Staff directory handlers.
//!
//! # Endpoints
//!
//! - `POST /api/v1/staff` - Create a staff member
//! - `GET /api/v1/staff?department_id=&role=&active=` - List staff
//! - `GET /api/v1/staff/{id}` - Get a staff member
//! - `PATCH /api/v1/staff/{id}` - Update a staff member
//! - `DELETE /api/v1/staff/{id}` - Deactivate (soft delete)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::roles::Role;
use crate::server::api_error::ApiError;
use crate::server::auth::Caller;
use crate::server::database::{new_id, now, StaffFilter, StaffMember};
use crate::server::handlers::{default_page, default_per_page, ApiResult, AppState, Paginated};
use crate::server::logging::{log_domain_event, DomainEvent};
use crate::server::validation::{optional_text, parse_enum, required_text, validate_email};

const MAX_NAME_LEN: usize = 120;

#[derive(Debug, Deserialize)]
pub struct CreateStaffRequest {
    pub full_name: String,
    pub email: String,
    /// Defaults to `staff`
    pub role: Option<String>,
    pub department_id: Option<String>,
}

/// Partial update. An empty `department_id` removes the member from their department.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateStaffRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub department_id: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ListStaffQuery {
    pub department_id: Option<String>,
    pub role: Option<String>,
    pub active: Option<bool>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

pub(crate) async fn load_staff(state: &AppState, id: &str) -> ApiResult<StaffMember> {
    state
        .db
        .get_staff(id)
        .await?
        .ok_or_else(|| ApiError::not_found("staff member"))
}

/// Load a staff member who can take on work (tasks, cover).
pub(crate) async fn load_active_staff(
    state: &AppState,
    id: &str,
    field: &str,
) -> ApiResult<StaffMember> {
    match state.db.get_staff(id).await? {
        Some(member) if member.is_active => Ok(member),
        Some(_) => Err(ApiError::invalid_field(field, "staff member is inactive")),
        None => Err(ApiError::invalid_field(field, "no such staff member")),
    }
}

/// Only admins hand out the admin role.
fn check_role_grant(caller: &Caller, role: Role) -> ApiResult<()> {
    if role.is_admin() && !caller.is_admin() {
        return Err(ApiError::insufficient_role("grant the admin role"));
    }
    Ok(())
}

async fn check_department(state: &AppState, department_id: &str) -> ApiResult<()> {
    if state.db.get_department(department_id).await?.is_none() {
        return Err(ApiError::invalid_field(
            "department_id",
            "no such department",
        ));
    }
    Ok(())
}

async fn ensure_email_free(state: &AppState, email: &str, except_id: Option<&str>) -> ApiResult<()> {
    if let Some(existing) = state.db.get_staff_by_email(email).await? {
        if except_id != Some(existing.id.as_str()) {
            return Err(ApiError::conflict(format!(
                "email '{email}' is already registered"
            )));
        }
    }
    Ok(())
}

/// Create a staff member.
///
/// `POST /api/v1/staff`
pub async fn create_staff_handler(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<CreateStaffRequest>,
) -> ApiResult<(StatusCode, Json<StaffMember>)> {
    caller.require(caller.role.can_manage_staff(), "manage staff")?;

    let full_name = required_text(&payload.full_name, MAX_NAME_LEN, "full_name")?;
    let email = validate_email(&payload.email, "email")?;
    let role = match payload.role.as_deref() {
        Some(role) => parse_enum::<Role>(role, "role")?,
        None => Role::Staff,
    };
    check_role_grant(&caller, role)?;

    let department_id = optional_text(payload.department_id.as_deref(), 64, "department_id")?;
    if let Some(department_id) = &department_id {
        check_department(&state, department_id).await?;
    }
    ensure_email_free(&state, &email, None).await?;

    let at = now();
    let member = StaffMember {
        id: new_id(),
        full_name,
        email,
        role: role.to_string(),
        department_id,
        is_active: true,
        created_at: at,
        updated_at: at,
    };

    info!("Creating staff member {} ({})", member.email, member.role);
    state.db.insert_staff(&member).await?;
    log_domain_event(DomainEvent::Created, &member.id, Some(&member.role));

    Ok((StatusCode::CREATED, Json(member)))
}

/// `GET /api/v1/staff?department_id=&role=&active=`
pub async fn list_staff_handler(
    State(state): State<AppState>,
    _caller: Caller,
    Query(query): Query<ListStaffQuery>,
) -> ApiResult<Json<Paginated<StaffMember>>> {
    let filter = StaffFilter {
        department_id: query.department_id,
        role: query
            .role
            .as_deref()
            .map(|r| parse_enum::<Role>(r, "role"))
            .transpose()?,
        active: query.active,
    };

    let (items, total) = state
        .db
        .list_staff(
            &filter,
            Paginated::<StaffMember>::window(query.page, query.per_page),
        )
        .await?;

    Ok(Json(Paginated::new(items, total, query.page, query.per_page)))
}

/// `GET /api/v1/staff/{id}`
pub async fn get_staff_handler(
    State(state): State<AppState>,
    _caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<StaffMember>> {
    Ok(Json(load_staff(&state, &id).await?))
}

/// Partially update a staff member.
///
/// `PATCH /api/v1/staff/{id}`
pub async fn update_staff_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<UpdateStaffRequest>,
) -> ApiResult<Json<StaffMember>> {
    caller.require(caller.role.can_manage_staff(), "manage staff")?;

    let mut member = load_staff(&state, &id).await?;

    // Only admins may edit an existing admin record.
    if member.role()?.is_admin() && !caller.is_admin() {
        return Err(ApiError::insufficient_role("modify an administrator"));
    }

    if let Some(name) = payload.full_name.as_deref() {
        member.full_name = required_text(name, MAX_NAME_LEN, "full_name")?;
    }
    if let Some(email) = payload.email.as_deref() {
        let email = validate_email(email, "email")?;
        ensure_email_free(&state, &email, Some(&member.id)).await?;
        member.email = email;
    }
    if let Some(role) = payload.role.as_deref() {
        let role = parse_enum::<Role>(role, "role")?;
        check_role_grant(&caller, role)?;
        member.role = role.to_string();
    }
    if let Some(department_id) = payload.department_id.as_deref() {
        let department_id = optional_text(Some(department_id), 64, "department_id")?;
        if let Some(department_id) = &department_id {
            check_department(&state, department_id).await?;
        }
        member.department_id = department_id;
    }
    if let Some(active) = payload.is_active {
        member.is_active = active;
    }
    member.updated_at = now();

    if !state.db.update_staff(&member).await? {
        return Err(ApiError::not_found("staff member"));
    }
    log_domain_event(DomainEvent::Updated, &member.id, None);

    Ok(Json(member))
}

/// Soft-delete: the record stays, `is_active` becomes false.
///
/// `DELETE /api/v1/staff/{id}`
pub async fn deactivate_staff_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<StaffMember>> {
    caller.require(caller.role.can_manage_staff(), "manage staff")?;

    let member = load_staff(&state, &id).await?;
    if member.role()?.is_admin() && !caller.is_admin() {
        return Err(ApiError::insufficient_role("deactivate an administrator"));
    }

    if member.is_active {
        state.db.set_staff_active(&member.id, false, now()).await?;
        log_domain_event(DomainEvent::Deactivated, &member.id, None);
    }

    Ok(Json(load_staff(&state, &id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_admin_grants_admin() {
        let hr = Caller::staff("hr-1", Role::Hr);
        assert!(check_role_grant(&hr, Role::Staff).is_ok());
        assert!(check_role_grant(&hr, Role::Head).is_ok());
        assert!(check_role_grant(&hr, Role::Admin).is_err());
        assert!(check_role_grant(&Caller::system(), Role::Admin).is_ok());
    }
}
