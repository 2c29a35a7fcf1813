//! Notification handlers and the delivery helpers used by other modules.
//!
//! # Endpoints
//!
//! - `POST /api/v1/notifications` - Send a notification to one staff member
//! - `POST /api/v1/departments/{id}/notifications` - Broadcast to a department
//! - `GET /api/v1/notifications?unread=true` - The caller's notifications
//! - `GET /api/v1/notifications/unread-count` - Unread counter
//! - `POST /api/v1/notifications/{id}/read` - Mark one as read
//! - `POST /api/v1/notifications/read-all` - Mark all as read
//! - `DELETE /api/v1/notifications/{id}` - Delete one
//!
//! Workflow code sends through [`notify`] and [`notify_many`], which never
//! fail the caller: a delivery error is logged and swallowed.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::notification::NotificationKind;
use crate::server::api_error::ApiError;
use crate::server::auth::Caller;
use crate::server::database::{new_id, now, Database, Notification};
use crate::server::departments::{is_department_head, load_department};
use crate::server::handlers::{default_page, default_per_page, ApiResult, AppState, Paginated};
use crate::server::logging::{log_domain_event, DomainEvent};
use crate::server::validation::{optional_text, parse_enum, required_text};

const MAX_TITLE_LEN: usize = 200;
const MAX_BODY_LEN: usize = 4000;

// ============================================================================
// Delivery helpers
// ============================================================================

/// A message about to be delivered.
#[derive(Debug, Clone)]
pub struct Outgoing {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub reference_id: Option<String>,
}

impl Outgoing {
    pub fn new(kind: NotificationKind, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            body: body.into(),
            reference_id: None,
        }
    }

    pub fn about(mut self, reference_id: &str) -> Self {
        self.reference_id = Some(reference_id.to_string());
        self
    }

    fn for_recipient(&self, recipient_id: &str) -> Notification {
        Notification {
            id: new_id(),
            recipient_id: recipient_id.to_string(),
            kind: self.kind.to_string(),
            title: self.title.clone(),
            body: self.body.clone(),
            reference_id: self.reference_id.clone(),
            is_read: false,
            created_at: now(),
            read_at: None,
        }
    }
}

/// Deliver one notification. Failures are logged, never returned.
pub async fn notify(db: &Database, recipient_id: &str, message: &Outgoing) -> Option<Notification> {
    let notification = message.for_recipient(recipient_id);
    match db.insert_notification(&notification).await {
        Ok(()) => {
            log_domain_event(
                DomainEvent::NotificationSent,
                &notification.id,
                Some(&format!("{} -> {}", message.kind, recipient_id)),
            );
            Some(notification)
        }
        Err(e) => {
            log_domain_event(
                DomainEvent::DeliveryFailed,
                recipient_id,
                Some(&format!("{}: {e}", message.kind)),
            );
            None
        }
    }
}

/// Deliver the same message to several recipients. Returns how many landed.
pub async fn notify_many(db: &Database, recipient_ids: &[String], message: &Outgoing) -> usize {
    let mut delivered = 0;
    for recipient_id in recipient_ids {
        if notify(db, recipient_id, message).await.is_some() {
            delivered += 1;
        }
    }
    delivered
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SendNotificationRequest {
    pub recipient_id: String,
    pub title: String,
    pub body: String,
    /// Defaults to `general`
    pub kind: Option<String>,
    pub reference_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct BroadcastResponse {
    pub department_id: String,
    pub delivered: usize,
}

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    #[serde(default)]
    pub unread: Option<bool>,
    /// Admins may read another staff member's inbox
    pub recipient_id: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

#[derive(Debug, Deserialize)]
pub struct RecipientQuery {
    pub recipient_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub recipient_id: String,
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub recipient_id: String,
    pub updated: u64,
}

/// Whose inbox a request is about: the caller's own, or (admins only) the one named.
fn resolve_recipient(caller: &Caller, requested: Option<String>) -> ApiResult<String> {
    match requested {
        Some(id) if caller.is_admin() || caller.is(&id) => Ok(id),
        Some(_) => Err(ApiError::forbidden(
            "only administrators may read another staff member's notifications",
        )),
        None => Ok(caller.own_id()?.to_string()),
    }
}

async fn load_notification(state: &AppState, id: &str) -> ApiResult<Notification> {
    state
        .db
        .get_notification(id)
        .await?
        .ok_or_else(|| ApiError::not_found("notification"))
}

fn require_recipient_or_admin(caller: &Caller, notification: &Notification) -> ApiResult<()> {
    caller.require_self_or(
        &notification.recipient_id,
        caller.is_admin(),
        "manage this notification",
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// `POST /api/v1/notifications`
pub async fn send_notification_handler(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<SendNotificationRequest>,
) -> ApiResult<(StatusCode, Json<Notification>)> {
    caller.require(caller.role.can_send_notifications(), "send notifications")?;

    let title = required_text(&payload.title, MAX_TITLE_LEN, "title")?;
    let body = required_text(&payload.body, MAX_BODY_LEN, "body")?;
    let kind = match payload.kind.as_deref() {
        Some(kind) => parse_enum::<NotificationKind>(kind, "kind")?,
        None => NotificationKind::General,
    };
    let reference_id = optional_text(payload.reference_id.as_deref(), 64, "reference_id")?;

    if state.db.get_staff(&payload.recipient_id).await?.is_none() {
        return Err(ApiError::invalid_field("recipient_id", "no such staff member"));
    }

    let mut message = Outgoing::new(kind, title, body);
    message.reference_id = reference_id;

    let notification = message.for_recipient(&payload.recipient_id);
    state.db.insert_notification(&notification).await?;
    log_domain_event(
        DomainEvent::NotificationSent,
        &notification.id,
        Some(&format!("{} -> {}", kind, notification.recipient_id)),
    );

    Ok((StatusCode::CREATED, Json(notification)))
}

/// `POST /api/v1/departments/{id}/notifications`
pub async fn broadcast_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(department_id): Path<String>,
    Json(payload): Json<BroadcastRequest>,
) -> ApiResult<(StatusCode, Json<BroadcastResponse>)> {
    let department = load_department(&state, &department_id).await?;

    if !caller.is_admin() && !is_department_head(&state, &caller, &department).await? {
        return Err(ApiError::forbidden(
            "only administrators or the head of this department may broadcast to it",
        ));
    }

    let title = required_text(&payload.title, MAX_TITLE_LEN, "title")?;
    let body = required_text(&payload.body, MAX_BODY_LEN, "body")?;

    let recipients: Vec<String> = state
        .db
        .list_active_in_department(&department.id)
        .await?
        .into_iter()
        .map(|m| m.id)
        .collect();

    let message = Outgoing::new(NotificationKind::General, title, body).about(&department.id);
    let delivered = notify_many(&state.db, &recipients, &message).await;

    info!(
        "Broadcast to department {} delivered {}/{}",
        department.code,
        delivered,
        recipients.len()
    );

    Ok((
        StatusCode::CREATED,
        Json(BroadcastResponse {
            department_id: department.id,
            delivered,
        }),
    ))
}

/// `GET /api/v1/notifications?unread=true`
pub async fn list_notifications_handler(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListNotificationsQuery>,
) -> ApiResult<Json<Paginated<Notification>>> {
    let recipient_id = resolve_recipient(&caller, query.recipient_id)?;

    let (items, total) = state
        .db
        .list_notifications(
            &recipient_id,
            query.unread.unwrap_or(false),
            Paginated::<Notification>::window(query.page, query.per_page),
        )
        .await?;

    Ok(Json(Paginated::new(items, total, query.page, query.per_page)))
}

/// `GET /api/v1/notifications/unread-count`
pub async fn unread_count_handler(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<RecipientQuery>,
) -> ApiResult<Json<UnreadCountResponse>> {
    let recipient_id = resolve_recipient(&caller, query.recipient_id)?;
    let unread = state.db.count_unread_notifications(&recipient_id).await?;

    Ok(Json(UnreadCountResponse {
        recipient_id,
        unread,
    }))
}

/// `POST /api/v1/notifications/{id}/read`
pub async fn mark_read_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<Notification>> {
    let notification = load_notification(&state, &id).await?;
    require_recipient_or_admin(&caller, &notification)?;

    if !notification.is_read {
        state.db.mark_notification_read(&id, now()).await?;
    }

    Ok(Json(load_notification(&state, &id).await?))
}

/// `POST /api/v1/notifications/read-all`
pub async fn mark_all_read_handler(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<RecipientQuery>,
) -> ApiResult<Json<MarkAllReadResponse>> {
    let recipient_id = resolve_recipient(&caller, query.recipient_id)?;
    let updated = state
        .db
        .mark_all_notifications_read(&recipient_id, now())
        .await?;

    Ok(Json(MarkAllReadResponse {
        recipient_id,
        updated,
    }))
}

/// `DELETE /api/v1/notifications/{id}`
pub async fn delete_notification_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let notification = load_notification(&state, &id).await?;
    require_recipient_or_admin(&caller, &notification)?;

    state.db.delete_notification(&id).await?;
    log_domain_event(DomainEvent::Deleted, &id, Some("notification"));

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::Role;

    #[test]
    fn recipient_defaults_to_caller() {
        let caller = Caller::staff("s1", Role::Staff);
        assert_eq!(resolve_recipient(&caller, None).unwrap(), "s1");
        assert_eq!(
            resolve_recipient(&caller, Some("s1".to_string())).unwrap(),
            "s1"
        );
        assert!(resolve_recipient(&caller, Some("s2".to_string())).is_err());
    }

    #[test]
    fn admin_may_read_any_inbox() {
        let admin = Caller::system();
        assert_eq!(
            resolve_recipient(&admin, Some("s2".to_string())).unwrap(),
            "s2"
        );
        assert!(resolve_recipient(&admin, None).is_err());
    }

    #[test]
    fn outgoing_builds_unread_notification() {
        let message = Outgoing::new(NotificationKind::TaskAssigned, "New task", "Do it")
            .about("task-1");
        let n = message.for_recipient("s1");
        assert_eq!(n.kind, "task_assigned");
        assert_eq!(n.reference_id.as_deref(), Some("task-1"));
        assert!(!n.is_read);
        assert!(n.read_at.is_none());
    }
}
