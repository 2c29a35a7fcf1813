//! Request logging middleware and domain event logging.
//!
//! Every request gets a fresh id, a span carrying method and path, and a
//! completion line with status and duration. The id is echoed back in the
//! `X-Request-Id` response header.
//!
//! State changes in the workflow modules are logged through
//! [`log_domain_event`] so they share one shape in the log stream.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, Response},
    middleware::Next,
};
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// State changes worth an audit line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainEvent {
    Created,
    Updated,
    Deleted,
    Deactivated,
    Invited,
    Accepted,
    Declined,
    Dropped,
    Cancelled,
    Completed,
    NoShow,
    Expired,
    NotificationSent,
    /// A workflow step was refused because of the current state
    TransitionRejected,
    /// A side effect (usually a notification) could not be delivered
    DeliveryFailed,
}

impl std::fmt::Display for DomainEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DomainEvent::Created => "created",
            DomainEvent::Updated => "updated",
            DomainEvent::Deleted => "deleted",
            DomainEvent::Deactivated => "deactivated",
            DomainEvent::Invited => "invited",
            DomainEvent::Accepted => "accepted",
            DomainEvent::Declined => "declined",
            DomainEvent::Dropped => "dropped",
            DomainEvent::Cancelled => "cancelled",
            DomainEvent::Completed => "completed",
            DomainEvent::NoShow => "no_show",
            DomainEvent::Expired => "expired",
            DomainEvent::NotificationSent => "notification_sent",
            DomainEvent::TransitionRejected => "transition_rejected",
            DomainEvent::DeliveryFailed => "delivery_failed",
        };
        write!(f, "{}", s)
    }
}

/// Log a domain state change.
///
/// # Arguments
///
/// * `event` - What happened
/// * `entity_id` - The record it happened to
/// * `details` - Optional free-form context
pub fn log_domain_event(event: DomainEvent, entity_id: &str, details: Option<&str>) {
    let span = info_span!(
        "domain_event",
        event = %event,
        entity_id = %entity_id,
    );
    let _enter = span.enter();

    match event {
        DomainEvent::TransitionRejected | DomainEvent::DeliveryFailed => {
            if let Some(d) = details {
                warn!(reason = %d, "Domain event occurred");
            } else {
                warn!("Domain event occurred");
            }
        }
        _ => {
            if let Some(d) = details {
                info!(details = %d, "Domain event occurred");
            } else {
                info!("Domain event occurred");
            }
        }
    }
}

/// Header name for the request ID.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Generate a new unique request ID.
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Logging middleware that tracks request timing and generates request IDs.
pub async fn request_logging_middleware(request: Request, next: Next) -> Response<Body> {
    let request_id = generate_request_id();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    let start = Instant::now();

    let response = async move {
        info!("Started processing request");
        next.run(request).await
    }
    .instrument(span.clone())
    .await;

    let duration = start.elapsed();
    let status = response.status();

    let _enter = span.enter();
    if status.is_server_error() {
        warn!(
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "Request failed"
        );
    } else {
        info!(
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "Request completed"
        );
    }

    let (mut parts, body) = response.into_parts();
    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        parts.headers.insert(REQUEST_ID_HEADER, header_value);
    }

    Response::from_parts(parts, body)
}

/// Health check response structure.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: String,
    pub service: String,
    pub version: String,
    pub database: DatabaseHealth,
}

/// Database health status.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DatabaseHealth {
    pub connected: bool,
    /// sqlite or postgres
    pub db_type: String,
}

impl HealthResponse {
    pub fn new(db_connected: bool, db_type: &str) -> Self {
        Self {
            status: if db_connected { "healthy" } else { "degraded" }.to_string(),
            service: "staffroom".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: DatabaseHealth {
                connected: db_connected,
                db_type: db_type.to_string(),
            },
        }
    }
}
