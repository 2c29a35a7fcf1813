use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::server::attendance::{
    attendance_summary_handler, delete_attendance_handler, get_attendance_handler,
    list_attendance_handler, record_attendance_handler,
};
use crate::server::departments::{
    create_department_handler, delete_department_handler, department_members_handler,
    get_department_handler, list_departments_handler, update_department_handler,
};
use crate::server::handlers::{health_handler, AppState};
use crate::server::hr_tasks::{
    change_task_status_handler, create_task_handler, delete_task_handler, get_task_handler,
    list_tasks_handler, update_task_handler,
};
use crate::server::logging::request_logging_middleware;
use crate::server::notifications::{
    broadcast_handler, delete_notification_handler, list_notifications_handler,
    mark_all_read_handler, mark_read_handler, send_notification_handler, unread_count_handler,
};
use crate::server::staff::{
    create_staff_handler, deactivate_staff_handler, get_staff_handler, list_staff_handler,
    update_staff_handler,
};
use crate::server::substitutions::{
    accept_invitation_handler, cancel_request_handler, complete_request_handler,
    create_request_handler, decline_invitation_handler, drop_invitation_handler,
    get_request_handler, invite_candidates_handler, list_history_handler,
    list_invitations_handler, list_requests_handler, no_show_handler, staff_record_handler,
    suggest_candidates_handler,
};
use crate::server::timetable::{
    create_entry_handler, delete_entry_handler, get_entry_handler, list_entries_handler,
    staff_day_handler, update_entry_handler,
};

/// Build the application router.
///
/// `main.rs` and the integration tests both construct the app through this
/// one call. Every route is wrapped in the request logging middleware.
///
/// # Routes
///
/// - `GET /health`
/// - `/api/v1/departments` - department CRUD, members, broadcast
/// - `/api/v1/staff` - staff directory, a member's timetable for a date
/// - `/api/v1/notifications` - inbox, read markers, direct send
/// - `/api/v1/timetable` - timetable entries
/// - `/api/v1/attendance` - daily records and summaries
/// - `/api/v1/tasks` - HR tasks and their status workflow
/// - `/api/v1/substitutions` - cover requests, invitations, history
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        // Departments
        .route(
            "/api/v1/departments",
            post(create_department_handler).get(list_departments_handler),
        )
        .route(
            "/api/v1/departments/:id",
            get(get_department_handler)
                .patch(update_department_handler)
                .delete(delete_department_handler),
        )
        .route(
            "/api/v1/departments/:id/staff",
            get(department_members_handler),
        )
        .route(
            "/api/v1/departments/:id/notifications",
            post(broadcast_handler),
        )
        // Staff
        .route(
            "/api/v1/staff",
            post(create_staff_handler).get(list_staff_handler),
        )
        .route(
            "/api/v1/staff/:id",
            get(get_staff_handler)
                .patch(update_staff_handler)
                .delete(deactivate_staff_handler),
        )
        .route("/api/v1/staff/:id/timetable", get(staff_day_handler))
        // Notifications
        .route(
            "/api/v1/notifications",
            post(send_notification_handler).get(list_notifications_handler),
        )
        .route(
            "/api/v1/notifications/unread-count",
            get(unread_count_handler),
        )
        .route(
            "/api/v1/notifications/read-all",
            post(mark_all_read_handler),
        )
        .route(
            "/api/v1/notifications/:id",
            axum::routing::delete(delete_notification_handler),
        )
        .route("/api/v1/notifications/:id/read", post(mark_read_handler))
        // Timetable
        .route(
            "/api/v1/timetable",
            post(create_entry_handler).get(list_entries_handler),
        )
        .route(
            "/api/v1/timetable/:id",
            get(get_entry_handler)
                .patch(update_entry_handler)
                .delete(delete_entry_handler),
        )
        // Attendance
        .route(
            "/api/v1/attendance",
            put(record_attendance_handler).get(list_attendance_handler),
        )
        .route(
            "/api/v1/attendance/summary",
            get(attendance_summary_handler),
        )
        .route(
            "/api/v1/attendance/:id",
            get(get_attendance_handler).delete(delete_attendance_handler),
        )
        // HR tasks
        .route(
            "/api/v1/tasks",
            post(create_task_handler).get(list_tasks_handler),
        )
        .route(
            "/api/v1/tasks/:id",
            get(get_task_handler)
                .patch(update_task_handler)
                .delete(delete_task_handler),
        )
        .route(
            "/api/v1/tasks/:id/status",
            post(change_task_status_handler),
        )
        // Substitution requests
        .route(
            "/api/v1/substitutions/requests",
            post(create_request_handler).get(list_requests_handler),
        )
        .route(
            "/api/v1/substitutions/requests/:id",
            get(get_request_handler),
        )
        .route(
            "/api/v1/substitutions/requests/:id/invitations",
            post(invite_candidates_handler),
        )
        .route(
            "/api/v1/substitutions/requests/:id/suggestions",
            get(suggest_candidates_handler),
        )
        .route(
            "/api/v1/substitutions/requests/:id/cancel",
            post(cancel_request_handler),
        )
        .route(
            "/api/v1/substitutions/requests/:id/complete",
            post(complete_request_handler),
        )
        .route(
            "/api/v1/substitutions/requests/:id/no-show",
            post(no_show_handler),
        )
        // Substitution invitations
        .route(
            "/api/v1/substitutions/invitations",
            get(list_invitations_handler),
        )
        .route(
            "/api/v1/substitutions/invitations/:id/accept",
            post(accept_invitation_handler),
        )
        .route(
            "/api/v1/substitutions/invitations/:id/decline",
            post(decline_invitation_handler),
        )
        .route(
            "/api/v1/substitutions/invitations/:id/drop",
            post(drop_invitation_handler),
        )
        // Substitution history
        .route(
            "/api/v1/substitutions/history",
            get(list_history_handler),
        )
        .route(
            "/api/v1/substitutions/history/:staff_id/summary",
            get(staff_record_handler),
        )
        .layer(middleware::from_fn(request_logging_middleware))
        .with_state(state)
}
