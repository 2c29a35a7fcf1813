//! HR task handlers.
//!
//! # Endpoints
//!
//! - `POST /api/v1/tasks` - Create a task
//! - `GET /api/v1/tasks?assignee_id=&status=&overdue=true` - List tasks
//! - `GET /api/v1/tasks/{id}` - Get a task
//! - `PATCH /api/v1/tasks/{id}` - Update task fields
//! - `POST /api/v1/tasks/{id}/status` - Change status
//! - `DELETE /api/v1/tasks/{id}` - Delete a task

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::notification::NotificationKind;
use crate::server::api_error::ApiError;
use crate::server::auth::Caller;
use crate::server::database::{new_id, now, HrTask, TaskFilter};
use crate::server::handlers::{default_page, default_per_page, ApiResult, AppState, Paginated};
use crate::server::logging::{log_domain_event, DomainEvent};
use crate::server::notifications::{notify, Outgoing};
use crate::server::staff::load_active_staff;
use crate::server::validation::{optional_text, parse_date, parse_enum, required_text};
use crate::tasks::{is_overdue, TaskPriority, TaskStatus};

const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 4000;

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub assignee_id: Option<String>,
    /// Defaults to `normal`
    pub priority: Option<String>,
    pub due_date: Option<String>,
}

/// Partial update of everything except status. Empty strings clear
/// `description`, `assignee_id` and `due_date`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assignee_id: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    pub assignee_id: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub overdue: Option<bool>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// A task plus whether it is overdue today.
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    #[serde(flatten)]
    pub task: HrTask,
    pub overdue: bool,
}

impl TaskResponse {
    fn new(task: HrTask, today: NaiveDate) -> ApiResult<Self> {
        let overdue = is_overdue(task.status()?, task.due_date, today);
        Ok(Self { task, overdue })
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

async fn load_task(state: &AppState, id: &str) -> ApiResult<HrTask> {
    state
        .db
        .get_task(id)
        .await?
        .ok_or_else(|| ApiError::not_found("task"))
}

fn can_see(caller: &Caller, task: &HrTask) -> bool {
    caller.role.can_manage_tasks()
        || task
            .assignee_id
            .as_deref()
            .is_some_and(|assignee| caller.is(assignee))
}

async fn notify_assignee(state: &AppState, task: &HrTask) {
    if let Some(assignee) = &task.assignee_id {
        let message = Outgoing::new(
            NotificationKind::TaskAssigned,
            format!("New task: {}", task.title),
            match task.due_date {
                Some(due) => format!("You have been assigned '{}', due {due}.", task.title),
                None => format!("You have been assigned '{}'.", task.title),
            },
        )
        .about(&task.id);
        notify(&state.db, assignee, &message).await;
    }
}

/// Create a task, notifying the assignee.
///
/// `POST /api/v1/tasks`
pub async fn create_task_handler(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskResponse>)> {
    caller.require(caller.role.can_manage_tasks(), "manage HR tasks")?;

    let title = required_text(&payload.title, MAX_TITLE_LEN, "title")?;
    let description = optional_text(
        payload.description.as_deref(),
        MAX_DESCRIPTION_LEN,
        "description",
    )?;
    let priority = match payload.priority.as_deref() {
        Some(p) => parse_enum::<TaskPriority>(p, "priority")?,
        None => TaskPriority::default(),
    };
    let due_date = match optional_text(payload.due_date.as_deref(), 10, "due_date")? {
        Some(d) => Some(parse_date(&d, "due_date")?),
        None => None,
    };
    let assignee_id = match optional_text(payload.assignee_id.as_deref(), 64, "assignee_id")? {
        Some(id) => Some(load_active_staff(&state, &id, "assignee_id").await?.id),
        None => None,
    };

    let at = now();
    let task = HrTask {
        id: new_id(),
        title,
        description,
        assignee_id,
        created_by: caller.id().map(str::to_string),
        status: TaskStatus::Open.to_string(),
        priority: priority.to_string(),
        due_date,
        created_at: at,
        updated_at: at,
        completed_at: None,
    };

    state.db.insert_task(&task).await?;
    log_domain_event(DomainEvent::Created, &task.id, Some(&task.title));
    notify_assignee(&state, &task).await;

    Ok((StatusCode::CREATED, Json(TaskResponse::new(task, today())?)))
}

/// Admins and HR see every task; everyone else sees tasks assigned to them.
///
/// `GET /api/v1/tasks?assignee_id=&status=&overdue=true`
pub async fn list_tasks_handler(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListTasksQuery>,
) -> ApiResult<Json<Paginated<TaskResponse>>> {
    let assignee_id = if caller.role.can_manage_tasks() {
        query.assignee_id
    } else {
        let own = caller.own_id()?;
        if query.assignee_id.as_deref().is_some_and(|a| a != own) {
            return Err(ApiError::forbidden("you may only list your own tasks"));
        }
        Some(own.to_string())
    };

    let today = today();
    let filter = TaskFilter {
        assignee_id,
        status: query
            .status
            .as_deref()
            .map(|s| parse_enum::<TaskStatus>(s, "status"))
            .transpose()?,
        overdue_on: query.overdue.unwrap_or(false).then_some(today),
    };

    let (items, total) = state
        .db
        .list_tasks(&filter, Paginated::<HrTask>::window(query.page, query.per_page))
        .await?;
    let items = items
        .into_iter()
        .map(|task| TaskResponse::new(task, today))
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(Json(Paginated::new(items, total, query.page, query.per_page)))
}

/// `GET /api/v1/tasks/{id}`
pub async fn get_task_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<TaskResponse>> {
    let task = load_task(&state, &id).await?;
    if !can_see(&caller, &task) {
        return Err(ApiError::forbidden("this task is not assigned to you"));
    }
    Ok(Json(TaskResponse::new(task, today())?))
}

/// Update task fields. Reassignment notifies the new assignee.
///
/// `PATCH /api/v1/tasks/{id}`
pub async fn update_task_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<UpdateTaskRequest>,
) -> ApiResult<Json<TaskResponse>> {
    caller.require(caller.role.can_manage_tasks(), "manage HR tasks")?;

    let mut task = load_task(&state, &id).await?;
    let previous_assignee = task.assignee_id.clone();

    if let Some(title) = payload.title.as_deref() {
        task.title = required_text(title, MAX_TITLE_LEN, "title")?;
    }
    if let Some(description) = payload.description.as_deref() {
        task.description = optional_text(Some(description), MAX_DESCRIPTION_LEN, "description")?;
    }
    if let Some(priority) = payload.priority.as_deref() {
        task.priority = parse_enum::<TaskPriority>(priority, "priority")?.to_string();
    }
    if let Some(due) = payload.due_date.as_deref() {
        task.due_date = match optional_text(Some(due), 10, "due_date")? {
            Some(d) => Some(parse_date(&d, "due_date")?),
            None => None,
        };
    }
    if let Some(assignee) = payload.assignee_id.as_deref() {
        task.assignee_id = match optional_text(Some(assignee), 64, "assignee_id")? {
            Some(id) => Some(load_active_staff(&state, &id, "assignee_id").await?.id),
            None => None,
        };
    }
    task.updated_at = now();

    if !state.db.update_task(&task).await? {
        return Err(ApiError::not_found("task"));
    }
    log_domain_event(DomainEvent::Updated, &task.id, None);

    if task.assignee_id.is_some() && task.assignee_id != previous_assignee {
        notify_assignee(&state, &task).await;
    }

    Ok(Json(TaskResponse::new(task, today())?))
}

/// Move a task through its workflow.
///
/// Entering `done` stamps `completed_at`; leaving it clears the stamp. When
/// the assignee makes the change the creator is told.
///
/// `POST /api/v1/tasks/{id}/status`
pub async fn change_task_status_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<ChangeStatusRequest>,
) -> ApiResult<Json<TaskResponse>> {
    let task = load_task(&state, &id).await?;
    if !can_see(&caller, &task) {
        return Err(ApiError::forbidden("this task is not assigned to you"));
    }

    let current = task.status()?;
    let target: TaskStatus = parse_enum(&payload.status, "status")?;
    if let Err(e) = current.transition(target) {
        log_domain_event(DomainEvent::TransitionRejected, &task.id, Some(&e.to_string()));
        return Err(e.into());
    }

    let at = now();
    let completed_at = (target == TaskStatus::Done).then_some(at);
    if !state
        .db
        .set_task_status(&task.id, current, target, completed_at, at)
        .await?
    {
        return Err(ApiError::conflict(
            "task status changed concurrently; reload and retry",
        ));
    }
    log_domain_event(
        DomainEvent::Updated,
        &task.id,
        Some(&format!("{current} -> {target}")),
    );

    let task = load_task(&state, &id).await?;

    let by_assignee = task
        .assignee_id
        .as_deref()
        .is_some_and(|assignee| caller.is(assignee));
    if by_assignee {
        if let Some(creator) = task.created_by.as_deref().filter(|c| !caller.is(c)) {
            let message = Outgoing::new(
                NotificationKind::TaskUpdated,
                format!("Task updated: {}", task.title),
                format!("'{}' moved from {current} to {target}.", task.title),
            )
            .about(&task.id);
            notify(&state.db, creator, &message).await;
        }
    }

    Ok(Json(TaskResponse::new(task, today())?))
}

/// `DELETE /api/v1/tasks/{id}`
pub async fn delete_task_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    caller.require(caller.role.can_manage_tasks(), "manage HR tasks")?;

    if !state.db.delete_task(&id).await? {
        return Err(ApiError::not_found("task"));
    }
    log_domain_event(DomainEvent::Deleted, &id, Some("task"));

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::Role;

    fn task(assignee: Option<&str>, status: TaskStatus, due: Option<NaiveDate>) -> HrTask {
        HrTask {
            id: "t1".to_string(),
            title: "Renew DBS check".to_string(),
            description: None,
            assignee_id: assignee.map(str::to_string),
            created_by: Some("hr-1".to_string()),
            status: status.to_string(),
            priority: TaskPriority::Normal.to_string(),
            due_date: due,
            created_at: now(),
            updated_at: now(),
            completed_at: None,
        }
    }

    #[test]
    fn visibility_follows_role_and_assignment() {
        let t = task(Some("s1"), TaskStatus::Open, None);
        assert!(can_see(&Caller::staff("hr-1", Role::Hr), &t));
        assert!(can_see(&Caller::staff("s1", Role::Staff), &t));
        assert!(!can_see(&Caller::staff("s2", Role::Staff), &t));
        assert!(!can_see(&Caller::staff("h1", Role::Head), &t));
    }

    #[test]
    fn response_flags_overdue_tasks() {
        let today = NaiveDate::from_ymd_opt(2025, 9, 10).unwrap();
        let yesterday = NaiveDate::from_ymd_opt(2025, 9, 9);

        let late = TaskResponse::new(task(None, TaskStatus::InProgress, yesterday), today).unwrap();
        assert!(late.overdue);

        let finished = TaskResponse::new(task(None, TaskStatus::Done, yesterday), today).unwrap();
        assert!(!finished.overdue);
    }
}
