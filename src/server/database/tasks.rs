use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::FromRow;

use super::{query_failed, Database, Page};
use crate::errors::StaffroomResult;
use crate::tasks::{TaskPriority, TaskStatus};

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct HrTask {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub assignee_id: Option<String>,
    pub created_by: Option<String>,
    pub status: String,
    pub priority: String,
    pub due_date: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

impl HrTask {
    pub fn status(&self) -> StaffroomResult<TaskStatus> {
        self.status.parse()
    }

    pub fn priority(&self) -> StaffroomResult<TaskPriority> {
        self.priority.parse()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub assignee_id: Option<String>,
    pub status: Option<TaskStatus>,
    /// Only active tasks due before this date.
    pub overdue_on: Option<NaiveDate>,
}

impl Database {
    pub async fn insert_task(&self, task: &HrTask) -> StaffroomResult<()> {
        with_pool!(self, pool => {
            sqlx::query(
                "INSERT INTO hr_tasks
                    (id, title, description, assignee_id, created_by, status, priority, due_date,
                     created_at, updated_at, completed_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            )
            .bind(&task.id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(&task.assignee_id)
            .bind(&task.created_by)
            .bind(&task.status)
            .bind(&task.priority)
            .bind(task.due_date)
            .bind(task.created_at)
            .bind(task.updated_at)
            .bind(task.completed_at)
            .execute(pool)
            .await
            .map_err(query_failed("insert_task"))?;
        });
        Ok(())
    }

    pub async fn get_task(&self, id: &str) -> StaffroomResult<Option<HrTask>> {
        with_pool!(self, pool => {
            sqlx::query_as::<_, HrTask>("SELECT * FROM hr_tasks WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(query_failed("get_task"))
        })
    }

    /// Soonest due first; undated tasks last.
    pub async fn list_tasks(
        &self,
        filter: &TaskFilter,
        page: Page,
    ) -> StaffroomResult<(Vec<HrTask>, i64)> {
        let status = filter.status.map(|s| s.as_str());

        with_pool!(self, pool => {
            let items = sqlx::query_as::<_, HrTask>(
                "SELECT * FROM hr_tasks
                 WHERE ($1 IS NULL OR assignee_id = $1)
                   AND ($2 IS NULL OR status = $2)
                   AND ($3 IS NULL OR (due_date < $3 AND status IN ('open', 'in_progress')))
                 ORDER BY due_date IS NULL, due_date, created_at, id
                 LIMIT $4 OFFSET $5",
            )
            .bind(&filter.assignee_id)
            .bind(status)
            .bind(filter.overdue_on)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(pool)
            .await
            .map_err(query_failed("list_tasks"))?;

            let total: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM hr_tasks
                 WHERE ($1 IS NULL OR assignee_id = $1)
                   AND ($2 IS NULL OR status = $2)
                   AND ($3 IS NULL OR (due_date < $3 AND status IN ('open', 'in_progress')))",
            )
            .bind(&filter.assignee_id)
            .bind(status)
            .bind(filter.overdue_on)
            .fetch_one(pool)
            .await
            .map_err(query_failed("count_tasks"))?;

            Ok((items, total))
        })
    }

    pub async fn update_task(&self, task: &HrTask) -> StaffroomResult<bool> {
        let result = with_pool!(self, pool => {
            sqlx::query(
                "UPDATE hr_tasks
                 SET title = $2, description = $3, assignee_id = $4, status = $5, priority = $6,
                     due_date = $7, updated_at = $8, completed_at = $9
                 WHERE id = $1",
            )
            .bind(&task.id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(&task.assignee_id)
            .bind(&task.status)
            .bind(&task.priority)
            .bind(task.due_date)
            .bind(task.updated_at)
            .bind(task.completed_at)
            .execute(pool)
            .await
            .map_err(query_failed("update_task"))?
            .rows_affected()
        });
        Ok(result > 0)
    }

    /// Move a task to `status` only if it is still in `expected`.
    pub async fn set_task_status(
        &self,
        id: &str,
        expected: TaskStatus,
        status: TaskStatus,
        completed_at: Option<NaiveDateTime>,
        at: NaiveDateTime,
    ) -> StaffroomResult<bool> {
        let result = with_pool!(self, pool => {
            sqlx::query(
                "UPDATE hr_tasks SET status = $3, completed_at = $4, updated_at = $5
                 WHERE id = $1 AND status = $2",
            )
            .bind(id)
            .bind(expected.as_str())
            .bind(status.as_str())
            .bind(completed_at)
            .bind(at)
            .execute(pool)
            .await
            .map_err(query_failed("set_task_status"))?
            .rows_affected()
        });
        Ok(result > 0)
    }

    pub async fn delete_task(&self, id: &str) -> StaffroomResult<bool> {
        let result = with_pool!(self, pool => {
            sqlx::query("DELETE FROM hr_tasks WHERE id = $1")
                .bind(id)
                .execute(pool)
                .await
                .map_err(query_failed("delete_task"))?
                .rows_affected()
        });
        Ok(result > 0)
    }
}
