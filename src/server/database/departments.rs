use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;

use super::{query_failed, Database, Page};
use crate::errors::StaffroomResult;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Department {
    pub id: String,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub head_staff_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Database {
    pub async fn insert_department(&self, department: &Department) -> StaffroomResult<()> {
        with_pool!(self, pool => {
            sqlx::query(
                "INSERT INTO departments (id, code, name, description, head_staff_id, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(&department.id)
            .bind(&department.code)
            .bind(&department.name)
            .bind(&department.description)
            .bind(&department.head_staff_id)
            .bind(department.created_at)
            .bind(department.updated_at)
            .execute(pool)
            .await
            .map_err(query_failed("insert_department"))?;
        });
        Ok(())
    }

    pub async fn get_department(&self, id: &str) -> StaffroomResult<Option<Department>> {
        with_pool!(self, pool => {
            sqlx::query_as::<_, Department>("SELECT * FROM departments WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(query_failed("get_department"))
        })
    }

    pub async fn get_department_by_code(&self, code: &str) -> StaffroomResult<Option<Department>> {
        with_pool!(self, pool => {
            sqlx::query_as::<_, Department>("SELECT * FROM departments WHERE code = $1")
                .bind(code)
                .fetch_optional(pool)
                .await
                .map_err(query_failed("get_department_by_code"))
        })
    }

    /// One page of departments ordered by code, with the overall count.
    pub async fn list_departments(&self, page: Page) -> StaffroomResult<(Vec<Department>, i64)> {
        with_pool!(self, pool => {
            let items = sqlx::query_as::<_, Department>(
                "SELECT * FROM departments ORDER BY code LIMIT $1 OFFSET $2",
            )
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(pool)
            .await
            .map_err(query_failed("list_departments"))?;

            let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM departments")
                .fetch_one(pool)
                .await
                .map_err(query_failed("count_departments"))?;

            Ok((items, total))
        })
    }

    /// Write back every editable column. Returns false if the row is gone.
    pub async fn update_department(&self, department: &Department) -> StaffroomResult<bool> {
        let result = with_pool!(self, pool => {
            sqlx::query(
                "UPDATE departments
                 SET code = $2, name = $3, description = $4, head_staff_id = $5, updated_at = $6
                 WHERE id = $1",
            )
            .bind(&department.id)
            .bind(&department.code)
            .bind(&department.name)
            .bind(&department.description)
            .bind(&department.head_staff_id)
            .bind(department.updated_at)
            .execute(pool)
            .await
            .map_err(query_failed("update_department"))?
            .rows_affected()
        });
        Ok(result > 0)
    }

    pub async fn delete_department(&self, id: &str) -> StaffroomResult<bool> {
        let result = with_pool!(self, pool => {
            sqlx::query("DELETE FROM departments WHERE id = $1")
                .bind(id)
                .execute(pool)
                .await
                .map_err(query_failed("delete_department"))?
                .rows_affected()
        });
        Ok(result > 0)
    }

    /// Staff rows (active or not) still pointing at a department.
    pub async fn count_staff_in_department(&self, id: &str) -> StaffroomResult<i64> {
        with_pool!(self, pool => {
            sqlx::query_scalar("SELECT COUNT(*) FROM staff WHERE department_id = $1")
                .bind(id)
                .fetch_one(pool)
                .await
                .map_err(query_failed("count_staff_in_department"))
        })
    }
}
