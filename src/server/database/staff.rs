use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;

use super::{query_failed, Database, Page};
use crate::errors::StaffroomResult;
use crate::roles::Role;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct StaffMember {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub role: String,
    pub department_id: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl StaffMember {
    pub fn role(&self) -> StaffroomResult<Role> {
        self.role.parse()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaffFilter {
    pub department_id: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
}

impl Database {
    pub async fn insert_staff(&self, member: &StaffMember) -> StaffroomResult<()> {
        with_pool!(self, pool => {
            sqlx::query(
                "INSERT INTO staff (id, full_name, email, role, department_id, is_active, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(&member.id)
            .bind(&member.full_name)
            .bind(&member.email)
            .bind(&member.role)
            .bind(&member.department_id)
            .bind(member.is_active)
            .bind(member.created_at)
            .bind(member.updated_at)
            .execute(pool)
            .await
            .map_err(query_failed("insert_staff"))?;
        });
        Ok(())
    }

    pub async fn get_staff(&self, id: &str) -> StaffroomResult<Option<StaffMember>> {
        with_pool!(self, pool => {
            sqlx::query_as::<_, StaffMember>("SELECT * FROM staff WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(query_failed("get_staff"))
        })
    }

    pub async fn get_staff_by_email(&self, email: &str) -> StaffroomResult<Option<StaffMember>> {
        with_pool!(self, pool => {
            sqlx::query_as::<_, StaffMember>("SELECT * FROM staff WHERE email = $1")
                .bind(email)
                .fetch_optional(pool)
                .await
                .map_err(query_failed("get_staff_by_email"))
        })
    }

    /// Fetch several staff rows at once. Unknown ids are silently absent.
    pub async fn get_staff_many(&self, ids: &[String]) -> StaffroomResult<Vec<StaffMember>> {
        let mut members = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(member) = self.get_staff(id).await? {
                members.push(member);
            }
        }
        Ok(members)
    }

    pub async fn list_staff(
        &self,
        filter: &StaffFilter,
        page: Page,
    ) -> StaffroomResult<(Vec<StaffMember>, i64)> {
        let role = filter.role.map(|r| r.as_str());

        with_pool!(self, pool => {
            let items = sqlx::query_as::<_, StaffMember>(
                "SELECT * FROM staff
                 WHERE ($1 IS NULL OR department_id = $1)
                   AND ($2 IS NULL OR role = $2)
                   AND ($3 IS NULL OR is_active = $3)
                 ORDER BY full_name, id
                 LIMIT $4 OFFSET $5",
            )
            .bind(&filter.department_id)
            .bind(role)
            .bind(filter.active)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(pool)
            .await
            .map_err(query_failed("list_staff"))?;

            let total: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM staff
                 WHERE ($1 IS NULL OR department_id = $1)
                   AND ($2 IS NULL OR role = $2)
                   AND ($3 IS NULL OR is_active = $3)",
            )
            .bind(&filter.department_id)
            .bind(role)
            .bind(filter.active)
            .fetch_one(pool)
            .await
            .map_err(query_failed("count_staff"))?;

            Ok((items, total))
        })
    }

    /// Active staff of a department, by name.
    pub async fn list_active_in_department(
        &self,
        department_id: &str,
    ) -> StaffroomResult<Vec<StaffMember>> {
        with_pool!(self, pool => {
            sqlx::query_as::<_, StaffMember>(
                "SELECT * FROM staff WHERE department_id = $1 AND is_active = $2 ORDER BY full_name, id",
            )
            .bind(department_id)
            .bind(true)
            .fetch_all(pool)
            .await
            .map_err(query_failed("list_active_in_department"))
        })
    }

    /// Every active staff member, by name.
    pub async fn list_active_staff(&self) -> StaffroomResult<Vec<StaffMember>> {
        with_pool!(self, pool => {
            sqlx::query_as::<_, StaffMember>(
                "SELECT * FROM staff WHERE is_active = $1 ORDER BY full_name, id",
            )
            .bind(true)
            .fetch_all(pool)
            .await
            .map_err(query_failed("list_active_staff"))
        })
    }

    pub async fn update_staff(&self, member: &StaffMember) -> StaffroomResult<bool> {
        let result = with_pool!(self, pool => {
            sqlx::query(
                "UPDATE staff
                 SET full_name = $2, email = $3, role = $4, department_id = $5, is_active = $6, updated_at = $7
                 WHERE id = $1",
            )
            .bind(&member.id)
            .bind(&member.full_name)
            .bind(&member.email)
            .bind(&member.role)
            .bind(&member.department_id)
            .bind(member.is_active)
            .bind(member.updated_at)
            .execute(pool)
            .await
            .map_err(query_failed("update_staff"))?
            .rows_affected()
        });
        Ok(result > 0)
    }

    /// Flip the active flag without touching anything else.
    pub async fn set_staff_active(
        &self,
        id: &str,
        active: bool,
        at: NaiveDateTime,
    ) -> StaffroomResult<bool> {
        let result = with_pool!(self, pool => {
            sqlx::query("UPDATE staff SET is_active = $2, updated_at = $3 WHERE id = $1")
                .bind(id)
                .bind(active)
                .bind(at)
                .execute(pool)
                .await
                .map_err(query_failed("set_staff_active"))?
                .rows_affected()
        });
        Ok(result > 0)
    }
}
