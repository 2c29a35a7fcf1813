use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use sqlx::FromRow;

use super::{query_failed, Database, Page};
use crate::attendance::{AttendanceStatus, AttendanceSummary};
use crate::errors::{StaffroomError, StaffroomResult};

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct AttendanceRecord {
    pub id: String,
    pub staff_id: String,
    pub date: NaiveDate,
    pub status: String,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub notes: Option<String>,
    pub recorded_by: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl AttendanceRecord {
    pub fn status(&self) -> StaffroomResult<AttendanceStatus> {
        self.status.parse()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AttendanceFilter {
    pub staff_id: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<AttendanceStatus>,
}

impl Database {
    /// Insert the day's record or overwrite the existing one for the same
    /// staff member and date. The stored row is returned; its id is the one
    /// passed in only when a new row was created.
    pub async fn upsert_attendance(
        &self,
        record: &AttendanceRecord,
    ) -> StaffroomResult<AttendanceRecord> {
        with_pool!(self, pool => {
            sqlx::query(
                "INSERT INTO attendance_records
                    (id, staff_id, date, status, check_in, check_out, notes, recorded_by, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                 ON CONFLICT (staff_id, date) DO UPDATE SET
                    status = excluded.status,
                    check_in = excluded.check_in,
                    check_out = excluded.check_out,
                    notes = excluded.notes,
                    recorded_by = excluded.recorded_by,
                    updated_at = excluded.updated_at",
            )
            .bind(&record.id)
            .bind(&record.staff_id)
            .bind(record.date)
            .bind(&record.status)
            .bind(record.check_in)
            .bind(record.check_out)
            .bind(&record.notes)
            .bind(&record.recorded_by)
            .bind(record.created_at)
            .bind(record.updated_at)
            .execute(pool)
            .await
            .map_err(query_failed("upsert_attendance"))?;
        });

        self.attendance_for_day(&record.staff_id, record.date)
            .await?
            .ok_or_else(|| StaffroomError::ServerError("attendance row vanished after upsert".into()))
    }

    pub async fn get_attendance(&self, id: &str) -> StaffroomResult<Option<AttendanceRecord>> {
        with_pool!(self, pool => {
            sqlx::query_as::<_, AttendanceRecord>("SELECT * FROM attendance_records WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(query_failed("get_attendance"))
        })
    }

    pub async fn attendance_for_day(
        &self,
        staff_id: &str,
        date: NaiveDate,
    ) -> StaffroomResult<Option<AttendanceRecord>> {
        with_pool!(self, pool => {
            sqlx::query_as::<_, AttendanceRecord>(
                "SELECT * FROM attendance_records WHERE staff_id = $1 AND date = $2",
            )
            .bind(staff_id)
            .bind(date)
            .fetch_optional(pool)
            .await
            .map_err(query_failed("attendance_for_day"))
        })
    }

    /// Newest day first.
    pub async fn list_attendance(
        &self,
        filter: &AttendanceFilter,
        page: Page,
    ) -> StaffroomResult<(Vec<AttendanceRecord>, i64)> {
        let status = filter.status.map(|s| s.as_str());

        with_pool!(self, pool => {
            let items = sqlx::query_as::<_, AttendanceRecord>(
                "SELECT * FROM attendance_records
                 WHERE ($1 IS NULL OR staff_id = $1)
                   AND ($2 IS NULL OR date >= $2)
                   AND ($3 IS NULL OR date <= $3)
                   AND ($4 IS NULL OR status = $4)
                 ORDER BY date DESC, staff_id
                 LIMIT $5 OFFSET $6",
            )
            .bind(&filter.staff_id)
            .bind(filter.from)
            .bind(filter.to)
            .bind(status)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(pool)
            .await
            .map_err(query_failed("list_attendance"))?;

            let total: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM attendance_records
                 WHERE ($1 IS NULL OR staff_id = $1)
                   AND ($2 IS NULL OR date >= $2)
                   AND ($3 IS NULL OR date <= $3)
                   AND ($4 IS NULL OR status = $4)",
            )
            .bind(&filter.staff_id)
            .bind(filter.from)
            .bind(filter.to)
            .bind(status)
            .fetch_one(pool)
            .await
            .map_err(query_failed("count_attendance"))?;

            Ok((items, total))
        })
    }

    pub async fn delete_attendance(&self, id: &str) -> StaffroomResult<bool> {
        let result = with_pool!(self, pool => {
            sqlx::query("DELETE FROM attendance_records WHERE id = $1")
                .bind(id)
                .execute(pool)
                .await
                .map_err(query_failed("delete_attendance"))?
                .rows_affected()
        });
        Ok(result > 0)
    }

    /// Per-status counts for the records matching `filter` (its status is ignored).
    pub async fn attendance_summary(
        &self,
        filter: &AttendanceFilter,
    ) -> StaffroomResult<AttendanceSummary> {
        let rows: Vec<(String, i64)> = with_pool!(self, pool => {
            sqlx::query_as(
                "SELECT status, COUNT(*) FROM attendance_records
                 WHERE ($1 IS NULL OR staff_id = $1)
                   AND ($2 IS NULL OR date >= $2)
                   AND ($3 IS NULL OR date <= $3)
                 GROUP BY status",
            )
            .bind(&filter.staff_id)
            .bind(filter.from)
            .bind(filter.to)
            .fetch_all(pool)
            .await
            .map_err(query_failed("attendance_summary"))?
        });

        let mut summary = AttendanceSummary::default();
        for (status, count) in rows {
            summary.add(status.parse()?, count);
        }
        Ok(summary)
    }

    /// Staff ids marked absent or on leave on a date.
    pub async fn staff_away_on(&self, date: NaiveDate) -> StaffroomResult<Vec<String>> {
        with_pool!(self, pool => {
            sqlx::query_scalar(
                "SELECT staff_id FROM attendance_records
                 WHERE date = $1 AND status IN ('absent', 'on_leave')",
            )
            .bind(date)
            .fetch_all(pool)
            .await
            .map_err(query_failed("staff_away_on"))
        })
    }
}
