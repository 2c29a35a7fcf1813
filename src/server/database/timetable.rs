use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;
use sqlx::FromRow;

use super::{query_failed, Database, Page};
use crate::errors::StaffroomResult;
use crate::schedule::TimeWindow;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct TimetableEntry {
    pub id: String,
    pub staff_id: String,
    pub department_id: Option<String>,
    pub day_of_week: i64,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub subject: String,
    pub room: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TimetableEntry {
    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.start_time,
            end: self.end_time,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TimetableFilter {
    pub staff_id: Option<String>,
    pub department_id: Option<String>,
    pub day_of_week: Option<i64>,
}

impl Database {
    pub async fn insert_timetable_entry(&self, entry: &TimetableEntry) -> StaffroomResult<()> {
        with_pool!(self, pool => {
            sqlx::query(
                "INSERT INTO timetable_entries
                    (id, staff_id, department_id, day_of_week, start_time, end_time, subject, room, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(&entry.id)
            .bind(&entry.staff_id)
            .bind(&entry.department_id)
            .bind(entry.day_of_week)
            .bind(entry.start_time)
            .bind(entry.end_time)
            .bind(&entry.subject)
            .bind(&entry.room)
            .bind(entry.created_at)
            .bind(entry.updated_at)
            .execute(pool)
            .await
            .map_err(query_failed("insert_timetable_entry"))?;
        });
        Ok(())
    }

    pub async fn get_timetable_entry(&self, id: &str) -> StaffroomResult<Option<TimetableEntry>> {
        with_pool!(self, pool => {
            sqlx::query_as::<_, TimetableEntry>("SELECT * FROM timetable_entries WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(query_failed("get_timetable_entry"))
        })
    }

    pub async fn list_timetable_entries(
        &self,
        filter: &TimetableFilter,
        page: Page,
    ) -> StaffroomResult<(Vec<TimetableEntry>, i64)> {
        with_pool!(self, pool => {
            let items = sqlx::query_as::<_, TimetableEntry>(
                "SELECT * FROM timetable_entries
                 WHERE ($1 IS NULL OR staff_id = $1)
                   AND ($2 IS NULL OR department_id = $2)
                   AND ($3 IS NULL OR day_of_week = $3)
                 ORDER BY day_of_week, start_time, id
                 LIMIT $4 OFFSET $5",
            )
            .bind(&filter.staff_id)
            .bind(&filter.department_id)
            .bind(filter.day_of_week)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(pool)
            .await
            .map_err(query_failed("list_timetable_entries"))?;

            let total: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM timetable_entries
                 WHERE ($1 IS NULL OR staff_id = $1)
                   AND ($2 IS NULL OR department_id = $2)
                   AND ($3 IS NULL OR day_of_week = $3)",
            )
            .bind(&filter.staff_id)
            .bind(&filter.department_id)
            .bind(filter.day_of_week)
            .fetch_one(pool)
            .await
            .map_err(query_failed("count_timetable_entries"))?;

            Ok((items, total))
        })
    }

    /// A staff member's entries on one weekday, in time order.
    pub async fn timetable_for_staff_day(
        &self,
        staff_id: &str,
        day_of_week: i64,
    ) -> StaffroomResult<Vec<TimetableEntry>> {
        with_pool!(self, pool => {
            sqlx::query_as::<_, TimetableEntry>(
                "SELECT * FROM timetable_entries
                 WHERE staff_id = $1 AND day_of_week = $2
                 ORDER BY start_time, id",
            )
            .bind(staff_id)
            .bind(day_of_week)
            .fetch_all(pool)
            .await
            .map_err(query_failed("timetable_for_staff_day"))
        })
    }

    pub async fn timetable_for_room_day(
        &self,
        room: &str,
        day_of_week: i64,
    ) -> StaffroomResult<Vec<TimetableEntry>> {
        with_pool!(self, pool => {
            sqlx::query_as::<_, TimetableEntry>(
                "SELECT * FROM timetable_entries
                 WHERE room = $1 AND day_of_week = $2
                 ORDER BY start_time, id",
            )
            .bind(room)
            .bind(day_of_week)
            .fetch_all(pool)
            .await
            .map_err(query_failed("timetable_for_room_day"))
        })
    }

    /// Every entry on a weekday, used when screening cover candidates.
    pub async fn timetable_on_day(&self, day_of_week: i64) -> StaffroomResult<Vec<TimetableEntry>> {
        with_pool!(self, pool => {
            sqlx::query_as::<_, TimetableEntry>(
                "SELECT * FROM timetable_entries WHERE day_of_week = $1 ORDER BY staff_id, start_time",
            )
            .bind(day_of_week)
            .fetch_all(pool)
            .await
            .map_err(query_failed("timetable_on_day"))
        })
    }

    pub async fn update_timetable_entry(&self, entry: &TimetableEntry) -> StaffroomResult<bool> {
        let result = with_pool!(self, pool => {
            sqlx::query(
                "UPDATE timetable_entries
                 SET staff_id = $2, department_id = $3, day_of_week = $4, start_time = $5,
                     end_time = $6, subject = $7, room = $8, updated_at = $9
                 WHERE id = $1",
            )
            .bind(&entry.id)
            .bind(&entry.staff_id)
            .bind(&entry.department_id)
            .bind(entry.day_of_week)
            .bind(entry.start_time)
            .bind(entry.end_time)
            .bind(&entry.subject)
            .bind(&entry.room)
            .bind(entry.updated_at)
            .execute(pool)
            .await
            .map_err(query_failed("update_timetable_entry"))?
            .rows_affected()
        });
        Ok(result > 0)
    }

    pub async fn delete_timetable_entry(&self, id: &str) -> StaffroomResult<bool> {
        let result = with_pool!(self, pool => {
            sqlx::query("DELETE FROM timetable_entries WHERE id = $1")
                .bind(id)
                .execute(pool)
                .await
                .map_err(query_failed("delete_timetable_entry"))?
                .rows_affected()
        });
        Ok(result > 0)
    }
}
