//! Attendance statuses and the consistency rules for a day's record.

use chrono::NaiveTime;
use serde::Serialize;

use crate::errors::{StaffroomError, StaffroomResult};

text_enum! {
    pub enum AttendanceStatus {
        Present => "present",
        Absent => "absent",
        Late => "late",
        Excused => "excused",
        OnLeave => "on_leave",
    }
}

impl AttendanceStatus {
    /// The staff member is not on site and cannot cover for anyone.
    pub fn is_away(&self) -> bool {
        matches!(self, AttendanceStatus::Absent | AttendanceStatus::OnLeave)
    }
}

/// Check that the times on a record agree with its status.
pub fn check_record(
    status: AttendanceStatus,
    check_in: Option<NaiveTime>,
    check_out: Option<NaiveTime>,
) -> StaffroomResult<()> {
    if status.is_away() && (check_in.is_some() || check_out.is_some()) {
        return Err(StaffroomError::InvalidInput(format!(
            "a record marked {status} cannot carry check-in or check-out times"
        )));
    }

    if let (Some(check_in), Some(check_out)) = (check_in, check_out) {
        if check_out < check_in {
            return Err(StaffroomError::InvalidInput(format!(
                "check_out ({check_out}) is earlier than check_in ({check_in})"
            )));
        }
    }

    if check_out.is_some() && check_in.is_none() {
        return Err(StaffroomError::InvalidInput(
            "check_out requires check_in".to_string(),
        ));
    }

    Ok(())
}

/// Per-status counts over a date range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceSummary {
    pub present: i64,
    pub absent: i64,
    pub late: i64,
    pub excused: i64,
    pub on_leave: i64,
    pub total: i64,
}

impl AttendanceSummary {
    pub fn add(&mut self, status: AttendanceStatus, count: i64) {
        match status {
            AttendanceStatus::Present => self.present += count,
            AttendanceStatus::Absent => self.absent += count,
            AttendanceStatus::Late => self.late += count,
            AttendanceStatus::Excused => self.excused += count,
            AttendanceStatus::OnLeave => self.on_leave += count,
        }
        self.total += count;
    }
}
