//! Staff roles and the permissions attached to them.
//!
//! Every staff member carries exactly one role. Permission checks across the
//! API go through the predicates here rather than comparing role names.
//!
//! | Role    | Scope                                                        |
//! |---------|--------------------------------------------------------------|
//! | `admin` | Everything                                                   |
//! | `hr`    | Staff directory, attendance, HR tasks, substitution oversight |
//! | `head`  | Head of a department: its timetable, notifications, cover    |
//! | `staff` | Their own attendance, tasks, invitations and requests         |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::StaffroomError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Hr,
    Head,
    Staff,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Hr, Role::Head, Role::Staff];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Hr => "hr",
            Role::Head => "head",
            Role::Staff => "staff",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Create and modify departments.
    pub fn can_manage_departments(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Create, edit and deactivate staff records.
    pub fn can_manage_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Hr)
    }

    /// Send a direct notification to any staff member.
    pub fn can_send_notifications(&self) -> bool {
        matches!(self, Role::Admin | Role::Hr | Role::Head)
    }

    /// Record or read attendance for other staff members.
    pub fn can_record_attendance(&self) -> bool {
        matches!(self, Role::Admin | Role::Hr | Role::Head)
    }

    pub fn can_delete_attendance(&self) -> bool {
        matches!(self, Role::Admin | Role::Hr)
    }

    /// Create, edit and delete HR tasks, and see every task.
    pub fn can_manage_tasks(&self) -> bool {
        matches!(self, Role::Admin | Role::Hr)
    }

    /// Raise cover requests for others and close them out.
    pub fn can_coordinate_cover(&self) -> bool {
        matches!(self, Role::Admin | Role::Hr | Role::Head)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = StaffroomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "hr" => Ok(Role::Hr),
            "head" => Ok(Role::Head),
            "staff" => Ok(Role::Staff),
            other => Err(StaffroomError::InvalidInput(format!(
                "unknown role '{other}' (expected one of: admin, hr, head, staff)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert_eq!(" HR ".parse::<Role>().unwrap(), Role::Hr);
        assert!("principal".parse::<Role>().is_err());
    }

    #[test]
    fn only_admin_manages_departments() {
        assert!(Role::Admin.can_manage_departments());
        assert!(!Role::Hr.can_manage_departments());
        assert!(!Role::Head.can_manage_departments());
        assert!(!Role::Staff.can_manage_departments());
    }

    #[test]
    fn staff_role_has_no_oversight_permissions() {
        let role = Role::Staff;
        assert!(!role.can_manage_staff());
        assert!(!role.can_send_notifications());
        assert!(!role.can_record_attendance());
        assert!(!role.can_manage_tasks());
        assert!(!role.can_coordinate_cover());
    }

    #[test]
    fn heads_coordinate_cover_but_do_not_manage_tasks() {
        assert!(Role::Head.can_coordinate_cover());
        assert!(Role::Head.can_record_attendance());
        assert!(!Role::Head.can_manage_tasks());
        assert!(!Role::Head.can_delete_attendance());
    }

    #[test]
    fn serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Role::Hr).unwrap(), "\"hr\"");
    }
}
