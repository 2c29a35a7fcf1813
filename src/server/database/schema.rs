//! Table definitions, one dialect per backend.
//!
//! Every statement is idempotent so `Database::migrate` can run on each start.

#[cfg(feature = "sqlite")]
pub(super) const SQLITE: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS departments (
        id              TEXT PRIMARY KEY,
        code            TEXT NOT NULL UNIQUE,
        name            TEXT NOT NULL,
        description     TEXT,
        head_staff_id   TEXT,
        created_at      TEXT NOT NULL,
        updated_at      TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS staff (
        id              TEXT PRIMARY KEY,
        full_name       TEXT NOT NULL,
        email           TEXT NOT NULL UNIQUE,
        role            TEXT NOT NULL CHECK (role IN ('admin', 'hr', 'head', 'staff')),
        department_id   TEXT REFERENCES departments(id),
        is_active       BOOLEAN NOT NULL DEFAULT 1,
        created_at      TEXT NOT NULL,
        updated_at      TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id              TEXT PRIMARY KEY,
        recipient_id    TEXT NOT NULL REFERENCES staff(id),
        kind            TEXT NOT NULL CHECK (kind IN (
                            'general', 'substitution_invitation', 'substitution_accepted',
                            'substitution_declined', 'substitution_dropped',
                            'substitution_cancelled', 'task_assigned', 'task_updated')),
        title           TEXT NOT NULL,
        body            TEXT NOT NULL,
        reference_id    TEXT,
        is_read         BOOLEAN NOT NULL DEFAULT 0,
        created_at      TEXT NOT NULL,
        read_at         TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS timetable_entries (
        id              TEXT PRIMARY KEY,
        staff_id        TEXT NOT NULL REFERENCES staff(id),
        department_id   TEXT REFERENCES departments(id) ON DELETE SET NULL,
        day_of_week     INTEGER NOT NULL CHECK (day_of_week BETWEEN 1 AND 7),
        start_time      TEXT NOT NULL,
        end_time        TEXT NOT NULL,
        subject         TEXT NOT NULL,
        room            TEXT,
        created_at      TEXT NOT NULL,
        updated_at      TEXT NOT NULL,
        CHECK (start_time < end_time)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS attendance_records (
        id              TEXT PRIMARY KEY,
        staff_id        TEXT NOT NULL REFERENCES staff(id),
        date            TEXT NOT NULL,
        status          TEXT NOT NULL CHECK (status IN ('present', 'absent', 'late', 'excused', 'on_leave')),
        check_in        TEXT,
        check_out       TEXT,
        notes           TEXT,
        recorded_by     TEXT,
        created_at      TEXT NOT NULL,
        updated_at      TEXT NOT NULL,
        UNIQUE (staff_id, date)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS hr_tasks (
        id              TEXT PRIMARY KEY,
        title           TEXT NOT NULL,
        description     TEXT,
        assignee_id     TEXT REFERENCES staff(id),
        created_by      TEXT,
        status          TEXT NOT NULL CHECK (status IN ('open', 'in_progress', 'done', 'cancelled')),
        priority        TEXT NOT NULL CHECK (priority IN ('low', 'normal', 'high', 'urgent')),
        due_date        TEXT,
        created_at      TEXT NOT NULL,
        updated_at      TEXT NOT NULL,
        completed_at    TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS substitution_requests (
        id                      TEXT PRIMARY KEY,
        requester_id            TEXT NOT NULL REFERENCES staff(id),
        department_id           TEXT REFERENCES departments(id) ON DELETE SET NULL,
        timetable_entry_id      TEXT REFERENCES timetable_entries(id) ON DELETE SET NULL,
        date                    TEXT NOT NULL,
        start_time              TEXT NOT NULL,
        end_time                TEXT NOT NULL,
        reason                  TEXT,
        status                  TEXT NOT NULL CHECK (status IN ('open', 'filled', 'cancelled', 'closed', 'expired')),
        substitute_id           TEXT REFERENCES staff(id),
        accepted_invitation_id  TEXT,
        created_by              TEXT,
        created_at              TEXT NOT NULL,
        updated_at              TEXT NOT NULL,
        closed_at               TEXT,
        CHECK (start_time < end_time)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS substitution_invitations (
        id              TEXT PRIMARY KEY,
        request_id      TEXT NOT NULL REFERENCES substitution_requests(id) ON DELETE CASCADE,
        candidate_id    TEXT NOT NULL REFERENCES staff(id),
        status          TEXT NOT NULL CHECK (status IN (
                            'pending', 'accepted', 'declined', 'disabled',
                            'dropped', 'completed', 'no_show')),
        created_at      TEXT NOT NULL,
        responded_at    TEXT,
        updated_at      TEXT NOT NULL,
        UNIQUE (request_id, candidate_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS substitution_history (
        id              TEXT PRIMARY KEY,
        request_id      TEXT NOT NULL REFERENCES substitution_requests(id),
        invitation_id   TEXT NOT NULL REFERENCES substitution_invitations(id),
        substitute_id   TEXT NOT NULL REFERENCES staff(id),
        requester_id    TEXT NOT NULL REFERENCES staff(id),
        date            TEXT NOT NULL,
        outcome         TEXT NOT NULL CHECK (outcome IN ('completed', 'no_show')),
        recorded_at     TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_staff_department ON staff (department_id)",
    "CREATE INDEX IF NOT EXISTS idx_notifications_recipient ON notifications (recipient_id, is_read)",
    "CREATE INDEX IF NOT EXISTS idx_timetable_staff_day ON timetable_entries (staff_id, day_of_week)",
    "CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance_records (date)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_assignee ON hr_tasks (assignee_id)",
    "CREATE INDEX IF NOT EXISTS idx_requests_status_date ON substitution_requests (status, date)",
    "CREATE INDEX IF NOT EXISTS idx_invitations_request ON substitution_invitations (request_id)",
    "CREATE INDEX IF NOT EXISTS idx_invitations_candidate ON substitution_invitations (candidate_id)",
    "CREATE INDEX IF NOT EXISTS idx_history_substitute ON substitution_history (substitute_id)",
];

#[cfg(feature = "postgres")]
pub(super) const POSTGRES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS departments (
        id              TEXT PRIMARY KEY,
        code            TEXT NOT NULL UNIQUE,
        name            TEXT NOT NULL,
        description     TEXT,
        head_staff_id   TEXT,
        created_at      TIMESTAMP NOT NULL,
        updated_at      TIMESTAMP NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS staff (
        id              TEXT PRIMARY KEY,
        full_name       TEXT NOT NULL,
        email           TEXT NOT NULL UNIQUE,
        role            TEXT NOT NULL CHECK (role IN ('admin', 'hr', 'head', 'staff')),
        department_id   TEXT REFERENCES departments(id),
        is_active       BOOLEAN NOT NULL DEFAULT TRUE,
        created_at      TIMESTAMP NOT NULL,
        updated_at      TIMESTAMP NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id              TEXT PRIMARY KEY,
        recipient_id    TEXT NOT NULL REFERENCES staff(id),
        kind            TEXT NOT NULL CHECK (kind IN (
                            'general', 'substitution_invitation', 'substitution_accepted',
                            'substitution_declined', 'substitution_dropped',
                            'substitution_cancelled', 'task_assigned', 'task_updated')),
        title           TEXT NOT NULL,
        body            TEXT NOT NULL,
        reference_id    TEXT,
        is_read         BOOLEAN NOT NULL DEFAULT FALSE,
        created_at      TIMESTAMP NOT NULL,
        read_at         TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS timetable_entries (
        id              TEXT PRIMARY KEY,
        staff_id        TEXT NOT NULL REFERENCES staff(id),
        department_id   TEXT REFERENCES departments(id) ON DELETE SET NULL,
        day_of_week     BIGINT NOT NULL CHECK (day_of_week BETWEEN 1 AND 7),
        start_time      TIME NOT NULL,
        end_time        TIME NOT NULL,
        subject         TEXT NOT NULL,
        room            TEXT,
        created_at      TIMESTAMP NOT NULL,
        updated_at      TIMESTAMP NOT NULL,
        CHECK (start_time < end_time)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS attendance_records (
        id              TEXT PRIMARY KEY,
        staff_id        TEXT NOT NULL REFERENCES staff(id),
        date            DATE NOT NULL,
        status          TEXT NOT NULL CHECK (status IN ('present', 'absent', 'late', 'excused', 'on_leave')),
        check_in        TIME,
        check_out       TIME,
        notes           TEXT,
        recorded_by     TEXT,
        created_at      TIMESTAMP NOT NULL,
        updated_at      TIMESTAMP NOT NULL,
        UNIQUE (staff_id, date)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS hr_tasks (
        id              TEXT PRIMARY KEY,
        title           TEXT NOT NULL,
        description     TEXT,
        assignee_id     TEXT REFERENCES staff(id),
        created_by      TEXT,
        status          TEXT NOT NULL CHECK (status IN ('open', 'in_progress', 'done', 'cancelled')),
        priority        TEXT NOT NULL CHECK (priority IN ('low', 'normal', 'high', 'urgent')),
        due_date        DATE,
        created_at      TIMESTAMP NOT NULL,
        updated_at      TIMESTAMP NOT NULL,
        completed_at    TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS substitution_requests (
        id                      TEXT PRIMARY KEY,
        requester_id            TEXT NOT NULL REFERENCES staff(id),
        department_id           TEXT REFERENCES departments(id) ON DELETE SET NULL,
        timetable_entry_id      TEXT REFERENCES timetable_entries(id) ON DELETE SET NULL,
        date                    DATE NOT NULL,
        start_time              TIME NOT NULL,
        end_time                TIME NOT NULL,
        reason                  TEXT,
        status                  TEXT NOT NULL CHECK (status IN ('open', 'filled', 'cancelled', 'closed', 'expired')),
        substitute_id           TEXT REFERENCES staff(id),
        accepted_invitation_id  TEXT,
        created_by              TEXT,
        created_at              TIMESTAMP NOT NULL,
        updated_at              TIMESTAMP NOT NULL,
        closed_at               TIMESTAMP,
        CHECK (start_time < end_time)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS substitution_invitations (
        id              TEXT PRIMARY KEY,
        request_id      TEXT NOT NULL REFERENCES substitution_requests(id) ON DELETE CASCADE,
        candidate_id    TEXT NOT NULL REFERENCES staff(id),
        status          TEXT NOT NULL CHECK (status IN (
                            'pending', 'accepted', 'declined', 'disabled',
                            'dropped', 'completed', 'no_show')),
        created_at      TIMESTAMP NOT NULL,
        responded_at    TIMESTAMP,
        updated_at      TIMESTAMP NOT NULL,
        UNIQUE (request_id, candidate_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS substitution_history (
        id              TEXT PRIMARY KEY,
        request_id      TEXT NOT NULL REFERENCES substitution_requests(id),
        invitation_id   TEXT NOT NULL REFERENCES substitution_invitations(id),
        substitute_id   TEXT NOT NULL REFERENCES staff(id),
        requester_id    TEXT NOT NULL REFERENCES staff(id),
        date            DATE NOT NULL,
        outcome         TEXT NOT NULL CHECK (outcome IN ('completed', 'no_show')),
        recorded_at     TIMESTAMP NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_staff_department ON staff (department_id)",
    "CREATE INDEX IF NOT EXISTS idx_notifications_recipient ON notifications (recipient_id, is_read)",
    "CREATE INDEX IF NOT EXISTS idx_timetable_staff_day ON timetable_entries (staff_id, day_of_week)",
    "CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance_records (date)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_assignee ON hr_tasks (assignee_id)",
    "CREATE INDEX IF NOT EXISTS idx_requests_status_date ON substitution_requests (status, date)",
    "CREATE INDEX IF NOT EXISTS idx_invitations_request ON substitution_invitations (request_id)",
    "CREATE INDEX IF NOT EXISTS idx_invitations_candidate ON substitution_invitations (candidate_id)",
    "CREATE INDEX IF NOT EXISTS idx_history_substitute ON substitution_history (substitute_id)",
];
