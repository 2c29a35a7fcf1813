//! Shared helpers for the integration tests: in-memory and file-backed
//! databases, seeded rows and a router with JWT auth switched on.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{NaiveDate, NaiveTime};
use serde_json::{json, Value};
use staffroom::config::{AuthConfig, SubstitutionConfig};
use staffroom::roles::Role;
use staffroom::server::database::{new_id, now, Department, StaffMember, TimetableEntry};
use staffroom::server::{build_router, AppState, AuthState, Database, JwtValidator};
use tower::ServiceExt;

pub async fn setup_db() -> Arc<Database> {
    let db = Database::connect("sqlite", "sqlite::memory:", 1)
        .await
        .expect("failed to open in-memory database");
    db.migrate().await.expect("failed to create schema");
    Arc::new(db)
}

/// A database file in a fresh temp dir, shared by `max_connections`
/// connections. Keep the dir alive for as long as the pool is used.
pub async fn setup_file_db(max_connections: u32) -> (tempfile::TempDir, Arc<Database>) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let url = format!("sqlite://{}", dir.path().join("staffroom.db").display());
    let db = Database::connect("sqlite", &url, max_connections)
        .await
        .expect("failed to open database file");
    db.migrate().await.expect("failed to create schema");
    (dir, Arc::new(db))
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn time(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M").unwrap()
}

pub async fn seed_department(db: &Database, code: &str) -> Department {
    let at = now();
    let department = Department {
        id: new_id(),
        code: code.to_string(),
        name: format!("{code} department"),
        description: None,
        head_staff_id: None,
        created_at: at,
        updated_at: at,
    };
    db.insert_department(&department).await.unwrap();
    department
}

pub async fn seed_staff(
    db: &Database,
    name: &str,
    role: Role,
    department_id: Option<&str>,
) -> StaffMember {
    let at = now();
    let member = StaffMember {
        id: new_id(),
        full_name: name.to_string(),
        email: format!("{}@school.test", name.to_lowercase().replace(' ', ".")),
        role: role.to_string(),
        department_id: department_id.map(str::to_string),
        is_active: true,
        created_at: at,
        updated_at: at,
    };
    db.insert_staff(&member).await.unwrap();
    member
}

pub async fn seed_lesson(
    db: &Database,
    staff_id: &str,
    day_of_week: i64,
    start: &str,
    end: &str,
) -> TimetableEntry {
    let at = now();
    let entry = TimetableEntry {
        id: new_id(),
        staff_id: staff_id.to_string(),
        department_id: None,
        day_of_week,
        start_time: time(start),
        end_time: time(end),
        subject: "Mathematics".to_string(),
        room: None,
        created_at: at,
        updated_at: at,
    };
    db.insert_timetable_entry(&entry).await.unwrap();
    entry
}

pub fn auth_config() -> AuthConfig {
    AuthConfig {
        enabled: true,
        jwt_secret: "integration-test-secret".to_string(),
        jwt_issuer: "staffroom".to_string(),
        jwt_audience: "staffroom-api".to_string(),
        token_expiration_secs: 3600,
    }
}

/// Router plus a way to mint tokens for seeded staff.
pub struct TestApp {
    pub db: Arc<Database>,
    pub state: AppState,
    validator: JwtValidator,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_substitutions(SubstitutionConfig::default()).await
    }

    pub async fn with_substitutions(substitutions: SubstitutionConfig) -> Self {
        let db = setup_db().await;
        let config = auth_config();
        let state = AppState::new(
            Arc::clone(&db),
            AuthState::from_config(&config).unwrap(),
            substitutions,
        );
        Self {
            db,
            state,
            validator: JwtValidator::from_config(&config).unwrap(),
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub fn token(&self, member: &StaffMember) -> String {
        self.validator
            .create_token(&member.id, member.role().unwrap())
            .unwrap()
    }

    /// Send a JSON request as `member` (or anonymously) and decode the reply.
    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        member: Option<&StaffMember>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json");
        if let Some(member) = member {
            builder = builder.header("Authorization", format!("Bearer {}", self.token(member)));
        }
        let body = body
            .map(|v| serde_json::to_vec(&v).unwrap())
            .unwrap_or_default();

        let response = self
            .router()
            .oneshot(builder.body(Body::from(body)).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(json!({}));

        (status, value)
    }
}
