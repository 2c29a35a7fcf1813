use std::sync::Arc;

use axum::{
    extract::{FromRef, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::config::{StaffroomConfig, SubstitutionConfig};
use crate::errors::StaffroomResult;
use crate::server::api_error::ApiError;
use crate::server::auth::AuthState;
use crate::server::database::{total_pages, Database, Page};
use crate::server::logging::HealthResponse;

/// Shared application state for handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub auth: AuthState,
    pub substitutions: SubstitutionConfig,
}

impl AppState {
    pub fn new(db: Arc<Database>, auth: AuthState, substitutions: SubstitutionConfig) -> Self {
        Self {
            db,
            auth,
            substitutions,
        }
    }

    /// Build state from the loaded configuration.
    pub fn from_config(db: Arc<Database>, config: &StaffroomConfig) -> StaffroomResult<Self> {
        Ok(Self::new(
            db,
            AuthState::from_config(&config.auth)?,
            config.substitutions.clone(),
        ))
    }
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

/// Handler result type: success body or a standard error response.
pub type ApiResult<T> = Result<T, ApiError>;

pub(crate) fn default_page() -> u32 {
    1
}

pub(crate) fn default_per_page() -> u32 {
    50
}

/// One page of a listing.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    /// The `LIMIT`/`OFFSET` window for the requested page.
    pub fn window(page: u32, per_page: u32) -> Page {
        Page::new(page, per_page)
    }

    pub fn new(items: Vec<T>, total: i64, page: u32, per_page: u32) -> Self {
        let page = page.max(1);
        let per_page = per_page.clamp(1, Page::MAX_PER_PAGE);
        Self {
            items,
            total,
            page,
            per_page,
            total_pages: total_pages(total, i64::from(per_page)),
        }
    }
}

/// Plain page/per_page query for listings without filters.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// `GET /health`
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = state.db.ping().await;
    Json(HealthResponse::new(connected, state.db.db_type()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginated_clamps_and_counts_pages() {
        let page = Paginated::new(vec![1, 2, 3], 120, 0, 500);
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, Page::MAX_PER_PAGE);
        assert_eq!(page.total_pages, 1);

        let page = Paginated::new(Vec::<i32>::new(), 120, 3, 50);
        assert_eq!(page.total_pages, 3);
    }
}
