use thiserror::Error;

/// Errors produced anywhere in the staffroom services.
#[derive(Debug, Error)]
pub enum StaffroomError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Another candidate won the race to accept a cover request.
    #[error("already filled: {0}")]
    AlreadyFilled(String),

    #[error("server error: {0}")]
    ServerError(String),
}

pub type StaffroomResult<T> = Result<T, StaffroomError>;

impl From<sqlx::Error> for StaffroomError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StaffroomError::NotFound("row".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StaffroomError::Conflict(db_err.message().to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                StaffroomError::InvalidInput(db_err.message().to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_check_violation() => {
                StaffroomError::InvalidInput(db_err.message().to_string())
            }
            _ => StaffroomError::DatabaseError(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_the_resource() {
        let err = StaffroomError::NotFound("department".to_string());
        assert_eq!(err.to_string(), "department not found");
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err: StaffroomError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, StaffroomError::NotFound(_)));
    }
}
