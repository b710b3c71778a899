//! Shared error mapping for sqlx persistence layer

use application::error::ApplicationError;

/// Map a sqlx error to an application-layer error
pub fn map_sqlx_error(e: sqlx::Error) -> ApplicationError {
    match e {
        sqlx::Error::RowNotFound => {
            ApplicationError::NotFound("Database record not found".to_string())
        },
        sqlx::Error::Database(db_err) => {
            ApplicationError::Storage(format!("Database error: {db_err}"))
        },
        other => ApplicationError::Storage(format!("Database error: {other}")),
    }
}

/// Map a malformed stored value to an application-layer error
pub fn corrupt_row(column: &str, detail: impl std::fmt::Display) -> ApplicationError {
    ApplicationError::Storage(format!("Invalid value in column {column}: {detail}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            ApplicationError::NotFound(_)
        ));
    }

    #[test]
    fn other_errors_map_to_storage() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            ApplicationError::Storage(_)
        ));
    }
}
