use warp::reject::Rejection;

use crate::error::{Error, HtmlError};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";

/// Failure of a database round trip, classified by what the caller can do about it.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// A concurrent write got there first.
    #[error("unique constraint {0} violated")]
    Duplicate(String),
    /// A referenced row disappeared between validation and write.
    #[error("foreign key {0} violated")]
    MissingReference(String),
    #[error("check constraint {0} violated")]
    Check(String),
    #[error("pool unavailable: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Backend(String),
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) => {
                let constraint = e.constraint().unwrap_or("-").to_string();
                match e.code().as_deref() {
                    Some(UNIQUE_VIOLATION) => Self::Duplicate(constraint),
                    Some(FOREIGN_KEY_VIOLATION) => Self::MissingReference(constraint),
                    Some(CHECK_VIOLATION) => Self::Check(constraint),
                    _ => Self::Backend(e.to_string()),
                }
            }
            sqlx::Error::PoolTimedOut => Self::Unavailable("timed out".to_string()),
            sqlx::Error::PoolClosed => Self::Unavailable("closed".to_string()),
            sqlx::Error::Io(e) => Self::Unavailable(e.to_string()),
            sqlx::Error::ColumnNotFound(column) => {
                Self::Backend(format!("Column not found: {column}"))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                Self::Backend(format!("Column decode {index} ({source})"))
            }
            e => Self::Backend(e.to_string()),
        }
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        match value {
            QueryError::Duplicate(_) => {
                log::debug!("Query lost a race: {value}");
                HtmlError::InvalidRequest.new("Object already exists.")
            }
            QueryError::MissingReference(_) => {
                log::debug!("Query lost a race: {value}");
                HtmlError::InvalidRequest.new("Referenced object does not exist.")
            }
            QueryError::Check(_) => {
                log::warn!("Query rejected by the database: {value}");
                HtmlError::InvalidRequest.default()
            }
            QueryError::Unavailable(_) | QueryError::Backend(_) => {
                log::error!("Query failed: {value}");
                HtmlError::InternalServerError.default()
            }
        }
    }
}

/// Catalog cache failure. Callers usually fall back to the database.
#[derive(Debug, thiserror::Error)]
#[error("{kind:?}: {detail}")]
pub struct CacheError {
    kind: redis::ErrorKind,
    detail: String,
}

impl From<redis::RedisError> for CacheError {
    fn from(value: redis::RedisError) -> Self {
        Self {
            kind: value.kind(),
            detail: value.detail().unwrap_or("-").to_string(),
        }
    }
}

impl From<CacheError> for Error {
    fn from(value: CacheError) -> Self {
        log::warn!("Cache failed: {value}");
        HtmlError::InternalServerError.default()
    }
}

/// A request value that could not be bound to the type it was expected as.
#[derive(Debug, thiserror::Error)]
#[error("{field} ({info})")]
pub struct TypeError {
    field: String,
    info: String,
}

impl TypeError {
    pub fn new(field: &str, info: &str) -> Self {
        Self {
            field: field.to_string(),
            info: info.to_string(),
        }
    }
}

impl From<TypeError> for Error {
    fn from(value: TypeError) -> Self {
        HtmlError::InvalidRequest.field(&value.field, &value.info)
    }
}

impl From<TypeError> for Rejection {
    fn from(value: TypeError) -> Self {
        Error::from(value).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_details_stay_out_of_the_response() {
        let error = Error::from(QueryError::Backend("relation \"users\" does not exist".into()));

        assert_eq!(error.code, 500);
        assert!(!error.body().to_string().contains("relation"));
    }

    #[test]
    fn lost_races_are_client_errors() {
        assert_eq!(Error::from(QueryError::Duplicate("favorites_pkey".into())).code, 400);
        assert_eq!(Error::from(QueryError::MissingReference("x".into())).code, 400);
    }

    #[test]
    fn type_errors_are_scoped_to_their_field() {
        let error = Error::from(TypeError::new("page", "Expected a number"));

        assert_eq!(error.field.as_deref(), Some("page"));
        assert_eq!(error.code, 400);
    }

    #[test]
    fn pool_exhaustion_is_a_server_error() {
        assert_eq!(Error::from(QueryError::from(sqlx::Error::PoolTimedOut)).code, 500);
    }
}
