use serde::Serialize;
use sqlx::error::ErrorKind;
use thiserror::Error;
use warp::{http::StatusCode, reject::Reject};

pub const NON_FIELD_ERRORS: &str = "non_field_errors";

#[derive(Debug, Error)]
pub enum Error {
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("Authentication credentials were not provided")]
    Unauthorized,

    #[error("Query error: {0}")]
    Query(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn validation(field: &str, message: &str) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation { .. } | Error::Conflict(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Query(_) | Error::Storage(_) | Error::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn body(&self) -> ErrorBody {
        match self {
            Error::Validation { field, message } => ErrorBody {
                field: Some(field.to_owned()),
                detail: message.to_owned(),
            },
            // Storage internals stay in the logs
            Error::Query(_) | Error::Storage(_) | Error::Config(_) => ErrorBody {
                field: None,
                detail: String::from("Internal server error"),
            },
            other => ErrorBody {
                field: None,
                detail: other.to_string(),
            },
        }
    }
}

impl Reject for Error {}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub detail: String,
}

/// Describes a storage failure that has no client-facing meaning.
pub struct QueryError {
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        Self::new(value.to_string())
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        log::error!("{}", value.info);
        Error::Query(value.info)
    }
}

impl From<sqlx::Error> for Error {
    fn from(value: sqlx::Error) -> Self {
        let kind = match &value {
            sqlx::Error::Database(e) => Some(e.kind()),
            _ => None,
        };

        match (kind, &value) {
            (Some(ErrorKind::UniqueViolation), _) => {
                Error::Conflict(String::from("Object already exists."))
            }
            (Some(ErrorKind::ForeignKeyViolation), _) => {
                Error::validation(NON_FIELD_ERRORS, "Referenced object does not exist.")
            }
            (Some(ErrorKind::CheckViolation), _) | (Some(ErrorKind::NotNullViolation), _) => {
                Error::validation(NON_FIELD_ERRORS, "Value violates a storage constraint.")
            }
            (_, sqlx::Error::RowNotFound) => Error::NotFound(String::from("Not found.")),
            _ => QueryError::from(value).into(),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for Error {
    fn from(value: sqlx::migrate::MigrateError) -> Self {
        QueryError::new(format!("{value}")).into()
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        log::error!("Image store failure: {value}");
        Error::Storage(format!("{value}"))
    }
}
