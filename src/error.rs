use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::models::{AuthorityId, MenuId};

/// Boxed source for persistence failures the core does not inspect.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error
///
/// The complete failure taxonomy of the authorization core. Every operation
/// returns one of these to its caller; nothing is retried or swallowed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or missing required input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Uniqueness or referential-use violation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Committing the new parent would make the node its own ancestor.
    #[error("parent {parent_id} would make {id} its own ancestor")]
    Cycle { id: i64, parent_id: i64 },

    /// The requested grants exceed what the parent authority holds.
    #[error("authority {authority_id} cannot hold menus {excess:?} not granted to its parent")]
    Containment {
        authority_id: AuthorityId,
        excess: Vec<MenuId>,
    },

    /// Request carried no usable identity.
    #[error("unauthorized")]
    Unauthorized,

    /// Authenticated, but the authority may not administer the console.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Underlying persistence failure.
    #[error("store error: {0}")]
    Store(#[source] BoxError),
}

/// Result type alias using the crate's Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Map error to HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) | Error::Cycle { .. } | Error::Containment { .. } => {
                StatusCode::BAD_REQUEST
            }
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        // 23505 = unique_violation; surfaces a lost check-then-insert race as a conflict.
        let unique_violation = err
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| code == "23505");
        if unique_violation {
            return Error::Conflict(err.to_string());
        }
        Error::Store(Box::new(err))
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!("internal error: {self}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
