use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use metronome_core::{CatalogError, RoomError};
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

/// Any error that can be returned from a route handler
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: String,
    },
    #[error("User is not allowed to access this room")]
    AccessDenied,
    #[error("User is not a member of this room")]
    NotInRoom,
    #[error("A room needs at least one track to be created")]
    EmptyTracklist,
    #[error("The playing track cannot be removed from the queue")]
    QueueRemovalRefused,
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::NotInRoom => StatusCode::FORBIDDEN,
            Self::EmptyTracklist => StatusCode::BAD_REQUEST,
            Self::QueueRemovalRefused => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.as_status_code();
        let message = self.to_string();

        (status, message).into_response()
    }
}

impl From<RoomError> for ServerError {
    fn from(value: RoomError) -> Self {
        match value {
            RoomError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            RoomError::AccessDenied => Self::AccessDenied,
            RoomError::UserNotInRoom => Self::NotInRoom,
            RoomError::EmptyTracklist => Self::EmptyTracklist,
        }
    }
}

impl From<CatalogError> for ServerError {
    fn from(value: CatalogError) -> Self {
        match value {
            CatalogError::NotFound(track_id) => Self::NotFound {
                resource: "track",
                identifier: track_id.to_string(),
            },
        }
    }
}
