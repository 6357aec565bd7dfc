use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

use crate::routes::Route;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Api(ApiError),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("not logged in")]
    NotLoggedIn,
}

impl ClientError {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Api(err) => Some(err.code),
            ClientError::NotLoggedIn => Some(ErrorCode::Unauthorized),
            _ => None,
        }
    }

    /// Where the front end should navigate after this error, if anywhere.
    /// `None` means show the message and stay put.
    pub fn recovery_route(&self) -> Option<Route> {
        match self.code()? {
            ErrorCode::Unauthorized => Some(Route::Login),
            ErrorCode::Forbidden | ErrorCode::NotFound => Some(Route::Dashboard),
            ErrorCode::Validation | ErrorCode::Conflict | ErrorCode::Internal => None,
        }
    }
}

impl From<ApiError> for ClientError {
    fn from(err: ApiError) -> Self {
        ClientError::Api(err)
    }
}
