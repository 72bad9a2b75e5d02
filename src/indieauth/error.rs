//! Error types for construction and per-request failures.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid identity URL {me}: {source}")]
    InvalidMe {
        me: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported identity URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("callback path must start with '/': {0}")]
    InvalidCallbackPath(String),
    #[error("state cache capacity must be greater than zero")]
    ZeroStateCapacity,
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to fetch {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with {status}")]
    Status { url: String, status: StatusCode },
    #[error("no \"authorization_endpoint\" found at {0}")]
    NoAuthorizationEndpoint(String),
    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Failures while building the gate. Discovery failures abort construction.
#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to get \"authorization_endpoint\": {0}")]
    Discovery(#[from] DiscoveryError),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to generate session id")]
    Entropy(#[source] rand::Error),
    #[error("session backend failure: {0}")]
    Backend(String),
}

/// Failures confined to a single request.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("identity mismatch: expected {expected}, got {got}")]
    IdentityMismatch { expected: String, got: String },
    #[error("invalid or expired state")]
    InvalidState,
    #[error("missing query parameter: {0}")]
    MissingParameter(&'static str),
    #[error("authorization endpoint answered with forbidden")]
    Forbidden,
    #[error("code verification failed: {0}")]
    Verification(String),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("failed to generate state token")]
    Entropy(#[source] rand::Error),
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::IdentityMismatch { .. } | Self::InvalidState | Self::MissingParameter(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Verification(_) => StatusCode::BAD_GATEWAY,
            Self::Session(_) | Self::Entropy(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("IndieAuth request failed: {self}");
        } else {
            warn!("IndieAuth request rejected: {self}");
        }
        let message = match &self {
            // Upstream and storage details stay in the logs.
            Self::Verification(_) => "Code verification failed".to_string(),
            Self::Session(_) | Self::Entropy(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        };
        (status, message).into_response()
    }
}
