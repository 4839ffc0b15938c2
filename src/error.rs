use std::{io, net::SocketAddr, path::PathBuf};

use axum::response::{IntoResponse, Response};
use http::{StatusCode, header};
use thiserror::Error;

/// Startup and listener failures, fatal to the process
#[derive(Debug, Error)]
pub enum Error {
    #[error("directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to accept connection: {0}")]
    Accept(#[source] io::Error),
    #[error("IO error: {0}")]
    IO(#[from] io::Error),
}

/// Per-request failures, surfaced only as a status code
#[derive(Debug)]
pub enum AppError {
    Unauthorized { challenge: String },
    Forbidden,
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Unauthorized { challenge } => (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, challenge)],
                "",
            )
                .into_response(),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "403 Forbidden").into_response(),
            AppError::InternalError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response()
            }
        }
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;
