//! HTTP command submission
//!
//! `POST /command/{command}` with a body of `{"args": ["..", ..]}` forwards
//! one console command through the ECON client.

use crate::econ::EconClient;
use crate::error::EconError;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use log::{info, warn};
use serde::Deserialize;
use std::io;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub args: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// Body is not JSON or `args` is not a list of strings
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("Invalid command")]
    InvalidCommand,

    /// No live console connection, or the write failed
    #[error("console unavailable: {0}")]
    Unavailable(EconError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCommand => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<EconError> for ApiError {
    fn from(err: EconError) -> Self {
        match err {
            EconError::InvalidCommand(_) => ApiError::InvalidCommand,
            other => ApiError::Unavailable(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

pub fn router(econ: Arc<EconClient>) -> Router {
    Router::new()
        .route("/command/{command}", post(route_command))
        .with_state(econ)
}

pub async fn serve(listener: TcpListener, econ: Arc<EconClient>) -> io::Result<()> {
    info!("Command API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(econ)).await
}

async fn route_command(
    State(econ): State<Arc<EconClient>>,
    Path(command): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    submit_command(&econ, &command, &body).await?;
    Ok(StatusCode::OK)
}

/// Validates the payload, then hands the command to the console client.
///
/// Malformed payloads are rejected before the console is touched.
pub async fn submit_command(econ: &EconClient, command: &str, body: &[u8]) -> Result<(), ApiError> {
    let request: CommandRequest = serde_json::from_slice(body).map_err(|e| {
        warn!("Malformed payload for command {:?}: {}", command, e);
        ApiError::BadRequest(e.to_string())
    })?;

    econ.command(command, request.args.as_slice()).await?;
    Ok(())
}
