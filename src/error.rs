use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::abi::AbiError;
use crate::assistant::AssistantError;
use crate::chain::ChainError;
use crate::rate_limiter::TOO_MANY_REQUESTS;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{msg}", msg = TOO_MANY_REQUESTS)]
    RateLimited,

    #[error("Only the contract owner can withdraw.")]
    NotOwner,

    #[error("Invalid message: {0}")]
    InvalidMessage(#[from] AbiError),

    #[error("Chain read failed: {0}")]
    Chain(#[from] ChainError),

    #[error("Assistant call failed: {0}")]
    Assistant(#[from] AssistantError),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotOwner => StatusCode::FORBIDDEN,
            ApiError::InvalidMessage(_) => StatusCode::BAD_REQUEST,
            ApiError::Chain(_) => StatusCode::BAD_GATEWAY,
            ApiError::Assistant(AssistantError::RateLimited(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Assistant(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{}", self);
        }
        let message = match &self {
            // Upstream details stay in the log.
            ApiError::Chain(_) => "Failed to read guestbook state.".to_string(),
            ApiError::Assistant(AssistantError::RateLimited(_)) => {
                "AI service is busy. Try again shortly.".to_string()
            }
            ApiError::Assistant(_) => "AI service request failed.".to_string(),
            ApiError::InvalidMessage(e) => e.to_string(),
            other => other.to_string(),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
