//! HTTP routes of the guestbook service.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::abi::{self, ContractCall, POST_FEE_WEI};
use crate::assistant::Assistant;
use crate::chain::GuestbookReader;
use crate::config::Chain;
use crate::error::ApiError;
use crate::feed::{self, Address, EmptyState, MAX_MESSAGE_LENGTH};
use crate::rate_limiter::{Clock, RateLimiter, TOO_MANY_REQUESTS, UNKNOWN_CLIENT};
use crate::time_ago::time_ago;

#[derive(Clone)]
pub struct AppState {
    pub limiter: Arc<RateLimiter>,
    pub reader: Arc<dyn GuestbookReader>,
    pub assistant: Arc<dyn Assistant>,
    pub clock: Arc<dyn Clock>,
    pub chain: Chain,
    pub contract: Address,
    pub page_size: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckContentResponse {
    pub is_safe: bool,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessagesQuery {
    #[serde(default)]
    pub q: String,
    pub page: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEntry {
    pub sender: Address,
    pub content: String,
    pub timestamp: u64,
    pub time_ago: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesResponse {
    pub messages: Vec<MessageEntry>,
    pub total: usize,
    pub has_more: bool,
    pub page: usize,
    pub empty_state: Option<EmptyState>,
    /// Placeholder text for `empty_state`.
    pub empty_message: Option<&'static str>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WithdrawQuery {
    /// The connected wallet asking for the call.
    pub from: Option<Address>,
}

#[derive(Debug, Deserialize)]
pub struct PostCallRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub chain: &'static str,
    pub chain_id: u64,
    pub contract: Address,
    pub explorer_url: &'static str,
    pub owner: Address,
    pub balance_wei: String,
    pub post_fee_wei: String,
    pub max_message_length: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/status", get(status_handler))
        .route("/api/messages", get(messages_handler))
        .route("/api/check-content", post(check_content_handler))
        .route("/api/generate", post(generate_handler))
        .route("/api/calls/post", post(post_call_handler))
        .route("/api/calls/withdraw", get(withdraw_call_handler))
        .with_state(state)
}

/// First entry of `X-Forwarded-For`, or the shared `"unknown"` bucket.
pub fn client_identifier(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn status_handler(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let owner = state.reader.owner().await?;
    let balance = state.reader.balance().await?;

    Ok(Json(StatusResponse {
        chain: state.chain.name(),
        chain_id: state.chain.id(),
        contract: state.contract,
        explorer_url: state.chain.explorer_url(),
        owner,
        balance_wei: balance.to_string(),
        post_fee_wei: POST_FEE_WEI.to_string(),
        max_message_length: MAX_MESSAGE_LENGTH,
    }))
}

async fn messages_handler(
    State(state): State<AppState>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let messages = feed::newest_first(state.reader.messages().await?);
    let page = query.page.unwrap_or(1).max(1);
    let view = feed::derive_view(&messages, &query.q, page, state.page_size);
    let now_secs = state.clock.now_millis() / 1000;
    let empty_state = view.empty_state(messages.len());

    Ok(Json(MessagesResponse {
        empty_state,
        empty_message: empty_state.map(EmptyState::message),
        has_more: view.has_more,
        total: messages.len(),
        page,
        messages: view
            .visible
            .iter()
            .map(|m| MessageEntry {
                sender: m.sender,
                content: m.content.clone(),
                timestamp: m.timestamp,
                time_ago: time_ago(m.timestamp, now_secs),
            })
            .collect(),
    }))
}

fn verdict_response(status: StatusCode, reason: &str) -> Response {
    (
        status,
        Json(CheckContentResponse {
            is_safe: false,
            reason: reason.to_string(),
        }),
    )
        .into_response()
}

async fn check_content_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let ip = client_identifier(&headers);
    if !state.limiter.check(&ip).admitted {
        warn!("Rate limit exceeded for IP: {}", ip);
        return Ok(verdict_response(StatusCode::TOO_MANY_REQUESTS, TOO_MANY_REQUESTS));
    }

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Unparseable moderation request from IP: {}", ip);
            serde_json::Value::Null
        }
    };
    let message = match payload.get("message").and_then(|m| m.as_str()) {
        Some(m) if !m.trim().is_empty() => m,
        _ => {
            warn!("Empty moderation request from IP: {}", ip);
            return Ok(verdict_response(StatusCode::BAD_REQUEST, "Message cannot be empty."));
        }
    };

    info!("Moderation request from IP: {}", ip);
    let verdict = state.assistant.moderate(message).await?;
    if !verdict.is_safe {
        info!(reason = %verdict.reason, "Message blocked by moderation");
    }

    Ok(Json(CheckContentResponse {
        is_safe: verdict.is_safe,
        reason: verdict.reason,
    })
    .into_response())
}

async fn generate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<GenerateResponse>, ApiError> {
    let ip = client_identifier(&headers);
    if !state.limiter.check(&ip).admitted {
        warn!("Rate limit exceeded for IP: {}", ip);
        return Err(ApiError::RateLimited);
    }

    info!("Generation request from IP: {}", ip);
    let text = state.assistant.generate().await?;
    Ok(Json(GenerateResponse { text }))
}

async fn post_call_handler(
    State(state): State<AppState>,
    Json(payload): Json<PostCallRequest>,
) -> Result<Json<ContractCall>, ApiError> {
    let call = abi::post_message_call(state.contract, &payload.message).inspect_err(|e| {
        warn!("Rejected post call: {}", e);
    })?;
    Ok(Json(call))
}

/// Only built for the owner, the one account the contract lets withdraw.
async fn withdraw_call_handler(
    State(state): State<AppState>,
    Query(query): Query<WithdrawQuery>,
) -> Result<Json<ContractCall>, ApiError> {
    let owner = state.reader.owner().await?;
    if query.from != Some(owner) {
        warn!(from = ?query.from, "Withdraw call requested by a non-owner");
        return Err(ApiError::NotOwner);
    }
    Ok(Json(abi::withdraw_call(state.contract)))
}
