//! HTTP API for the betting mini-app
//!
//! Thin axum layer over the ledger core. Handlers validate nothing beyond
//! shape; business rules live in the engines and surface here as typed
//! errors mapped to status codes.

use crate::account::Accounts;
use crate::chests::ChestShop;
use crate::error::BotError;
use crate::polls::PollEngine;
use crate::rating;
use crate::storage::Database;
use crate::types::{Chest, PollDetail, PollSummaryRow, RatingEntry, ResolveOutcome, User};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub struct AppState {
    pub accounts: Accounts,
    pub polls: PollEngine,
    pub chests: ChestShop,
    pub db: Database,
}

impl IntoResponse for BotError {
    fn into_response(self) -> Response {
        let status = match &self {
            BotError::PollNotFound | BotError::UserNotFound | BotError::ChestNotFound => {
                StatusCode::NOT_FOUND
            }
            BotError::InvalidOptions
            | BotError::InvalidAmount
            | BotError::OptionNotInPoll
            | BotError::BettingClosed
            | BotError::AlreadyResolved
            | BotError::InsufficientBalance => StatusCode::BAD_REQUEST,
            BotError::DuplicateBet => StatusCode::CONFLICT,
            BotError::Unauthorized => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("api request failed: {}", self);
        }
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct InitRequest {
    user_id: i64,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatePollRequest {
    user_id: i64,
    username: Option<String>,
    question: String,
    options: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CreatePollResponse {
    poll_id: i64,
}

#[derive(Debug, Deserialize)]
struct PlaceBetRequest {
    user_id: i64,
    username: Option<String>,
    poll_id: i64,
    option_id: i64,
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct ResolveRequest {
    user_id: i64,
    option_id: i64,
}

#[derive(Debug, Deserialize)]
struct OpenChestRequest {
    user_id: i64,
    username: Option<String>,
    chest_id: i64,
}

#[derive(Debug, Serialize)]
struct OpenChestResponse {
    reward: i64,
    balance: i64,
}

#[derive(Debug, Deserialize)]
struct RatingParams {
    limit: Option<usize>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/init", post(init_user))
        .route("/api/user/{id}", get(get_user))
        .route("/api/polls", get(list_polls).post(create_poll))
        .route("/api/polls/{id}", get(poll_detail))
        .route("/api/polls/{id}/resolve", post(resolve_poll))
        .route("/api/bets", post(place_bet))
        .route("/api/rating", get(get_rating))
        .route("/api/chests", get(list_chests))
        .route("/api/chests/open", post(open_chest))
        .with_state(state)
}

/// Serve the API until the process exits.
pub async fn serve(state: Arc<AppState>, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("API listening on http://{}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn init_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InitRequest>,
) -> Result<Json<User>, BotError> {
    state
        .accounts
        .ensure_user(req.user_id, req.username.as_deref())
        .await?;
    let user = state
        .accounts
        .get_user(req.user_id)
        .await?
        .ok_or(BotError::UserNotFound)?;
    Ok(Json(user))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<User>, BotError> {
    let user = state
        .accounts
        .get_user(id)
        .await?
        .ok_or(BotError::UserNotFound)?;
    Ok(Json(user))
}

async fn list_polls(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PollSummaryRow>>, BotError> {
    Ok(Json(state.polls.list_all().await?))
}

async fn poll_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<PollDetail>, BotError> {
    let detail = state
        .polls
        .poll_detail(id)
        .await?
        .ok_or(BotError::PollNotFound)?;
    Ok(Json(detail))
}

async fn create_poll(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePollRequest>,
) -> Result<Json<CreatePollResponse>, BotError> {
    state
        .accounts
        .ensure_user(req.user_id, req.username.as_deref())
        .await?;
    let poll_id = state
        .polls
        .create_poll(req.user_id, &req.question, &req.options)
        .await?;
    Ok(Json(CreatePollResponse { poll_id }))
}

async fn place_bet(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlaceBetRequest>,
) -> Result<Json<User>, BotError> {
    state
        .accounts
        .ensure_user(req.user_id, req.username.as_deref())
        .await?;
    state
        .polls
        .place_bet(req.user_id, req.poll_id, req.option_id, req.amount)
        .await?;
    let user = state
        .accounts
        .get_user(req.user_id)
        .await?
        .ok_or(BotError::UserNotFound)?;
    Ok(Json(user))
}

async fn resolve_poll(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<ResolveOutcome>, BotError> {
    // Over HTTP only the creator may settle; the admin allowlist is a chat
    // concept.
    let detail = state
        .polls
        .poll_detail(id)
        .await?
        .ok_or(BotError::PollNotFound)?;
    if detail.creator_id != req.user_id {
        return Err(BotError::Unauthorized);
    }
    let outcome = state.polls.resolve(req.user_id, id, req.option_id).await?;
    Ok(Json(outcome))
}

async fn get_rating(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RatingParams>,
) -> Result<Json<Vec<RatingEntry>>, BotError> {
    Ok(Json(rating::get_rating(&state.db, params.limit).await?))
}

async fn list_chests(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Chest>>, BotError> {
    Ok(Json(state.chests.list().await?))
}

async fn open_chest(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OpenChestRequest>,
) -> Result<Json<OpenChestResponse>, BotError> {
    state
        .accounts
        .ensure_user(req.user_id, req.username.as_deref())
        .await?;
    let reward = state.chests.open(req.user_id, req.chest_id).await?;
    let user = state
        .accounts
        .get_user(req.user_id)
        .await?
        .ok_or(BotError::UserNotFound)?;
    Ok(Json(OpenChestResponse {
        reward,
        balance: user.balance,
    }))
}
