//! Ingestion control endpoints: start, current-run, abort, logs.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use jobscout_core::{RunId, UserId};
use jobscout_pipeline::initializer::InitializeRun;

use crate::AppState;
use crate::auth::bearer_token;
use crate::error::ApiError;
use crate::routes::progress;

const LOG_PAGE_SIZE: i64 = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(start))
        .route("/current-run", get(current_run))
        .route("/abort/{run_id}", post(abort))
        .route("/progress/{run_id}", get(progress::progress))
        .route("/logs/{run_id}", get(logs))
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<UserId, ApiError> {
    let token = bearer_token(headers)?;
    state.verifier.verify(token).await
}

#[derive(Debug, Default, Deserialize)]
struct StartRequest {
    #[serde(default)]
    force: bool,
}

#[derive(Debug, Serialize)]
struct StartResponse {
    run_id: i64,
}

async fn start(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<StartRequest>>,
) -> Result<Json<StartResponse>, ApiError> {
    let user_id = authenticate(&state, &headers).await?;
    let force = body.map(|Json(req)| req.force).unwrap_or_default();

    // Double-starts are a business conflict; the partial unique index
    // backstops the race between the check and the insert.
    if let Some(active) = state.runs.current_for_user(user_id).await? {
        return Err(ApiError::Conflict(format!(
            "run {} is still active",
            active.id
        )));
    }

    let run = state
        .runs
        .create(user_id, serde_json::json!({"force": force}))
        .await?;
    let run_id = RunId::new(run.id);

    // Fire-and-forget: ingestion takes minutes, the response must not.
    let initializer = state.initializer.clone();
    tokio::spawn(async move {
        initializer
            .run(InitializeRun {
                run_id,
                user_id,
                force,
            })
            .await;
    });

    tracing::info!(run_id = %run_id, user_id = %user_id, force, "run started");
    Ok(Json(StartResponse { run_id: run.id }))
}

#[derive(Debug, Serialize)]
struct CurrentRunResponse {
    run_id: Option<i64>,
}

async fn current_run(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CurrentRunResponse>, ApiError> {
    let user_id = authenticate(&state, &headers).await?;
    let active = state.runs.current_for_user(user_id).await?;
    Ok(Json(CurrentRunResponse {
        run_id: active.map(|r| r.id),
    }))
}

#[derive(Debug, Serialize)]
struct AbortResponse {
    ok: bool,
}

async fn abort(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(run_id): Path<i64>,
) -> Result<Json<AbortResponse>, ApiError> {
    let user_id = authenticate(&state, &headers).await?;
    let run_id = RunId::new(run_id);

    let record = state.runs.get_owned(run_id, user_id).await?;
    if record.run_status()?.is_terminal() {
        return Err(ApiError::Conflict(format!("run {run_id} already terminal")));
    }

    // Workers observe the terminal status at their first step and
    // become no-ops for the remaining messages.
    if !state.runs.abort(run_id, user_id).await? {
        return Err(ApiError::Conflict(format!("run {run_id} already terminal")));
    }
    state
        .logs
        .append(run_id, user_id, "run aborted by user")
        .await?;

    tracing::info!(run_id = %run_id, user_id = %user_id, "run aborted");
    Ok(Json(AbortResponse { ok: true }))
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    token: String,
    /// Milliseconds since epoch.
    start_time: Option<i64>,
    next_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct LogEntry {
    timestamp: i64,
    message: String,
}

#[derive(Debug, Serialize)]
struct LogsResponse {
    logs: Vec<LogEntry>,
    next_token: Option<String>,
}

async fn logs(
    State(state): State<AppState>,
    Path(run_id): Path<i64>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<LogsResponse>, ApiError> {
    let user_id = state.verifier.verify(&query.token).await?;
    let run_id = RunId::new(run_id);
    state.runs.get_owned(run_id, user_id).await?;

    let since: Option<DateTime<Utc>> = match query.start_time {
        Some(ms) => Some(
            DateTime::<Utc>::from_timestamp_millis(ms)
                .ok_or_else(|| ApiError::BadRequest(format!("bad start_time: {ms}")))?,
        ),
        None => None,
    };
    let after_id = match &query.next_token {
        Some(token) => Some(
            token
                .parse::<i64>()
                .map_err(|_| ApiError::BadRequest(format!("bad next_token: {token}")))?,
        ),
        None => None,
    };

    let records = state
        .logs
        .fetch(run_id, user_id, since, after_id, LOG_PAGE_SIZE)
        .await?;

    let next_token = records.last().map(|r| r.id.to_string()).or(query.next_token);
    let logs = records
        .into_iter()
        .map(|r| LogEntry {
            timestamp: r.logged_at.timestamp_millis(),
            message: r.message,
        })
        .collect();

    Ok(Json(LogsResponse { logs, next_token }))
}
