use axum::{extract::State, Json};

use super::{
    CodeQuery, CookieQuery, QueryParams, StrategyQuery, UserQuery, ACCOUNT_COOKIE_FIELD,
    COOKIE_FIELD, STOCK_LIST_FIELD, STRATEGY_FIELD, USER_FIELD,
};
use crate::error::ApiError;
use crate::records::{self, BacktestHistoryEntry, BacktestInfo, Record, StrategyRecord};
use crate::store::{with_deadline, Filter, Operation};
use crate::AppState;

async fn find_records<R: Record>(state: &AppState, filter: Filter) -> Result<Vec<R>, ApiError> {
    let collection = R::COLLECTION;
    let docs = with_deadline(
        Operation::Query(collection),
        state.query_timeout,
        state.store.find(collection, filter),
    )
    .await?;

    tracing::debug!("{} matched {} documents", collection, docs.len());
    Ok(records::decode_all::<R>(docs)?)
}

async fn find_record<R: Record>(state: &AppState, filter: Filter) -> Result<Option<R>, ApiError> {
    let collection = R::COLLECTION;
    let doc = with_deadline(
        Operation::Query(collection),
        state.query_timeout,
        state.store.find_one(collection, filter),
    )
    .await?;

    Ok(doc.map(records::decode::<R>).transpose()?)
}

// ============================================================================
// GET /info?name=
// Backtests registered by a user
// ============================================================================

pub async fn info_by_user(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<UserQuery>,
) -> Result<Json<Vec<BacktestInfo>>, ApiError> {
    tracing::info!(user = ?params.name, "Backtest info by user");

    let infos = find_records(&state, Filter::eq(USER_FIELD, params.name)).await?;
    Ok(Json(infos))
}

// ============================================================================
// GET /info_strategy?strategy=
// ============================================================================

pub async fn info_by_strategy(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<StrategyQuery>,
) -> Result<Json<Vec<BacktestInfo>>, ApiError> {
    tracing::info!(strategy = ?params.strategy, "Backtest info by strategy");

    let infos = find_records(&state, Filter::eq(STRATEGY_FIELD, params.strategy)).await?;
    Ok(Json(infos))
}

// ============================================================================
// GET /info_all
// ============================================================================

pub async fn info_all(
    State(state): State<AppState>,
) -> Result<Json<Vec<BacktestInfo>>, ApiError> {
    tracing::info!("All backtest info");

    let infos = find_records(&state, Filter::All).await?;
    Ok(Json(infos))
}

// ============================================================================
// GET /info_code?code=
// Regex match against the traded codes. No code matches every string code.
// ============================================================================

pub async fn info_by_code(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<CodeQuery>,
) -> Result<Json<Vec<BacktestInfo>>, ApiError> {
    tracing::info!(code = ?params.code, "Backtest info by code");

    let filter = Filter::regex(STOCK_LIST_FIELD, params.code.unwrap_or_default());
    let infos = find_records(&state, filter).await?;
    Ok(Json(infos))
}

// ============================================================================
// GET /info_cookie?cookie=
// First run for an account cookie, or null
// ============================================================================

pub async fn info_by_cookie(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<CookieQuery>,
) -> Result<Json<Option<BacktestInfo>>, ApiError> {
    tracing::info!(cookie = ?params.cookie, "Backtest info by account cookie");

    let info = find_record(&state, Filter::eq(ACCOUNT_COOKIE_FIELD, params.cookie)).await?;
    Ok(Json(info))
}

// ============================================================================
// GET /history?cookie=
// ============================================================================

pub async fn history_by_cookie(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<CookieQuery>,
) -> Result<Json<Vec<BacktestHistoryEntry>>, ApiError> {
    tracing::info!(cookie = ?params.cookie, "Backtest history");

    let history = find_records(&state, Filter::eq(COOKIE_FIELD, params.cookie)).await?;
    Ok(Json(history))
}

// ============================================================================
// GET /strategy?cookie=
// ============================================================================

pub async fn strategy_by_cookie(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<CookieQuery>,
) -> Result<Json<Vec<StrategyRecord>>, ApiError> {
    tracing::info!(cookie = ?params.cookie, "Strategy records");

    let strategies = find_records(&state, Filter::eq(COOKIE_FIELD, params.cookie)).await?;
    Ok(Json(strategies))
}
