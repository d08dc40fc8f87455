// Read-only queries over backtest runs, their history, and strategies

pub mod handlers;

use axum::extract::{FromRequestParts, Query};
use serde::Deserialize;

use crate::error::ApiError;

// ============================================================================
// Query-string parameters
// ============================================================================

/// `Query` whose rejection renders as the JSON error body.
#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct QueryParams<T>(pub T);

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StrategyQuery {
    pub strategy: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CodeQuery {
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CookieQuery {
    pub cookie: Option<String>,
}

// ============================================================================
// Queried fields
// ============================================================================

pub const USER_FIELD: &str = "user";
pub const STRATEGY_FIELD: &str = "strategy";
pub const STOCK_LIST_FIELD: &str = "stock_list";
pub const ACCOUNT_COOKIE_FIELD: &str = "account_cookie";
pub const COOKIE_FIELD: &str = "cookie";
