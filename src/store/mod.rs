use async_trait::async_trait;
use bson::Document;
use std::future::Future;
use std::time::Duration;

use crate::error::StoreError;

pub mod memory;
pub mod mongo;

pub use memory::InMemoryStore;
pub use mongo::MongoStore;

/// The collections this service reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    BacktestInfo,
    BacktestHistory,
    Strategy,
}

impl Collection {
    pub const fn name(self) -> &'static str {
        match self {
            Collection::BacktestInfo => "backtest_info",
            Collection::BacktestHistory => "backtest_history",
            Collection::Strategy => "strategy",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Predicate for a single find. Every route needs exactly one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Match every document.
    All,
    /// `field == value`; `None` matches documents where the field is null or absent.
    Eq { field: &'static str, value: Option<String> },
    /// `field` matches an unanchored regex. Array fields match if any element does.
    Regex { field: &'static str, pattern: String },
}

impl Filter {
    pub fn eq(field: &'static str, value: Option<String>) -> Self {
        Filter::Eq { field, value }
    }

    /// The pattern is passed to the backend untouched; each backend reports
    /// patterns its own engine rejects as `InvalidPattern`.
    pub fn regex(field: &'static str, pattern: impl Into<String>) -> Self {
        Filter::Regex {
            field,
            pattern: pattern.into(),
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents in `collection` matching `filter`, in natural order.
    async fn find(&self, collection: Collection, filter: Filter)
        -> Result<Vec<Document>, StoreError>;

    /// First document in natural order matching `filter`.
    async fn find_one(
        &self,
        collection: Collection,
        filter: Filter,
    ) -> Result<Option<Document>, StoreError>;

    /// Round-trip to the store
    async fn ping(&self) -> Result<(), StoreError>;
}

/// What a deadline-bound store call is doing, for timeout reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Query(Collection),
    Ping,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Query(collection) => write!(f, "Query on {}", collection),
            Operation::Ping => f.write_str("Store ping"),
        }
    }
}

/// Runs a store call under a deadline.
pub async fn with_deadline<T, F>(
    operation: Operation,
    after: Duration,
    call: F,
) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout {
            operation: operation.to_string(),
            after,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_names() {
        assert_eq!(Collection::BacktestInfo.name(), "backtest_info");
        assert_eq!(Collection::BacktestHistory.to_string(), "backtest_history");
        assert_eq!(Collection::Strategy.name(), "strategy");
    }

    #[test]
    fn test_regex_filter_keeps_pattern_verbatim() {
        // Lookaround is valid for the document store even though the regex crate lacks it
        assert_eq!(
            Filter::regex("stock_list", "^(?=6)\\d+"),
            Filter::Regex {
                field: "stock_list",
                pattern: "^(?=6)\\d+".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_deadline_expires() {
        let result: Result<(), _> = with_deadline(
            Operation::Query(Collection::Strategy),
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
        )
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err, StoreError::Timeout { .. }));
        assert_eq!(err.to_string(), "Query on strategy timed out after 10ms");
    }

    #[tokio::test]
    async fn test_deadline_passes_through_result() {
        let result = with_deadline(Operation::Ping, Duration::from_secs(1), async {
            Ok::<_, StoreError>(7)
        })
        .await;

        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_ping_timeout_names_the_ping() {
        let result: Result<(), _> = with_deadline(Operation::Ping, Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert_eq!(
            result.unwrap_err().to_string(),
            "Store ping timed out after 10ms"
        );
    }
}
