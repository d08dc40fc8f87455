use async_trait::async_trait;
use bson::{Bson, Document};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{Collection, DocumentStore, Filter};
use crate::error::StoreError;

/// In-process store evaluating filters the way the document store does.
#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, collection: Collection, doc: Document) {
        self.collections
            .write()
            .await
            .entry(collection)
            .or_default()
            .push(doc);
    }

    pub async fn insert_many(&self, collection: Collection, docs: impl IntoIterator<Item = Document>) {
        self.collections
            .write()
            .await
            .entry(collection)
            .or_default()
            .extend(docs);
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn find(
        &self,
        collection: Collection,
        filter: Filter,
    ) -> Result<Vec<Document>, StoreError> {
        let predicate = Predicate::compile(&filter)?;
        let collections = self.collections.read().await;

        Ok(collections
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| predicate.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: Filter,
    ) -> Result<Option<Document>, StoreError> {
        let predicate = Predicate::compile(&filter)?;
        let collections = self.collections.read().await;

        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|doc| predicate.matches(doc)).cloned()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

enum Predicate<'a> {
    All,
    Eq { field: &'a str, value: Option<&'a str> },
    Regex { field: &'a str, regex: regex::Regex },
}

impl<'a> Predicate<'a> {
    fn compile(filter: &'a Filter) -> Result<Self, StoreError> {
        Ok(match filter {
            Filter::All => Predicate::All,
            Filter::Eq { field, value } => Predicate::Eq {
                field: *field,
                value: value.as_deref(),
            },
            Filter::Regex { field, pattern } => Predicate::Regex {
                field: *field,
                regex: regex::Regex::new(pattern).map_err(|e| StoreError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?,
            },
        })
    }

    fn matches(&self, doc: &Document) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Eq { field, value: None } => {
                matches!(doc.get(field), None | Some(Bson::Null) | Some(Bson::Undefined))
            }
            Predicate::Eq { field, value: Some(want) } => {
                any_element(doc.get(field), |v| matches!(v, Bson::String(s) if s == want))
            }
            Predicate::Regex { field, regex } => {
                any_element(doc.get(field), |v| matches!(v, Bson::String(s) if regex.is_match(s)))
            }
        }
    }
}

/// Scalar fields are tested directly; array fields match if any element does.
fn any_element(value: Option<&Bson>, test: impl Fn(&Bson) -> bool) -> bool {
    match value {
        Some(Bson::Array(items)) => items.iter().any(|item| test(item)),
        Some(other) => test(other),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .insert_many(
                Collection::BacktestInfo,
                [
                    doc! { "user": "alice", "stock_list": ["000001", "600010"], "account_cookie": "a1" },
                    doc! { "user": "bob", "stock_list": "600519", "account_cookie": "b1" },
                    doc! { "stock_list": ["300750"] },
                    doc! { "user": "alice", "stock_list": [], "account_cookie": "a2" },
                ],
            )
            .await;
        store
    }

    #[tokio::test]
    async fn test_equality_filter() {
        let store = seeded().await;
        let docs = store
            .find(Collection::BacktestInfo, Filter::eq("user", Some("alice".into())))
            .await
            .unwrap();

        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.get_str("user").ok() == Some("alice")));
    }

    #[tokio::test]
    async fn test_null_filter_matches_missing_field() {
        let store = seeded().await;
        let docs = store
            .find(Collection::BacktestInfo, Filter::eq("user", None))
            .await
            .unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get_array("stock_list").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_regex_matches_array_elements_and_scalars() {
        let store = seeded().await;

        let docs = store
            .find(Collection::BacktestInfo, Filter::regex("stock_list", "^600"))
            .await
            .unwrap();
        assert_eq!(docs.len(), 2);

        let docs = store
            .find(Collection::BacktestInfo, Filter::regex("stock_list", "0075"))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[tokio::test]
    async fn test_find_one_returns_first_in_insertion_order() {
        let store = seeded().await;

        let doc = store
            .find_one(Collection::BacktestInfo, Filter::eq("user", Some("alice".into())))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.get_str("account_cookie").ok(), Some("a1"));

        let missing = store
            .find_one(Collection::BacktestInfo, Filter::eq("account_cookie", Some("zz".into())))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_empty_collection() {
        let store = InMemoryStore::new();
        let docs = store.find(Collection::Strategy, Filter::All).await.unwrap();
        assert!(docs.is_empty());
    }
}
