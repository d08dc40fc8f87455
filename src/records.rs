//! Typed views over the three backtest collections.
//!
//! Documents come out of the store untyped. They are converted to JSON the way
//! the platform's web clients expect (ObjectId as hex, datetimes as ISO-8601
//! strings) and then decoded into a record type. Known fields are checked for
//! type; everything else is carried through in `extra`.

use bson::{Bson, Document};
use chrono::SecondsFormat;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::store::Collection;

/// Codes a backtest ran over. Most runs store a list; some older runs a single code.
/// Anything else written by other tools is carried as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StockList {
    Many(Vec<String>),
    One(String),
    Other(Value),
}

impl StockList {
    pub fn codes(&self) -> Vec<&str> {
        match self {
            StockList::Many(codes) => codes.iter().map(String::as_str).collect(),
            StockList::One(code) => vec![code.as_str()],
            StockList::Other(Value::Array(items)) => {
                items.iter().filter_map(Value::as_str).collect()
            }
            StockList::Other(_) => Vec::new(),
        }
    }
}

/// Marks a field present even when its value is `null`, so absent and null
/// stay distinct: `None` is absent, `Some(None)` is a stored `null`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// `_id` is not typed: the store allows any value there and it passes through `extra`.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestInfo {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub user: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub stock_list: Option<StockList>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub account_cookie: Option<Option<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BacktestInfo {
    pub fn user(&self) -> Option<&str> {
        self.user.as_ref().and_then(Option::as_deref)
    }

    pub fn account_cookie(&self) -> Option<&str> {
        self.account_cookie.as_ref().and_then(Option::as_deref)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestHistoryEntry {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub cookie: Option<Option<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyRecord {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub cookie: Option<Option<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A record type bound to the collection it is read from.
pub trait Record: DeserializeOwned + Serialize + Send {
    const COLLECTION: Collection;
}

impl Record for BacktestInfo {
    const COLLECTION: Collection = Collection::BacktestInfo;
}

impl Record for BacktestHistoryEntry {
    const COLLECTION: Collection = Collection::BacktestHistory;
}

impl Record for StrategyRecord {
    const COLLECTION: Collection = Collection::Strategy;
}

/// Decode one raw document into `R`.
pub fn decode<R: Record>(doc: Document) -> Result<R, StoreError> {
    let json = document_to_json(doc);
    serde_json::from_value(json).map_err(|e| StoreError::Decode {
        collection: R::COLLECTION.name().to_string(),
        message: e.to_string(),
    })
}

pub fn decode_all<R: Record>(docs: Vec<Document>) -> Result<Vec<R>, StoreError> {
    docs.into_iter().map(decode).collect()
}

pub fn document_to_json(doc: Document) -> Value {
    Value::Object(
        doc.into_iter()
            .map(|(key, value)| (key, bson_to_json(value)))
            .collect(),
    )
}

pub fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(b),
        Bson::String(s) => Value::String(s),
        Bson::Int32(i) => Value::from(i),
        Bson::Int64(i) => Value::from(i),
        // from_f64 rejects NaN/inf, which JSON cannot carry
        Bson::Double(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => Value::String(
            dt.to_chrono()
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        ),
        Bson::RegularExpression(re) => Value::String(format!("/{}/{}", re.pattern, re.options)),
        Bson::Timestamp(ts) => serde_json::json!({ "t": ts.time, "i": ts.increment }),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        Bson::Document(doc) => document_to_json(doc),
        other => other.into_relaxed_extjson(),
    }
}
