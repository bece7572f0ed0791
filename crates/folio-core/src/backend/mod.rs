//! Backend-as-a-service boundary
//!
//! The portfolio's tables, image bucket, and auth live in a hosted backend.
//! This module defines the narrow surface Folio consumes from it:
//! - `TableStore`: select/count/insert/update/delete with simple filters
//! - `ObjectStorage`: upload, remove, and public URL resolution
//! - `AuthProvider`: password sign-in, sign-out, refresh, user metadata
//!
//! `SupabaseClient` talks to the hosted service over HTTP; `MemoryBackend`
//! keeps everything in process and is what the tests run against.

pub mod http;
pub mod memory;
pub mod query;

pub use http::{SupabaseClient, SupabaseClientBuilder};
pub use memory::MemoryBackend;
pub use query::{Filter, FilterOp, Order, Query};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::auth::{Session, User};
use crate::error::{Error, Result};

/// A table row as returned by the backend
pub type Row = serde_json::Map<String, Value>;

/// Path segment preceding `<bucket>/<object path>` in public object URLs
pub const PUBLIC_OBJECT_SEGMENT: &str = "/storage/v1/object/public/";

/// Relational table access
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Rows matching `query`
    async fn select(&self, query: &Query) -> Result<Vec<Row>>;

    /// Exact number of rows matching the filters of `query`
    async fn count(&self, query: &Query) -> Result<u64>;

    /// Insert one row and return it as stored (with generated columns)
    async fn insert(&self, table: &str, row: Row) -> Result<Row>;

    /// Patch the row with `id`; fails with `RowNotFound` when absent
    async fn update(&self, table: &str, id: &str, patch: Row) -> Result<Row>;

    /// Delete the row with `id`; fails with `RowNotFound` when absent
    async fn delete(&self, table: &str, id: &str) -> Result<()>;
}

/// Object storage buckets
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>, content_type: &str)
    -> Result<()>;

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()>;

    /// Public URL of an object; always contains `PUBLIC_OBJECT_SEGMENT`
    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// Authentication
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session>;

    async fn sign_out(&self, access_token: &str) -> Result<()>;

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session>;

    async fn get_user(&self, access_token: &str) -> Result<User>;

    /// Merge `metadata` into the user's metadata
    async fn update_user(&self, access_token: &str, metadata: Value) -> Result<User>;

    /// Token attached to subsequent table and storage calls (`None` = anonymous)
    fn set_access_token(&self, token: Option<String>);
}

/// Everything Folio needs from the hosted backend
pub trait Backend: TableStore + ObjectStorage + AuthProvider {}

impl<T: TableStore + ObjectStorage + AuthProvider> Backend for T {}

/// Serialize a record into a row for insert/update
pub fn to_row<T: Serialize>(value: &T) -> Result<Row> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidInput(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

/// Convert a row into a typed record, rejecting unexpected shapes
pub fn from_row<T: DeserializeOwned>(table: &str, row: Row) -> Result<T> {
    serde_json::from_value(Value::Object(row)).map_err(|e| Error::UnexpectedRow {
        table: table.to_string(),
        message: e.to_string(),
    })
}

/// Convert many rows, failing on the first malformed one
pub fn from_rows<T: DeserializeOwned>(table: &str, rows: Vec<Row>) -> Result<Vec<T>> {
    rows.into_iter().map(|row| from_row(table, row)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        id: String,
        count: u32,
    }

    #[test]
    fn test_to_row_requires_object() {
        let row = to_row(&Sample {
            id: "a".into(),
            count: 1,
        })
        .unwrap();
        assert_eq!(row["count"], json!(1));
        assert!(to_row(&5).is_err());
    }

    #[test]
    fn test_from_row_rejects_unexpected_shape() {
        let bad = json!({"id": "a", "count": "many"}).as_object().cloned().unwrap();
        let err = from_row::<Sample>("samples", bad).unwrap_err();
        assert!(matches!(err, Error::UnexpectedRow { ref table, .. } if table == "samples"));
    }
}
