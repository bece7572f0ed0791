//! In-process backend
//!
//! Mirrors the semantics Folio relies on from the hosted service: generated
//! `id`/`created_at` columns, filter/order/limit evaluation, single-level
//! embedded relations (`projects(title)`), non-upserting uploads, public
//! object URLs, and password sessions. Upload failures can be injected.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{Duration, SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use super::{AuthProvider, ObjectStorage, PUBLIC_OBJECT_SEGMENT, Query, Row, TableStore};
use crate::auth::{Session, User};
use crate::error::{Error, Result};

const MEMORY_BASE_URL: &str = "http://memory.local";

type UploadFailure = Box<dyn Fn(&str, &[u8]) -> bool + Send + Sync>;

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

#[derive(Debug, Clone)]
struct Account {
    password: String,
    user: User,
}

/// Backend kept entirely in memory
#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    accounts: RwLock<HashMap<String, Account>>,
    access_tokens: RwLock<HashMap<String, String>>,
    refresh_tokens: RwLock<HashMap<String, String>>,
    current_token: RwLock<Option<String>>,
    upload_failure: RwLock<Option<UploadFailure>>,
    failing_tables: RwLock<HashSet<String>>,
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("tables", &self.tables.read().map(|t| t.len()).unwrap_or(0))
            .finish()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account that can sign in with `password`
    pub fn add_user(&self, email: &str, password: &str) -> User {
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: Some(email.to_string()),
            user_metadata: Map::new(),
        };
        self.accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                email.to_string(),
                Account {
                    password: password.to_string(),
                    user: user.clone(),
                },
            );
        user
    }

    /// Insert rows as-is (generated columns filled when missing)
    pub fn seed(&self, table: &str, rows: Vec<Value>) -> Vec<Row> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let stored = tables.entry(table.to_string()).or_default();
        let mut inserted = Vec::new();
        for value in rows {
            if let Value::Object(row) = value {
                let row = with_generated_columns(row);
                stored.push(row.clone());
                inserted.push(row);
            }
        }
        inserted
    }

    /// Current contents of `table`
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Object paths stored in `bucket`
    pub fn object_paths(&self, bucket: &str) -> Vec<String> {
        let prefix = format!("{}/", bucket);
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    /// Content type recorded for an uploaded object
    pub fn object_content_type(&self, bucket: &str, path: &str) -> Option<String> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&object_key(bucket, path))
            .map(|o| o.content_type.clone())
    }

    /// Make uploads fail whenever `predicate(path, bytes)` holds
    pub fn fail_uploads_when(
        &self,
        predicate: impl Fn(&str, &[u8]) -> bool + Send + Sync + 'static,
    ) {
        *self
            .upload_failure
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(predicate));
    }

    /// Make every insert, update, and delete on `table` fail
    pub fn fail_writes_to(&self, table: &str) {
        self.failing_tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(table.to_string());
    }

    fn check_writable(&self, table: &str) -> Result<()> {
        if self
            .failing_tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(table)
        {
            return Err(Error::Backend {
                status: 503,
                message: format!("writes to '{}' are unavailable", table),
            });
        }
        Ok(())
    }

    /// Token most recently attached via `set_access_token`
    pub fn access_token(&self) -> Option<String> {
        self.current_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn issue_session(&self, email: &str, user: User) -> Session {
        let access_token = Uuid::new_v4().to_string();
        let refresh_token = Uuid::new_v4().to_string();
        self.access_tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(access_token.clone(), email.to_string());
        self.refresh_tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(refresh_token.clone(), email.to_string());
        Session {
            access_token,
            refresh_token,
            expires_at: Utc::now() + Duration::hours(1),
            user,
        }
    }

    fn email_for_token(&self, access_token: &str) -> Result<String> {
        self.access_tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(access_token)
            .cloned()
            .ok_or_else(|| Error::AuthFailed("Invalid or expired session".to_string()))
    }

    fn embed_relations(&self, query: &Query, rows: Vec<Row>) -> Vec<Row> {
        let columns: Vec<String> = split_columns(&query.columns);
        let wildcard = columns.iter().any(|c| c == "*");
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);

        rows.into_iter()
            .map(|row| {
                let mut out = if wildcard {
                    row.clone()
                } else {
                    Row::new()
                };
                for column in &columns {
                    if let Some((relation, fields)) = parse_embed(column) {
                        let foreign_key = format!("{}_id", relation.trim_end_matches('s'));
                        let related = row.get(&foreign_key).and_then(|fk| {
                            let lookup = Query::table(relation.clone()).eq("id", fk.clone());
                            tables
                                .get(&relation)
                                .and_then(|rows| rows.iter().find(|r| lookup.matches(r)))
                        });
                        let value = match related {
                            Some(related) => Value::Object(pick(related, &fields)),
                            None => Value::Null,
                        };
                        out.insert(relation, value);
                    } else if column != "*" {
                        if let Some(value) = row.get(column) {
                            out.insert(column.clone(), value.clone());
                        }
                    }
                }
                out
            })
            .collect()
    }
}

fn object_key(bucket: &str, path: &str) -> String {
    format!("{}/{}", bucket, path)
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn with_generated_columns(mut row: Row) -> Row {
    if row.get("id").is_none_or(Value::is_null) {
        row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
    }
    if row.get("created_at").is_none_or(Value::is_null) {
        row.insert("created_at".to_string(), Value::String(now_timestamp()));
    }
    row
}

/// Split a select list on top-level commas
fn split_columns(columns: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for ch in columns.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// `projects(title)` → (`projects`, [`title`])
fn parse_embed(column: &str) -> Option<(String, Vec<String>)> {
    let open = column.find('(')?;
    let inner = column.get(open + 1..column.len().checked_sub(1)?)?;
    let fields = inner
        .split(',')
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
        .collect();
    Some((column[..open].trim().to_string(), fields))
}

fn pick(row: &Row, fields: &[String]) -> Row {
    if fields.iter().any(|f| f == "*") {
        return row.clone();
    }
    fields
        .iter()
        .filter_map(|f| row.get(f).map(|v| (f.clone(), v.clone())))
        .collect()
}

#[async_trait]
impl TableStore for MemoryBackend {
    async fn select(&self, query: &Query) -> Result<Vec<Row>> {
        let rows = self.rows(&query.table);
        let selected = query.apply(rows);
        debug!(table = %query.table, rows = selected.len(), "memory select");
        Ok(self.embed_relations(query, selected))
    }

    async fn count(&self, query: &Query) -> Result<u64> {
        let rows = self.rows(&query.table);
        Ok(rows.iter().filter(|r| query.matches(r)).count() as u64)
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row> {
        self.check_writable(table)?;
        let row = with_generated_columns(row);
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, id: &str, patch: Row) -> Result<Row> {
        self.check_writable(table)?;
        let lookup = Query::table(table).eq("id", id);
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let row = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|r| lookup.matches(r)))
            .ok_or_else(|| Error::RowNotFound {
                table: table.to_string(),
                id: id.to_string(),
            })?;
        for (key, value) in patch {
            if key != "id" {
                row.insert(key, value);
            }
        }
        Ok(row.clone())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        self.check_writable(table)?;
        let lookup = Query::table(table).eq("id", id);
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let rows = tables.entry(table.to_string()).or_default();
        let before = rows.len();
        rows.retain(|r| !lookup.matches(r));
        if rows.len() == before {
            return Err(Error::RowNotFound {
                table: table.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for MemoryBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let rejected = self
            .upload_failure
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|fail| fail(path, &bytes));
        if rejected {
            return Err(Error::UploadFailed(format!("storage rejected '{}'", path)));
        }

        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        let key = object_key(bucket, path);
        if objects.contains_key(&key) {
            return Err(Error::Backend {
                status: 409,
                message: "The resource already exists".to_string(),
            });
        }
        objects.insert(
            key,
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()> {
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        for path in paths {
            objects.remove(&object_key(bucket, path));
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}{}{}/{}", MEMORY_BASE_URL, PUBLIC_OBJECT_SEGMENT, bucket, path)
    }
}

#[async_trait]
impl AuthProvider for MemoryBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let account = self
            .accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(email)
            .cloned();
        match account {
            Some(account) if account.password == password => {
                Ok(self.issue_session(email, account.user))
            }
            _ => Err(Error::AuthFailed("Invalid login credentials".to_string())),
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        self.access_tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(access_token);
        Ok(())
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
        let email = self
            .refresh_tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(refresh_token)
            .ok_or_else(|| Error::AuthFailed("Invalid refresh token".to_string()))?;
        let user = self
            .accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&email)
            .map(|a| a.user.clone())
            .ok_or_else(|| Error::AuthFailed("User no longer exists".to_string()))?;
        Ok(self.issue_session(&email, user))
    }

    async fn get_user(&self, access_token: &str) -> Result<User> {
        let email = self.email_for_token(access_token)?;
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&email)
            .map(|a| a.user.clone())
            .ok_or_else(|| Error::AuthFailed("User no longer exists".to_string()))
    }

    async fn update_user(&self, access_token: &str, metadata: Value) -> Result<User> {
        let email = self.email_for_token(access_token)?;
        let Value::Object(metadata) = metadata else {
            return Err(Error::InvalidInput("user metadata must be an object".to_string()));
        };
        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        let account = accounts
            .get_mut(&email)
            .ok_or_else(|| Error::AuthFailed("User no longer exists".to_string()))?;
        account.user.user_metadata.extend(metadata);
        Ok(account.user.clone())
    }

    fn set_access_token(&self, token: Option<String>) {
        *self
            .current_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_insert_generates_id_and_created_at() {
        let backend = MemoryBackend::new();
        let inserted = backend
            .insert("projects", row(json!({"title": "Site"})))
            .await
            .unwrap();
        assert!(inserted["id"].as_str().is_some());
        assert!(inserted["created_at"].as_str().is_some());
        assert_eq!(backend.rows("projects").len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_rows_fail() {
        let backend = MemoryBackend::new();
        assert!(matches!(
            backend.update("projects", "nope", Row::new()).await,
            Err(Error::RowNotFound { .. })
        ));
        assert!(matches!(
            backend.delete("projects", "nope").await,
            Err(Error::RowNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_never_changes_id() {
        let backend = MemoryBackend::new();
        backend.seed("projects", vec![json!({"id": "p1", "title": "Old"})]);
        let updated = backend
            .update("projects", "p1", row(json!({"id": "p2", "title": "New"})))
            .await
            .unwrap();
        assert_eq!(updated["id"], json!("p1"));
        assert_eq!(updated["title"], json!("New"));
    }

    #[tokio::test]
    async fn test_select_embeds_related_rows() {
        let backend = MemoryBackend::new();
        backend.seed("projects", vec![json!({"id": "p1", "title": "Brand"})]);
        backend.seed(
            "experiences",
            vec![
                json!({"id": "e1", "project_id": "p1"}),
                json!({"id": "e2", "project_id": null}),
            ],
        );

        let rows = backend
            .select(
                &Query::table("experiences")
                    .select("*, projects(title)")
                    .order("id", true),
            )
            .await
            .unwrap();
        assert_eq!(rows[0]["projects"], json!({"title": "Brand"}));
        assert_eq!(rows[1]["projects"], Value::Null);
    }

    #[tokio::test]
    async fn test_select_projects_named_columns() {
        let backend = MemoryBackend::new();
        backend.seed("projects", vec![json!({"id": "p1", "title": "A", "slug": "a"})]);
        let rows = backend
            .select(&Query::table("projects").select("id, title"))
            .await
            .unwrap();
        assert_eq!(rows[0].len(), 2);
        assert!(rows[0].get("slug").is_none());
    }

    #[tokio::test]
    async fn test_upload_does_not_overwrite() {
        let backend = MemoryBackend::new();
        backend
            .upload("b", "x.png", vec![1], "image/png")
            .await
            .unwrap();
        assert!(backend.upload("b", "x.png", vec![2], "image/png").await.is_err());
        assert_eq!(backend.object_paths("b"), vec!["x.png".to_string()]);
        assert_eq!(
            backend.object_content_type("b", "x.png").as_deref(),
            Some("image/png")
        );
    }

    #[tokio::test]
    async fn test_injected_upload_failure() {
        let backend = MemoryBackend::new();
        backend.fail_uploads_when(|_, bytes| bytes == b"bad");
        assert!(matches!(
            backend.upload("b", "a.png", b"bad".to_vec(), "image/png").await,
            Err(Error::UploadFailed(_))
        ));
        assert!(backend.upload("b", "c.png", b"ok".to_vec(), "image/png").await.is_ok());
    }

    #[test]
    fn test_public_url_contains_bucket_segment() {
        let backend = MemoryBackend::new();
        assert_eq!(
            backend.public_url("portfolio-images", "projects/a.png"),
            "http://memory.local/storage/v1/object/public/portfolio-images/projects/a.png"
        );
    }

    #[test]
    fn test_split_and_parse_columns() {
        assert_eq!(
            split_columns("*, projects(title, slug)"),
            vec!["*".to_string(), "projects(title, slug)".to_string()]
        );
        assert_eq!(
            parse_embed("projects(title, slug)"),
            Some(("projects".to_string(), vec!["title".to_string(), "slug".to_string()]))
        );
        assert_eq!(parse_embed("title"), None);
    }
}
