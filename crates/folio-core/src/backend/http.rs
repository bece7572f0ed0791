//! HTTP client for the hosted backend
//!
//! Speaks the PostgREST (`/rest/v1`), storage (`/storage/v1`) and GoTrue
//! (`/auth/v1`) dialects. Every request carries the anon key as `apikey`;
//! the bearer token is the signed-in user's access token when one is set.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client as HttpClient, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::{AuthProvider, ObjectStorage, PUBLIC_OBJECT_SEGMENT, Query, Row, TableStore};
use crate::auth::{Session, User};
use crate::config::BackendConfig;
use crate::error::{Error, Result};

/// Default request timeout
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Cache lifetime sent with uploaded objects
const UPLOAD_CACHE_CONTROL: &str = "max-age=3600";

/// Backend client over HTTP
pub struct SupabaseClient {
    http_client: HttpClient,
    base_url: String,
    anon_key: String,
    access_token: RwLock<Option<String>>,
}

impl std::fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Builder for SupabaseClient
pub struct SupabaseClientBuilder {
    base_url: Option<String>,
    anon_key: Option<String>,
    timeout_secs: Option<u64>,
}

impl Default for SupabaseClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SupabaseClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            anon_key: None,
            timeout_secs: None,
        }
    }

    /// Project URL, e.g. `https://xyz.supabase.co`
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn anon_key(mut self, key: impl Into<String>) -> Self {
        self.anon_key = Some(key.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn build(self) -> Result<SupabaseClient> {
        let anon_key = self
            .anon_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                Error::ConfigError(
                    "Backend anon key is missing. Set FOLIO_ANON_KEY or SUPABASE_ANON_KEY."
                        .to_string(),
                )
            })?;
        let base_url = self
            .base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::ConfigError("Backend URL is missing".to_string()))?;

        let timeout = Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::NetworkError)?;

        Ok(SupabaseClient {
            http_client,
            base_url,
            anon_key,
            access_token: RwLock::new(None),
        })
    }
}

/// Token grant response from `/auth/v1/token`
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: User,
}

impl From<TokenResponse> for Session {
    fn from(token: TokenResponse) -> Self {
        Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: Utc::now() + chrono::Duration::seconds(token.expires_in),
            user: token.user,
        }
    }
}

impl SupabaseClient {
    pub fn builder() -> SupabaseClientBuilder {
        SupabaseClientBuilder::new()
    }

    /// Client for the configured backend; the anon key comes from the environment
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let anon_key = config
            .resolved_anon_key()
            .map_err(|e| Error::ConfigError(e.to_string()))?
            .unwrap_or_default();
        Self::builder()
            .base_url(config.resolved_url())
            .anon_key(anon_key)
            .timeout_secs(config.timeout_secs)
            .build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn storage_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}", self.base_url, path)
    }

    /// Bearer token for table and storage calls
    fn bearer(&self) -> String {
        self.access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| self.anon_key.clone())
    }

    fn request(&self, method: Method, url: &str, bearer: &str) -> RequestBuilder {
        debug!(%method, url, "backend request");
        self.http_client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            self.handle_error_response(status, response).await
        }
    }

    async fn handle_error_response<T>(
        &self,
        status: reqwest::StatusCode,
        response: Response,
    ) -> Result<T> {
        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body);

        match status.as_u16() {
            401 | 403 => Err(Error::AuthFailed(message)),
            code => Err(Error::Backend {
                status: code,
                message,
            }),
        }
    }

    async fn rows(&self, response: Response) -> Result<Vec<Row>> {
        Ok(response.json::<Vec<Row>>().await?)
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<Session> {
        let url = format!("{}?grant_type={}", self.auth_url("token"), grant_type);
        let response = self
            .send(self.request(Method::POST, &url, &self.anon_key).json(&body))
            .await?;
        let token: TokenResponse = response.json().await?;
        Ok(token.into())
    }
}

#[async_trait]
impl TableStore for SupabaseClient {
    async fn select(&self, query: &Query) -> Result<Vec<Row>> {
        let request = self
            .request(Method::GET, &self.rest_url(&query.table), &self.bearer())
            .query(&query.to_params());
        let response = self.send(request).await?;
        self.rows(response).await
    }

    async fn count(&self, query: &Query) -> Result<u64> {
        let params: Vec<(String, String)> = query
            .to_params()
            .into_iter()
            .filter(|(key, _)| key != "order" && key != "limit")
            .collect();
        let request = self
            .request(Method::HEAD, &self.rest_url(&query.table), &self.bearer())
            .header("Prefer", "count=exact")
            .query(&params);
        let response = self.send(request).await?;
        content_range_total(response.headers()).ok_or_else(|| Error::UnexpectedRow {
            table: query.table.clone(),
            message: "response carried no Content-Range total".to_string(),
        })
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row> {
        let request = self
            .request(Method::POST, &self.rest_url(table), &self.bearer())
            .header("Prefer", "return=representation")
            .json(&row);
        let response = self.send(request).await?;
        self.rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::UnexpectedRow {
                table: table.to_string(),
                message: "insert returned no row".to_string(),
            })
    }

    async fn update(&self, table: &str, id: &str, patch: Row) -> Result<Row> {
        let request = self
            .request(Method::PATCH, &self.rest_url(table), &self.bearer())
            .header("Prefer", "return=representation")
            .query(&[("id", format!("eq.{}", id))])
            .json(&patch);
        let response = self.send(request).await?;
        self.rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::RowNotFound {
                table: table.to_string(),
                id: id.to_string(),
            })
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        let request = self
            .request(Method::DELETE, &self.rest_url(table), &self.bearer())
            .header("Prefer", "return=representation")
            .query(&[("id", format!("eq.{}", id))]);
        let response = self.send(request).await?;
        if self.rows(response).await?.is_empty() {
            return Err(Error::RowNotFound {
                table: table.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for SupabaseClient {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let url = self.storage_url(&format!("{}/{}", bucket, path));
        let request = self
            .request(Method::POST, &url, &self.bearer())
            .header(CONTENT_TYPE, content_type)
            .header("cache-control", UPLOAD_CACHE_CONTROL)
            .header("x-upsert", "false")
            .body(bytes);
        self.send(request).await.map_err(|e| match e {
            Error::Backend { message, .. } => Error::UploadFailed(message),
            other => other,
        })?;
        Ok(())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()> {
        let request = self
            .request(Method::DELETE, &self.storage_url(bucket), &self.bearer())
            .json(&json!({ "prefixes": paths }));
        self.send(request).await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}{}{}/{}", self.base_url, PUBLIC_OBJECT_SEGMENT, bucket, path)
    }
}

#[async_trait]
impl AuthProvider for SupabaseClient {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        self.token_grant("password", json!({ "email": email, "password": password }))
            .await
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        self.send(self.request(Method::POST, &self.auth_url("logout"), access_token))
            .await?;
        Ok(())
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
        self.token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }

    async fn get_user(&self, access_token: &str) -> Result<User> {
        let response = self
            .send(self.request(Method::GET, &self.auth_url("user"), access_token))
            .await?;
        Ok(response.json().await?)
    }

    async fn update_user(&self, access_token: &str, metadata: Value) -> Result<User> {
        let request = self
            .request(Method::PUT, &self.auth_url("user"), access_token)
            .json(&json!({ "data": metadata }));
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    fn set_access_token(&self, token: Option<String>) {
        *self
            .access_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }
}

/// Total from a `Content-Range` header (`0-9/42` or `*/42`)
fn content_range_total(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("content-range")
        .and_then(|v: &HeaderValue| v.to_str().ok())
        .and_then(parse_content_range)
}

fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

/// Human-readable message from an error body
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|key| v.get(key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}
