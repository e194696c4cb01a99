//! HTTP implementation of the remote store.
//!
//! Talks to a PostgREST-style REST API: one route per table, filters as
//! query parameters, upserts via `Prefer: resolution=merge-duplicates`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::DomainRecord;
use crate::util::{compact_text, is_http_url, normalize_text_option};

use super::{RemoteFilter, RemoteStore};

const HTTP_TIMEOUT_SECS: u64 = 15;

/// Connection settings for the REST remote.
#[derive(Debug, Clone, Default)]
pub struct HttpRemoteConfig {
    /// Base URL, e.g. `https://project.example.co/rest/v1`
    pub base_url: Option<String>,
    /// Public API key sent as the `apikey` header
    pub api_key: Option<String>,
    /// Bearer token for the authenticated user
    pub access_token: Option<String>,
}

/// `RemoteStore` over a PostgREST-style REST API.
#[derive(Clone)]
pub struct HttpRemote {
    base_url: String,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl HttpRemote {
    /// Build a remote client from connection settings.
    pub fn new(config: HttpRemoteConfig) -> Result<Self> {
        let base_url = normalize_text_option(config.base_url)
            .ok_or_else(|| Error::InvalidInput("remote base URL must not be empty".to_string()))?;
        if !is_http_url(&base_url) {
            return Err(Error::InvalidInput(
                "remote base URL must include http:// or https://".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(api_key) = normalize_text_option(config.api_key) {
            let value = HeaderValue::from_str(&api_key)
                .map_err(|_| Error::InvalidInput("API key contains invalid bytes".to_string()))?;
            headers.insert("apikey", value);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: normalize_text_option(config.access_token),
            client,
        })
    }

    fn request(&self, method: Method, table: &str, query: &str) -> RequestBuilder {
        let url = if query.is_empty() {
            format!("{}/{table}", self.base_url)
        } else {
            format!("{}/{table}?{query}", self.base_url)
        };
        let mut request = self.client.request(method, url);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        request
    }

    async fn expect_success(response: Response, context: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(remote_error(status, &body, context))
    }

    async fn read_records(response: Response, context: &str) -> Result<Vec<DomainRecord>> {
        let values: Vec<Value> = response.json().await?;
        values
            .into_iter()
            .map(DomainRecord::from_value)
            .collect::<Result<Vec<_>>>()
            .map_err(|error| Error::Corruption(format!("{context}: {error}")))
    }
}

fn remote_error(status: StatusCode, body: &str, context: &str) -> Error {
    let detail = parse_error_body(body);
    if detail.is_empty() {
        Error::Remote(format!("{context}: HTTP {}", status.as_u16()))
    } else {
        Error::Remote(format!("{context}: {detail} ({})", status.as_u16()))
    }
}

fn parse_error_body(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        error: Option<String>,
    }

    if let Ok(payload) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return message.trim().to_string();
        }
    }
    compact_text(body)
}

fn eq_param(column: &str, value: &str) -> String {
    format!("{column}=eq.{}", urlencoding::encode(value))
}

#[async_trait]
impl RemoteStore for HttpRemote {
    async fn fetch(&self, table: &str, filter: &RemoteFilter) -> Result<Vec<DomainRecord>> {
        let mut query = eq_param("owner_id", &filter.owner_id);
        if let Some(watermark) = filter.updated_after {
            query.push_str(&format!("&updated_at=gt.{watermark}"));
        }

        let response = self.request(Method::GET, table, &query).send().await?;
        let response = Self::expect_success(response, &format!("fetch from '{table}'")).await?;
        Self::read_records(response, &format!("record from '{table}'")).await
    }

    async fn fetch_one(&self, table: &str, id: &str) -> Result<Option<DomainRecord>> {
        let query = format!("{}&limit=1", eq_param("id", id));
        let response = self.request(Method::GET, table, &query).send().await?;
        let response = Self::expect_success(response, &format!("fetch '{id}' from '{table}'")).await?;
        let mut records = Self::read_records(response, &format!("record from '{table}'")).await?;
        Ok(if records.is_empty() {
            None
        } else {
            Some(records.swap_remove(0))
        })
    }

    async fn upsert(&self, table: &str, record: &DomainRecord) -> Result<DomainRecord> {
        let response = self
            .request(Method::POST, table, "on_conflict=id")
            .header(
                "Prefer",
                "resolution=merge-duplicates,return=representation",
            )
            .json(&[record])
            .send()
            .await?;
        let response =
            Self::expect_success(response, &format!("upsert '{}' into '{table}'", record.id))
                .await?;

        let mut records = Self::read_records(response, &format!("record from '{table}'")).await?;
        if records.is_empty() {
            // Server accepted the write but returned no representation;
            // fall back to what we sent.
            return Ok(record.clone());
        }
        Ok(records.swap_remove(0))
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, table, &eq_param("id", id))
            .send()
            .await?;
        // A delete matching zero rows still returns success; only
        // transport/server failures surface here.
        Self::expect_success(response, &format!("delete '{id}' from '{table}'")).await?;
        Ok(())
    }

    async fn update_json_field(
        &self,
        table: &str,
        owner_id: &str,
        field: &str,
        items: &[DomainRecord],
    ) -> Result<()> {
        let array = items
            .iter()
            .map(DomainRecord::to_value)
            .collect::<Result<Vec<Value>>>()?;
        let body = serde_json::json!({ field: array });

        let response = self
            .request(Method::PATCH, table, &eq_param("id", owner_id))
            .json(&body)
            .send()
            .await?;
        Self::expect_success(
            response,
            &format!("update '{field}' on '{table}' for owner '{owner_id}'"),
        )
        .await?;
        Ok(())
    }
}
