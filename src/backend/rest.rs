use std::env;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

use super::{
    Backend, BackendError, BackendErrorKind, Filter, RowPage, SelectQuery, SortOrder,
};

pub const ENV_API_URL: &str = "GLOWDESK_API_URL";
pub const ENV_API_KEY: &str = "GLOWDESK_API_KEY";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: Url,
    pub api_key: String,
}

impl BackendConfig {
    pub fn new(base_url: Url, api_key: impl Into<String>) -> Self {
        BackendConfig {
            base_url,
            api_key: api_key.into(),
        }
    }

    /// Reads `GLOWDESK_API_URL` / `GLOWDESK_API_KEY`.
    pub fn from_env() -> anyhow::Result<Self> {
        let raw_url = env::var(ENV_API_URL)
            .map_err(|_| anyhow::anyhow!("{ENV_API_URL} is not set"))?;
        let api_key =
            env::var(ENV_API_KEY).map_err(|_| anyhow::anyhow!("{ENV_API_KEY} is not set"))?;
        let base_url = Url::parse(&raw_url)
            .map_err(|err| anyhow::anyhow!("{ENV_API_URL} is not a valid url: {err}"))?;
        Ok(BackendConfig::new(base_url, api_key))
    }
}

/// PostgREST-style HTTP backend. All error-signature sniffing lives here;
/// callers only ever see a classified `BackendError`.
pub struct RestBackend {
    http: reqwest::Client,
    config: BackendConfig,
}

/// Error body shape PostgREST returns alongside non-2xx statuses.
#[derive(Debug, Default, Deserialize)]
struct RestErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl RestBackend {
    pub fn new(config: BackendConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        let mut key_value = HeaderValue::from_str(&config.api_key)
            .map_err(|err| anyhow::anyhow!("api key is not a valid header value: {err}"))?;
        key_value.set_sensitive(true);
        headers.insert("apikey", key_value);
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|err| anyhow::anyhow!("api key is not a valid header value: {err}"))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| anyhow::anyhow!("build http client: {err}"))?;
        Ok(RestBackend { http, config })
    }

    fn table_url(&self, table: &str) -> Result<Url, BackendError> {
        let base = self.config.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/rest/v1/{table}")).map_err(|err| {
            BackendError::new(BackendErrorKind::Unknown, format!("bad table url: {err}"))
                .with_table(table)
        })
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http.request(method, url)
    }

    async fn send(
        &self,
        builder: RequestBuilder,
        table: Option<&str>,
    ) -> Result<Response, BackendError> {
        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body: RestErrorBody = response.json().await.unwrap_or_default();
        let mut err = classify_failure(status, &body.code, &body.message);
        if let Some(table) = table {
            err = err.with_table(table);
        }
        Err(err)
    }
}

fn transport_error(err: reqwest::Error) -> BackendError {
    if err.is_connect() || err.is_timeout() || err.is_request() {
        BackendError::new(BackendErrorKind::Connectivity, err.to_string())
    } else {
        BackendError::new(BackendErrorKind::Unknown, err.to_string())
    }
}

/// The one place where status codes, SQLSTATE codes and message signatures
/// are turned into a `BackendErrorKind`.
fn classify_failure(status: StatusCode, code: &str, message: &str) -> BackendError {
    let kind = if message.contains("infinite recursion") {
        BackendErrorKind::PolicyRecursion
    } else if code == "42P01" || status == StatusCode::NOT_FOUND {
        BackendErrorKind::TableNotFound
    } else if code == "42501"
        || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
    {
        BackendErrorKind::PermissionDenied
    } else if code == "42703" || code.starts_with("PGRST") {
        BackendErrorKind::SchemaMismatch
    } else {
        BackendErrorKind::Unknown
    };
    let message = if message.is_empty() {
        format!("backend responded with status {status}")
    } else {
        message.to_string()
    };
    BackendError::new(kind, message)
}

fn filter_pair(filter: &Filter) -> (String, String) {
    match filter {
        Filter::Eq(col, v) => (col.clone(), format!("eq.{}", literal(v))),
        Filter::Gte(col, v) => (col.clone(), format!("gte.{}", literal(v))),
        Filter::Lte(col, v) => (col.clone(), format!("lte.{}", literal(v))),
    }
}

fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// PostgREST `or=(a.ilike.*term*,b.ilike.*term*)` disjunction. The term is
/// stripped of the reserved characters rather than escaped; search terms are
/// user-typed fragments, not patterns.
fn search_pair(fields: &[String], term: &str) -> (String, String) {
    let cleaned: String = term
        .chars()
        .filter(|c| !matches!(c, ',' | '(' | ')' | '*' | '"'))
        .collect();
    let arms: Vec<String> = fields
        .iter()
        .map(|f| format!("{f}.ilike.*{cleaned}*"))
        .collect();
    ("or".to_string(), format!("({})", arms.join(",")))
}

fn apply_query(mut url: Url, query: &SelectQuery) -> Url {
    {
        let mut pairs = url.query_pairs_mut();
        for filter in &query.filters {
            let (k, v) = filter_pair(filter);
            pairs.append_pair(&k, &v);
        }
        if let Some(search) = &query.search {
            if !search.term.is_empty() && !search.fields.is_empty() {
                let (k, v) = search_pair(&search.fields, &search.term);
                pairs.append_pair(&k, &v);
            }
        }
        if let Some((column, order)) = &query.order {
            let dir = match order {
                SortOrder::Asc => "asc",
                SortOrder::Desc => "desc",
            };
            pairs.append_pair("order", &format!("{column}.{dir}"));
        }
        if query.offset > 0 {
            pairs.append_pair("offset", &query.offset.to_string());
        }
        if let Some(limit) = query.limit {
            pairs.append_pair("limit", &limit.to_string());
        }
    }
    url
}

/// Parses a `Content-Range` value such as `0-9/42` or `*/42` into the total.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

fn response_total(response: &Response) -> Option<u64> {
    response
        .headers()
        .get("content-range")
        .and_then(|v| v.to_str().ok())
        .and_then(parse_content_range_total)
}

#[async_trait::async_trait]
impl Backend for RestBackend {
    async fn ping(&self) -> Result<(), BackendError> {
        let base = self.config.base_url.as_str().trim_end_matches('/');
        let url = Url::parse(&format!("{base}/rest/v1/")).map_err(|err| {
            BackendError::new(BackendErrorKind::Unknown, format!("bad base url: {err}"))
        })?;
        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(transport_error)?;
        match response.status() {
            // Rejected credentials count as "cannot reach the backend" for
            // the probe's purposes.
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(BackendError::new(
                BackendErrorKind::Connectivity,
                "backend rejected the api key",
            )),
            _ => Ok(()),
        }
    }

    async fn probe_table(&self, table: &str) -> Result<(), BackendError> {
        let url = apply_query(self.table_url(table)?, &SelectQuery::probe());
        self.send(self.request(Method::GET, url), Some(table))
            .await
            .map(|_| ())
    }

    async fn select(&self, table: &str, query: &SelectQuery) -> Result<RowPage, BackendError> {
        let url = apply_query(self.table_url(table)?, query);
        let response = self
            .send(
                self.request(Method::GET, url)
                    .header("Prefer", "count=exact"),
                Some(table),
            )
            .await?;
        let total = response_total(&response);
        let rows: Vec<Value> = response.json().await.map_err(|err| {
            BackendError::new(BackendErrorKind::SchemaMismatch, err.to_string())
                .with_table(table)
        })?;
        let total = total.unwrap_or(rows.len() as u64);
        Ok(RowPage { rows, total })
    }

    async fn insert(
        &self,
        table: &str,
        row: Map<String, Value>,
    ) -> Result<Value, BackendError> {
        let url = self.table_url(table)?;
        let response = self
            .send(
                self.request(Method::POST, url)
                    .header("Prefer", "return=representation")
                    .json(&Value::Object(row)),
                Some(table),
            )
            .await?;
        let mut rows: Vec<Value> = response.json().await.map_err(|err| {
            BackendError::new(BackendErrorKind::SchemaMismatch, err.to_string())
                .with_table(table)
        })?;
        rows.pop().ok_or_else(|| {
            BackendError::new(BackendErrorKind::Unknown, "insert returned no row")
                .with_table(table)
        })
    }

    async fn update(
        &self,
        table: &str,
        id: &str,
        business_id: &str,
        patch: Map<String, Value>,
    ) -> Result<Value, BackendError> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{id}"))
            .append_pair("business_id", &format!("eq.{business_id}"));
        let response = self
            .send(
                self.request(Method::PATCH, url)
                    .header("Prefer", "return=representation")
                    .json(&Value::Object(patch)),
                Some(table),
            )
            .await?;
        let mut rows: Vec<Value> = response.json().await.map_err(|err| {
            BackendError::new(BackendErrorKind::SchemaMismatch, err.to_string())
                .with_table(table)
        })?;
        rows.pop().ok_or_else(|| {
            BackendError::new(BackendErrorKind::Unknown, "no row matched the update")
                .with_table(table)
        })
    }

    async fn delete(
        &self,
        table: &str,
        id: &str,
        business_id: &str,
    ) -> Result<u64, BackendError> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{id}"))
            .append_pair("business_id", &format!("eq.{business_id}"));
        let response = self
            .send(
                self.request(Method::DELETE, url)
                    .header("Prefer", "return=representation"),
                Some(table),
            )
            .await?;
        let rows: Vec<Value> = response.json().await.map_err(|err| {
            BackendError::new(BackendErrorKind::SchemaMismatch, err.to_string())
                .with_table(table)
        })?;
        Ok(rows.len() as u64)
    }

    async fn count(&self, table: &str, filters: &[Filter]) -> Result<u64, BackendError> {
        let query = SelectQuery {
            filters: filters.to_vec(),
            limit: Some(0),
            ..SelectQuery::default()
        };
        let url = apply_query(self.table_url(table)?, &query);
        let response = self
            .send(
                self.request(Method::GET, url)
                    .header("Prefer", "count=exact"),
                Some(table),
            )
            .await?;
        response_total(&response).ok_or_else(|| {
            BackendError::new(
                BackendErrorKind::SchemaMismatch,
                "backend did not report a row count",
            )
            .with_table(table)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_missing_table() {
        let err = classify_failure(
            StatusCode::NOT_FOUND,
            "42P01",
            "relation \"public.clientes\" does not exist",
        );
        assert_eq!(err.kind, BackendErrorKind::TableNotFound);
    }

    #[test]
    fn classifies_policy_recursion_before_status() {
        let err = classify_failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "42P17",
            "infinite recursion detected in policy for relation \"appointments\"",
        );
        assert_eq!(err.kind, BackendErrorKind::PolicyRecursion);
        assert!(err.is_blacklistable());
    }

    #[test]
    fn classifies_permission_and_schema_errors() {
        assert_eq!(
            classify_failure(StatusCode::FORBIDDEN, "42501", "permission denied").kind,
            BackendErrorKind::PermissionDenied
        );
        assert_eq!(
            classify_failure(StatusCode::BAD_REQUEST, "42703", "column does not exist").kind,
            BackendErrorKind::SchemaMismatch
        );
        assert_eq!(
            classify_failure(StatusCode::BAD_REQUEST, "PGRST100", "parse error").kind,
            BackendErrorKind::SchemaMismatch
        );
    }

    #[test]
    fn unknown_status_without_code_falls_through() {
        let err = classify_failure(StatusCode::INTERNAL_SERVER_ERROR, "", "");
        assert_eq!(err.kind, BackendErrorKind::Unknown);
        assert!(err.message.contains("500"));
    }

    #[test]
    fn parses_content_range_totals() {
        assert_eq!(parse_content_range_total("0-9/42"), Some(42));
        assert_eq!(parse_content_range_total("*/7"), Some(7));
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn builds_query_string_with_filters_search_and_range() {
        let url = Url::parse("https://api.example.test/rest/v1/clients").unwrap();
        let query = SelectQuery::new()
            .eq("business_id", "biz-1")
            .eq("status", "active")
            .search(&["name", "email", "phone"], "ana")
            .order_by("name", SortOrder::Asc)
            .page(2, 10);
        let url = apply_query(url, &query);
        let qs = url.query().unwrap();
        assert!(qs.contains("business_id=eq.biz-1"));
        assert!(qs.contains("status=eq.active"));
        assert!(qs.contains("ilike.%2Aana%2A") || qs.contains("ilike.*ana*"));
        assert!(qs.contains("order=name.asc"));
        assert!(qs.contains("offset=10"));
        assert!(qs.contains("limit=10"));
    }

    #[test]
    fn search_term_reserved_characters_are_stripped() {
        let (_, v) = search_pair(&["name".into()], "a,b(c)*");
        assert_eq!(v, "(name.ilike.*abc*)");
    }

    #[test]
    fn numeric_filter_literals_are_unquoted() {
        let (_, v) = filter_pair(&Filter::Gte("date".into(), json!(1700000000000i64)));
        assert_eq!(v, "gte.1700000000000");
    }
}
