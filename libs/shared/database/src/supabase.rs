use anyhow::{Result, anyhow};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION, CONTENT_RANGE},
    Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use shared_config::AppConfig;

/// Raw PostgREST reply for callers that need to branch on the status code
/// instead of treating every non-2xx as a failure.
#[derive(Debug, Clone)]
pub struct SupabaseResponse {
    pub status: StatusCode,
    pub body: Value,
    pub content_range: Option<String>,
}

impl SupabaseResponse {
    /// PostgreSQL error code carried in a PostgREST error body (`23505`, `23503`, ...).
    pub fn pg_error_code(&self) -> Option<&str> {
        self.body.get("code").and_then(Value::as_str)
    }

    /// Total row count from a `Content-Range: 0-7/42` header.
    pub fn total_count(&self) -> Option<u64> {
        self.content_range
            .as_deref()
            .and_then(|range| range.rsplit('/').next())
            .and_then(|total| total.parse().ok())
    }
}

#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        match HeaderValue::from_str(&self.anon_key) {
            Ok(value) => {
                headers.insert("apikey", value);
            }
            Err(_) => warn!("Supabase anon key is not a valid header value"),
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!("Auth token is not a valid header value"),
            }
        }

        headers
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T>
    where T: DeserializeOwned {
        let response = self.request_with_status(method, path, auth_token, body, extra_headers).await?;

        if !response.status.is_success() {
            let error_text = response.body.to_string();
            error!("API error ({}): {}", response.status, error_text);

            return Err(match response.status.as_u16() {
                401 | 403 => anyhow!("Authentication error: {}", error_text),
                404 => anyhow!("Resource not found: {}", error_text),
                _ => anyhow!("API error ({}): {}", response.status, error_text),
            });
        }

        let data = serde_json::from_value::<T>(response.body)?;
        Ok(data)
    }

    /// Sends the request and hands back status, body and `Content-Range`
    /// without failing on non-2xx replies. Only transport errors are `Err`.
    pub async fn request_with_status(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<SupabaseResponse> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token);
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        let content_range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(SupabaseResponse { status, body, content_range })
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

/// `Prefer: return=representation` so inserts and updates echo the stored rows.
pub fn prefer_representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

/// `Prefer: count=exact` so listings report their total in `Content-Range`.
pub fn prefer_exact_count() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("count=exact"));
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_total_count_from_content_range() {
        let response = SupabaseResponse {
            status: StatusCode::OK,
            body: json!([]),
            content_range: Some("0-7/42".to_string()),
        };
        assert_eq!(response.total_count(), Some(42));
    }

    #[test]
    fn test_pg_error_code() {
        let response = SupabaseResponse {
            status: StatusCode::CONFLICT,
            body: json!({"code": "23505", "message": "duplicate key value"}),
            content_range: None,
        };
        assert_eq!(response.pg_error_code(), Some("23505"));
    }
}
