//! Authenticated HTTP client for the CMP backend.
//!
//! Every request goes to `base_url + endpoint`, carries the JSON defaults,
//! the tenant header when one is configured, and the session's bearer token.
//! Non-2xx answers become [`ApiError::Http`]; nothing is cached or retried.

mod upload;

pub use upload::Upload;

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::config::{self, ClientConfig};
use crate::error::{is_json_content, ApiError};
use crate::session::{MemorySession, SessionStore};

const DF_ID_HEADER: &str = "df-id";

/// How the body of a successful response should be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseType {
    /// Parse JSON when the response declares it, otherwise read text.
    #[default]
    Auto,
    Json,
    Text,
    Blob,
}

/// One request. `call` returns only the body; `call_full` returns the
/// `{data, status, headers}` envelope.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub data: Option<Value>,
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub response_type: ResponseType,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::new(Method::GET)
    }
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            data: None,
            params: Vec::new(),
            headers: Vec::new(),
            response_type: ResponseType::Auto,
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn json(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Append a query pair. Repeating a key keeps every value.
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn params<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params.extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    fn has_body(&self) -> bool {
        self.data.is_some() && self.method != Method::GET && self.method != Method::HEAD
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// `204 No Content`, or an empty JSON body.
    Null,
    Json(Value),
    Text(String),
    Blob(Vec<u8>),
}

impl ResponseBody {
    pub fn is_null(&self) -> bool {
        matches!(self, ResponseBody::Null)
    }

    pub fn into_json(self) -> Result<Value, ApiError> {
        match self {
            ResponseBody::Null => Ok(Value::Null),
            ResponseBody::Json(value) => Ok(value),
            ResponseBody::Text(text) => serde_json::from_str(&text)
                .map_err(|_| ApiError::Decode(format!("expected JSON, got text: {}", truncate(&text, 80)))),
            ResponseBody::Blob(_) => Err(ApiError::Decode("expected JSON, got binary content".to_string())),
        }
    }

    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        Ok(serde_json::from_value(self.into_json()?)?)
    }

    /// JSON value as seen by callers; text becomes a JSON string.
    pub fn to_value(&self) -> Value {
        match self {
            ResponseBody::Null => Value::Null,
            ResponseBody::Json(value) => value.clone(),
            ResponseBody::Text(text) => Value::String(text.clone()),
            ResponseBody::Blob(bytes) => serde_json::json!({ "bytes": bytes.len() }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FullResponse {
    pub data: ResponseBody,
    pub status: u16,
    pub headers: HeaderMap,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    df_id: Option<String>,
    upload_chunk_bytes: usize,
    session: Arc<dyn SessionStore>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("df_id", &self.df_id)
            .finish()
    }
}

impl ApiClient {
    pub fn new(config: &ClientConfig, session: Arc<dyn SessionStore>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            df_id: config.df_id.clone(),
            upload_chunk_bytes: config.upload_chunk_bytes.max(1),
            session,
        })
    }

    /// Client for the globally configured backend.
    pub fn from_env(session: Arc<dyn SessionStore>) -> Result<Self, ApiError> {
        Self::new(&config::config().client, session)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.session
    }

    /// Same backend and connection pool, acting for another bearer token.
    pub fn for_token(&self, token: &str) -> Self {
        Self {
            session: Arc::new(MemorySession::with_token(token)),
            ..self.clone()
        }
    }

    pub fn url(&self, endpoint: &str, params: &[(String, String)]) -> Result<Url, ApiError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, endpoint))?;
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }

    fn headers(&self, json: bool, overrides: &[(String, String)]) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        if json {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(df_id) = &self.df_id {
            headers.insert(DF_ID_HEADER, header_value(df_id)?);
        }

        for (name, value) in overrides {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ApiError::InvalidRequest(format!("invalid header name '{}'", name)))?;
            headers.insert(name, header_value(value)?);
        }

        if let Some(token) = self.session.token() {
            headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", token))?);
        }

        Ok(headers)
    }

    pub async fn call(&self, endpoint: &str, options: RequestOptions) -> Result<ResponseBody, ApiError> {
        Ok(self.call_full(endpoint, options).await?.data)
    }

    pub async fn call_full(&self, endpoint: &str, options: RequestOptions) -> Result<FullResponse, ApiError> {
        let url = self.url(endpoint, &options.params)?;
        let headers = self.headers(true, &options.headers)?;

        tracing::debug!("{} {}", options.method, url);

        let mut request = self.http.request(options.method.clone(), url).headers(headers);
        if options.has_body() {
            if let Some(data) = &options.data {
                request = request.body(serde_json::to_vec(data)?);
            }
        }

        let response = request.send().await?;
        finish(response, options.response_type).await
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<T, ApiError> {
        let options = RequestOptions::get().params(params.iter().cloned());
        self.call(endpoint, options).await?.into_typed()
    }

    /// Multipart upload reporting percent-complete as the body is sent.
    ///
    /// Success yields the JSON body, or the raw text when it is not JSON.
    /// Failures carry the same `{status, message, data}` shape as `call`.
    pub async fn upload_file<F>(&self, endpoint: &str, upload: Upload, on_progress: F) -> Result<ResponseBody, ApiError>
    where
        F: FnMut(u8) + Send + Sync + 'static,
    {
        let url = self.url(endpoint, &[])?;
        let headers = self.headers(false, &upload.headers)?;
        let method = upload.method.clone();

        tracing::debug!("{} {} (multipart, {} bytes)", method, url, upload.len());

        let form = upload.into_form(self.upload_chunk_bytes, on_progress)?;
        let response = self
            .http
            .request(method, url)
            .headers(headers)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let data = parse_lenient(&text);

        if !status.is_success() {
            tracing::warn!("Upload to {} failed with {}", endpoint, status);
            return Err(ApiError::from_status(status, data.to_value()));
        }
        Ok(data)
    }
}

fn header_value(value: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value).map_err(|_| ApiError::InvalidRequest("header value contains invalid characters".to_string()))
}

async fn finish(response: reqwest::Response, response_type: ResponseType) -> Result<FullResponse, ApiError> {
    let status = response.status();
    let headers = response.headers().clone();

    if status == StatusCode::NO_CONTENT {
        return Ok(FullResponse {
            data: ResponseBody::Null,
            status: status.as_u16(),
            headers,
        });
    }

    if !status.is_success() {
        let data = if is_json_content(&headers) {
            let bytes = response.bytes().await.unwrap_or_default();
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        } else {
            match response.text().await {
                Ok(text) if !text.is_empty() => Value::String(text),
                _ => Value::Null,
            }
        };
        let err = ApiError::from_status(status, data);
        tracing::warn!("Request failed with {}: {}", status, err.message());
        return Err(err);
    }

    let data = match response_type {
        ResponseType::Blob => ResponseBody::Blob(response.bytes().await?.to_vec()),
        ResponseType::Text => ResponseBody::Text(response.text().await?),
        ResponseType::Json => json_body(response).await?,
        ResponseType::Auto if is_json_content(&headers) => json_body(response).await?,
        ResponseType::Auto => ResponseBody::Text(response.text().await?),
    };

    Ok(FullResponse {
        data,
        status: status.as_u16(),
        headers,
    })
}

async fn json_body(response: reqwest::Response) -> Result<ResponseBody, ApiError> {
    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return Ok(ResponseBody::Null);
    }
    Ok(ResponseBody::Json(serde_json::from_slice(&bytes)?))
}

fn parse_lenient(text: &str) -> ResponseBody {
    if text.trim().is_empty() {
        return ResponseBody::Null;
    }
    match serde_json::from_str(text) {
        Ok(value) => ResponseBody::Json(value),
        Err(_) => ResponseBody::Text(text.to_string()),
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
