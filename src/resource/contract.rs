use serde_json::Value;

use crate::error::ApiError;
use crate::table::TableState;

/// How one list endpoint names its paging parameters and response fields.
///
/// The backend is not consistent (`current_page`/`data_per_page`,
/// `page`/`page_size`, `page`/`limit`), so each endpoint carries its own.
/// Response keys may be dotted paths such as `pagination.total_pages`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContract {
    pub endpoint: String,
    pub page_param: String,
    pub size_param: String,
    pub search_param: Option<String>,
    pub rows_key: String,
    pub total_pages_key: String,
    pub current_page_key: Option<String>,
    pub total_count_key: Option<String>,
}

/// One page as reported by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct PageData {
    pub rows: Vec<Value>,
    pub total_pages: u32,
    pub current_page: Option<u32>,
    pub total_count: Option<u64>,
}

impl PageContract {
    fn with_params(endpoint: &str, page: &str, size: &str, rows_key: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            page_param: page.to_string(),
            size_param: size.to_string(),
            search_param: None,
            rows_key: rows_key.to_string(),
            total_pages_key: "total_pages".to_string(),
            current_page_key: None,
            total_count_key: None,
        }
    }

    /// `current_page` / `data_per_page`
    pub fn current_page_style(endpoint: &str, rows_key: &str) -> Self {
        Self::with_params(endpoint, "current_page", "data_per_page", rows_key)
    }

    /// `page` / `page_size`
    pub fn page_size_style(endpoint: &str, rows_key: &str) -> Self {
        Self::with_params(endpoint, "page", "page_size", rows_key)
    }

    /// `page` / `limit`
    pub fn page_limit_style(endpoint: &str, rows_key: &str) -> Self {
        Self::with_params(endpoint, "page", "limit", rows_key)
    }

    pub fn search(mut self, param: &str) -> Self {
        self.search_param = Some(param.to_string());
        self
    }

    pub fn total_pages_key(mut self, key: &str) -> Self {
        self.total_pages_key = key.to_string();
        self
    }

    pub fn current_page_key(mut self, key: &str) -> Self {
        self.current_page_key = Some(key.to_string());
        self
    }

    pub fn total_count_key(mut self, key: &str) -> Self {
        self.total_count_key = Some(key.to_string());
        self
    }

    /// Query pairs for the state's page, size, search and filters.
    pub fn query(&self, state: &TableState) -> Vec<(String, String)> {
        let mut pairs = vec![
            (self.page_param.clone(), state.current_page.max(1).to_string()),
            (self.size_param.clone(), state.rows_per_page.to_string()),
        ];
        if let Some(param) = &self.search_param {
            let search = state.search.trim();
            if !search.is_empty() {
                pairs.push((param.clone(), search.to_string()));
            }
        }
        pairs.extend(state.filters.query_pairs());
        pairs
    }

    pub fn extract(&self, body: &Value) -> Result<PageData, ApiError> {
        let rows = match lookup(body, &self.rows_key) {
            Some(Value::Array(rows)) => rows.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(ApiError::Decode(format!(
                    "'{}' in {} response is {}, expected a list",
                    self.rows_key,
                    self.endpoint,
                    type_name(other)
                )))
            }
        };

        let total_pages = lookup(body, &self.total_pages_key)
            .and_then(as_u64)
            .map(|n| n.min(u32::MAX as u64) as u32)
            .unwrap_or(0);
        let current_page = self
            .current_page_key
            .as_deref()
            .and_then(|key| lookup(body, key))
            .and_then(as_u64)
            .map(|n| n.min(u32::MAX as u64) as u32);
        let total_count = self
            .total_count_key
            .as_deref()
            .and_then(|key| lookup(body, key))
            .and_then(as_u64);

        Ok(PageData {
            rows,
            total_pages,
            current_page,
            total_count,
        })
    }
}

fn lookup<'a>(body: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(body, |value, key| value.get(key))
}

// Some endpoints send counts as strings or floats.
fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
