use axum::{
    extract::{Extension, RawQuery},
    http::{StatusCode, Uri},
};
use serde_json::{json, Value};

use super::ConsoleState;
use crate::config::TableConfig;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::resource::{self, FetchOutcome};
use crate::session::Session;
use crate::table::{Filters, TableState, TableView};

/// GET /apps - Landing page listing the available list pages
pub async fn landing(Extension(session): Extension<Session>) -> ApiResult<Value> {
    let pages: Vec<Value> = resource::registry()
        .iter()
        .map(|def| {
            json!({
                "name": def.name,
                "title": def.table.title(),
                "route": def.route,
            })
        })
        .collect();

    Ok(ApiResponse::success(json!({
        "email": session.email,
        "pages": pages,
    })))
}

/// List query: `page`, `rows_per_page`, `search`; any other key is a
/// filter and may repeat.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub rows_per_page: Option<u32>,
    pub search: Option<String>,
    pub filters: Filters,
}

impl ListQuery {
    pub fn parse(raw: Option<&str>) -> Result<Self, ApiError> {
        let mut query = ListQuery::default();
        let Some(raw) = raw else { return Ok(query) };

        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "page" => query.page = Some(parse_number("page", &value)?),
                "rows_per_page" => query.rows_per_page = Some(parse_number("rows_per_page", &value)?),
                "search" => query.search = Some(value.into_owned()),
                _ => {
                    query.filters.add(key.into_owned(), value.into_owned());
                }
            }
        }
        Ok(query)
    }

    pub fn into_state(self, config: &TableConfig) -> Result<TableState, ApiError> {
        let rows_per_page = self.rows_per_page.unwrap_or(config.default_rows_per_page);
        if !config.rows_per_page_options.contains(&rows_per_page) {
            return Err(ApiError::InvalidRequest(format!(
                "rows_per_page must be one of {:?}",
                config.rows_per_page_options
            )));
        }

        let mut state = TableState::new(rows_per_page).at_page(self.page.unwrap_or(1));
        if let Some(search) = self.search {
            state.search = search;
        }
        state.filters = self.filters;
        Ok(state)
    }
}

fn parse_number(key: &str, value: &str) -> Result<u32, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::InvalidRequest(format!("'{}' must be a positive number, got '{}'", key, value)))
}

/// GET /apps/<page> - One page of a server-paginated list, as a table view
pub async fn list(
    Extension(state): Extension<ConsoleState>,
    Extension(session): Extension<Session>,
    uri: Uri,
    RawQuery(raw): RawQuery,
) -> ApiResult<TableView> {
    let def = resource::find_by_route(uri.path()).ok_or_else(|| {
        ApiError::from_status(
            StatusCode::NOT_FOUND,
            json!({ "message": format!("No list page at {}", uri.path()) }),
        )
    })?;

    let token = session.bearer_token().ok_or_else(|| {
        ApiError::from_status(StatusCode::UNAUTHORIZED, json!({ "message": "Not signed in" }))
    })?;

    let table_config = &state.config.table;
    let table_state = ListQuery::parse(raw.as_deref())?.into_state(table_config)?;
    let list = def.resource(table_state);

    match list.refresh(&state.client.for_token(token)).await? {
        FetchOutcome::Applied(_) => {}
        FetchOutcome::Stale { seq } => {
            // Nothing else fetches this resource, so a stale answer means a bug.
            tracing::error!("Single-use resource {} reported stale seq {}", def.name, seq);
        }
    }

    let table = def.with_layout(table_config).table;
    Ok(ApiResponse::success(list.view(&table)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_keys_become_repeated_filters() {
        let query = ListQuery::parse(Some("page=3&rows_per_page=50&search=jane+doe&dp_tags=vip&dp_tags=new")).unwrap();
        assert_eq!(query.page, Some(3));
        assert_eq!(query.rows_per_page, Some(50));
        assert_eq!(query.search.as_deref(), Some("jane doe"));
        assert_eq!(query.filters.get("dp_tags"), &["vip".to_string(), "new".to_string()]);
    }

    #[test]
    fn bad_numbers_are_rejected() {
        assert!(ListQuery::parse(Some("page=two")).is_err());
        assert!(ListQuery::parse(Some("rows_per_page=-1")).is_err());
    }

    #[test]
    fn page_size_must_be_an_offered_option() {
        let config = TableConfig::default();
        assert!(ListQuery::parse(Some("rows_per_page=7")).unwrap().into_state(&config).is_err());

        let state = ListQuery::parse(None).unwrap().into_state(&config).unwrap();
        assert_eq!((state.current_page, state.rows_per_page), (1, 20));
    }
}
