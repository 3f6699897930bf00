//! Server-paginated table contract.
//!
//! A [`Table`] projects the rows of the current page through its columns
//! into a serializable [`TableView`]. It never fetches anything: page, size,
//! search and filters live in the caller's [`TableState`].

pub mod filter;
pub mod pagination;
pub mod render;

pub use filter::{FilterDetail, Filters};
pub use pagination::{PageItem, TableState};

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

/// Shown for null, missing, blank or empty values.
pub const PLACEHOLDER: &str = "- - -";

pub type AccessorFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;
/// `(value, row)` to cell text; `None` falls back to the placeholder.
pub type RenderFn = Arc<dyn Fn(&Value, &Value) -> Option<String> + Send + Sync>;
pub type RouteFn = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

#[derive(Clone)]
pub enum Accessor {
    Key(String),
    Func(AccessorFn),
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accessor::Key(key) => write!(f, "Key({:?})", key),
            Accessor::Func(_) => write!(f, "Func(..)"),
        }
    }
}

#[derive(Clone)]
pub struct Column {
    pub header: String,
    pub accessor: Accessor,
    pub render: Option<RenderFn>,
    pub header_class: Option<String>,
    pub cell_class: Option<String>,
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("header", &self.header)
            .field("accessor", &self.accessor)
            .field("render", &self.render.is_some())
            .finish()
    }
}

impl Column {
    /// Column reading `row[key]`.
    pub fn key(header: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            accessor: Accessor::Key(key.into()),
            render: None,
            header_class: None,
            cell_class: None,
        }
    }

    /// Column computing its value from the whole row.
    pub fn computed<F>(header: impl Into<String>, accessor: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Self {
            header: header.into(),
            accessor: Accessor::Func(Arc::new(accessor)),
            render: None,
            header_class: None,
            cell_class: None,
        }
    }

    pub fn render<F>(mut self, render: F) -> Self
    where
        F: Fn(&Value, &Value) -> Option<String> + Send + Sync + 'static,
    {
        self.render = Some(Arc::new(render));
        self
    }

    pub fn header_class(mut self, class: impl Into<String>) -> Self {
        self.header_class = Some(class.into());
        self
    }

    pub fn cell_class(mut self, class: impl Into<String>) -> Self {
        self.cell_class = Some(class.into());
        self
    }

    pub fn value(&self, row: &Value) -> Value {
        match &self.accessor {
            Accessor::Key(key) => row.get(key).cloned().unwrap_or(Value::Null),
            Accessor::Func(f) => f(row),
        }
    }

    /// Displayed text of this column for `row`.
    pub fn cell(&self, row: &Value) -> String {
        let value = self.value(row);
        let text = match &self.render {
            Some(render) => render(&value, row),
            None => display_value(&value),
        };
        text.filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| PLACEHOLDER.to_string())
    }
}

/// Plain rendering of a JSON value, `None` when there is nothing to show.
pub fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(display_value).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        Value::Object(map) if map.is_empty() => None,
        Value::Object(_) => Some(value.to_string()),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HeaderView {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<u64>,
    pub cells: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Body {
    Loading { skeleton_rows: usize },
    Empty { text: String },
    Rows,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginationView {
    pub current_page: u32,
    pub total_pages: u32,
    pub rows_per_page: u32,
    pub rows_per_page_options: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
    pub pages: Vec<PageItem>,
    pub has_prev: bool,
    pub has_next: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterView {
    pub key: String,
    pub label: String,
    pub options: Vec<String>,
    pub selected: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableView {
    pub title: String,
    pub headers: Vec<HeaderView>,
    pub body: Body,
    pub rows: Vec<RowView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationView>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub search: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterView>,
}

#[derive(Clone)]
pub struct Table {
    title: String,
    columns: Vec<Column>,
    row_route: Option<RouteFn>,
    serial_numbers: bool,
    empty_text: String,
    skeleton_rows: usize,
    visible_pages: u32,
    rows_per_page_options: Vec<u32>,
    filter_details: Vec<FilterDetail>,
    hide_pagination: bool,
}

impl Table {
    pub fn new(title: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            title: title.into(),
            columns,
            row_route: None,
            serial_numbers: true,
            empty_text: "No Data Available".to_string(),
            skeleton_rows: 20,
            visible_pages: 3,
            rows_per_page_options: vec![10, 20, 50, 100],
            filter_details: Vec::new(),
            hide_pagination: false,
        }
    }

    pub fn row_route<F>(mut self, route: F) -> Self
    where
        F: Fn(&Value) -> Option<String> + Send + Sync + 'static,
    {
        self.row_route = Some(Arc::new(route));
        self
    }

    pub fn without_serial_numbers(mut self) -> Self {
        self.serial_numbers = false;
        self
    }

    pub fn without_pagination(mut self) -> Self {
        self.hide_pagination = true;
        self
    }

    pub fn empty_text(mut self, text: impl Into<String>) -> Self {
        self.empty_text = text.into();
        self
    }

    pub fn filter_details(mut self, details: Vec<FilterDetail>) -> Self {
        self.filter_details = details;
        self
    }

    pub fn with_layout(mut self, config: &crate::config::TableConfig) -> Self {
        self.skeleton_rows = config.skeleton_rows;
        self.visible_pages = config.visible_pages;
        self.rows_per_page_options = config.rows_per_page_options.clone();
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn route_for(&self, row: &Value) -> Option<String> {
        self.row_route.as_ref().and_then(|route| route(row))
    }

    pub fn view(&self, rows: &[Value], state: &TableState) -> TableView {
        let mut headers = Vec::with_capacity(self.columns.len() + 1);
        if self.serial_numbers {
            headers.push(HeaderView {
                label: "#".to_string(),
                class: None,
            });
        }
        headers.extend(self.columns.iter().map(|c| HeaderView {
            label: c.header.clone(),
            class: c.header_class.clone(),
        }));

        let (body, rows) = if state.loading {
            (
                Body::Loading {
                    skeleton_rows: self.skeleton_rows,
                },
                Vec::new(),
            )
        } else if rows.is_empty() {
            (
                Body::Empty {
                    text: self.empty_text.clone(),
                },
                Vec::new(),
            )
        } else {
            let rows = rows
                .iter()
                .enumerate()
                .map(|(idx, row)| RowView {
                    serial: self.serial_numbers.then(|| state.serial(idx)),
                    cells: self.columns.iter().map(|c| c.cell(row)).collect(),
                    route: self.route_for(row),
                })
                .collect();
            (Body::Rows, rows)
        };

        let pagination = (!self.hide_pagination && state.total_pages > 0).then(|| PaginationView {
            current_page: state.current_page,
            total_pages: state.total_pages,
            rows_per_page: state.rows_per_page,
            rows_per_page_options: self.rows_per_page_options.clone(),
            total_count: state.total_count,
            pages: state.page_numbers(self.visible_pages),
            has_prev: state.has_prev(),
            has_next: state.has_next(),
        });

        let filters = self
            .filter_details
            .iter()
            .map(|detail| FilterView {
                key: detail.key.clone(),
                label: detail.label.clone(),
                options: detail.options.clone(),
                selected: state.filters.get(&detail.key).to_vec(),
            })
            .collect();

        TableView {
            title: self.title.clone(),
            headers,
            body,
            rows,
            pagination,
            search: state.search.clone(),
            filters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> Table {
        Table::new(
            "Data Elements",
            vec![
                Column::key("Name", "de_name"),
                Column::key("Type", "de_data_type"),
                Column::key("Core Identifier", "is_core_identifier")
                    .render(|v, _| Some(if v.as_bool() == Some(false) { "no" } else { "yes" }.to_string())),
            ],
        )
        .row_route(|row| row.get("de_id").and_then(Value::as_str).map(|id| format!("/apps/data-element/details/{}", id)))
    }

    #[test]
    fn falsy_values_render_placeholder() {
        let column = Column::key("Name", "name");
        for row in [json!({}), json!({"name": null}), json!({"name": ""}), json!({"name": "  "}), json!({"name": []}), json!({"name": {}})] {
            assert_eq!(column.cell(&row), PLACEHOLDER, "row {}", row);
        }
        assert_eq!(column.cell(&json!({"name": 0})), "0");
        assert_eq!(column.cell(&json!({"name": false})), "false");
    }

    #[test]
    fn custom_render_sees_value_and_row() {
        let column = Column::key("Name", "de_name").render(|v, row| {
            Some(format!("{} ({})", v.as_str()?, row.get("de_description")?.as_str()?))
        });
        assert_eq!(column.cell(&json!({"de_name": "email", "de_description": "work"})), "email (work)");
        assert_eq!(column.cell(&json!({"de_name": "email"})), PLACEHOLDER);
    }

    #[test]
    fn arrays_are_joined() {
        let column = Column::computed("Tags", |row| row["tags"].clone());
        assert_eq!(column.cell(&json!({"tags": ["a", null, "b"]})), "a, b");
    }

    #[test]
    fn rows_are_projected_with_serials_and_routes() {
        let mut state = TableState::new(20).at_page(2);
        state.total_pages = 3;
        let rows = vec![
            json!({"de_id": "d1", "de_name": "email", "de_data_type": "string", "is_core_identifier": true}),
            json!({"de_name": "phone", "is_core_identifier": false}),
        ];

        let view = table().view(&rows, &state);
        assert_eq!(view.body, Body::Rows);
        assert_eq!(view.headers[0].label, "#");
        assert_eq!(view.rows[0].serial, Some(21));
        assert_eq!(view.rows[0].cells, vec!["email", "string", "yes"]);
        assert_eq!(view.rows[0].route.as_deref(), Some("/apps/data-element/details/d1"));
        assert_eq!(view.rows[1].cells, vec!["phone", PLACEHOLDER, "no"]);
        assert_eq!(view.rows[1].route, None);

        let pagination = view.pagination.unwrap();
        assert_eq!(pagination.current_page, 2);
        assert!(pagination.has_prev && pagination.has_next);
    }

    #[test]
    fn loading_wins_over_rows_and_empty() {
        let mut state = TableState::new(20);
        state.loading = true;
        let view = table().view(&[json!({"de_name": "x"})], &state);
        assert_eq!(view.body, Body::Loading { skeleton_rows: 20 });
        assert!(view.rows.is_empty());
    }

    #[test]
    fn empty_state_uses_configured_text() {
        let view = table().empty_text("No Data Element Available").view(&[], &TableState::new(20));
        assert_eq!(
            view.body,
            Body::Empty {
                text: "No Data Element Available".to_string()
            }
        );
        assert!(view.pagination.is_none());
    }

    #[test]
    fn filter_selection_is_reflected() {
        let mut state = TableState::new(10);
        state.filters.add("status", "published");
        let view = table()
            .filter_details(vec![FilterDetail::new("status", "Status", &["draft", "published", "archived"])])
            .view(&[], &state);
        assert_eq!(view.filters[0].selected, vec!["published".to_string()]);
    }
}
