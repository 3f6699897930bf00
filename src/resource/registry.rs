//! The admin console's list pages: endpoint contract, columns, row links.

use chrono::DateTime;
use serde_json::Value;

use super::{PageContract, PaginatedResource};
use crate::config::TableConfig;
use crate::table::{display_value, Column, FilterDetail, Table, TableState};

#[derive(Clone)]
pub struct ResourceDef {
    pub name: &'static str,
    /// Console page path; the route guard authorizes this path.
    pub route: &'static str,
    pub contract: PageContract,
    pub table: Table,
}

impl std::fmt::Debug for ResourceDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceDef")
            .field("name", &self.name)
            .field("route", &self.route)
            .field("endpoint", &self.contract.endpoint)
            .finish()
    }
}

impl ResourceDef {
    fn new(name: &'static str, route: &'static str, contract: PageContract, table: Table) -> Self {
        Self {
            name,
            route,
            contract,
            table,
        }
    }

    pub fn with_layout(mut self, config: &TableConfig) -> Self {
        self.table = self.table.with_layout(config);
        self
    }

    pub fn resource(&self, state: TableState) -> PaginatedResource {
        PaginatedResource::new(self.contract.clone(), state)
    }
}

pub fn find(name: &str) -> Option<ResourceDef> {
    registry().into_iter().find(|def| def.name == name)
}

pub fn find_by_route(path: &str) -> Option<ResourceDef> {
    let path = path.trim_end_matches('/');
    registry().into_iter().find(|def| def.route == path)
}

pub fn names() -> Vec<&'static str> {
    registry().iter().map(|def| def.name).collect()
}

fn date(value: &Value, _row: &Value) -> Option<String> {
    let raw = value.as_str()?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => Some(parsed.format("%d %b %Y").to_string()),
        Err(_) => Some(raw.to_string()),
    }
}

fn yes_no(value: &Value, _row: &Value) -> Option<String> {
    value.as_bool().map(|b| if b { "Yes" } else { "No" }.to_string())
}

// Lists of objects show one named field per item.
fn names_of(field: &'static str) -> impl Fn(&Value, &Value) -> Option<String> + Send + Sync {
    move |value, _row| {
        let items = value.as_array()?;
        let names: Vec<String> = items
            .iter()
            .filter_map(|item| match item {
                Value::Object(_) => item.get(field).and_then(display_value),
                other => display_value(other),
            })
            .collect();
        (!names.is_empty()).then(|| names.join(", "))
    }
}

fn route_by(key: &'static str, prefix: &'static str, suffix: &'static str) -> impl Fn(&Value) -> Option<String> + Send + Sync {
    move |row| {
        let id = row.get(key).and_then(display_value)?;
        Some(format!("{}/{}{}", prefix, id, suffix))
    }
}

pub fn registry() -> Vec<ResourceDef> {
    vec![
        ResourceDef::new(
            "data-elements",
            "/apps/data-element",
            PageContract::current_page_style("/data-elements/get-all-data-element", "data_elements"),
            Table::new(
                "Data Elements",
                vec![
                    Column::key("Name", "de_name"),
                    Column::key("Original Name", "de_original_name"),
                    Column::key("Type", "de_data_type"),
                    Column::key("Core Identifier", "is_core_identifier").render(yes_no),
                    Column::key("Sensitivity", "de_sensitivity"),
                    Column::key("Status", "de_status"),
                ],
            )
            .row_route(route_by("de_id", "/apps/data-element", "?type=edit"))
            .empty_text("No Data Element Available"),
        ),
        ResourceDef::new(
            "purposes",
            "/apps/purpose-management",
            PageContract::current_page_style("/purposes/get-all-purposes", "purposes").current_page_key("current_page"),
            Table::new(
                "Purposes",
                vec![
                    Column::key("Statement", "purpose_title"),
                    Column::key("Data Element", "data_elements").render(names_of("de_name")),
                    Column::key("Category", "purpose_category"),
                    Column::key("Priority", "purpose_priority"),
                    Column::key("Time Period", "consent_time_period"),
                    Column::key("Status", "purpose_status"),
                ],
            )
            .row_route(route_by("purpose_id", "/apps/purpose-management", ""))
            .filter_details(vec![
                FilterDetail::new("purpose_status", "Status", &["draft", "published", "archived"]),
                FilterDetail::new("purpose_priority", "Priority", &["low", "medium", "high"]),
            ])
            .empty_text("No Purpose Available"),
        ),
        ResourceDef::new(
            "collection-points",
            "/apps/collection-point",
            PageContract::current_page_style("/cp/get-all-cps", "collection_points").current_page_key("current_page"),
            Table::new(
                "Collection Points",
                vec![
                    Column::key("Name", "cp_name"),
                    Column::key("Description", "cp_description"),
                    Column::key("Data Elements", "data_elements").render(names_of("de_name")),
                    Column::key("Language", "default_language"),
                    Column::key("Status", "cp_status"),
                ],
            )
            .row_route(route_by("cp_id", "/apps/collection-point", "?type=edit"))
            .empty_text("No Collection Point Available"),
        ),
        ResourceDef::new(
            "webhooks",
            "/apps/webhook-management",
            PageContract::current_page_style("/webhooks/get-all-webhooks", "webhooks"),
            Table::new(
                "Webhooks",
                vec![
                    Column::key("URL", "url"),
                    Column::key("Subscribed Events", "subscribed_events"),
                    Column::key("Environment", "environment"),
                    Column::key("Status", "status"),
                ],
            )
            .empty_text("No Web hooks Available"),
        ),
        ResourceDef::new(
            "roles",
            "/apps/organization-management/roles",
            PageContract::page_limit_style("/roles/get-all-roles", "data"),
            Table::new(
                "Roles",
                vec![Column::key("Name", "role_name"), Column::key("Description", "role_description")],
            ),
        ),
        ResourceDef::new(
            "departments",
            "/apps/organization-management/departments",
            PageContract::page_limit_style("/departments/get-all-departments", "data"),
            Table::new(
                "Departments",
                vec![
                    Column::key("Name", "department_name"),
                    Column::key("Description", "department_description"),
                ],
            ),
        ),
        ResourceDef::new(
            "users",
            "/apps/organization-management/users",
            PageContract::page_size_style("/auth/get-df-users", "data").search("search"),
            Table::new(
                "Users",
                vec![
                    Column::computed("User Name", |row| {
                        let first = row.get("first_name").and_then(Value::as_str).unwrap_or("");
                        let last = row.get("last_name").and_then(Value::as_str).unwrap_or("");
                        Value::String(format!("{} {}", first, last).trim().to_string())
                    }),
                    Column::key("Email", "email"),
                    Column::key("Designation", "designation"),
                    Column::key("Contact", "contact"),
                ],
            ),
        ),
        ResourceDef::new(
            "data-principals",
            "/apps/principal-management",
            PageContract::page_limit_style("/data-principal/get-all-data-principals", "dataPrincipals")
                .search("search")
                .total_pages_key("totalPages")
                .total_count_key("totalPrincipals"),
            Table::new(
                "Data Principals",
                vec![
                    Column::key("DP ID", "dp_id"),
                    Column::key("Email", "dp_email"),
                    Column::key("Mobile", "dp_mobile"),
                    Column::key("Country", "dp_country"),
                    Column::key("State", "dp_state"),
                    Column::key("Language", "dp_preferred_lang"),
                    Column::key("Legacy", "is_legacy").render(yes_no),
                    Column::key("Consents", "consent_count"),
                ],
            )
            .row_route(route_by("dp_id", "/apps/principal-management", ""))
            .filter_details(vec![
                FilterDetail::new("dp_tags", "Tags", &[]),
                FilterDetail::new("is_legacy", "Legacy", &["true", "false"]),
            ])
            .empty_text("No Data Principal Available"),
        ),
        ResourceDef::new(
            "grievances",
            "/apps/grievances",
            PageContract::page_size_style("/grievances/view-all-grievances", "data")
                .total_pages_key("pagination.pages")
                .current_page_key("pagination.page")
                .total_count_key("pagination.total"),
            Table::new(
                "Grievances",
                vec![
                    Column::key("Subject", "subject"),
                    Column::key("Email", "email"),
                    Column::key("Mobile", "mobile_number"),
                    Column::key("Data Principal Type", "dp_type"),
                    Column::key("Status", "request_status"),
                    Column::key("Created At", "created_at").render(date),
                ],
            )
            .row_route(route_by("_id", "/apps/grievances", ""))
            .empty_text("No Grievances Available"),
        ),
        ResourceDef::new(
            "incidents",
            "/apps/breach-management",
            PageContract::page_size_style("/incidents/get-all-incidents", "incidents")
                .total_pages_key("pagination.totalPages"),
            Table::new(
                "Breaches",
                vec![
                    Column::key("Breach Name", "incident_name"),
                    Column::key("Breach Type", "incident_type"),
                    Column::key("Breach Severity", "incident_sensitivity"),
                    Column::key("Current Stage", "current_stage"),
                    Column::key("Status", "status"),
                    Column::key("Date Discovered", "date_discovered").render(date),
                    Column::key("Deadline", "deadline").render(date),
                ],
            )
            .row_route(route_by("_id", "/apps/breach-management", ""))
            .empty_text("No Breaches Available"),
        ),
        ResourceDef::new(
            "notice-notifications",
            "/apps/principal-management/consent",
            PageContract::page_limit_style("/notice-notification/get-all-notice-notifications", "notifications")
                .total_pages_key("pagination.total_pages")
                .current_page_key("pagination.current_page"),
            Table::new(
                "Notice Notifications",
                vec![
                    Column::key("Email", "dp_email"),
                    Column::key("Mobile", "dp_mobile"),
                    Column::key("Notice", "notice_name"),
                    Column::key("Medium", "notification_medium"),
                    Column::computed("Consent Status", |row| match row.get("notification_status") {
                        Some(Value::String(status)) if status == "sent" => Value::String("Pending".to_string()),
                        Some(other) => other.clone(),
                        None => Value::Null,
                    }),
                    Column::key("Sent At", "sent_at").render(date),
                ],
            ),
        ),
    ]
}
