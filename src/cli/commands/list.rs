use clap::Args;
use serde_json::{json, Value};

use crate::cli::utils::{output_table, require_token, session_client};
use crate::cli::OutputFormat;
use crate::config;
use crate::resource::{self, FetchOutcome, ResourceDef};
use crate::table::{Filters, TableState};

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(help = "List page name (see 'cmp pages')")]
    pub resource: String,

    #[arg(long, default_value_t = 1, help = "Page number, starting at 1")]
    pub page: u32,

    #[arg(long, help = "Rows per page (10, 20, 50 or 100)")]
    pub size: Option<u32>,

    #[arg(long, help = "Search term, for lists that support it")]
    pub search: Option<String>,

    #[arg(long = "filter", value_name = "KEY=VALUE", help = "Filter; repeat for several values")]
    pub filters: Vec<String>,
}

/// Registry entry for `name`, laid out with the configured table settings.
pub fn resolve(name: &str) -> anyhow::Result<ResourceDef> {
    let def = resource::find(name).ok_or_else(|| {
        anyhow::anyhow!("Unknown list '{}'. Known lists: {}", name, resource::registry::names().join(", "))
    })?;
    Ok(def.with_layout(&config::config().table))
}

/// Validated rows-per-page value; falls back to the configured default.
pub fn page_size(size: Option<u32>) -> anyhow::Result<u32> {
    let table = &config::config().table;
    let size = size.unwrap_or(table.default_rows_per_page);
    if !table.rows_per_page_options.contains(&size) {
        anyhow::bail!("Rows per page must be one of {:?}", table.rows_per_page_options);
    }
    Ok(size)
}

pub async fn handle(args: ListArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let def = resolve(&args.resource)?;
    let filters = Filters::parse_args(&args.filters).map_err(|e| anyhow::anyhow!(e))?;

    let mut state = TableState::new(page_size(args.size)?).at_page(args.page);
    if let Some(search) = args.search {
        state.search = search;
    }
    state.filters = filters;

    let (session, client) = session_client()?;
    require_token(session.as_ref())?;

    let list = def.resource(state);
    if let FetchOutcome::Applied(snapshot) = list.refresh(&client).await? {
        if snapshot.state.current_page != args.page {
            tracing::info!(
                "Page {} does not exist, showing page {} of {}",
                args.page,
                snapshot.state.current_page,
                snapshot.state.total_pages
            );
        }
    }

    output_table(&output_format, &list.view(&def.table))
}

pub fn pages(output_format: OutputFormat) -> anyhow::Result<()> {
    let defs = resource::registry();
    match output_format {
        OutputFormat::Json => {
            let pages: Vec<Value> = defs
                .iter()
                .map(|def| {
                    json!({
                        "name": def.name,
                        "title": def.table.title(),
                        "route": def.route,
                        "endpoint": def.contract.endpoint,
                        "page_param": def.contract.page_param,
                        "size_param": def.contract.size_param,
                        "search": def.contract.search_param.is_some(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json!({ "pages": pages }))?);
        }
        OutputFormat::Text => {
            let width = defs.iter().map(|d| d.name.len()).max().unwrap_or(0);
            for def in &defs {
                println!("{:width$}  {:<24}  {}", def.name, def.table.title(), def.contract.endpoint, width = width);
            }
        }
    }
    Ok(())
}
