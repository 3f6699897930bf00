use std::sync::Arc;

use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use super::list::{page_size, resolve};
use crate::cli::utils::{output_error, output_table, require_token, session_client};
use crate::cli::OutputFormat;
use crate::client::ApiClient;
use crate::config;
use crate::debounce::debounced;
use crate::error::ApiError;
use crate::resource::{FetchOutcome, PaginatedResource};
use crate::table::TableState;

#[derive(Args, Debug)]
pub struct BrowseArgs {
    #[arg(help = "List page name (see 'cmp pages')")]
    pub resource: String,

    #[arg(long, help = "Rows per page (10, 20, 50 or 100)")]
    pub size: Option<u32>,
}

/// One line typed at the browse prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseCommand {
    Next,
    Prev,
    Goto(u32),
    Size(u32),
    /// `/text` searches; a lone `/` clears the search.
    Search(String),
    Filter(String, String),
    ClearFilters,
    Refresh,
    Help,
    Quit,
    Invalid(String),
}

impl BrowseCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if let Some(term) = line.strip_prefix('/') {
            return BrowseCommand::Search(term.trim().to_string());
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word {
            "n" | "next" | "" => BrowseCommand::Next,
            "p" | "prev" => BrowseCommand::Prev,
            "r" | "refresh" => BrowseCommand::Refresh,
            "h" | "help" | "?" => BrowseCommand::Help,
            "q" | "quit" | "exit" => BrowseCommand::Quit,
            "clear" => BrowseCommand::ClearFilters,
            "g" | "page" => rest
                .parse()
                .map(BrowseCommand::Goto)
                .unwrap_or_else(|_| BrowseCommand::Invalid(format!("'{}' is not a page number", rest))),
            "size" => rest
                .parse()
                .map(BrowseCommand::Size)
                .unwrap_or_else(|_| BrowseCommand::Invalid(format!("'{}' is not a page size", rest))),
            "f" | "filter" => match rest.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    BrowseCommand::Filter(key.trim().to_string(), value.trim().to_string())
                }
                _ => BrowseCommand::Invalid("filters look like 'f key=value'".to_string()),
            },
            other => BrowseCommand::Invalid(format!("unknown command '{}'", other)),
        }
    }
}

fn print_help() {
    eprintln!("Enter: next page   p: previous   g N: go to page   size N: rows per page");
    eprintln!("/text: search      /: clear search   f key=value: filter   clear: drop filters");
    eprintln!("r: refresh         q: quit");
}

type FetchResult = Result<FetchOutcome, ApiError>;

fn spawn_fetch(list: &Arc<PaginatedResource>, client: &ApiClient, done: &mpsc::UnboundedSender<FetchResult>) {
    let list = list.clone();
    let client = client.clone();
    let done = done.clone();
    tokio::spawn(async move {
        let _ = done.send(list.fetch(&client).await);
    });
}

pub async fn handle(args: BrowseArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let def = resolve(&args.resource)?;
    let table_config = &config::config().table;
    let size = page_size(args.size)?;

    let (session, client) = session_client()?;
    require_token(session.as_ref())?;

    let list = Arc::new(def.resource(TableState::new(size)));
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<FetchResult>();
    let (search, mut settled) = debounced::<String>(table_config.debounce());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print_help();
    spawn_fetch(&list, &client, &done_tx);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let refetch = match BrowseCommand::parse(&line) {
                    BrowseCommand::Quit => break,
                    BrowseCommand::Help => {
                        print_help();
                        false
                    }
                    BrowseCommand::Next => list.update(|s| s.next_page()),
                    BrowseCommand::Prev => list.update(|s| s.prev_page()),
                    BrowseCommand::Goto(page) => list.update(|s| s.set_page(page)),
                    BrowseCommand::Size(size) => {
                        if table_config.rows_per_page_options.contains(&size) {
                            list.update(|s| s.set_rows_per_page(size));
                            true
                        } else {
                            output_error(&output_format, &format!("Rows per page must be one of {:?}", table_config.rows_per_page_options), None)?;
                            false
                        }
                    }
                    BrowseCommand::Search(term) => {
                        search.push(term);
                        false
                    }
                    BrowseCommand::Filter(key, value) => {
                        list.update(|s| {
                            let mut filters = s.filters.clone();
                            filters.add(key, value);
                            s.set_filters(filters);
                        });
                        true
                    }
                    BrowseCommand::ClearFilters => {
                        list.update(|s| s.clear_filters());
                        true
                    }
                    BrowseCommand::Refresh => true,
                    BrowseCommand::Invalid(message) => {
                        output_error(&output_format, &message, Some("INVALID_COMMAND"))?;
                        false
                    }
                };
                if refetch {
                    spawn_fetch(&list, &client, &done_tx);
                }
            }
            Some(term) = settled.recv() => {
                if list.update(|s| s.set_search(term)) {
                    spawn_fetch(&list, &client, &done_tx);
                }
            }
            Some(result) = done_rx.recv() => match result {
                Ok(FetchOutcome::Applied(snapshot)) => {
                    if snapshot.clamped {
                        spawn_fetch(&list, &client, &done_tx);
                    } else {
                        output_table(&output_format, &list.view(&def.table))?;
                    }
                }
                Ok(FetchOutcome::Stale { seq }) => tracing::debug!("Ignoring superseded page (seq {})", seq),
                Err(e) => output_error(&output_format, &e.message(), Some(e.error_code()))?,
            },
        }
    }

    search.finish().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prompt_lines() {
        assert_eq!(BrowseCommand::parse(""), BrowseCommand::Next);
        assert_eq!(BrowseCommand::parse("p"), BrowseCommand::Prev);
        assert_eq!(BrowseCommand::parse("g 4"), BrowseCommand::Goto(4));
        assert_eq!(BrowseCommand::parse("size 50"), BrowseCommand::Size(50));
        assert_eq!(BrowseCommand::parse("/ jane "), BrowseCommand::Search("jane".to_string()));
        assert_eq!(BrowseCommand::parse("/"), BrowseCommand::Search(String::new()));
        assert_eq!(
            BrowseCommand::parse("f dp_tags = vip"),
            BrowseCommand::Filter("dp_tags".to_string(), "vip".to_string())
        );
        assert_eq!(BrowseCommand::parse("q"), BrowseCommand::Quit);
    }

    #[test]
    fn malformed_lines_are_invalid() {
        assert!(matches!(BrowseCommand::parse("g two"), BrowseCommand::Invalid(_)));
        assert!(matches!(BrowseCommand::parse("f nothing"), BrowseCommand::Invalid(_)));
        assert!(matches!(BrowseCommand::parse("jump"), BrowseCommand::Invalid(_)));
    }
}
