use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::cli::OutputFormat;
use crate::client::ApiClient;
use crate::session::{FileSession, SessionStore};
use crate::table::render::render_text;
use crate::table::TableView;

/// The persisted CLI session and a client that sends its token.
pub fn session_client() -> anyhow::Result<(Arc<FileSession>, ApiClient)> {
    let session = Arc::new(FileSession::open_default()?);
    let client = ApiClient::from_env(session.clone())?;
    Ok((session, client))
}

/// Token of the persisted session, or an error telling the user to log in.
pub fn require_token(session: &dyn SessionStore) -> anyhow::Result<String> {
    session
        .token()
        .ok_or_else(|| anyhow::anyhow!("Not logged in. Run 'cmp auth login <email>' first"))
}

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = Map::new();
            response.insert("success".to_string(), json!(true));
            response.insert("message".to_string(), json!(message));
            match data {
                Some(Value::Object(fields)) => response.extend(fields),
                Some(other) => {
                    response.insert("data".to_string(), other);
                }
                None => {}
            }
            println!("{}", serde_json::to_string_pretty(&Value::Object(response))?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(output_format: &OutputFormat, message: &str, error_code: Option<&str>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// Output a table view: aligned text, or the view itself as JSON.
pub fn output_table(output_format: &OutputFormat, view: &TableView) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(view)?),
        OutputFormat::Text => print!("{}", render_text(view)),
    }
    Ok(())
}

/// Output `key: value` lines, or the object as JSON.
pub fn output_fields(output_format: &OutputFormat, fields: Value) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&fields)?),
        OutputFormat::Text => {
            if let Value::Object(map) = &fields {
                let width = map.keys().map(|k| k.len()).max().unwrap_or(0);
                for (key, value) in map {
                    let shown = match value {
                        Value::String(s) => s.clone(),
                        Value::Null => "-".to_string(),
                        other => other.to_string(),
                    };
                    println!("{:width$}  {}", key, shown, width = width);
                }
            } else {
                println!("{}", fields);
            }
        }
    }
    Ok(())
}
