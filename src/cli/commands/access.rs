use clap::Args;
use serde_json::json;

use crate::cli::utils::{output_fields, require_token, session_client};
use crate::cli::OutputFormat;
use crate::config;
use crate::middleware::access::batch_check;
use crate::middleware::{AccessChecker, Action, HttpAccessChecker, PermissionSet};

#[derive(Args, Debug)]
pub struct AccessArgs {
    #[arg(help = "Console paths to check, e.g. /apps/data-element")]
    pub paths: Vec<String>,

    #[arg(long, help = "List every permission the session's roles grant")]
    pub list: bool,
}

pub async fn handle(args: AccessArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let (session, client) = session_client()?;
    let token = require_token(session.as_ref())?;
    let permissions = PermissionSet::fetch(&client).await?;

    if args.list || args.paths.is_empty() {
        return match output_format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&permissions)?);
                Ok(())
            }
            OutputFormat::Text => {
                for path in permissions.paths() {
                    let mode = if permissions.can_write(path) { "read/write" } else { "read" };
                    println!("{:<48}  {}", path, mode);
                }
                Ok(())
            }
        };
    }

    if args.paths.len() == 1 {
        let path = &args.paths[0];
        let checker = HttpAccessChecker::new(client.clone(), config::config().guard.access_check_endpoint.clone());
        let allowed = checker.check(&token, path).await?;
        return output_fields(
            &output_format,
            json!({
                "path": path,
                "access": allowed,
                "can_read": permissions.can_read(path),
                "can_write": permissions.can_write(path),
            }),
        );
    }

    let results = batch_check(&client, &args.paths, Action::Read).await?;
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&json!({ "access": results }))?),
        OutputFormat::Text => {
            for (path, allowed) in &results {
                let write = if permissions.can_write(path) { ", write" } else { "" };
                println!("{:<48}  {}{}", path, if *allowed { "allowed" } else { "denied" }, write);
            }
        }
    }
    Ok(())
}
