use std::io::Write;

use clap::Args;
use reqwest::Method;
use serde_json::json;

use crate::cli::utils::{output_success, require_token, session_client};
use crate::cli::OutputFormat;
use crate::client::{ResponseBody, Upload};

#[derive(Args, Debug)]
pub struct UploadArgs {
    #[arg(help = "Backend endpoint, e.g. /data-principal/upload-csv")]
    pub endpoint: String,

    #[arg(help = "File to upload")]
    pub file: std::path::PathBuf,

    #[arg(long, default_value = "file", help = "Form field holding the file")]
    pub field: String,

    #[arg(long = "form", value_name = "KEY=VALUE", help = "Extra text form field; repeatable")]
    pub form: Vec<String>,

    #[arg(long, default_value = "POST", help = "HTTP method")]
    pub method: String,

    #[arg(long, help = "Content type of the file part")]
    pub mime: Option<String>,
}

pub async fn handle(args: UploadArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let (session, client) = session_client()?;
    require_token(session.as_ref())?;

    let method = Method::from_bytes(args.method.to_uppercase().as_bytes())
        .map_err(|_| anyhow::anyhow!("'{}' is not an HTTP method", args.method))?;

    let mut upload = Upload::from_path(&args.file).await?.field(&args.field).method(method);
    if let Some(mime) = &args.mime {
        upload = upload.mime(mime);
    }
    for pair in &args.form {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("form field '{}' must look like key=value", pair))?;
        upload = upload.text(key.trim(), value);
    }

    let bytes = upload.len();
    let show_progress = matches!(output_format, OutputFormat::Text);
    let body = client
        .upload_file(&args.endpoint, upload, move |percent| {
            if show_progress {
                eprint!("\rUploading... {:>3}%", percent);
                let _ = std::io::stderr().flush();
            }
        })
        .await;
    if show_progress {
        eprintln!();
    }
    let body = body?;

    let response = match body {
        ResponseBody::Null => json!(null),
        other => other.to_value(),
    };
    output_success(
        &output_format,
        &format!("Uploaded {} ({} bytes)", args.file.display(), bytes),
        Some(json!({ "response": response })),
    )
}
