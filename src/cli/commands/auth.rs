use std::io::{self, BufRead, Write};

use chrono::{DateTime, Utc};
use clap::Subcommand;
use serde_json::json;

use crate::auth::{self, LoginOutcome, TokenError};
use crate::cli::utils::{output_fields, output_success, require_token, session_client};
use crate::cli::OutputFormat;
use crate::config;
use crate::session::{Session, SessionCookie, SessionStore};

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Login to the CMP backend")]
    Login {
        #[arg(help = "Email")]
        email: String,
        #[arg(long, help = "Password (will prompt if not provided)")]
        password: Option<String>,
    },

    #[command(about = "Forget the stored session")]
    Logout,

    #[command(about = "Show current authentication status")]
    Status,

    #[command(about = "Show the claims of the stored token")]
    Whoami,
}

fn prompt_password() -> anyhow::Result<String> {
    eprint!("Password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn next_step(outcome: LoginOutcome) -> &'static str {
    let guard = &config::config().guard;
    match outcome {
        LoginOutcome::ResetPassword => guard.password_reset_path.as_str(),
        LoginOutcome::OrgSetup => guard.org_setup_path.as_str(),
        LoginOutcome::Ready => guard.landing_path.as_str(),
    }
}

fn timestamp(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AuthCommands::Login { email, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password()?,
            };
            let (session, client) = session_client()?;

            // A stale token must not ride along on the login call.
            session.clear()?;

            let answer = auth::login(&client, email.trim(), &password).await?;
            session.set(SessionCookie::Email, email.trim())?;
            let outcome = answer.store(session.as_ref())?;
            tracing::info!("Logged in as {}", email.trim());

            let message = match outcome {
                LoginOutcome::Ready => format!("Logged in as {}", email.trim()),
                LoginOutcome::ResetPassword => format!("Logged in as {}; the password must be reset first", email.trim()),
                LoginOutcome::OrgSetup => format!("Logged in as {}; the organization is not set up yet", email.trim()),
            };
            output_success(
                &output_format,
                &message,
                Some(json!({
                    "outcome": outcome,
                    "next": next_step(outcome),
                    "session_file": session.path(),
                })),
            )
        }
        AuthCommands::Logout => {
            let (session, _) = session_client()?;
            session.clear()?;
            output_success(&output_format, "Logged out", None)
        }
        AuthCommands::Status => {
            let (session, _) = session_client()?;
            let view = Session::from_store(session.as_ref());

            let (authenticated, expires_at, problem) = match view.bearer_token() {
                None => (false, None, Some("no token stored".to_string())),
                Some(token) => match auth::check_expiry(token) {
                    Ok(claims) => (true, Some(timestamp(claims.exp)), None),
                    Err(TokenError::Expired(exp)) => (false, Some(timestamp(exp)), Some("token expired".to_string())),
                    Err(e) => (false, None, Some(e.to_string())),
                },
            };

            output_fields(
                &output_format,
                json!({
                    "authenticated": authenticated,
                    "email": view.email,
                    "expires_at": expires_at,
                    "org_setup_pending": view.is_not_org_setup,
                    "password_reset_pending": view.is_not_password_set,
                    "invited_user": view.is_invited_user,
                    "problem": problem,
                }),
            )
        }
        AuthCommands::Whoami => {
            let (session, _) = session_client()?;
            let token = require_token(session.as_ref())?;
            let claims = auth::decode_unverified(&token)?;
            output_fields(
                &output_format,
                json!({
                    "sub": claims.sub,
                    "email": claims.email,
                    "roles": claims.user_roles,
                    "expires_at": timestamp(claims.exp),
                }),
            )
        }
    }
}
