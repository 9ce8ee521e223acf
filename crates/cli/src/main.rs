// SPDX-License-Identifier: MIT

//! `warden`: a thin client over `wardend`'s Unix socket.

mod client;
mod daemon_process;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use warden_core::{JobId, SessionKey};
use warden_daemon::{ApiErrorKind, Config, Request, Response};

use client::DaemonClient;

#[derive(Parser)]
#[command(name = "warden", version, about = "Run and supervise container-based coding jobs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a new job with the given prompt.
    Start {
        prompt: String,
        /// Conversation this job continues. Omit to start a fresh session.
        #[arg(long)]
        session: Option<String>,
        /// Directory of credentials to copy into the session's sink.
        #[arg(long, value_name = "DIR")]
        credentials: Option<PathBuf>,
    },
    /// Show a job's current status.
    Status {
        job_id: String,
        #[arg(long)]
        session: Option<String>,
    },
    /// Fetch a slice of a job's output.
    Output {
        job_id: String,
        #[arg(long)]
        session: Option<String>,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        #[arg(long)]
        limit: Option<u64>,
    },
    /// Cancel a running job.
    Cancel {
        job_id: String,
        #[arg(long)]
        session: Option<String>,
    },
    /// Remove sessions that have sat idle past the configured timeout.
    Cleanup {
        /// Also delete the sessions' workspace directories.
        #[arg(long)]
        delete_workspaces: bool,
    },
    /// List known sessions.
    Sessions,
}

#[tokio::main]
async fn main() {
    install_logging();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn install_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = std::env::var("WARDEN_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok()
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Start { prompt, session, credentials } => {
            let request = Request::Start {
                prompt,
                session_key: session.map(SessionKey::new),
                has_credentials: credentials.is_some(),
                credentials_source: credentials,
            };
            let client = DaemonClient::connect_or_start().await?;
            match client.send(&request).await? {
                Response::Start { result } => {
                    println!("job {} started in session {}", result.job_id, result.session_key);
                }
                other => return Err(unexpected_response(other)),
            }
        }

        Command::Status { job_id, session } => {
            let request = Request::Status { job_id: JobId::new(job_id), session_key: session.map(SessionKey::new) };
            let client = DaemonClient::connect_or_start().await?;
            match client.send(&request).await? {
                Response::Status { result } => {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                }
                other => return Err(unexpected_response(other)),
            }
        }

        Command::Output { job_id, session, offset, limit } => {
            let request = Request::Output {
                job_id: JobId::new(job_id),
                session_key: session.map(SessionKey::new),
                offset,
                limit,
            };
            let client = DaemonClient::connect_or_start().await?;
            match client.send(&request).await? {
                Response::Output { header, bytes } => {
                    print!("{header}");
                    use std::io::Write;
                    std::io::stdout().write_all(&bytes)?;
                }
                other => return Err(unexpected_response(other)),
            }
        }

        Command::Cancel { job_id, session } => {
            let request = Request::Cancel { job_id: JobId::new(job_id), session_key: session.map(SessionKey::new) };
            let client = DaemonClient::connect_or_start().await?;
            match client.send(&request).await? {
                Response::Cancel { message } => println!("{message}"),
                other => return Err(unexpected_response(other)),
            }
        }

        Command::Cleanup { delete_workspaces } => {
            let request = Request::Cleanup { delete_workspaces };
            let client = DaemonClient::connect_or_start().await?;
            match client.send(&request).await? {
                Response::Cleanup { result } => {
                    if result.removed.is_empty() {
                        println!("nothing to clean up");
                    } else {
                        for key in &result.removed {
                            println!("removed {key}");
                        }
                    }
                }
                other => return Err(unexpected_response(other)),
            }
        }

        Command::Sessions => {
            let config = Config::load()?;
            let client = DaemonClient::connect(&config).await?;
            match client.send(&Request::Sessions).await? {
                Response::Sessions { sessions } => {
                    println!("{}", serde_json::to_string_pretty(&sessions)?);
                }
                other => return Err(unexpected_response(other)),
            }
        }
    }
    Ok(())
}

fn unexpected_response(response: Response) -> anyhow::Error {
    if let Response::Error { kind, message } = response {
        return anyhow::anyhow!("{}: {message}", describe_error_kind(kind));
    }
    anyhow::anyhow!("unexpected response from wardend: {response:?}")
}

fn describe_error_kind(kind: ApiErrorKind) -> &'static str {
    match kind {
        ApiErrorKind::MissingParameter => "missing parameter",
        ApiErrorKind::SessionNotFound => "session not found",
        ApiErrorKind::JobNotFound => "job not found",
        ApiErrorKind::ActiveJobExists => "active job exists",
        ApiErrorKind::MissingAuthentication => "missing authentication",
        ApiErrorKind::MissingImage => "missing image",
        ApiErrorKind::Store => "storage error",
        ApiErrorKind::SpawnFailed => "spawn failed",
    }
}
