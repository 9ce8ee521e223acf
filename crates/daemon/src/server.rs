// SPDX-License-Identifier: MIT

//! Unix-socket listener: accepts connections and dispatches each request to
//! the `JobSupervisor`, spawning one task per connection so a slow or
//! misbehaving client can't stall anyone else.

use std::sync::Arc;

use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, warn};

use crate::protocol::{self, Request, Response, DEFAULT_TIMEOUT};
use crate::supervisor::JobSupervisor;

pub struct Server {
    socket: UnixListener,
    supervisor: Arc<JobSupervisor>,
}

impl Server {
    pub fn new(socket: UnixListener, supervisor: Arc<JobSupervisor>) -> Self {
        Self { socket, supervisor }
    }

    /// Runs the accept loop forever. Intended to be raced against a shutdown
    /// signal by the caller (`main`), which simply drops the future.
    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, _addr)) => {
                    let supervisor = self.supervisor.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &supervisor).await {
                            match e {
                                protocol::ProtocolError::ConnectionClosed => debug!("client disconnected"),
                                protocol::ProtocolError::Timeout => warn!("connection timed out"),
                                other => error!(error = %other, "connection error"),
                            }
                        }
                    });
                }
                Err(e) => error!(error = %e, "accept failed"),
            }
        }
    }
}

async fn handle_connection(stream: UnixStream, supervisor: &JobSupervisor) -> Result<(), protocol::ProtocolError> {
    let (mut reader, mut writer) = stream.into_split();
    let request = protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await?;

    if matches!(request, Request::Status { .. } | Request::Output { .. } | Request::Ping) {
        debug!(request = ?request, "received request");
    } else {
        tracing::info!(request = ?request, "received request");
    }

    let response = dispatch(request, supervisor).await;
    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await
}

async fn dispatch(request: Request, supervisor: &JobSupervisor) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Start { prompt, session_key, has_credentials, credentials_source } => {
            let req = crate::types::StartRequest { prompt, session_key, has_credentials, credentials_source };
            match supervisor.start(req).await {
                Ok(result) => Response::Start { result },
                Err(e) => Response::from_api_error(&e),
            }
        }

        Request::Status { job_id, session_key } => match supervisor.status(&job_id, session_key).await {
            Ok(result) => Response::Status { result },
            Err(e) => Response::from_api_error(&e),
        },

        Request::Output { job_id, session_key, offset, limit } => {
            match supervisor.output(&job_id, session_key, offset, limit).await {
                Ok(result) => result.into(),
                Err(e) => Response::from_api_error(&e),
            }
        }

        Request::Cancel { job_id, session_key } => match supervisor.cancel(&job_id, session_key).await {
            Ok(message) => Response::Cancel { message },
            Err(e) => Response::from_api_error(&e),
        },

        Request::Cleanup { delete_workspaces } => match supervisor.cleanup(delete_workspaces).await {
            Ok(result) => Response::Cleanup { result },
            Err(e) => Response::from_api_error(&e),
        },

        Request::Sessions => Response::Sessions { sessions: supervisor.sessions().await },
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
