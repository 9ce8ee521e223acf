// SPDX-License-Identifier: MIT

//! `wardend`: the container job supervisor daemon.
//!
//! Typically started by the `warden` CLI on first use and left running in
//! the background; listens on a Unix socket for the six API operations.

use std::fs::File;
use std::io::Write;
use std::sync::Arc;

use fs2::FileExt;
use tokio::net::UnixListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;
use warden_adapters::{DockerRuntime, NoopNotifier, Notifier, WebhookNotifier};
use warden_core::{Clock, SystemClock};
use warden_daemon::{Config, JobSupervisor, OrphanReconciler, Server};
use warden_storage::{FsStore, Layout, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    for dir in [&config.sessions_dir, &config.workspaces_dir] {
        std::fs::create_dir_all(dir)?;
    }
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let _lock_file = acquire_lock(&config)?;
    let _log_guard = setup_logging(&config)?;

    info!(socket = %config.socket_path.display(), "starting wardend");

    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)?;

    let layout = Layout::new(config.sessions_dir.clone(), config.workspaces_dir.clone());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store: Arc<dyn Store> = Arc::new(FsStore::new(layout, clock.clone()));
    let runtime: Arc<dyn warden_adapters::Runtime> = Arc::new(DockerRuntime::new());
    let notifier: Arc<dyn Notifier> = match &config.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
        None => Arc::new(NoopNotifier),
    };

    let reconciler = OrphanReconciler::new(store.clone(), runtime.clone(), clock.clone());
    reconciler.run().await;

    let supervisor = Arc::new(JobSupervisor::new(store, runtime, notifier, clock, config.clone()));
    let server = Server::new(listener, supervisor);

    info!("wardend ready");
    println!("READY");

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        () = server.run() => {}
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    let _ = std::fs::remove_file(&config.socket_path);
    let _ = std::fs::remove_file(&config.lock_path);

    info!("wardend stopped");
    Ok(())
}

/// Acquires the single-instance lock, writing our PID into it. The file
/// handle is held for the process lifetime; the OS releases the lock when it
/// closes, including on crash.
fn acquire_lock(config: &Config) -> Result<File, Box<dyn std::error::Error>> {
    let mut lock_file = std::fs::OpenOptions::new().write(true).create(true).truncate(false).open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(|e| format!("wardend already running: {e}"))?;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    Ok(lock_file)
}

fn setup_logging(config: &Config) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = config.log_path.parent().unwrap_or_else(|| std::path::Path::new("."));
    let file_name = config.log_path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("wardend.log"));
    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = std::env::var("WARDEN_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok()
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(non_blocking)).init();
    Ok(guard)
}
