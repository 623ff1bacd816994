use std::net::SocketAddr;
use std::os::fd::{FromRawFd, RawFd};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod config;
mod policy;
mod proxy;
mod systemd;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config_path: PathBuf = std::env::args_os()
        .nth(1)
        .map(Into::into)
        .unwrap_or_else(|| PathBuf::from("./config.toml"));
    let settings: Arc<config::Settings> = Arc::new(config::load(&config_path)?);
    let policy = Arc::new(policy::init(&settings)?);
    if policy.is_empty() {
        info!("access policy is empty; all destinations are allowed");
    } else {
        info!("access policy holds {} blocked hostnames", policy.len());
    }

    let listener = acquire_listener(&settings).await?;
    info!("listening on {}", listener.local_addr()?);

    if let Err(err) = systemd::notify_ready() {
        debug!("systemd readiness notification skipped: {err}");
    }

    proxy::start(settings, policy, listener).await
}

/// Prefer a socket handed over by systemd socket activation (named `proxy`);
/// bind from the configuration otherwise.
async fn acquire_listener(settings: &config::Settings) -> Result<TcpListener> {
    if let Some(&fd) = systemd::listen_fds_named().get("proxy") {
        return listener_from_fd(fd);
    }
    let addr = SocketAddr::new(settings.listen_address, settings.listen_port);
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("while binding {addr}"))
}

fn listener_from_fd(fd: RawFd) -> Result<TcpListener> {
    // The fd is owned by this process alone under the LISTEN_FDS protocol.
    let std_listener = unsafe { std::net::TcpListener::from_raw_fd(fd) };
    std_listener.set_nonblocking(true)?;
    TcpListener::from_std(std_listener).context("while adopting the activated socket")
}
