use std::collections::HashMap;
use std::env;
use std::os::fd::RawFd;
use std::os::unix::net::UnixDatagram;

use thiserror::Error;

const NOTIFY_SOCKET_PATH: &str = "/run/systemd/notify";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to create an unbound UNIX datagram socket: {0}")]
    Create(std::io::Error),
    #[error("failed to connect to the systemd notify socket: {0}")]
    Connect(std::io::Error),
    #[error("failed to send to the systemd notify socket: {0}")]
    Send(std::io::Error),
}

/// Tell systemd the proxy is ready to serve.
pub fn notify_ready() -> Result<(), NotifyError> {
    let sock = UnixDatagram::unbound().map_err(NotifyError::Create)?;
    sock.connect(NOTIFY_SOCKET_PATH)
        .map_err(NotifyError::Connect)?;
    sock.send(b"READY=1").map_err(NotifyError::Send)?;
    Ok(())
}

/// Sockets passed by systemd socket activation, keyed by FileDescriptorName.
pub fn listen_fds_named() -> HashMap<String, RawFd> {
    let pid_ok = env::var("LISTEN_PID")
        .map(|v| v == std::process::id().to_string())
        .unwrap_or(false);
    if !pid_ok {
        return HashMap::new();
    }

    let n_fds = env::var("LISTEN_FDS")
        .ok()
        .and_then(|v| v.parse::<i32>().ok())
        .unwrap_or(0);

    let raw_names = env::var("LISTEN_FDNAMES").unwrap_or_default();
    let names: Vec<&str> = raw_names.split(':').collect(); // FDNAMES are colon-separated

    let mut map = HashMap::new();
    for i in 0..n_fds {
        let fd = 3 + i;
        let name = match names.get(i as usize) {
            Some(name) if !name.is_empty() => (*name).to_owned(),
            _ => format!("fd{fd}"),
        };
        map.insert(name, fd);
    }
    map
}
