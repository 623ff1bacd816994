use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::config::Settings;
use crate::policy::{Access, AccessPolicy};

mod connector;
mod head;
mod relay;

pub use connector::{Connect, TcpConnector};
pub use head::Destination;

use head::RequestHead;

/// Byte-exact denial response; a blocked client sees this and nothing else.
const FORBIDDEN_RESPONSE: &[u8] = b"HTTP/1.1 403 Forbidden\r\nContent-Type: text/html\r\nContent-Length: 58\r\n\r\n<html><body><h1>403 Forbidden: Access Denied</h1></body></html>";

/// Byte-exact confirmation of an established tunnel, written before any
/// relayed byte.
const CONNECTION_ESTABLISHED: &[u8] = b"HTTP/1.1 200 Connection Established\r\n\r\n";

/// Everything that can end a session early. All variants are local to their
/// session: the accept loop's task logs them and nothing propagates to other
/// sessions or the process.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("client closed the connection before sending a request")]
    ClientDisconnected,
    #[error("no destination could be resolved from the request head")]
    Unresolvable,
    #[error("destination host {0} is blocked")]
    Denied(String),
    #[error("connecting to {destination} failed: {source}")]
    Connect {
        destination: Destination,
        source: std::io::Error,
    },
    #[error("relay failed: {0}")]
    Relay(std::io::Error),
}

/// Accept loop: one task per client connection, capped by `max-sessions`.
pub async fn start(
    settings: Arc<Settings>,
    policy: Arc<AccessPolicy>,
    listener: TcpListener,
) -> anyhow::Result<()> {
    let connector = Arc::new(TcpConnector::from_settings(&settings));
    let admission = Arc::new(Semaphore::new(settings.max_sessions));

    loop {
        let permit = admission.clone().acquire_owned().await?;
        let (socket, peer) = listener.accept().await?;

        let settings = settings.clone();
        let policy = policy.clone();
        let connector = connector.clone();

        tokio::spawn(async move {
            let _permit = permit;
            if settings.tcp_nodelay {
                let _ = socket.set_nodelay(true);
            }
            match handle_session(&settings, &policy, connector.as_ref(), socket, peer).await {
                Ok(()) => {}
                Err(err @ SessionError::Denied(_)) => info!(client = %peer, "{err}"),
                Err(err @ (SessionError::Connect { .. } | SessionError::Relay(_))) => {
                    info!(client = %peer, "session failed: {err}");
                }
                Err(err) => debug!(client = %peer, "session ended: {err}"),
            }
        });
    }
}

/// Drive one client session to completion: read the request head, resolve
/// the destination, apply the access policy, connect outbound, and relay
/// until both sides are done. Returns once every connection the session
/// owned is finished; the owned streams close on every exit path.
///
/// A denied destination is answered with the 403 literal; an unresolvable
/// request or a failed connect closes the client silently. The asymmetry is
/// deliberate: probing clients learn nothing beyond the denial itself.
pub async fn handle_session<S, C>(
    settings: &Settings,
    policy: &AccessPolicy,
    connector: &C,
    mut client: S,
    peer: SocketAddr,
) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    C: Connect,
{
    let mut head_buf = vec![0u8; settings.read_buffer_size];
    let n = timeout(settings.idle_timeout, client.read(&mut head_buf))
        .await
        .map_err(|_| {
            SessionError::Relay(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "request head timed out",
            ))
        })?
        .map_err(SessionError::Relay)?;
    if n == 0 {
        return Err(SessionError::ClientDisconnected);
    }
    let head = &head_buf[..n];

    let request = head::parse(head).ok_or(SessionError::Unresolvable)?;
    let destination = request.destination().clone();

    if let Access::Deny = policy.evaluate(&destination.host) {
        let _ = client.write_all(FORBIDDEN_RESPONSE).await;
        let _ = client.shutdown().await;
        return Err(SessionError::Denied(destination.host));
    }

    let mut server = connector
        .connect(&destination)
        .await
        .map_err(|source| SessionError::Connect {
            destination: destination.clone(),
            source,
        })?;

    match request {
        RequestHead::Tunnel { .. } => {
            client
                .write_all(CONNECTION_ESTABLISHED)
                .await
                .map_err(SessionError::Relay)?;
            debug!(client = %peer, destination = %destination, "tunnel established");

            let (upstream, downstream) = relay::tunnel(
                client,
                server,
                settings.read_buffer_size,
                settings.idle_timeout,
            )
            .await;
            let (sent, received) = match (upstream, downstream) {
                (Ok(sent), Ok(received)) => (sent, received),
                (Err(err), _) | (_, Err(err)) => return Err(SessionError::Relay(err)),
            };
            debug!(client = %peer, destination = %destination, sent, received, "tunnel closed");
        }
        RequestHead::Forward { .. } => {
            server.write_all(head).await.map_err(SessionError::Relay)?;
            debug!(client = %peer, destination = %destination, "request forwarded");

            let received = relay::copy_until_eof(
                &mut server,
                &mut client,
                settings.read_buffer_size,
                settings.idle_timeout,
            )
            .await
            .map_err(SessionError::Relay)?;
            debug!(client = %peer, destination = %destination, received, "response relayed");
        }
    }

    Ok(())
}
