use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::Settings;
use crate::proxy::head::Destination;

/// Seam between session handling and the network: opening the outbound
/// connection. Sessions are generic over this so tests can substitute a
/// recording stub for the real network.
pub trait Connect {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin;

    fn connect(
        &self,
        destination: &Destination,
    ) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Production connector: one TCP connect attempt per session, guarded by the
/// configured timeout. A failure is terminal for its session; there are no
/// retries.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
    nodelay: bool,
}

impl TcpConnector {
    pub fn from_settings(settings: &Settings) -> Self {
        TcpConnector {
            connect_timeout: settings.connect_timeout,
            nodelay: settings.tcp_nodelay,
        }
    }
}

impl Connect for TcpConnector {
    type Stream = TcpStream;

    fn connect(
        &self,
        destination: &Destination,
    ) -> impl Future<Output = io::Result<TcpStream>> + Send {
        let addr = (destination.host.clone(), destination.port);
        let connect_timeout = self.connect_timeout;
        let nodelay = self.nodelay;
        async move {
            let stream = timeout(connect_timeout, TcpStream::connect(addr))
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
            if nodelay {
                stream.set_nodelay(true)?;
            }
            Ok(stream)
        }
    }
}
