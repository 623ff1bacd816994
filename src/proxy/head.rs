use std::fmt;

/// The host/port pair a client asked to reach. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// What the first bytes of a client connection asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestHead {
    /// `CONNECT host:port` — open a raw tunnel and relay opaque bytes.
    Tunnel { destination: Destination },
    /// A plain HTTP request — forward it to the origin named by its `Host:`
    /// header, port 80.
    Forward { destination: Destination },
}

impl RequestHead {
    pub fn destination(&self) -> &Destination {
        match self {
            RequestHead::Tunnel { destination } | RequestHead::Forward { destination } => {
                destination
            }
        }
    }
}

/// Extract the destination from the first read off a client connection.
///
/// This is deliberately not an HTTP parser; a tolerant line scanner is all
/// the request head needs. Any failure, including non-UTF-8 input, yields
/// `None` and never escapes as a panic or error.
pub fn parse(raw: &[u8]) -> Option<RequestHead> {
    let text = std::str::from_utf8(raw).ok()?;
    let first_line = text.lines().next()?;
    let mut tokens = first_line.split_whitespace();

    if tokens.next() == Some("CONNECT") {
        let destination = parse_authority(tokens.next()?)?;
        return Some(RequestHead::Tunnel { destination });
    }

    // The first `Host:` line decides; its value is taken verbatim, so a
    // port-suffixed value stays part of the host string.
    for line in text.lines() {
        let Some(name) = line.get(..5) else { continue };
        if !name.eq_ignore_ascii_case("host:") {
            continue;
        }
        let host = line[5..].split_whitespace().next()?;
        return Some(RequestHead::Forward {
            destination: Destination {
                host: host.to_owned(),
                port: 80,
            },
        });
    }

    None
}

/// Parse a `host:port` authority token: split on the last colon, base-10
/// port in [1, 65535], non-empty host.
fn parse_authority(token: &str) -> Option<Destination> {
    let (host, port) = token.rsplit_once(':')?;
    let port: u16 = port.parse().ok()?;
    if host.is_empty() || port == 0 {
        return None;
    }
    Some(Destination {
        host: host.to_owned(),
        port,
    })
}
