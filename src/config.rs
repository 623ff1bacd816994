use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[serde_with::serde_as]
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    /// Address the proxy listens on when not socket-activated.
    #[serde(default = "default_listen_address")]
    pub listen_address: IpAddr,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Size of the head-read and relay buffers, in bytes.
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,

    /// Hostnames refused by the access policy, exact matches only.
    #[serde(default)]
    pub blocked_hosts: Vec<String>,
    /// Optional file of additional blocked hostnames, one per line.
    pub blocklist_path: Option<PathBuf>,

    /// Upper bound on a single outbound connect attempt.
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Duration,
    /// A relay direction that moves no bytes for this long tears its
    /// session down.
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: Duration,

    /// Cap on concurrently served sessions; accepts beyond it wait in the
    /// listen backlog.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    #[serde(default)]
    pub tcp_nodelay: bool,
}

fn default_listen_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_listen_port() -> u16 {
    8080
}

fn default_read_buffer_size() -> usize {
    4096
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_max_sessions() -> usize {
    100
}

pub fn load(path: &Path) -> anyhow::Result<Settings> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("while reading config file {}", path.display()))?;
    toml::from_str(&contents).context("while parsing config file")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_falls_back_to_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings.listen_port, 8080);
        assert_eq!(settings.read_buffer_size, 4096);
        assert_eq!(settings.max_sessions, 100);
        assert_eq!(settings.connect_timeout, Duration::from_secs(10));
        assert_eq!(settings.idle_timeout, Duration::from_secs(300));
        assert!(settings.blocked_hosts.is_empty());
        assert!(settings.blocklist_path.is_none());
        assert!(!settings.tcp_nodelay);
    }

    #[test]
    fn timeouts_are_given_in_seconds() {
        let settings: Settings = toml::from_str(
            "listen-port = 3128\nconnect-timeout = 3\nidle-timeout = 60\nblocked-hosts = [\"www.example.com\"]\n",
        )
        .unwrap();
        assert_eq!(settings.listen_port, 3128);
        assert_eq!(settings.connect_timeout, Duration::from_secs(3));
        assert_eq!(settings.idle_timeout, Duration::from_secs(60));
        assert_eq!(settings.blocked_hosts, vec!["www.example.com".to_string()]);
    }
}
