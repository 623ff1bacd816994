mod evaluator;
mod parser;

pub use evaluator::{Access, AccessPolicy};
pub use parser::load_hosts_from_file;

use crate::config::Settings;

/// Build the process-wide access policy from the inline config list and the
/// optional blocklist file, merged.
pub fn init(settings: &Settings) -> anyhow::Result<AccessPolicy> {
    let mut hosts = settings.blocked_hosts.clone();
    if let Some(ref path) = settings.blocklist_path {
        hosts.extend(load_hosts_from_file(path)?);
    }
    Ok(AccessPolicy::new(hosts))
}
