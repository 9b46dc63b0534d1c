use serde::{Deserialize, Serialize};

/// A named, persisted configuration template.
///
/// Addresses and durations are kept in their string form so an alias file
/// stays readable and editable by hand; they are parsed when the alias is
/// merged into a [`Configuration`](super::Configuration).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Alias {
    pub name: String,
    pub tunnel_type: String,
    pub verbose: bool,
    pub insecure: bool,
    pub detach: bool,
    pub source: Vec<String>,
    pub destination: Vec<String>,
    pub server: String,
    pub key: String,
    pub keep_alive_interval: String,
    pub connection_retries: u32,
    pub wait_and_retry: String,
    pub ssh_agent: String,
    pub timeout: String,
    pub ssh_config: String,
    pub rpc: bool,
    pub rpc_address: String,
}
