//! Runtime configuration of a single instance.

use super::{AddressInput, AddressInputList, Alias};
use crate::config::{IpcConfig, TunnelDefaults};
use crate::{BurrowError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Flag names that keep their explicitly given value over an alias.
pub const FLAG_VERBOSE: &str = "verbose";
pub const FLAG_INSECURE: &str = "insecure";
pub const FLAG_DETACH: &str = "detach";

/// Every parameter needed to run one instance.
///
/// This is also the payload of the `show-instance` RPC method, so the
/// serialized field names are part of the wire contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    pub id: String,
    pub tunnel_type: String,
    pub verbose: bool,
    pub insecure: bool,
    pub detach: bool,
    pub source: AddressInputList,
    pub destination: AddressInputList,
    pub server: AddressInput,
    pub key: String,
    #[serde(with = "humantime_serde")]
    pub keep_alive_interval: Duration,
    pub connection_retries: u32,
    #[serde(with = "humantime_serde")]
    pub wait_and_retry: Duration,
    pub ssh_agent: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub ssh_config: String,
    pub rpc: bool,
    pub rpc_address: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            id: String::new(),
            tunnel_type: TunnelDefaults::TUNNEL_TYPE.to_string(),
            verbose: false,
            insecure: false,
            detach: false,
            source: AddressInputList::default(),
            destination: AddressInputList::default(),
            server: AddressInput::default(),
            key: String::new(),
            keep_alive_interval: TunnelDefaults::KEEP_ALIVE_INTERVAL,
            connection_retries: TunnelDefaults::CONNECTION_RETRIES,
            wait_and_retry: TunnelDefaults::WAIT_AND_RETRY,
            ssh_agent: String::new(),
            timeout: TunnelDefaults::TIMEOUT,
            ssh_config: String::new(),
            rpc: true,
            rpc_address: IpcConfig::DEFAULT_LISTEN_ADDRESS.to_string(),
        }
    }
}

impl Configuration {
    /// Project this configuration onto a persistable alias named `name`.
    pub fn to_alias(&self, name: impl Into<String>) -> Alias {
        Alias {
            name: name.into(),
            tunnel_type: self.tunnel_type.clone(),
            verbose: self.verbose,
            insecure: self.insecure,
            detach: self.detach,
            source: self.source.list(),
            destination: self.destination.list(),
            server: self.server.to_string(),
            key: self.key.clone(),
            keep_alive_interval: format_duration(self.keep_alive_interval),
            connection_retries: self.connection_retries,
            wait_and_retry: format_duration(self.wait_and_retry),
            ssh_agent: self.ssh_agent.clone(),
            timeout: format_duration(self.timeout),
            ssh_config: self.ssh_config.clone(),
            rpc: self.rpc,
            rpc_address: self.rpc_address.clone(),
        }
    }

    /// Merge a stored alias into this configuration.
    ///
    /// `verbose`, `insecure` and `detach` are taken from the alias only when
    /// their flag is not in `given_flags`. Every other field is copied from
    /// the alias and the id becomes the alias name.
    ///
    /// Nothing is modified when the alias holds a malformed address or
    /// duration.
    pub fn merge(&mut self, alias: &Alias, given_flags: &[&str]) -> Result<()> {
        let given = |flag: &str| given_flags.contains(&flag);

        let source = parse_list(&alias.source)?;
        let destination = parse_list(&alias.destination)?;
        let server: AddressInput = alias.server.parse()?;
        let keep_alive_interval = parse_duration("keep-alive-interval", &alias.keep_alive_interval)?;
        let wait_and_retry = parse_duration("wait-and-retry", &alias.wait_and_retry)?;
        let timeout = parse_duration("timeout", &alias.timeout)?;

        if !given(FLAG_VERBOSE) {
            self.verbose = alias.verbose;
        }
        if !given(FLAG_INSECURE) {
            self.insecure = alias.insecure;
        }
        if !given(FLAG_DETACH) {
            self.detach = alias.detach;
        }

        self.id = alias.name.clone();
        self.tunnel_type = alias.tunnel_type.clone();
        self.source = source;
        self.destination = destination;
        self.server = server;
        self.key = alias.key.clone();
        self.keep_alive_interval = keep_alive_interval;
        self.connection_retries = alias.connection_retries;
        self.wait_and_retry = wait_and_retry;
        self.ssh_agent = alias.ssh_agent.clone();
        self.timeout = timeout;
        self.ssh_config = alias.ssh_config.clone();
        self.rpc = alias.rpc;
        self.rpc_address = alias.rpc_address.clone();

        Ok(())
    }
}

fn parse_list(values: &[String]) -> Result<AddressInputList> {
    let mut list = AddressInputList::new();
    for value in values {
        list.push_str(value)?;
    }
    Ok(list)
}

fn parse_duration(field: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value.trim()).map_err(|e| BurrowError::InvalidDuration {
        field: field.to_string(),
        value: value.to_string(),
        message: e.to_string(),
    })
}

fn format_duration(duration: Duration) -> String {
    humantime::format_duration(duration).to_string()
}

mod humantime_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
