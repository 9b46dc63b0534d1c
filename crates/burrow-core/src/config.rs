//! Centralized configuration constants for burrow.
//!
//! Runtime parameters of a single instance live in
//! [`crate::models::Configuration`]; this module only holds the fixed values
//! shared by every process on the host.

use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "burrow";
    /// Length of auto-generated instance ids.
    pub const GENERATED_ID_LEN: usize = 8;
}

/// On-disk layout of the instance registry.
pub struct RegistryConfig;

impl RegistryConfig {
    /// Directory under the user home holding every instance directory.
    pub const HOME_DIR_NAME: &'static str = ".burrow";
    pub const PID_FILE_NAME: &'static str = "pid";
    pub const RPC_FILE_NAME: &'static str = "rpc";
    pub const LOG_FILE_NAME: &'static str = "burrow.log";
    pub const ALIAS_FILE_SUFFIX: &'static str = ".alias.json";
}

/// Local IPC limits and timeouts.
pub struct IpcConfig;

impl IpcConfig {
    pub const DEFAULT_LISTEN_ADDRESS: &'static str = "127.0.0.1:0";
    pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024; // 4MB
    pub const MAX_CONNECTIONS: usize = 64;
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
    pub const CALL_TIMEOUT: Duration = Duration::from_secs(5);
}

/// Daemon lifecycle configuration.
pub struct DaemonConfig;

impl DaemonConfig {
    /// Environment variable marking a re-executed child; carries the instance id.
    pub const DETACHED_ENV_VAR: &'static str = "BURROW_DETACHED_ID";
    /// Prefix of the staging pid/log files written before relocation.
    pub const STAGING_PREFIX: &'static str = "burrow-detach";
    pub const STOP_TIMEOUT: Duration = Duration::from_secs(2);
}

/// Defaults applied to a new instance when the caller gives no value.
pub struct TunnelDefaults;

impl TunnelDefaults {
    pub const TUNNEL_TYPE: &'static str = "local";
    pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(10);
    pub const CONNECTION_RETRIES: u32 = 3;
    pub const WAIT_AND_RETRY: Duration = Duration::from_secs(3);
    pub const TIMEOUT: Duration = Duration::from_secs(3);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_are_reasonable() {
        assert!(IpcConfig::CONNECT_TIMEOUT <= IpcConfig::CALL_TIMEOUT);
        assert!(DaemonConfig::STOP_TIMEOUT > Duration::ZERO);
    }

    #[test]
    fn test_registry_file_names_are_distinct() {
        let names = [
            RegistryConfig::PID_FILE_NAME,
            RegistryConfig::RPC_FILE_NAME,
            RegistryConfig::LOG_FILE_NAME,
        ];
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
