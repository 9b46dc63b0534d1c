//! `[user@]host[:port]` address inputs.

use crate::{BurrowError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// One address as typed by the user.
///
/// Every part is optional: `:8080` is "any host, port 8080" and an empty
/// string is the empty address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressInput {
    pub user: String,
    pub host: String,
    pub port: Option<u16>,
}

impl AddressInput {
    /// `host:port` suitable for dialing or binding, without the user part.
    pub fn address(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        match self.port {
            Some(port) => format!("{}:{}", host, port),
            None => host,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.user.is_empty() && self.host.is_empty() && self.port.is_none()
    }

    fn invalid(value: &str, message: impl Into<String>) -> BurrowError {
        BurrowError::InvalidAddress {
            value: value.to_string(),
            message: message.into(),
        }
    }
}

impl FromStr for AddressInput {
    type Err = BurrowError;

    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        let (user, rest) = match trimmed.split_once('@') {
            Some(("", _)) => return Err(Self::invalid(value, "empty user before '@'")),
            Some((user, rest)) => (user.to_string(), rest),
            None => (String::new(), trimmed),
        };

        let (host, port) = if let Some(bracketed) = rest.strip_prefix('[') {
            let (host, after) = bracketed
                .split_once(']')
                .ok_or_else(|| Self::invalid(value, "unterminated '[' in host"))?;
            match after {
                "" => (host, None),
                _ => match after.strip_prefix(':') {
                    Some(port) => (host, Some(port)),
                    None => return Err(Self::invalid(value, "unexpected text after ']'")),
                },
            }
        } else {
            match rest.rsplit_once(':') {
                // Bare IPv6 literal without brackets: no port.
                Some((host, _)) if host.contains(':') => (rest, None),
                Some((host, port)) => (host, Some(port)),
                None => (rest, None),
            }
        };

        let port = match port {
            Some(p) => Some(
                p.parse::<u16>()
                    .map_err(|_| Self::invalid(value, format!("invalid port {:?}", p)))?,
            ),
            None => None,
        };

        Ok(Self {
            user,
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for AddressInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.user.is_empty() {
            write!(f, "{}@", self.user)?;
        }
        f.write_str(&self.address())
    }
}

impl Serialize for AddressInput {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AddressInput {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Ordered list of addresses, built from repeated or comma-separated values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressInputList(pub Vec<AddressInput>);

impl AddressInputList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `value` and append it. Commas separate several addresses.
    pub fn push_str(&mut self, value: &str) -> Result<()> {
        for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            self.0.push(part.parse()?);
        }
        Ok(())
    }

    /// String form of each address.
    pub fn list(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AddressInput> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&AddressInput> {
        self.0.get(index)
    }
}

impl<'a> IntoIterator for &'a AddressInputList {
    type Item = &'a AddressInput;
    type IntoIter = std::slice::Iter<'a, AddressInput>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromStr for AddressInputList {
    type Err = BurrowError;

    fn from_str(value: &str) -> Result<Self> {
        let mut list = Self::new();
        list.push_str(value)?;
        Ok(list)
    }
}

impl fmt::Display for AddressInputList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.list().join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_address() {
        let addr: AddressInput = "deploy@bastion.example.com:2222".parse().unwrap();
        assert_eq!(addr.user, "deploy");
        assert_eq!(addr.host, "bastion.example.com");
        assert_eq!(addr.port, Some(2222));
        assert_eq!(addr.address(), "bastion.example.com:2222");
        assert_eq!(addr.to_string(), "deploy@bastion.example.com:2222");
    }

    #[test]
    fn test_parse_partial_addresses() {
        let port_only: AddressInput = ":8080".parse().unwrap();
        assert_eq!(port_only.host, "");
        assert_eq!(port_only.port, Some(8080));
        assert_eq!(port_only.to_string(), ":8080");

        let host_only: AddressInput = "db.internal".parse().unwrap();
        assert_eq!(host_only.port, None);
        assert_eq!(host_only.to_string(), "db.internal");

        let empty: AddressInput = "".parse().unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.to_string(), "");
    }

    #[test]
    fn test_parse_ipv6() {
        let addr: AddressInput = "[::1]:5432".parse().unwrap();
        assert_eq!(addr.host, "::1");
        assert_eq!(addr.port, Some(5432));
        assert_eq!(addr.to_string(), "[::1]:5432");

        let bare: AddressInput = "fe80::1".parse().unwrap();
        assert_eq!(bare.host, "fe80::1");
        assert_eq!(bare.port, None);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(
            "host:notaport".parse::<AddressInput>(),
            Err(BurrowError::InvalidAddress { .. })
        ));
        assert!("host:70000".parse::<AddressInput>().is_err());
        assert!("@host".parse::<AddressInput>().is_err());
        assert!("[::1".parse::<AddressInput>().is_err());
    }

    #[test]
    fn test_list_accepts_repeated_and_comma_values() {
        let mut list = AddressInputList::new();
        list.push_str("127.0.0.1:8080").unwrap();
        list.push_str(":9090, :9091").unwrap();

        assert_eq!(list.len(), 3);
        assert_eq!(list.list(), vec!["127.0.0.1:8080", ":9090", ":9091"]);
    }

    #[test]
    fn test_serializes_as_strings() {
        let list: AddressInputList = "a@h:1,:2".parse().unwrap();
        let json = serde_json::to_value(&list).unwrap();
        assert_eq!(json, serde_json::json!(["a@h:1", ":2"]));

        let back: AddressInputList = serde_json::from_value(json).unwrap();
        assert_eq!(back, list);
    }
}
