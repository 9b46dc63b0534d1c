//! Data models shared by the control plane and the CLI.
//!
//! [`Configuration`] is what a running instance reports over RPC;
//! [`Alias`] is its persisted, string-typed projection.

mod address;
mod alias;
mod configuration;

pub use address::{AddressInput, AddressInputList};
pub use alias::Alias;
pub use configuration::{Configuration, FLAG_DETACH, FLAG_INSECURE, FLAG_VERBOSE};
