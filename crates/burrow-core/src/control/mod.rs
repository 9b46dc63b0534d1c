//! RPC control plane: the server every instance embeds and the client other
//! invocations use to reach it.

pub mod client;
pub mod server;

pub use client::{ControlClient, InstanceReport};
pub use server::{ControlServer, SharedConfiguration, ShowInstance, SHOW_INSTANCE_METHOD};
