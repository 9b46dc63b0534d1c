//! Local IPC between burrow instances.
//!
//! Provides a lightweight TCP-based request/response mechanism that lets one
//! invocation query another instance's control server. Uses length-prefixed
//! JSON-RPC 2.0 over short-lived TCP connections.
//!
//! # Architecture
//!
//! - **Server**: Runs inside an RPC-enabled instance, accepts connections, dispatches method calls
//! - **Methods**: Explicit name → handler registry handed to the server
//! - **Client**: Dials a published address once per call
//! - **Protocol**: Shared framing and JSON-RPC types used by both

pub mod client;
pub mod methods;
pub mod protocol;
pub mod server;

pub use client::{CallContext, IpcClient};
pub use methods::{MethodHandler, MethodRegistry};
pub use protocol::{IpcRequest, IpcResponse};
pub use server::{IpcDispatch, IpcServer, IpcServerHandle};
