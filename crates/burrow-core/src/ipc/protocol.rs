//! JSON-RPC 2.0 messages and their framing on a byte stream.
//!
//! Each message travels as one frame:
//!
//! ```text
//! [u32 BE: len][UTF-8 JSON bytes of len]
//! ```
//!
//! Frames larger than [`IpcConfig::MAX_MESSAGE_SIZE`] are refused on both the
//! read and the write side.

use crate::config::IpcConfig;
use crate::{BurrowError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    pub id: Option<Value>,
}

impl IpcRequest {
    pub fn new(method: impl Into<String>, params: Value, id: u64) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params: Some(params),
            id: Some(Value::from(id)),
        }
    }
}

/// A response carries exactly one of `result` and `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<IpcError>,
    pub id: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl IpcResponse {
    fn new(id: Option<Value>, result: Option<Value>, error: Option<IpcError>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result,
            error,
            id,
        }
    }

    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self::new(id, Some(result), None)
    }

    pub fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self::new(
            id,
            None,
            Some(IpcError {
                code,
                message,
                data: None,
            }),
        )
    }

    /// Error response for a failed dispatch. Method-not-found carries the
    /// method name as `data` so the caller can rebuild the same error.
    pub fn from_error(id: Option<Value>, err: &BurrowError) -> Self {
        let data = match err {
            BurrowError::MethodNotFound { method } => Some(Value::String(method.clone())),
            _ => None,
        };
        Self::new(
            id,
            None,
            Some(IpcError {
                code: err.to_rpc_error_code(),
                message: err.to_string(),
                data,
            }),
        )
    }

    /// Caller-side view of the response: method-not-found keeps its own
    /// variant, every other error object becomes [`BurrowError::Remote`].
    pub fn into_result(self) -> Result<Value> {
        match (self.result, self.error) {
            (_, Some(err)) if err.code == METHOD_NOT_FOUND => {
                let method = match err.data {
                    Some(Value::String(method)) => method,
                    _ => err.message,
                };
                Err(BurrowError::MethodNotFound { method })
            }
            (_, Some(err)) => Err(BurrowError::Remote {
                code: err.code,
                message: err.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Err(BurrowError::Protocol {
                message: "IPC response missing result".to_string(),
            }),
        }
    }
}

fn check_frame_size(len: usize) -> Result<()> {
    if len > IpcConfig::MAX_MESSAGE_SIZE {
        return Err(BurrowError::Protocol {
            message: format!(
                "IPC message size {} exceeds maximum {}",
                len,
                IpcConfig::MAX_MESSAGE_SIZE
            ),
        });
    }
    Ok(())
}

/// Read one frame. `None` means the peer closed the stream between frames;
/// a stream ending inside a frame is a protocol error.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut prefix = [0u8; 4];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(prefix) as usize;
    check_frame_size(len)?;

    let mut payload = vec![0u8; len];
    match reader.read_exact(&mut payload).await {
        Ok(_) => Ok(Some(payload)),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(BurrowError::Protocol {
            message: format!("IPC frame truncated, expected {} bytes", len),
        }),
        Err(e) => Err(e.into()),
    }
}

pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    check_frame_size(payload.len())?;
    writer
        .write_all(&(payload.len() as u32).to_be_bytes())
        .await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}
