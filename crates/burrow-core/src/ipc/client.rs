//! TCP IPC client for calling another instance's control server.
//!
//! Every call dials a fresh connection, sends one request and reads one
//! response. Nothing is pooled: the target may have exited between two calls.

use super::protocol::{read_frame, write_frame, IpcRequest, IpcResponse};
use crate::cancel::CancellationToken;
use crate::config::IpcConfig;
use crate::{BurrowError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Deadline and cancellation governing a single call.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Bound on connect + write + read.
    pub timeout: Duration,
    pub cancel: CancellationToken,
}

impl Default for CallContext {
    fn default() -> Self {
        Self {
            timeout: IpcConfig::CALL_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }
}

impl CallContext {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// IPC client bound to one published address.
#[derive(Debug, Clone)]
pub struct IpcClient {
    addr: String,
}

impl IpcClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// Get the address this client dials.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Call a JSON-RPC method.
    ///
    /// Dial failures and broken connections are [`BurrowError::Connection`],
    /// undecodable responses are [`BurrowError::Protocol`], and errors sent
    /// back by the server come through [`IpcResponse::into_result`].
    pub async fn call(
        &self,
        ctx: &CallContext,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value> {
        ctx.cancel.check()?;

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(BurrowError::Cancelled),
            result = tokio::time::timeout(ctx.timeout, self.round_trip(method, params)) => {
                result.map_err(|_| BurrowError::Timeout(ctx.timeout))?
            }
        }
    }

    async fn round_trip(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let mut stream = tokio::time::timeout(
            IpcConfig::CONNECT_TIMEOUT,
            TcpStream::connect(self.addr.as_str()),
        )
        .await
        .map_err(|_| self.connection_error("connect timed out"))?
        .map_err(|e| self.connection_error(e))?;

        let id = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
        let request = IpcRequest::new(method, params, id);
        let request_bytes = serde_json::to_vec(&request)?;

        debug!(addr = %self.addr, method, id, "IPC call");

        let (mut reader, mut writer) = stream.split();

        write_frame(&mut writer, &request_bytes)
            .await
            .map_err(|e| self.connection_error(e))?;

        let response_bytes = match read_frame(&mut reader).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Err(self.connection_error("connection closed before response")),
            Err(e @ BurrowError::Protocol { .. }) => return Err(e),
            Err(e) => return Err(self.connection_error(e)),
        };

        let response: IpcResponse =
            serde_json::from_slice(&response_bytes).map_err(|e| BurrowError::Protocol {
                message: format!("Failed to parse IPC response from {}: {}", self.addr, e),
            })?;

        response.into_result()
    }

    fn connection_error(&self, err: impl std::fmt::Display) -> BurrowError {
        BurrowError::Connection {
            addr: self.addr.clone(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::server::{IpcDispatch, IpcServer};
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    struct TestDispatch;

    #[async_trait::async_trait]
    impl IpcDispatch for TestDispatch {
        async fn dispatch(
            &self,
            method: &str,
            params: serde_json::Value,
        ) -> std::result::Result<serde_json::Value, BurrowError> {
            match method {
                "ping" => Ok(serde_json::json!("pong")),
                "add" => {
                    let a = params["a"].as_i64().unwrap_or(0);
                    let b = params["b"].as_i64().unwrap_or(0);
                    Ok(serde_json::json!(a + b))
                }
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(serde_json::Value::Null)
                }
                "not-ready" => Err(BurrowError::InstanceNotReady { id: "x".into() }),
                _ => Err(BurrowError::MethodNotFound {
                    method: method.to_string(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_client_call_success() {
        let mut handle = IpcServer::start("127.0.0.1:0", Arc::new(TestDispatch))
            .await
            .unwrap();

        let client = IpcClient::new(handle.addr().to_string());
        let ctx = CallContext::default();

        let result = client.call(&ctx, "ping", serde_json::json!({})).await.unwrap();
        assert_eq!(result, serde_json::json!("pong"));

        // A second call opens a second connection.
        let result = client
            .call(&ctx, "add", serde_json::json!({"a": 3, "b": 4}))
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!(7));

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_client_unknown_method() {
        let mut handle = IpcServer::start("127.0.0.1:0", Arc::new(TestDispatch))
            .await
            .unwrap();

        let client = IpcClient::new(handle.addr().to_string());
        match client
            .call(&CallContext::default(), "nonexistent", serde_json::json!({}))
            .await
        {
            Err(BurrowError::MethodNotFound { method }) => assert_eq!(method, "nonexistent"),
            other => panic!("Expected MethodNotFound, got: {:?}", other),
        }

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_client_remote_error() {
        let mut handle = IpcServer::start("127.0.0.1:0", Arc::new(TestDispatch))
            .await
            .unwrap();

        let client = IpcClient::new(handle.addr().to_string());
        match client
            .call(&CallContext::default(), "not-ready", serde_json::Value::Null)
            .await
        {
            Err(BurrowError::Remote { code, .. }) => assert_eq!(code, -32001),
            other => panic!("Expected Remote, got: {:?}", other),
        }

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_client_connect_to_dead_server_returns_connection_error() {
        // Bind then drop to find a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = IpcClient::new(addr.to_string());
        match client
            .call(&CallContext::default(), "ping", serde_json::Value::Null)
            .await
        {
            Err(BurrowError::Connection { addr: failed, .. }) => {
                assert_eq!(failed, addr.to_string());
            }
            other => panic!("Expected Connection, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_client_timeout() {
        let mut handle = IpcServer::start("127.0.0.1:0", Arc::new(TestDispatch))
            .await
            .unwrap();

        let client = IpcClient::new(handle.addr().to_string());
        let ctx = CallContext::with_timeout(Duration::from_millis(100));

        match client.call(&ctx, "slow", serde_json::Value::Null).await {
            Err(BurrowError::Timeout(d)) => assert_eq!(d, Duration::from_millis(100)),
            other => panic!("Expected Timeout, got: {:?}", other),
        }

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_client_cancelled() {
        let mut handle = IpcServer::start("127.0.0.1:0", Arc::new(TestDispatch))
            .await
            .unwrap();

        let client = IpcClient::new(handle.addr().to_string());
        let token = CancellationToken::new();
        let ctx = CallContext::default().with_cancel(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let result = client.call(&ctx, "slow", serde_json::Value::Null).await;
        assert!(matches!(result, Err(BurrowError::Cancelled)));
        canceller.await.unwrap();

        // Already-cancelled contexts never dial.
        let result = client.call(&ctx, "ping", serde_json::Value::Null).await;
        assert!(matches!(result, Err(BurrowError::Cancelled)));

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_client_garbage_response_is_protocol_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let (mut reader, mut writer) = stream.split();
            let _ = read_frame(&mut reader).await.unwrap();
            write_frame(&mut writer, b"{not json").await.unwrap();
            writer.shutdown().await.unwrap();
        });

        let client = IpcClient::new(addr.to_string());
        let result = client
            .call(&CallContext::default(), "ping", serde_json::Value::Null)
            .await;
        assert!(matches!(result, Err(BurrowError::Protocol { .. })));

        server.await.unwrap();
    }
}
