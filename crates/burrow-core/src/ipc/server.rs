//! JSON-RPC endpoint of an RPC-enabled instance.
//!
//! One listener task accepts connections; every connection gets its own task
//! reading frames until the peer hangs up or the server is shut down. At most
//! [`IpcConfig::MAX_CONNECTIONS`] connections are served at once, further
//! peers are closed right after accept.

use super::protocol::{
    read_frame, write_frame, IpcRequest, IpcResponse, INVALID_REQUEST, JSONRPC_VERSION,
    PARSE_ERROR,
};
use crate::cancel::CancellationToken;
use crate::config::IpcConfig;
use crate::{BurrowError, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A running server. Dropping it stops the server too.
pub struct IpcServerHandle {
    addr: SocketAddr,
    stop: CancellationToken,
    listener_task: Option<JoinHandle<()>>,
}

impl IpcServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting and close every open connection.
    pub fn shutdown(&mut self) {
        self.stop.cancel();
        if let Some(task) = self.listener_task.take() {
            task.abort();
        }
    }
}

impl Drop for IpcServerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Dispatch seam between the server and whatever serves the methods.
#[async_trait::async_trait]
pub trait IpcDispatch: Send + Sync + 'static {
    async fn dispatch(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, BurrowError>;
}

pub struct IpcServer;

impl IpcServer {
    /// Bind `listen` (e.g. `127.0.0.1:0`) and serve in background tasks.
    ///
    /// The returned handle carries the concrete bound address.
    pub async fn start<D: IpcDispatch>(listen: &str, dispatch: Arc<D>) -> Result<IpcServerHandle> {
        let listener = TcpListener::bind(listen).await.map_err(|e| BurrowError::Io {
            message: format!("Failed to bind IPC listener on {}", listen),
            path: None,
            source: Some(e),
        })?;
        let addr = listener.local_addr()?;
        info!(addr = %addr, "IPC server listening");

        let stop = CancellationToken::new();
        let listener_task = tokio::spawn(Self::serve(listener, dispatch, stop.clone()));

        Ok(IpcServerHandle {
            addr,
            stop,
            listener_task: Some(listener_task),
        })
    }

    async fn serve<D: IpcDispatch>(
        listener: TcpListener,
        dispatch: Arc<D>,
        stop: CancellationToken,
    ) {
        let slots = Arc::new(Semaphore::new(IpcConfig::MAX_CONNECTIONS));

        loop {
            let accepted = tokio::select! {
                _ = stop.cancelled() => break,
                accepted = listener.accept() => accepted,
            };
            let (stream, peer) = match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "IPC accept failed");
                    continue;
                }
            };

            let Ok(slot) = slots.clone().try_acquire_owned() else {
                warn!(peer = %peer, "Rejecting IPC connection, {} already open", IpcConfig::MAX_CONNECTIONS);
                continue;
            };

            let dispatch = dispatch.clone();
            let stop = stop.clone();
            tokio::spawn(async move {
                if let Err(e) = Self::serve_connection(stream, &*dispatch, &stop).await {
                    debug!(peer = %peer, error = %e, "IPC connection ended");
                }
                drop(slot);
            });
        }
        debug!("IPC server stopped");
    }

    async fn serve_connection<D: IpcDispatch>(
        mut stream: TcpStream,
        dispatch: &D,
        stop: &CancellationToken,
    ) -> Result<()> {
        let (mut reader, mut writer) = stream.split();

        loop {
            let frame = tokio::select! {
                _ = stop.cancelled() => return Ok(()),
                frame = read_frame(&mut reader) => match frame? {
                    Some(frame) => frame,
                    None => return Ok(()),
                },
            };

            let response = Self::answer(&frame, dispatch).await;
            write_frame(&mut writer, &serde_json::to_vec(&response)?).await?;
        }
    }

    /// Decode one request frame and run it. Never fails: every problem is
    /// reported to the caller as a JSON-RPC error object.
    async fn answer<D: IpcDispatch>(frame: &[u8], dispatch: &D) -> IpcResponse {
        let request: IpcRequest = match serde_json::from_slice(frame) {
            Ok(request) => request,
            Err(e) => return IpcResponse::error(None, PARSE_ERROR, format!("Parse error: {}", e)),
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return IpcResponse::error(
                request.id,
                INVALID_REQUEST,
                "Invalid Request: expected jsonrpc 2.0".to_string(),
            );
        }

        let params = request.params.unwrap_or(serde_json::Value::Null);
        match dispatch.dispatch(&request.method, params).await {
            Ok(result) => IpcResponse::success(request.id, result),
            Err(e) => {
                debug!(method = %request.method, error = %e, "IPC method failed");
                IpcResponse::from_error(request.id, &e)
            }
        }
    }
}
