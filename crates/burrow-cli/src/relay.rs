//! Default tunnel engine: a plain TCP relay.
//!
//! Each listen address is paired with the forward address at the same index.
//! `local` tunnels listen on the sources and forward to the destinations;
//! `remote` tunnels do the reverse.

use burrow_core::{AddressInput, BurrowError, Configuration, Result, TunnelEngine};
use futures::future::try_join_all;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

const DEFAULT_HOST: &str = "127.0.0.1";

pub struct RelayEngine;

#[async_trait::async_trait]
impl TunnelEngine for RelayEngine {
    fn describe(&self) -> String {
        "tcp relay".to_string()
    }

    async fn start(&self, config: &Configuration) -> Result<()> {
        let routes = routes(config)?;
        if routes.is_empty() {
            return Err(BurrowError::Tunnel {
                message: "no destination to forward to".to_string(),
            });
        }

        let mut relays = Vec::with_capacity(routes.len());
        for (listen, forward) in routes {
            let listener =
                bind_with_retries(&listen, config.connection_retries, config.wait_and_retry)
                    .await?;
            info!(
                listen = %listener.local_addr()?,
                forward = %forward,
                "Forwarding"
            );
            relays.push(relay(listener, forward, config.timeout));
        }

        try_join_all(relays).await?;
        Ok(())
    }
}

/// `(listen, forward)` address pairs for a configuration.
fn routes(config: &Configuration) -> Result<Vec<(String, String)>> {
    let (listens, forwards) = if config.tunnel_type == "remote" {
        (&config.destination, &config.source)
    } else {
        (&config.source, &config.destination)
    };

    if listens.len() > forwards.len() {
        return Err(BurrowError::Tunnel {
            message: format!(
                "{} listen addresses but only {} forward addresses",
                listens.len(),
                forwards.len()
            ),
        });
    }

    let unset = AddressInput::default();
    Ok(forwards
        .iter()
        .enumerate()
        .map(|(i, forward)| {
            let listen = listens.get(i).unwrap_or(&unset);
            (with_defaults(listen, 0), with_defaults(forward, 0))
        })
        .collect())
}

fn with_defaults(addr: &AddressInput, port: u16) -> String {
    let mut addr = addr.clone();
    if addr.host.is_empty() {
        addr.host = DEFAULT_HOST.to_string();
    }
    addr.port.get_or_insert(port);
    addr.address()
}

async fn bind_with_retries(addr: &str, retries: u32, wait: Duration) -> Result<TcpListener> {
    let mut attempt = 0;
    loop {
        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok(listener),
            Err(e) if attempt < retries => {
                attempt += 1;
                warn!(addr, attempt, error = %e, "Bind failed, retrying in {:?}", wait);
                tokio::time::sleep(wait).await;
            }
            Err(e) => {
                return Err(BurrowError::Tunnel {
                    message: format!("could not listen on {}: {}", addr, e),
                })
            }
        }
    }
}

async fn relay(listener: TcpListener, forward: String, timeout: Duration) -> Result<()> {
    loop {
        let (mut inbound, peer) = listener.accept().await?;
        let forward = forward.clone();

        tokio::spawn(async move {
            let outbound = tokio::time::timeout(timeout, TcpStream::connect(forward.as_str())).await;
            let mut outbound = match outbound {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    warn!(peer = %peer, forward = %forward, error = %e, "Forward connect failed");
                    return;
                }
                Err(_) => {
                    warn!(peer = %peer, forward = %forward, "Forward connect timed out");
                    return;
                }
            };

            match tokio::io::copy_bidirectional(&mut inbound, &mut outbound).await {
                Ok((up, down)) => debug!(peer = %peer, up, down, "Connection closed"),
                Err(e) => debug!(peer = %peer, error = %e, "Connection ended"),
            }
        });
    }
}
