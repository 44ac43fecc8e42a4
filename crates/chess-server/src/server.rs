//! TCP listener and top-level server wiring.
//!
//! This module:
//! - Listens on the configured address/port.
//! - Accepts new TCP connections, up to `max_clients`.
//! - Assigns each connection a `ClientId`.
//! - Spawns a per-client task that reads events and writes replies.
//!
//! All connections share one `SessionRegistry`. On Ctrl-C every session
//! is removed so no engine process outlives the server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use chess_core::OwnerId;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};

use crate::client;
use crate::config::Config;
use crate::game_task::Context;
use crate::registry::SessionRegistry;
use crate::types::{ClientId, ConnectionRegistry, OutboundRx, OutboundTx};

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

fn next_client_id() -> ClientId {
    OwnerId(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed))
}

/// Bind the configured address and serve until Ctrl-C.
pub async fn run(config: Config) -> Result<()> {
    let addr = config.socket_addr_string();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on {addr}");

    let registry = Arc::new(SessionRegistry::new(config.engine.clone()));

    tokio::select! {
        res = serve(listener, config, registry.clone()) => res,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            registry.shutdown_all().await;
            Ok(())
        }
    }
}

/// Accept loop on an already bound listener.
pub async fn serve(
    listener: TcpListener,
    config: Config,
    registry: Arc<SessionRegistry>,
) -> Result<()> {
    let connections: ConnectionRegistry = Arc::new(RwLock::new(HashMap::new()));

    loop {
        let (stream, peer_addr) = listener.accept().await?;

        let current_clients = connections.read().await.len();
        if current_clients >= config.max_clients {
            warn!(
                peer = %peer_addr,
                "rejecting connection: max_clients ({}) reached",
                config.max_clients
            );
            // Dropping the stream closes it.
            continue;
        }

        let client_id = next_client_id();
        info!(client = %client_id, peer = %peer_addr, "accepted connection");
        connections.write().await.insert(client_id, peer_addr);

        let (out_tx, out_rx): (OutboundTx, OutboundRx) = mpsc::unbounded_channel();
        let ctx = Context {
            client_id,
            registry: registry.clone(),
            out_tx,
            reap_finished: config.reap_finished,
        };
        let connections = connections.clone();

        tokio::spawn(async move {
            if let Err(e) = client::run_client(ctx, stream, peer_addr, out_rx, connections).await {
                warn!(client = %client_id, "connection error: {e:#}");
            }
        });
    }
}
