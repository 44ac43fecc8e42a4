//! Per-connection I/O.
//!
//! The socket is split in two:
//! - a writer task drains the client's outbound channel, one JSON line
//!   per event;
//! - the reader loop below frames incoming bytes into lines, parses each
//!   one and hands it to the game handlers.
//!
//! When the reader sees EOF or an error the client is gone: its sessions
//! are removed (killing their engines) and the writer is stopped.

use std::net::SocketAddr;

use anyhow::Result;
use chess_core::OutboundEvent;
use chess_protocol::{format_outbound, parse_inbound_line, LineFramer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

use crate::game_task::{self, Context};
use crate::types::{ConnectionRegistry, OutboundRx};

/// Player messages are small; a longer line is rejected.
const MAX_CLIENT_LINE: usize = 8 * 1024;

/// Run the I/O loop for a single connection until it closes.
pub async fn run_client(
    ctx: Context,
    stream: TcpStream,
    peer_addr: SocketAddr,
    out_rx: OutboundRx,
    connections: ConnectionRegistry,
) -> Result<()> {
    let client_id = ctx.client_id;
    let (mut read_stream, write_stream) = stream.into_split();

    let writer = tokio::spawn(async move {
        if let Err(e) = write_loop(write_stream, out_rx).await {
            debug!(client = %client_id, "write error: {e:#}");
        }
    });

    let mut framer = LineFramer::with_max_line_len(MAX_CLIENT_LINE);
    let outcome = loop {
        match read_stream.read_buf(framer.buffer_mut()).await {
            Ok(0) => break Ok(()),
            Ok(_) => loop {
                match framer.next_line() {
                    Ok(Some(line)) => handle_line(&ctx, &line).await,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(client = %client_id, "{e}");
                        let _ = ctx.out_tx.send(OutboundEvent::error(e.to_string()));
                    }
                }
            },
            Err(e) => break Err(e),
        }
    };

    // Disconnect: tear down everything this client owned.
    let removed = ctx.registry.remove_owner(client_id).await;
    connections.write().await.remove(&client_id);
    writer.abort();

    info!(
        client = %client_id,
        peer = %peer_addr,
        sessions = removed.len(),
        "client disconnected"
    );

    outcome.map_err(Into::into)
}

async fn handle_line(ctx: &Context, line: &str) {
    trace!(client = %ctx.client_id, "<- {line}");

    match parse_inbound_line(line) {
        Ok(Some(event)) => game_task::handle_event(ctx, event).await,
        Ok(None) => {}
        Err(e) => {
            debug!(client = %ctx.client_id, "invalid message: {e}");
            let _ = ctx
                .out_tx
                .send(OutboundEvent::error(format!("invalid message: {e}")));
        }
    }
}

async fn write_loop(mut stream: OwnedWriteHalf, mut out_rx: OutboundRx) -> Result<()> {
    while let Some(event) = out_rx.recv().await {
        let mut line = format_outbound(&event)?;
        line.push('\n');
        stream.write_all(line.as_bytes()).await?;
        stream.flush().await?;
    }
    Ok(())
}
