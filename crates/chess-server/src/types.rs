//! Shared types for the chess TCP server.
//!
//! This module defines:
//! - `ClientId`: a lightweight handle for connected clients
//! - the outbound channel aliases from game logic to a client's writer
//! - the registry of live connections

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use chess_core::{OutboundEvent, OwnerId};
use tokio::sync::mpsc;
use tokio::sync::RwLock;

/// Identifier for a connected client. Every session is owned by one.
pub type ClientId = OwnerId;

/// Outbound events for a given client.
pub type OutboundTx = mpsc::UnboundedSender<OutboundEvent>;
pub type OutboundRx = mpsc::UnboundedReceiver<OutboundEvent>;

/// Connected clients and their peer addresses.
///
/// Only used for admission control (`max_clients`) and logging; game
/// state lives in the session registry.
pub type ConnectionRegistry = Arc<RwLock<HashMap<ClientId, SocketAddr>>>;
