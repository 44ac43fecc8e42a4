//! Game event handling.
//!
//! Each inbound event from a client is handled here against the shared
//! session registry. Replies go back to the originating client only,
//! through its outbound channel.
//!
//! Opponent moves never block the client's reader: after an accepted
//! player move, the engine search runs in its own task, which locks the
//! session only to begin and to complete the move.

use std::sync::Arc;

use chess_core::{GameError, InboundEvent, MoveRequest, MoveResult, OutboundEvent, SessionId};
use tracing::{debug, info, warn};

use crate::registry::{SessionHandle, SessionRegistry};
use crate::types::{ClientId, OutboundTx};

/// Everything a handler needs to act for one client.
#[derive(Clone)]
pub struct Context {
    pub client_id: ClientId,
    pub registry: Arc<SessionRegistry>,
    pub out_tx: OutboundTx,
    pub reap_finished: bool,
}

impl Context {
    fn send(&self, event: OutboundEvent) {
        // The client may already be gone; nothing to do then.
        let _ = self.out_tx.send(event);
    }
}

/// Dispatch one inbound event.
pub async fn handle_event(ctx: &Context, event: InboundEvent) {
    match event {
        InboundEvent::StartGame => start_game(ctx).await,
        InboundEvent::MakeMove {
            session_id,
            request,
        } => make_move(ctx, session_id, request).await,
        InboundEvent::GetState { session_id } => get_state(ctx, session_id).await,
    }
}

async fn start_game(ctx: &Context) {
    // One live game per connection: a new start replaces the old one.
    let replaced = ctx.registry.remove_owner(ctx.client_id).await;
    if !replaced.is_empty() {
        debug!(client = %ctx.client_id, ?replaced, "replacing previous game");
    }

    let handle = match ctx.registry.create(ctx.client_id).await {
        Ok(handle) => handle,
        Err(e) => {
            warn!(client = %ctx.client_id, "failed to start game: {e}");
            ctx.send(OutboundEvent::error(format!("failed to start game: {e}")));
            return;
        }
    };

    let snapshot = {
        let mut game = handle.game.lock().await;
        if let Err(e) = game.start() {
            ctx.send(OutboundEvent::error(e.to_string()));
            return;
        }
        game.snapshot()
    };

    info!(client = %ctx.client_id, session = %handle.id(), "game started");
    ctx.send(OutboundEvent::GameStarted {
        session_id: handle.id(),
        snapshot,
    });
}

async fn make_move(ctx: &Context, session_id: SessionId, request: MoveRequest) {
    let handle = match owned_session(ctx, session_id).await {
        Ok(handle) => handle,
        Err(e) => {
            ctx.send(OutboundEvent::MoveResult(MoveResult::rejected(session_id, &e)));
            return;
        }
    };

    let outcome = handle.game.lock().await.apply_player_move(&request);
    let accepted = match outcome {
        Ok(accepted) => accepted,
        Err(e) => {
            debug!(session = %session_id, "move {}{} rejected: {e}", request.from, request.to);
            ctx.send(OutboundEvent::MoveResult(MoveResult::rejected(session_id, &e)));
            return;
        }
    };

    debug!(session = %session_id, "player played {}", accepted.notation);
    ctx.send(OutboundEvent::MoveResult(MoveResult::accepted(
        session_id, &accepted,
    )));

    if accepted.terminal {
        finish(ctx, &handle).await;
        return;
    }

    let ctx = ctx.clone();
    tokio::spawn(async move {
        run_opponent_turn(&ctx, handle).await;
    });
}

async fn get_state(ctx: &Context, session_id: SessionId) {
    match owned_session(ctx, session_id).await {
        Ok(handle) => {
            let snapshot = handle.game.lock().await.snapshot();
            ctx.send(OutboundEvent::State {
                session_id,
                snapshot,
            });
        }
        Err(e) => ctx.send(OutboundEvent::error(e.to_string())),
    }
}

/// Ask the engine for its reply and apply it.
async fn run_opponent_turn(ctx: &Context, handle: Arc<SessionHandle>) {
    let session_id = handle.id();

    let begun = handle.game.lock().await.begin_opponent_move();
    let fen = match begun {
        Ok(fen) => fen,
        Err(e) => {
            ctx.send(OutboundEvent::OpponentMove(MoveResult::rejected(session_id, &e)));
            return;
        }
    };

    let outcome = handle.engine.request_best_move(&fen).await;

    // The session lock is not held during the search.
    let result = handle.game.lock().await.complete_opponent_move(outcome);

    if !ctx.registry.contains(session_id).await {
        debug!(session = %session_id, "discarding engine reply for removed session");
        return;
    }

    match result {
        Ok(accepted) => {
            debug!(session = %session_id, "opponent played {}", accepted.notation);
            ctx.send(OutboundEvent::OpponentMove(MoveResult::accepted(
                session_id, &accepted,
            )));
            if accepted.terminal {
                finish(ctx, &handle).await;
            }
        }
        Err(GameError::Cancelled) => {
            debug!(session = %session_id, "search cancelled");
        }
        Err(e) if e.is_session_fatal() => {
            warn!(session = %session_id, "engine error ended the game: {e}");
            let ended = handle.game.lock().await.result().cloned();
            ctx.send(OutboundEvent::OpponentMove(
                MoveResult::rejected(session_id, &e).with_result(ended),
            ));
            finish(ctx, &handle).await;
        }
        Err(e) => {
            ctx.send(OutboundEvent::OpponentMove(MoveResult::rejected(session_id, &e)));
        }
    }
}

/// A session is only visible to the client that created it; to anyone
/// else it does not exist.
async fn owned_session(
    ctx: &Context,
    session_id: SessionId,
) -> Result<Arc<SessionHandle>, GameError> {
    let handle = ctx.registry.lookup(session_id).await?;
    if handle.owner() != ctx.client_id {
        return Err(GameError::NotFound(session_id));
    }
    Ok(handle)
}

async fn finish(ctx: &Context, handle: &SessionHandle) {
    let result = handle.game.lock().await.result().cloned();
    info!(session = %handle.id(), ?result, "game over");

    if ctx.reap_finished {
        ctx.registry.remove(handle.id()).await;
    }
}
