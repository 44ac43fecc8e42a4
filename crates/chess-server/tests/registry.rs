mod common;

use std::sync::Arc;
use std::time::Duration;

use chess_core::{GameError, MoveRequest, OwnerId, SessionStatus};
use chess_server::config::EngineConfig;
use chess_server::registry::SessionRegistry;
use common::{replying_engine, silent_engine};

#[tokio::test]
async fn owner_index_follows_create_and_remove() {
    let registry = SessionRegistry::new(replying_engine("e7e5"));
    let alice = OwnerId(1);
    let bob = OwnerId(2);

    let a1 = registry.create(alice).await.unwrap();
    let a2 = registry.create(alice).await.unwrap();
    let b1 = registry.create(bob).await.unwrap();

    assert_ne!(a1.id(), a2.id());
    assert_eq!(registry.len().await, 3);
    assert_eq!(registry.sessions_for(alice).await.len(), 2);
    assert_eq!(registry.sessions_for(bob).await, vec![b1.id()]);
    assert_eq!(a1.game.lock().await.status(), SessionStatus::Waiting);

    assert!(registry.remove(a1.id()).await);
    assert!(!registry.remove(a1.id()).await);
    assert!(registry.get(a1.id()).await.is_none());
    assert_eq!(registry.sessions_for(alice).await, vec![a2.id()]);

    assert_eq!(registry.remove_owner(alice).await, vec![a2.id()]);
    assert!(registry.sessions_for(alice).await.is_empty());
    assert!(registry.remove_owner(alice).await.is_empty());
    assert_eq!(registry.len().await, 1);

    registry.shutdown_all().await;
    assert!(registry.is_empty().await);
    assert!(registry.sessions_for(bob).await.is_empty());
}

#[tokio::test]
async fn lookup_of_unknown_id_is_not_found() {
    let registry = SessionRegistry::new(replying_engine("e7e5"));
    let handle = registry.create(OwnerId(7)).await.unwrap();
    let id = handle.id();
    registry.remove(id).await;

    assert!(matches!(
        registry.lookup(id).await,
        Err(GameError::NotFound(missing)) if missing == id
    ));
}

#[tokio::test]
async fn engine_that_cannot_start_registers_nothing() {
    let registry = SessionRegistry::new(EngineConfig {
        program: "/nonexistent/engine-binary".to_string(),
        ..EngineConfig::default()
    });

    assert!(matches!(
        registry.create(OwnerId(1)).await,
        Err(GameError::EngineFailure(_))
    ));
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn full_turn_through_a_registered_session() {
    let registry = SessionRegistry::new(replying_engine("e7e5"));
    let handle = registry.create(OwnerId(3)).await.unwrap();

    let mut game = handle.game.lock().await;
    game.start().unwrap();
    game.apply_player_move(&MoveRequest::new("e2", "e4")).unwrap();
    let reply = game.apply_opponent_move(&handle.engine).await.unwrap();

    assert_eq!(reply.notation, "e5");
    assert_eq!(game.history(), ["e4", "e5"]);
}

#[tokio::test]
async fn removing_a_session_mid_search_cancels_it() {
    let registry = Arc::new(SessionRegistry::new(silent_engine(30_000)));
    let handle = registry.create(OwnerId(4)).await.unwrap();
    let id = handle.id();

    let fen = {
        let mut game = handle.game.lock().await;
        game.start().unwrap();
        game.apply_player_move(&MoveRequest::new("e2", "e4")).unwrap();
        game.begin_opponent_move().unwrap()
    };

    let search = {
        let handle = handle.clone();
        tokio::spawn(async move { handle.engine.request_best_move(&fen).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Owner disconnects while the engine is thinking.
    assert_eq!(registry.remove_owner(OwnerId(4)).await, vec![id]);

    let outcome = tokio::time::timeout(Duration::from_secs(2), search)
        .await
        .expect("search should resolve promptly")
        .unwrap();
    assert!(handle.engine.exit_status().await.is_some());

    let mut game = handle.game.lock().await;
    assert_eq!(game.complete_opponent_move(outcome), Err(GameError::Cancelled));
    assert_eq!(game.history(), ["e4"]);
    assert!(!registry.contains(id).await);
}
