use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::channel::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tokio::time::delay_for;

use crate::common::utils::now_ms;
use crate::common::{
    ConnectionId, ErrorCode, Event, Player, Rating, Ratings, Subvariant, UserId, Variant,
};
use crate::config::Config;
use crate::connections::Connections;
use crate::game::GameController;
use crate::store::SessionStore;

use super::Matchmaker;

#[tokio::test]
async fn test_rank_window_match() {
    let env = setup(Config::default());
    let mut rx_a = env.register("c-a", "a").await;
    let mut rx_b = env.register("c-b", "b").await;

    let joined = env
        .matchmaker
        .join_queue(
            flat_player("a", "Mario", Variant::Crazyhouse, 1500.0),
            "c-a".into(),
            Variant::Crazyhouse,
            None,
        )
        .await
        .unwrap();
    assert!(!joined);
    assert_eq!(env.matchmaker.waiting_count(Variant::Crazyhouse).await, 1);

    let matched = env
        .matchmaker
        .join_queue(
            flat_player("b", "Luigi", Variant::Crazyhouse, 1600.0),
            "c-b".into(),
            Variant::Crazyhouse,
            None,
        )
        .await
        .unwrap();
    assert!(matched);

    // Queue entries are gone, cooldowns are running.
    assert!(env.matchmaker.entry_of(&"a".into()).await.is_none());
    assert!(env.matchmaker.entry_of(&"b".into()).await.is_none());
    let now = now_ms();
    assert!(env.matchmaker.cooldown_until(&"a".into()).await.unwrap() > now);
    assert!(env.matchmaker.cooldown_until(&"b".into()).await.unwrap() > now);

    let sid_a = match next_event(&mut rx_a) {
        Event::QueueMatched {
            session_id,
            tournament,
            ..
        } => {
            assert!(!tournament);
            session_id
        }
        other => panic!("expected a matched event, got {:?}", other),
    };
    let sid_b = match next_event(&mut rx_b) {
        Event::QueueMatched { session_id, .. } => session_id,
        other => panic!("expected a matched event, got {:?}", other),
    };
    assert_eq!(sid_a, sid_b);

    let session = env
        .store
        .get_user_active_session(&"a".into())
        .await
        .unwrap();
    assert_ne!(session.players.white.user_id, session.players.black.user_id);
}

#[tokio::test]
async fn test_cooldown_blocks_rejoin() {
    let env = setup(Config::default());
    let mut rx_a = env.register("c-a", "a").await;
    env.matchmaker
        .join_queue(
            flat_player("a", "Mario", Variant::Decay, 1500.0),
            "c-a".into(),
            Variant::Decay,
            None,
        )
        .await
        .unwrap();
    env.matchmaker.leave_queue(&"a".into()).await;
    assert!(env.matchmaker.cooldown_until(&"a".into()).await.is_some());

    let joined = env
        .matchmaker
        .join_queue(
            flat_player("a", "Mario", Variant::Decay, 1500.0),
            "c-a".into(),
            Variant::Decay,
            None,
        )
        .await
        .unwrap();
    assert!(!joined);
    assert!(env.matchmaker.entry_of(&"a".into()).await.is_none());
    match next_event(&mut rx_a) {
        Event::QueueCooldown { until } => assert!(until > now_ms() - 1_000),
        other => panic!("expected a cooldown event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fallback_matches_in_time_order() {
    let env = setup(Config::builder().fallback_delay(50).build());
    let _rx_a = env.register("c-a", "a").await;
    let _rx_b = env.register("c-b", "b").await;

    // 300 points apart: outside any rank window, so only the fallback
    // pass can pair them.
    let first = env
        .matchmaker
        .join_queue(
            flat_player("a", "Mario", Variant::SixPointer, 1500.0),
            "c-a".into(),
            Variant::SixPointer,
            None,
        )
        .await
        .unwrap();
    let second = env
        .matchmaker
        .join_queue(
            flat_player("b", "Luigi", Variant::SixPointer, 1800.0),
            "c-b".into(),
            Variant::SixPointer,
            None,
        )
        .await
        .unwrap();
    assert!(!first && !second);

    delay_for(Duration::from_millis(300)).await;
    assert!(env.matchmaker.entry_of(&"a".into()).await.is_none());
    assert!(env.matchmaker.entry_of(&"b".into()).await.is_none());
    assert!(env
        .store
        .get_user_active_session(&"a".into())
        .await
        .is_some());
}

#[tokio::test]
async fn test_classic_requires_matching_subvariant() {
    let env = setup(Config::default());
    let _rx_a = env.register("c-a", "a").await;
    let _rx_b = env.register("c-b", "b").await;
    env.matchmaker
        .join_queue(
            classic_player("a", "Mario", Subvariant::Blitz, 1500.0),
            "c-a".into(),
            Variant::Classic,
            Some(Subvariant::Blitz),
        )
        .await
        .unwrap();
    let matched = env
        .matchmaker
        .join_queue(
            classic_player("b", "Luigi", Subvariant::Bullet, 1500.0),
            "c-b".into(),
            Variant::Classic,
            Some(Subvariant::Bullet),
        )
        .await
        .unwrap();
    assert!(!matched);
    assert_eq!(env.matchmaker.waiting_count(Variant::Classic).await, 2);
}

#[tokio::test]
async fn test_rejoining_moves_the_entry_across_queues() {
    let env = setup(Config::default());
    let _rx_a = env.register("c-a", "a").await;
    let mut player = classic_player("a", "Mario", Subvariant::Blitz, 1500.0);
    player
        .ratings
        .0
        .insert(Variant::Crazyhouse, Rating::Flat(1450.0));
    env.matchmaker
        .join_queue(
            player.clone(),
            "c-a".into(),
            Variant::Classic,
            Some(Subvariant::Blitz),
        )
        .await
        .unwrap();
    env.matchmaker
        .join_queue(player, "c-a".into(), Variant::Crazyhouse, None)
        .await
        .unwrap();
    // A user owns at most one queue entry across all queues.
    assert_eq!(env.matchmaker.waiting_count(Variant::Classic).await, 0);
    let entry = env.matchmaker.entry_of(&"a".into()).await.unwrap();
    assert_eq!(entry.variant, Variant::Crazyhouse);
    assert_eq!(entry.rank, 1450.0);
}

#[tokio::test]
async fn test_missing_rating_is_an_error() {
    let env = setup(Config::default());
    let mut rx_a = env.register("c-a", "a").await;
    let err = env
        .matchmaker
        .join_queue(
            flat_player("a", "Mario", Variant::Crazyhouse, 1500.0),
            "c-a".into(),
            Variant::Decay,
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidInput);
    match next_event(&mut rx_a) {
        Event::QueueError { code, .. } => assert_eq!(code, Some(ErrorCode::InvalidInput)),
        other => panic!("expected a queue error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_dead_connection_is_evicted() {
    let env = setup(Config::default());
    let rx_a = env.register("c-a", "a").await;
    drop(rx_a);
    let joined = env
        .matchmaker
        .join_queue(
            flat_player("a", "Mario", Variant::Crazyhouse, 1500.0),
            "c-a".into(),
            Variant::Crazyhouse,
            None,
        )
        .await
        .unwrap();
    assert!(!joined);
    // The immediate match attempt notices the dead connection and evicts.
    assert!(env.matchmaker.entry_of(&"a".into()).await.is_none());
}

// Helper functions

struct Env {
    connections: Connections,
    matchmaker: Matchmaker,
    store: SessionStore,
    _shutdown: watch::Sender<bool>,
}

impl Env {
    async fn register(&self, conn: &str, user: &str) -> UnboundedReceiver<Event> {
        self.connections
            .register(ConnectionId::from(conn), UserId::from(user))
            .await
    }
}

fn setup(config: Config) -> Env {
    let config = Arc::new(config);
    let connections = Connections::new(config.max_errors_per_sec());
    let store = SessionStore::new(config.clone());
    let games = GameController::new(store.clone(), connections.clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let matchmaker = Matchmaker::new(connections.clone(), games, config, shutdown_rx);
    Env {
        connections,
        matchmaker,
        store,
        _shutdown: shutdown_tx,
    }
}

fn flat_player(id: &str, name: &str, variant: Variant, rating: f64) -> Player {
    let mut ratings = HashMap::new();
    ratings.insert(variant, Rating::Flat(rating));
    Player {
        user_id: id.into(),
        name: name.into(),
        ratings: Ratings(ratings),
        avatar: None,
        title: None,
    }
}

fn classic_player(id: &str, name: &str, subvariant: Subvariant, rating: f64) -> Player {
    let mut nested = HashMap::new();
    nested.insert(subvariant, rating);
    let mut ratings = HashMap::new();
    ratings.insert(Variant::Classic, Rating::BySubvariant(nested));
    Player {
        user_id: id.into(),
        name: name.into(),
        ratings: Ratings(ratings),
        avatar: None,
        title: None,
    }
}

fn next_event(rx: &mut UnboundedReceiver<Event>) -> Event {
    rx.try_next()
        .expect("event channel is open")
        .expect("an event was emitted")
}
