use std::collections::HashMap;
use std::sync::Arc;

use futures::channel::mpsc::UnboundedReceiver;
use tokio::sync::watch;

use crate::common::{
    ConnectionId, ErrorCode, Event, MatchSource, Player, Rating, Ratings, Subvariant, UserId,
    Variant,
};
use crate::config::Config;
use crate::connections::Connections;
use crate::game::GameController;
use crate::matchmaking::Matchmaker;
use crate::store::SessionStore;

use super::{TournamentStatus, Tournaments};

#[tokio::test]
async fn test_cross_queue_match_preserves_sources() {
    let config = Config::builder()
        .tournament_variants(vec![(Variant::Classic, Some(Subvariant::Blitz))])
        .build();
    let env = setup(config);
    let mut rx_r = env.register("c-r", "regular").await;
    let mut rx_t = env.register("c-t", "arena").await;

    let joined = env
        .matchmaker
        .join_queue(
            classic_player("regular", "Mario", Subvariant::Blitz, 1500.0),
            "c-r".into(),
            Variant::Classic,
            Some(Subvariant::Blitz),
        )
        .await
        .unwrap();
    assert!(!joined);

    let matched = env
        .tournaments
        .join_tournament(
            classic_player("arena", "Luigi", Subvariant::Blitz, 1520.0),
            "c-t".into(),
        )
        .await
        .unwrap();
    assert!(matched);

    // The regular waiter left their queue, both have a session.
    assert!(env.matchmaker.entry_of(&"regular".into()).await.is_none());
    let session = env
        .store
        .get_user_active_session(&"arena".into())
        .await
        .unwrap();
    assert_eq!(
        session.metadata.source.get(&UserId::from("arena")),
        Some(&MatchSource::Tournament)
    );
    assert_eq!(
        session.metadata.source.get(&UserId::from("regular")),
        Some(&MatchSource::Matchmaking)
    );

    match next_event(&mut rx_r) {
        Event::QueueMatched { tournament, .. } => assert!(!tournament),
        other => panic!("expected a matched event, got {:?}", other),
    }
    match next_event(&mut rx_t) {
        Event::TournamentNewActive { .. } => {}
        other => panic!("expected a new-active event, got {:?}", other),
    }
    match next_event(&mut rx_t) {
        Event::TournamentJoined { .. } => {}
        other => panic!("expected a joined event, got {:?}", other),
    }
    match next_event(&mut rx_t) {
        Event::QueueMatched { tournament, .. } => assert!(tournament),
        other => panic!("expected a matched event, got {:?}", other),
    }

    // Cooldowns were applied on both sides of the cross-queue match.
    assert!(env
        .matchmaker
        .cooldown_until(&"arena".into())
        .await
        .is_some());
    assert!(env
        .matchmaker
        .cooldown_until(&"regular".into())
        .await
        .is_some());
}

#[tokio::test]
async fn test_tournament_peers_match_each_other() {
    let config = Config::builder()
        .tournament_variants(vec![(Variant::Crazyhouse, None)])
        .build();
    let env = setup(config);
    let _rx_1 = env.register("c-1", "t1").await;
    let _rx_2 = env.register("c-2", "t2").await;

    let first = env
        .tournaments
        .join_tournament(
            flat_player("t1", "Mario", Variant::Crazyhouse, 1500.0),
            "c-1".into(),
        )
        .await
        .unwrap();
    assert!(!first);
    let second = env
        .tournaments
        .join_tournament(
            flat_player("t2", "Luigi", Variant::Crazyhouse, 1520.0),
            "c-2".into(),
        )
        .await
        .unwrap();
    assert!(second);

    let session = env.store.get_user_active_session(&"t1".into()).await.unwrap();
    assert_eq!(
        session.metadata.source.get(&UserId::from("t1")),
        Some(&MatchSource::Tournament)
    );
    assert_eq!(
        session.metadata.source.get(&UserId::from("t2")),
        Some(&MatchSource::Tournament)
    );
    let details = env.tournaments.active_details().await.unwrap();
    assert_eq!(details.status, TournamentStatus::InProgress);
}

#[tokio::test]
async fn test_capacity_is_enforced() {
    let config = Config::builder()
        .tournament_variants(vec![(Variant::Crazyhouse, None)])
        .tournament_capacity(1)
        .build();
    let env = setup(config);
    let _rx_1 = env.register("c-1", "t1").await;
    let mut rx_2 = env.register("c-2", "t2").await;

    env.tournaments
        .join_tournament(
            flat_player("t1", "Mario", Variant::Crazyhouse, 1500.0),
            "c-1".into(),
        )
        .await
        .unwrap();
    let err = env
        .tournaments
        .join_tournament(
            flat_player("t2", "Luigi", Variant::Crazyhouse, 1520.0),
            "c-2".into(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ValidationError);
    match next_event(&mut rx_2) {
        Event::TournamentError { .. } => {}
        other => panic!("expected a tournament error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_active_details_reflects_participants() {
    let config = Config::builder()
        .tournament_variants(vec![(Variant::Decay, None)])
        .build();
    let env = setup(config);
    let _rx_1 = env.register("c-1", "t1").await;
    assert!(env.tournaments.active_details().await.is_none());

    env.tournaments
        .join_tournament(
            flat_player("t1", "Mario", Variant::Decay, 1500.0),
            "c-1".into(),
        )
        .await
        .unwrap();
    let details = env.tournaments.active_details().await.unwrap();
    assert_eq!(details.participants, 1);
    assert_eq!(details.status, TournamentStatus::Open);
}

// Helper functions

struct Env {
    connections: Connections,
    matchmaker: Matchmaker,
    tournaments: Tournaments,
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
    let matchmaker = Matchmaker::new(
        connections.clone(),
        games.clone(),
        config.clone(),
        shutdown_rx,
    );
    let tournaments = Tournaments::new(
        connections.clone(),
        games,
        matchmaker.clone(),
        config,
    );
    Env {
        connections,
        matchmaker,
        tournaments,
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
