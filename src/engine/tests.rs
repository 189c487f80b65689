use std::collections::HashMap;

use crate::common::{Color, EndReason, ErrorCode, PieceKind, Subvariant, Variant};

use super::board::{normalized_fen, Board};
use super::{moves_from, update_timers, validate_and_apply, MoveInput, MoveReply};

// Classic

#[test]
fn test_bullet_timeout() {
    let board = Board::initial(Variant::Classic, Some(Subvariant::Bullet), 0);
    assert_eq!(board.white_time, 60_000);
    assert_eq!(board.increment, 1_000);
    let board = apply_ok(
        Variant::Classic,
        Some(Subvariant::Bullet),
        &board,
        MoveInput::normal("e2", "e4"),
        Color::White,
        0,
    );
    assert_eq!(board.white_time, 61_000);
    assert_eq!(board.black_time, 60_000);
    assert_eq!(board.active_color, Color::Black);

    let update = update_timers(Variant::Classic, Some(Subvariant::Bullet), &board, 61_001);
    assert!(update.game_ended);
    assert_eq!(update.state.end_reason, Some(EndReason::Timeout));
    assert_eq!(update.state.winner_color, Some(Color::White));
    assert_eq!(update.state.black_time, 0);
}

#[test]
fn test_clock_boundary_one_ms_left_is_not_timeout() {
    let board = Board::initial(Variant::Classic, Some(Subvariant::Bullet), 0);
    let board = apply_ok(
        Variant::Classic,
        Some(Subvariant::Bullet),
        &board,
        MoveInput::normal("e2", "e4"),
        Color::White,
        0,
    );
    let update = update_timers(Variant::Classic, Some(Subvariant::Bullet), &board, 59_999);
    assert!(!update.game_ended);
    assert_eq!(update.state.black_time, 1);
    // Exactly zero is a flag fall.
    let update = update_timers(Variant::Classic, Some(Subvariant::Bullet), &board, 60_000);
    assert!(update.game_ended);
    assert_eq!(update.state.end_reason, Some(EndReason::Timeout));
}

#[test]
fn test_increment_accounting() {
    let variant = Variant::Classic;
    let sub = Some(Subvariant::Blitz);
    let board = Board::initial(variant, sub, 0);
    let board = apply_ok(variant, sub, &board, MoveInput::normal("e2", "e4"), Color::White, 0);
    assert_eq!(board.white_time, 182_000);
    let board = apply_ok(variant, sub, &board, MoveInput::normal("e7", "e5"), Color::Black, 0);
    assert_eq!(board.black_time, 182_000);
    let board = apply_ok(variant, sub, &board, MoveInput::normal("g1", "f3"), Color::White, 0);
    assert_eq!(board.white_time, 184_000);
    assert_eq!(board.black_time, 182_000);
}

#[test]
fn test_active_color_tracks_fen() {
    let variant = Variant::Classic;
    let sub = Some(Subvariant::Standard);
    let mut board = Board::initial(variant, sub, 0);
    let moves = [
        ("e2", "e4", Color::White),
        ("c7", "c5", Color::Black),
        ("g1", "f3", Color::White),
        ("d7", "d6", Color::Black),
    ];
    for &(from, to, color) in &moves {
        board = apply_ok(variant, sub, &board, MoveInput::normal(from, to), color, 0);
        assert_eq!(fen_side(&board.fen), board.active_color);
    }
}

#[test]
fn test_reject_leaves_board_unchanged() {
    let board = Board::initial(Variant::Classic, Some(Subvariant::Standard), 0);
    let before = serde_json::to_string(&board).unwrap();
    let reply = validate_and_apply(
        Variant::Classic,
        Some(Subvariant::Standard),
        &board,
        &MoveInput::normal("e2", "e5"),
        Color::White,
        Some(0),
    );
    assert_eq!(reject_code(&reply), ErrorCode::IllegalMove);
    assert_eq!(serde_json::to_string(&board).unwrap(), before);
}

#[test]
fn test_wrong_turn() {
    let board = Board::initial(Variant::Classic, Some(Subvariant::Standard), 0);
    let reply = validate_and_apply(
        Variant::Classic,
        Some(Subvariant::Standard),
        &board,
        &MoveInput::normal("e7", "e5"),
        Color::Black,
        Some(0),
    );
    assert_eq!(reject_code(&reply), ErrorCode::WrongTurn);
}

#[test]
fn test_move_after_game_ended_rejected() {
    let mut board = Board::initial(Variant::Classic, Some(Subvariant::Standard), 0);
    board.end(EndReason::Resignation, Some(Color::Black), 0);
    let reply = validate_and_apply(
        Variant::Classic,
        Some(Subvariant::Standard),
        &board,
        &MoveInput::normal("e2", "e4"),
        Color::White,
        Some(0),
    );
    assert_eq!(reject_code(&reply), ErrorCode::GameEnded);
}

#[test]
fn test_threefold_repetition_draw() {
    let variant = Variant::Classic;
    let sub = Some(Subvariant::Standard);
    let mut board = Board::initial(variant, sub, 0);
    let shuffle = [
        ("g1", "f3", Color::White),
        ("g8", "f6", Color::Black),
        ("f3", "g1", Color::White),
        ("f6", "g8", Color::Black),
    ];
    for _ in 0..2 {
        for &(from, to, color) in &shuffle {
            assert!(!board.game_ended);
            board = apply_ok(variant, sub, &board, MoveInput::normal(from, to), color, 0);
        }
    }
    assert!(board.game_ended);
    assert_eq!(board.end_reason, Some(EndReason::ThreefoldRepetition));
    assert_eq!(board.winner_color, None);
}

#[test]
fn test_stalemate_is_a_draw_in_classic() {
    let board = board_with_fen(
        Variant::Classic,
        Some(Subvariant::Standard),
        "7k/4Q3/6K1/8/8/8/8/8 w - - 0 1",
    );
    let board = apply_ok(
        Variant::Classic,
        Some(Subvariant::Standard),
        &board,
        MoveInput::normal("e7", "f7"),
        Color::White,
        0,
    );
    assert!(board.game_ended);
    assert_eq!(board.end_reason, Some(EndReason::Stalemate));
}

#[test]
fn test_fischer_back_ranks() {
    let ranks = crate::chess::chess960_back_ranks();
    assert_eq!(ranks.len(), 960);
    for rank in &ranks {
        let bishops: Vec<usize> = (0..8)
            .filter(|&i| rank[i] == shakmaty::Role::Bishop)
            .collect();
        assert_eq!(bishops.len(), 2);
        assert_ne!(bishops[0] % 2, bishops[1] % 2);
        let rooks: Vec<usize> = (0..8)
            .filter(|&i| rank[i] == shakmaty::Role::Rook)
            .collect();
        let king = (0..8).find(|&i| rank[i] == shakmaty::Role::King).unwrap();
        assert!(rooks[0] < king && king < rooks[1]);
    }
}

#[test]
fn test_fischer_board_is_playable() {
    let board = Board::initial(Variant::Classic, Some(Subvariant::Fischer), 0);
    let moves = moves_from(
        Variant::Classic,
        Some(Subvariant::Fischer),
        &board,
        "e2",
        0,
    )
    .unwrap();
    assert_eq!(moves.len(), 2);
}

// Crazyhouse

#[test]
fn test_capture_fills_pocket_and_drop_places_piece() {
    let variant = Variant::Crazyhouse;
    let board = Board::initial(variant, None, 0);
    let board = apply_ok(variant, None, &board, MoveInput::normal("e2", "e4"), Color::White, 0);
    let board = apply_ok(variant, None, &board, MoveInput::normal("d7", "d5"), Color::Black, 100);
    let board = apply_ok(variant, None, &board, MoveInput::normal("e4", "d5"), Color::White, 200);
    assert_eq!(board.pocket_pieces.as_ref().unwrap().white, vec![PieceKind::Pawn]);
    assert_eq!(board.captured_pieces.white, vec![PieceKind::Pawn]);

    let board = apply_ok(variant, None, &board, MoveInput::normal("g8", "f6"), Color::Black, 300);
    let board = apply_ok(
        variant,
        None,
        &board,
        MoveInput::pocket_drop(PieceKind::Pawn, "e4"),
        Color::White,
        400,
    );
    assert!(board.pocket_pieces.as_ref().unwrap().white.is_empty());
    assert_eq!(board.active_color, Color::Black);
    let last = board.move_history.last().unwrap();
    assert!(last.drop);
    assert_eq!(last.to, "e4");
}

#[test]
fn test_drop_rules() {
    let variant = Variant::Crazyhouse;
    let mut board = board_with_fen(
        variant,
        None,
        "rnbqk2r/pppppppp/8/8/8/8/PPPPPPPP/RNBQK2R w KQkq - 0 1",
    );
    board
        .pocket_pieces
        .as_mut()
        .unwrap()
        .white
        .push(PieceKind::Pawn);

    let reply = validate_and_apply(
        variant,
        None,
        &board,
        &MoveInput::pocket_drop(PieceKind::Pawn, "f1"),
        Color::White,
        Some(0),
    );
    assert_eq!(reject_code(&reply), ErrorCode::InvalidPawnDrop);

    let reply = validate_and_apply(
        variant,
        None,
        &board,
        &MoveInput::pocket_drop(PieceKind::Pawn, "e2"),
        Color::White,
        Some(0),
    );
    assert_eq!(reject_code(&reply), ErrorCode::SquareOccupied);

    let reply = validate_and_apply(
        variant,
        None,
        &board,
        &MoveInput::pocket_drop(PieceKind::Knight, "f3"),
        Color::White,
        Some(0),
    );
    assert_eq!(reject_code(&reply), ErrorCode::PieceNotInPocket);
}

#[test]
fn test_stalemate_with_pocket_is_not_a_draw() {
    let variant = Variant::Crazyhouse;
    let mut board = board_with_fen(variant, None, "7k/4Q3/6K1/8/8/8/8/8 w - - 0 1");
    board
        .pocket_pieces
        .as_mut()
        .unwrap()
        .black
        .push(PieceKind::Knight);
    let board = apply_ok(variant, None, &board, MoveInput::normal("e7", "f7"), Color::White, 0);
    assert!(!board.game_ended);
}

#[test]
fn test_mate_with_saving_drop_continues() {
    let variant = Variant::Crazyhouse;
    let mut board = board_with_fen(variant, None, "6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1");
    board
        .pocket_pieces
        .as_mut()
        .unwrap()
        .black
        .push(PieceKind::Rook);
    let board = apply_ok(variant, None, &board, MoveInput::normal("a1", "a8"), Color::White, 0);
    assert!(!board.game_ended);
    // The defender blocks with the pocketed rook.
    let board = apply_ok(
        variant,
        None,
        &board,
        MoveInput::pocket_drop(PieceKind::Rook, "e8"),
        Color::Black,
        100,
    );
    assert!(!board.game_ended);
    assert!(board.pocket_pieces.as_ref().unwrap().black.is_empty());
}

#[test]
fn test_back_rank_mate_without_pocket_ends_game() {
    let variant = Variant::Crazyhouse;
    let board = board_with_fen(variant, None, "6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1");
    let board = apply_ok(variant, None, &board, MoveInput::normal("a1", "a8"), Color::White, 0);
    assert!(board.game_ended);
    assert_eq!(board.end_reason, Some(EndReason::Checkmate));
    assert_eq!(board.winner_color, Some(Color::White));
}

#[test]
fn test_promoted_piece_reverts_to_pawn_when_captured() {
    let variant = Variant::Crazyhouse;
    let board = board_with_fen(variant, None, "1r5k/P7/8/8/8/8/8/6K1 w - - 0 1");
    let board = apply_ok(
        variant,
        None,
        &board,
        MoveInput::promoting("a7", "a8", PieceKind::Queen),
        Color::White,
        0,
    );
    assert_eq!(board.promoted_squares.as_ref().unwrap(), &vec!["a8".to_string()]);
    let board = apply_ok(variant, None, &board, MoveInput::normal("b8", "a8"), Color::Black, 100);
    assert_eq!(board.pocket_pieces.as_ref().unwrap().black, vec![PieceKind::Pawn]);
    assert!(board.promoted_squares.as_ref().unwrap().is_empty());
    assert_eq!(board.captured_pieces.black, vec![PieceKind::Queen]);
}

#[test]
fn test_pocket_listing_avoids_back_ranks_for_pawns() {
    let variant = Variant::Crazyhouse;
    let mut board = Board::initial(variant, None, 0);
    board
        .pocket_pieces
        .as_mut()
        .unwrap()
        .white
        .push(PieceKind::Pawn);
    let moves = moves_from(variant, None, &board, "pocket", 0).unwrap();
    assert!(!moves.is_empty());
    for m in &moves {
        assert_eq!(m.flags, "d");
        assert!(!m.to.ends_with('1') && !m.to.ends_with('8'));
    }
}

// Crazyhouse with timer

#[test]
fn test_drop_timer_expiry() {
    let variant = Variant::Crazyhouse;
    let sub = Some(Subvariant::WithTimer);
    let board = board_with_fen(
        variant,
        sub,
        "rnbqkb1r/pppppppp/8/3n4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 1",
    );
    let board = apply_ok(variant, sub, &board, MoveInput::normal("e4", "d5"), Color::White, 0);
    let timers = &board.drop_timers.as_ref().unwrap().white;
    assert_eq!(timers.get("n_0"), Some(&10_000));

    // A quiet black move just before expiry leaves the timer alone.
    let board = apply_ok(variant, sub, &board, MoveInput::normal("g7", "g6"), Color::Black, 9_999);
    assert_eq!(
        board.drop_timers.as_ref().unwrap().white.get("n_0"),
        Some(&10_000)
    );

    let reply = validate_and_apply(
        variant,
        sub,
        &board,
        &MoveInput::pocket_drop(PieceKind::Knight, "e4"),
        Color::White,
        Some(10_001),
    );
    assert_eq!(reject_code(&reply), ErrorCode::DropExpired);

    // The expiry itself lands on the next timer poll.
    let update = update_timers(variant, sub, &board, 10_001);
    assert!(update.changed);
    assert!(update.state.pocketed_pieces.as_ref().unwrap().white.is_empty());
    assert!(update.state.drop_timers.as_ref().unwrap().white.is_empty());
}

#[test]
fn test_pocket_queue_is_fifo_with_single_timer() {
    let variant = Variant::Crazyhouse;
    let sub = Some(Subvariant::WithTimer);
    let board = board_with_fen(
        variant,
        sub,
        "rnbqkb1r/pppppppp/8/3n4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 1",
    );
    let board = apply_ok(variant, sub, &board, MoveInput::normal("e4", "d5"), Color::White, 0);
    let board = apply_ok(variant, sub, &board, MoveInput::normal("e7", "e6"), Color::Black, 1_000);
    let board = apply_ok(variant, sub, &board, MoveInput::normal("d5", "e6"), Color::White, 2_000);

    let queue = &board.pocketed_pieces.as_ref().unwrap().white;
    assert_eq!(queue.len(), 2);
    assert_eq!(queue[0].kind, PieceKind::Knight);
    assert_eq!(queue[1].kind, PieceKind::Pawn);
    // One running timer per color, and it belongs to the head.
    let timers = &board.drop_timers.as_ref().unwrap().white;
    assert_eq!(timers.len(), 1);
    assert_eq!(timers.get("n_0"), Some(&10_000));

    let board = apply_ok(variant, sub, &board, MoveInput::normal("a7", "a6"), Color::Black, 3_000);
    let reply = validate_and_apply(
        variant,
        sub,
        &board,
        &MoveInput::pocket_drop(PieceKind::Pawn, "e4"),
        Color::White,
        Some(4_000),
    );
    assert_eq!(reject_code(&reply), ErrorCode::SequentialDropOnly);

    // Dropping the head starts the next head's window.
    let board = apply_ok(
        variant,
        sub,
        &board,
        MoveInput::pocket_drop(PieceKind::Knight, "e4"),
        Color::White,
        4_000,
    );
    let timers = &board.drop_timers.as_ref().unwrap().white;
    assert_eq!(timers.len(), 1);
    assert_eq!(timers.get("p_2000"), Some(&14_000));
}

#[test]
fn test_timer_board_serialization_round_trip() {
    let variant = Variant::Crazyhouse;
    let sub = Some(Subvariant::WithTimer);
    let board = board_with_fen(
        variant,
        sub,
        "rnbqkb1r/pppppppp/8/3n4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 1",
    );
    let board = apply_ok(variant, sub, &board, MoveInput::normal("e4", "d5"), Color::White, 0);
    let json = serde_json::to_string(&board).unwrap();
    let reloaded: Board = serde_json::from_str(&json).unwrap();
    let a = apply_ok(variant, sub, &board, MoveInput::normal("g7", "g6"), Color::Black, 1_000);
    let b = apply_ok(variant, sub, &reloaded, MoveInput::normal("g7", "g6"), Color::Black, 1_000);
    assert_eq!(a.fen, b.fen);
    assert_eq!(a.repetition_map, b.repetition_map);
    assert_eq!(
        serde_json::to_string(&a.drop_timers).unwrap(),
        serde_json::to_string(&b.drop_timers).unwrap()
    );
}

#[test]
fn test_derived_frozen_covers_non_head_entries() {
    let variant = Variant::Crazyhouse;
    let sub = Some(Subvariant::WithTimer);
    let board = board_with_fen(
        variant,
        sub,
        "rnbqkb1r/pppppppp/8/3n4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 1",
    );
    let board = apply_ok(variant, sub, &board, MoveInput::normal("e4", "d5"), Color::White, 0);
    let board = apply_ok(variant, sub, &board, MoveInput::normal("e7", "e6"), Color::Black, 1_000);
    let board = apply_ok(variant, sub, &board, MoveInput::normal("d5", "e6"), Color::White, 2_000);
    let frozen = super::derived_frozen(&board, Color::White);
    assert_eq!(frozen, vec!["p_2000".to_string()]);
}

// Decay

#[test]
fn test_queen_decay_freeze() {
    let variant = Variant::Decay;
    let board = Board::initial(variant, None, 0);
    let board = apply_ok(variant, None, &board, MoveInput::normal("d2", "d4"), Color::White, 0);
    let board = apply_ok(variant, None, &board, MoveInput::normal("d7", "d5"), Color::Black, 500);
    let board = apply_ok(variant, None, &board, MoveInput::normal("d1", "d3"), Color::White, 1_000);
    {
        let queen = board.decay_timers.as_ref().unwrap().white.queen.as_ref().unwrap();
        assert!(queen.active);
        assert_eq!(queen.time_remaining, 25_000);
        assert_eq!(queen.move_count, 1);
        assert_eq!(board.decay_active, Some(true));
    }
    let board = apply_ok(variant, None, &board, MoveInput::normal("g8", "f6"), Color::Black, 2_000);
    // Another queen move pays back two seconds.
    let board = apply_ok(variant, None, &board, MoveInput::normal("d3", "e3"), Color::White, 3_000);
    {
        let queen = board.decay_timers.as_ref().unwrap().white.queen.as_ref().unwrap();
        assert_eq!(queen.time_remaining, 25_000);
        assert_eq!(queen.move_count, 2);
    }
    let board = apply_ok(variant, None, &board, MoveInput::normal("a7", "a6"), Color::Black, 4_000);

    let update = update_timers(variant, None, &board, 30_001);
    assert!(update.changed);
    assert!(!update.game_ended);
    let board = *update.state;
    assert!(board
        .frozen_pieces
        .as_ref()
        .unwrap()
        .white
        .contains(&"queen".to_string()));
    let queen = board.decay_timers.as_ref().unwrap().white.queen.as_ref().unwrap();
    assert!(queen.frozen);
    assert!(!queen.active);

    let reply = validate_and_apply(
        variant,
        None,
        &board,
        &MoveInput::normal("e3", "e4"),
        Color::White,
        Some(31_000),
    );
    assert_eq!(reject_code(&reply), ErrorCode::PieceFrozen);
}

#[test]
fn test_major_piece_decay_after_queen_freeze() {
    let variant = Variant::Decay;
    let board = Board::initial(variant, None, 0);
    let board = apply_ok(variant, None, &board, MoveInput::normal("d2", "d4"), Color::White, 0);
    let board = apply_ok(variant, None, &board, MoveInput::normal("d7", "d5"), Color::Black, 500);
    let board = apply_ok(variant, None, &board, MoveInput::normal("d1", "d3"), Color::White, 1_000);
    let board = apply_ok(variant, None, &board, MoveInput::normal("g8", "f6"), Color::Black, 2_000);
    let board = *update_timers(variant, None, &board, 27_000).state;
    assert!(board
        .frozen_pieces
        .as_ref()
        .unwrap()
        .white
        .contains(&"queen".to_string()));

    // First major piece to move becomes the tracked one.
    let board = apply_ok(
        variant,
        None,
        &board,
        MoveInput::normal("b1", "c3"),
        Color::White,
        28_000,
    );
    {
        let major = board
            .decay_timers
            .as_ref()
            .unwrap()
            .white
            .major_piece
            .as_ref()
            .unwrap();
        assert_eq!(major.piece_type, PieceKind::Knight);
        assert_eq!(major.piece_square, "c3");
        assert_eq!(major.time_remaining, 20_000);
    }
    let board = apply_ok(variant, None, &board, MoveInput::normal("a7", "a6"), Color::Black, 29_000);
    // Moving the tracked piece follows it and pays the bonus.
    let board = apply_ok(
        variant,
        None,
        &board,
        MoveInput::normal("c3", "d5"),
        Color::White,
        30_000,
    );
    {
        let major = board
            .decay_timers
            .as_ref()
            .unwrap()
            .white
            .major_piece
            .as_ref()
            .unwrap();
        assert_eq!(major.piece_square, "d5");
        assert_eq!(major.time_remaining, 20_000);
        assert_eq!(major.move_count, 2);
    }
    let board = apply_ok(variant, None, &board, MoveInput::normal("a6", "a5"), Color::Black, 31_000);

    let board = *update_timers(variant, None, &board, 50_001).state;
    assert!(board
        .frozen_pieces
        .as_ref()
        .unwrap()
        .white
        .contains(&"d5".to_string()));
    let reply = validate_and_apply(
        variant,
        None,
        &board,
        &MoveInput::normal("d5", "f6"),
        Color::White,
        Some(50_100),
    );
    assert_eq!(reject_code(&reply), ErrorCode::PieceFrozen);
}

#[test]
fn test_frozen_pieces_excluded_from_listings() {
    let variant = Variant::Decay;
    let board = Board::initial(variant, None, 0);
    let board = apply_ok(variant, None, &board, MoveInput::normal("d2", "d4"), Color::White, 0);
    let board = apply_ok(variant, None, &board, MoveInput::normal("d7", "d5"), Color::Black, 500);
    let board = apply_ok(variant, None, &board, MoveInput::normal("d1", "d3"), Color::White, 1_000);
    let board = apply_ok(variant, None, &board, MoveInput::normal("g8", "f6"), Color::Black, 2_000);
    let board = *update_timers(variant, None, &board, 27_000).state;
    let moves = moves_from(variant, None, &board, "d3", 27_000).unwrap();
    assert!(moves.is_empty());
}

// SixPointer

#[test]
fn test_foul_play_and_points_draw() {
    let variant = Variant::SixPointer;
    let board = board_with_fen(variant, None, super::board::SIXPOINTER_START_FENS[0]);
    let quiet = [
        ("a2", "a3", Color::White),
        ("a7", "a6", Color::Black),
        ("b2", "b3", Color::White),
        ("h7", "h6", Color::Black),
        ("h2", "h3", Color::White),
        ("g7", "g6", Color::Black),
        ("g2", "g3", Color::White),
        ("b7", "b6", Color::Black),
        ("d2", "d3", Color::White),
        ("d7", "d6", Color::Black),
        ("c2", "c3", Color::White),
    ];
    let mut board = board;
    for &(from, to, color) in &quiet {
        board = apply_ok(variant, None, &board, MoveInput::normal(from, to), color, 0);
    }
    assert_eq!(*board.moves_played.as_ref().unwrap().get(Color::White), 6);
    assert_eq!(*board.moves_played.as_ref().unwrap().get(Color::Black), 5);

    // Black's final move may not capture: white has nothing left to
    // answer with.
    let reply = validate_and_apply(
        variant,
        None,
        &board,
        &MoveInput::normal("c5", "a3"),
        Color::Black,
        Some(0),
    );
    assert_eq!(reject_code(&reply), ErrorCode::FoulPlay);

    let board = apply_ok(variant, None, &board, MoveInput::normal("c6", "e7"), Color::Black, 0);
    assert!(board.game_ended);
    assert_eq!(board.end_reason, Some(EndReason::Points));
    assert_eq!(board.winner_color, None);
}

#[test]
fn test_capture_scores_piece_value() {
    let variant = Variant::SixPointer;
    let board = board_with_fen(variant, None, super::board::SIXPOINTER_START_FENS[0]);
    let board = apply_ok(variant, None, &board, MoveInput::normal("c4", "f7"), Color::White, 0);
    assert_eq!(*board.points.as_ref().unwrap().get(Color::White), 1);
    assert_eq!(*board.moves_played.as_ref().unwrap().get(Color::White), 1);
    assert_eq!(board.white_time, 30_000);
    assert_eq!(board.black_time, 30_000);
}

#[test]
fn test_move_timer_expiry_passes_turn_with_warning() {
    let variant = Variant::SixPointer;
    let board = board_with_fen(variant, None, super::board::SIXPOINTER_START_FENS[0]);
    let board = apply_ok(variant, None, &board, MoveInput::normal("a2", "a3"), Color::White, 0);
    assert_eq!(board.active_color, Color::Black);

    let update = update_timers(variant, None, &board, 30_000);
    assert!(update.changed);
    assert!(!update.game_ended);
    let (code, _) = update.warning.clone().unwrap();
    assert_eq!(code, ErrorCode::Timeout);
    let board = *update.state;
    assert_eq!(board.active_color, Color::White);
    assert_eq!(fen_side(&board.fen), Color::White);
    assert_eq!(*board.points.as_ref().unwrap().get(Color::Black), 0);
    assert_eq!(board.white_time, 30_000);
    assert_eq!(board.black_time, 30_000);
    assert_eq!(*board.moves_played.as_ref().unwrap().get(Color::Black), 0);

    // The game goes on for the side that got the turn back.
    let board = apply_ok(variant, None, &board, MoveInput::normal("a3", "a4"), Color::White, 31_000);
    assert_eq!(*board.moves_played.as_ref().unwrap().get(Color::White), 2);
}

#[test]
fn test_sixpointer_boards_start_from_the_pool() {
    let board = Board::initial(Variant::SixPointer, None, 0);
    assert!(super::board::SIXPOINTER_START_FENS.contains(&board.fen.as_str()));
    assert_eq!(board.max_moves, Some(6));
    assert_eq!(board.white_time, 30_000);
}

// Helper functions

fn apply_ok(
    variant: Variant,
    subvariant: Option<Subvariant>,
    board: &Board,
    mv: MoveInput,
    color: Color,
    now: u64,
) -> Board {
    match validate_and_apply(variant, subvariant, board, &mv, color, Some(now)) {
        MoveReply::Valid { state, .. } => *state,
        other => panic!("expected a valid move, got {:?}", other),
    }
}

fn reject_code(reply: &MoveReply) -> ErrorCode {
    match reply {
        MoveReply::Reject { code, .. } => *code,
        other => panic!("expected a reject, got {:?}", other),
    }
}

fn fen_side(fen: &str) -> Color {
    match fen.split_whitespace().nth(1) {
        Some("w") => Color::White,
        Some("b") => Color::Black,
        other => panic!("malformed fen side: {:?}", other),
    }
}

fn board_with_fen(variant: Variant, subvariant: Option<Subvariant>, fen: &str) -> Board {
    let mut board = Board::initial(variant, subvariant, 0);
    board.fen = fen.to_string();
    board.active_color = fen_side(fen);
    board.position_history = vec![fen.to_string()];
    board.repetition_map = HashMap::new();
    board.repetition_map.insert(normalized_fen(fen), 1);
    board
}
