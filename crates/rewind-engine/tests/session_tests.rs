//! Integration tests for multi-participant sessions.
//!
//! Two or three in-process sessions are wired together with
//! [`PeerTransport`] and must converge on the same board after every
//! exchange.

use rewind_engine::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn starting_board() -> (GameState, PieceId, PieceId) {
    let mut state = GameState::new();
    let tank = state.spawn_piece(
        PieceState::named("Tank").with_property("Strength", "4"),
        Location::new("Main", 0, 0),
    );
    let mut fort_state = PieceState::named("Fort");
    fort_state.movement = Movement::Never;
    let fort = state.spawn_piece(fort_state, Location::new("Main", 5, 5));
    state.set_named_trigger("Smoke", "ignite", Command::display_text("smoke rises"));
    (state, tank, fort)
}

/// Two sessions on the same starting board, each sending to the other.
fn connected_pair(start: &GameState) -> (Session, Session) {
    let mut alice = Session::new(
        start.clone(),
        Box::new(PeerTransport::default()),
        SessionConfig {
            dice_seed: 1,
            id_namespace: 1,
            ..Default::default()
        },
    );
    let mut bob = Session::new(
        start.clone(),
        Box::new(PeerTransport::default()),
        SessionConfig {
            dice_seed: 2,
            id_namespace: 2,
            ..Default::default()
        },
    );
    alice.set_transport(Box::new(PeerTransport::new(vec![bob.handle()])));
    bob.set_transport(Box::new(PeerTransport::new(vec![alice.handle()])));
    (alice, bob)
}

fn assert_converged(a: &Session, b: &Session) {
    assert_eq!(a.state().state_hash(), b.state().state_hash());
}

// ---------------------------------------------------------------------------
// Convergence
// ---------------------------------------------------------------------------

#[test]
fn peers_converge_after_moves_and_undo() {
    let (start, tank, _) = starting_board();
    let (mut alice, mut bob) = connected_pair(&start);

    alice
        .perform(|s| move_piece(s, tank, Location::new("Main", 2, 0)))
        .unwrap();
    assert_eq!(bob.pump(), 1);
    assert_converged(&alice, &bob);

    alice.undo().unwrap();
    bob.pump();
    assert_converged(&alice, &bob);
    assert_eq!(bob.state().piece(tank).unwrap().location, Location::new("Main", 0, 0));
}

#[test]
fn peers_converge_on_markers_and_triggers() {
    let (start, tank, _) = starting_board();
    let (mut alice, mut bob) = connected_pair(&start);

    let spec = MarkerSpec {
        state: PieceState::named("Smoke"),
        x_offset: 1,
        after_burner: Some("ignite".to_owned()),
        report: Some("Tank lays smoke".to_owned()),
        ..Default::default()
    };
    alice.perform(|s| place_marker(s, tank, &spec)).unwrap();
    bob.pump();

    assert_converged(&alice, &bob);
    assert_eq!(bob.state().chat(), ["smoke rises", "Tank lays smoke"]);
    assert_eq!(bob.state().piece_count(), 3);
}

fn marker(name: &str) -> MarkerSpec {
    MarkerSpec {
        state: PieceState::named(name),
        x_offset: 1,
        ..Default::default()
    }
}

fn piece_names(session: &Session) -> Vec<String> {
    let mut names: Vec<_> = session
        .state()
        .pieces()
        .map(|p| p.state.name.clone())
        .collect();
    names.sort();
    names
}

#[test]
fn concurrent_markers_get_distinct_ids_and_converge() {
    let (start, tank, _) = starting_board();
    let (mut alice, mut bob) = connected_pair(&start);

    // Both place before either has seen the other's unit.
    let flag = marker("Flag");
    let smoke = marker("Smoke");
    alice.perform(|s| place_marker(s, tank, &flag)).unwrap();
    bob.perform(|s| place_marker(s, tank, &smoke)).unwrap();
    assert_eq!(alice.pump(), 1);
    assert_eq!(bob.pump(), 1);

    assert_converged(&alice, &bob);
    assert_eq!(piece_names(&alice), ["Flag", "Fort", "Smoke", "Tank"]);
    assert_eq!(piece_names(&bob), ["Flag", "Fort", "Smoke", "Tank"]);
    assert!(alice.reports().is_empty());
    assert!(bob.reports().is_empty());

    // Later pieces still line up.
    alice.perform(|s| place_marker(s, tank, &flag)).unwrap();
    bob.pump();
    assert_converged(&alice, &bob);
}

#[test]
fn shared_namespace_collision_is_reported_not_overwritten() {
    let (start, tank, _) = starting_board();
    let (mut alice, mut bob) = connected_pair(&start);
    let mut twin = Session::new(
        start.clone(),
        Box::new(PeerTransport::new(vec![alice.handle()])),
        SessionConfig {
            id_namespace: 1,
            ..Default::default()
        },
    );
    alice.set_transport(Box::new(PeerTransport::new(vec![bob.handle(), twin.handle()])));

    let flag = marker("Flag");
    let smoke = marker("Smoke");
    alice.perform(|s| place_marker(s, tank, &flag)).unwrap();
    twin.perform(|s| place_marker(s, tank, &smoke)).unwrap();
    alice.pump();
    twin.pump();

    assert_eq!(piece_names(&alice), ["Flag", "Fort", "Tank"]);
    assert_eq!(piece_names(&twin), ["Fort", "Smoke", "Tank"]);
    for session in [&alice, &twin] {
        assert_eq!(
            session
                .reports()
                .reports_of_kind(ReportKind::PieceConflict)
                .count(),
            1
        );
    }
}

#[test]
fn remote_undo_of_remote_unit_reverses_on_both_sides() {
    let (start, tank, _) = starting_board();
    let (mut alice, mut bob) = connected_pair(&start);

    alice
        .perform(|s| move_piece(s, tank, Location::new("Main", 1, 1)))
        .unwrap();
    bob.pump();

    // Bob undoes the move he received from Alice.
    bob.undo().unwrap();
    alice.pump();
    assert_converged(&alice, &bob);
    assert_eq!(alice.state(), &start);
}

#[test]
fn dice_results_are_shared_not_rerolled() {
    let (start, _, _) = starting_board();
    let (mut alice, mut bob) = connected_pair(&start);

    let roll = alice.roll_dice("Alice", 3, 6).unwrap();
    bob.pump();
    assert_eq!(bob.state().chat(), [roll.report()]);
    assert_converged(&alice, &bob);
}

#[test]
fn immobilized_piece_sends_nothing() {
    let (start, _, fort) = starting_board();
    let (mut alice, mut bob) = connected_pair(&start);

    let cmd = alice
        .perform(|s| move_piece(s, fort, Location::new("Main", 0, 0)))
        .unwrap();
    assert!(cmd.is_null());
    assert_eq!(bob.pump(), 0);
    assert!(alice.logger().output().is_empty());
}

#[test]
fn corrupt_remote_data_is_reported_and_skipped() {
    let (start, _, _) = starting_board();
    let (_alice, mut bob) = connected_pair(&start);

    let handle = bob.handle();
    handle.deliver_remote("MOVE\t0\t{broken").unwrap();
    handle.deliver_remote("CHAT\tstill here").unwrap();

    assert_eq!(bob.pump(), 1);
    assert_eq!(bob.state().chat(), ["still here"]);
    let bad: Vec<_> = bob.reports().reports_of_kind(ReportKind::BadData).collect();
    assert_eq!(bad.len(), 1);
    assert_eq!(bad[0].data, "MOVE\t0\t{broken");
}

#[test]
fn deliveries_from_many_threads_apply_on_owner() {
    let (start, _, _) = starting_board();
    let (mut alice, mut bob) = connected_pair(&start);

    let workers: Vec<_> = (0..4)
        .map(|n| {
            let handle = alice.handle();
            std::thread::spawn(move || {
                for i in 0..10 {
                    handle
                        .submit(Command::display_text(&format!("{n}:{i}")))
                        .unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(alice.pump(), 40);
    assert_eq!(bob.pump(), 40);
    assert_eq!(alice.state().chat(), bob.state().chat());
}

#[test]
fn aborted_chain_is_reported_and_session_continues() {
    let (mut start, tank, _) = starting_board();
    let again = Command::from(Effect::Trigger {
        piece: tank,
        key: "again".to_owned(),
    });
    start.set_trigger(tank, "again", again.clone());

    let (transport, _sent) = LoopbackTransport::new();
    let mut session = Session::new(
        start,
        Box::new(transport),
        SessionConfig {
            logger: LoggerConfig {
                max_recursion_depth: 8,
            },
            dice_seed: 0,
            ..Default::default()
        },
    );

    let err = session.send_and_log(again).unwrap_err();
    assert!(matches!(err, EngineError::Core(CoreError::RecursionLimit { .. })));
    assert_eq!(
        session
            .reports()
            .reports_of_kind(ReportKind::RecursionLimit)
            .count(),
        1
    );
    session.send_and_log(Command::display_text("ok")).unwrap();
    assert_eq!(session.logger().output().len(), 2);
}
