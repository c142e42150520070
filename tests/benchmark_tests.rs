//! Performance benchmarks for critical match systems

use rand::rngs::StdRng;
use rand::SeedableRng;
use server::game::MatchState;
use server::peer::{self, Recipient};
use shared::{ClientMessage, Direction, PlayerSlot, ServerMessage, FIELD_HEIGHT, FIELD_WIDTH};
use std::time::Instant;

fn full_match(code: &str) -> MatchState {
    let mut state = MatchState::new(code.to_string());
    let (left, _) = peer::channel();
    let (right, _) = peer::channel();
    state.seat(left);
    state.seat(right);
    state
}

/// Benchmarks the physics step of a full match
#[test]
fn benchmark_physics_step() {
    let mut state = full_match("00001");
    let mut rng = StdRng::seed_from_u64(1);

    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        let direction = if i % 60 < 30 {
            Direction::Up
        } else {
            Direction::Down
        };
        state.set_direction(PlayerSlot::Left, direction);
        state.step(1.0, &mut rng);
    }

    let duration = start.elapsed();
    println!(
        "Physics step: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(state.ball.y >= 0.0 && state.ball.y <= FIELD_HEIGHT);
    assert!(state.ball.x >= 0.0 && state.ball.x <= FIELD_WIDTH);

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks speed escalation over long rallies
#[test]
fn benchmark_hit_registration() {
    let mut state = full_match("00002");

    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        if i % 100 == 0 {
            state.hit_streak = 0;
        }
        state.register_hit();
    }

    let duration = start.elapsed();
    println!(
        "Hit registration: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(state.ball.speed() <= shared::MAX_BALL_SPEED + 1e-9);

    // Should complete in under 100ms
    assert!(duration.as_millis() < 100);
}

/// Benchmarks snapshot capture and JSON encoding, the per-tick broadcast cost
#[test]
fn benchmark_snapshot_encoding() {
    let state = full_match("00003");

    let iterations = 10_000;
    let start = Instant::now();

    let mut bytes = 0;
    for _ in 0..iterations {
        let message = ServerMessage::GameState(state.snapshot());
        bytes += message.to_json().unwrap().len();
    }

    let duration = start.elapsed();
    println!(
        "Snapshot encoding: {} iterations in {:?} ({:.2} μs/iter, {} bytes/msg)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64,
        bytes / iterations
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Stress tests decoding of client input under high load
#[test]
fn stress_test_many_inputs() {
    let inputs = [
        r#"{"type":"move","data":"up"}"#,
        r#"{"type":"move","data":"down"}"#,
        r#"{"type":"move","data":"stopped"}"#,
        r#"{"type":"move","data":"sideways"}"#,
    ];
    let mut state = full_match("00004");

    let iterations = 100_000;
    let start = Instant::now();

    let mut rejected = 0;
    for i in 0..iterations {
        let ClientMessage::Move(raw) = ClientMessage::from_json(inputs[i % inputs.len()]).unwrap();
        match raw.parse::<Direction>() {
            Ok(direction) => {
                state.set_direction(PlayerSlot::Right, direction);
            }
            Err(_) => rejected += 1,
        }
    }

    let duration = start.elapsed();
    println!(
        "Input decoding: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(rejected, iterations / inputs.len());

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks fan-out to both players over the outbound queues
#[tokio::test]
async fn benchmark_broadcast() {
    let (left, mut left_rx) = peer::channel();
    let (right, mut right_rx) = peer::channel();
    let recipients = vec![
        Recipient {
            slot: PlayerSlot::Left,
            peer: left,
        },
        Recipient {
            slot: PlayerSlot::Right,
            peer: right,
        },
    ];
    let snapshot = full_match("00005").snapshot();

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        peer::broadcast(&recipients, &ServerMessage::GameState(snapshot.clone())).await;
        left_rx.recv().await.unwrap();
        right_rx.recv().await.unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Broadcast: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}
