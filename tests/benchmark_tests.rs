//! Performance benchmarks for critical game systems

use server::board::Board;
use server::client_manager::ClientHandle;
use server::game::{Game, GameConfig};
use server::player::{CommandInbox, Player};
use shared::{decode_command, Direction, GameStatus, ServerMessage, CELL_APPLE};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Benchmarks the per-tick ageing pass on a full-size board
#[test]
fn benchmark_tick_decay() {
    let mut board = Board::with_seed(80, 40, 1);
    for x in 0..80 {
        board.set_cell(x, 20, 50);
    }

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        board.tick_decay();
    }

    let duration = start.elapsed();
    println!(
        "Tick decay: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks apple placement on a nearly full board, where random probing
/// mostly misses and the free-cell scan takes over
#[test]
fn benchmark_apple_on_crowded_board() {
    let iterations = 1_000;
    let start = Instant::now();

    for seed in 0..iterations {
        let mut board = Board::with_seed(80, 40, seed);
        for y in 0..40 {
            for x in 0..80 {
                board.set_cell(x, y, 9);
            }
        }
        board.set_cell(17, 33, 0);

        assert_eq!(board.generate_apple(), Some((17, 33)));
        assert_eq!(board.get_cell(17, 33), CELL_APPLE);
    }

    let duration = start.elapsed();
    println!(
        "Crowded apple placement: {} boards in {:?} ({:.2} μs/board)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks snake movement including tail ageing
#[test]
fn benchmark_player_movement() {
    let mut board = Board::with_seed(80, 40, 3);
    let mut player = Player::new("bench", 0, 20, Direction::Right, 10);

    let iterations = 100_000;
    let start = Instant::now();

    for step in 0..iterations {
        // bounce between the walls by turning around through a free row
        if player.x == 79 && player.direction == Direction::Right {
            player.change_direction(if step % 2 == 0 { Direction::Up } else { Direction::Down });
        } else if player.x == 0 && player.direction == Direction::Left {
            player.change_direction(if step % 2 == 0 { Direction::Up } else { Direction::Down });
        } else if player.direction == Direction::Up || player.direction == Direction::Down {
            player.change_direction(if player.x == 79 { Direction::Left } else { Direction::Right });
        }

        if player.advance(&mut board).is_err() {
            board.reset();
            player = Player::new("bench", 0, 20, Direction::Right, 10);
        }
        board.tick_decay();
    }

    let duration = start.elapsed();
    println!(
        "Player movement: {} steps in {:?} ({:.2} μs/step)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks full simulator ticks with several players and snapshot fan-out
#[test]
fn benchmark_game_step() {
    let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
    let config = GameConfig {
        width: 80,
        height: 40,
        match_size: 4,
        tick_interval: Duration::from_millis(100),
        initial_size: 3,
        seed: Some(21),
    };

    let mut senders = Vec::new();
    let mut receivers = Vec::new();
    let clients = (0..4)
        .map(|index| {
            let (commands, inbox) = CommandInbox::channel();
            let (outbound, receiver) = mpsc::unbounded_channel();
            senders.push(commands);
            receivers.push(receiver);
            ClientHandle::new(format!("player-{}", index), addr, inbox, outbound)
        })
        .collect();
    let mut game = Game::new(&config, clients).expect("Failed to seat players");

    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        game.step();
        for receiver in receivers.iter_mut() {
            while receiver.try_recv().is_ok() {}
        }
        if game.is_finished() {
            break;
        }
    }

    let duration = start.elapsed();
    println!(
        "Game step: {} ticks in {:?} ({:.2} μs/tick)",
        game.tick(),
        duration,
        duration.as_micros() as f64 / game.tick().max(1) as f64
    );

    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
    drop(senders);
}

/// Benchmarks snapshot serialization at the default board size
#[test]
fn benchmark_snapshot_serialization() {
    let board = Board::with_seed(80, 40, 5);
    let body = shared::ResponseBody {
        board: board.serialize(),
        width: board.width(),
        height: board.height(),
        players: (0..4)
            .map(|index| Player::new(format!("p{}", index), index, index, Direction::Up, 3).to_response())
            .collect(),
    };
    let message = ServerMessage::snapshot(GameStatus::Ok, body);

    let iterations = 1_000;
    let start = Instant::now();

    let mut total_bytes = 0;
    for _ in 0..iterations {
        total_bytes += message.to_json().unwrap().len();
    }

    let duration = start.elapsed();
    println!(
        "Snapshot serialization: {} snapshots ({} bytes) in {:?}",
        iterations, total_bytes, duration
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks decoding of inbound command frames
#[test]
fn benchmark_command_decoding() {
    let frames = [
        r#"{"eventtype":0,"key":0}"#,
        r#"{"eventtype":0,"key":3}"#,
        r#"{"eventtype":0,"id":2}"#,
        r#"{"eventtype":1}"#,
        "garbage",
    ];

    let iterations = 100_000;
    let start = Instant::now();

    let mut decoded = 0;
    for index in 0..iterations {
        if decode_command(frames[index % frames.len()]).is_ok() {
            decoded += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Command decoding: {} frames in {:?} ({:.2} ns/frame)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(decoded, iterations / frames.len() * 4);
    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}
