//! Interactive line client for chess-server.
//!
//! Usage:
//!   cargo run -p chess-server --example play_client
//!
//! Commands:
//!   start            start a new game (you play white)
//!   e2 e4            move from e2 to e4
//!   e7 e8 n          move with promotion
//!   state            print the current game state
//!   quit / exit      leave

use std::env;
use std::error::Error;
use std::sync::{Arc, Mutex};

use chess_core::{InboundEvent, MoveRequest, OutboundEvent, SessionId, Snapshot};
use chess_protocol::json_codec::{format_inbound, parse_outbound_line};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

type CurrentGame = Arc<Mutex<Option<SessionId>>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let addr = env::var("CHESS_CLIENT_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());

    println!("Connecting to {addr}...");
    let stream = TcpStream::connect(&addr).await?;
    println!("Connected. Type `start`, then moves like `e2 e4`. `quit` to leave.\n");

    let (read_half, mut write_half) = stream.into_split();
    let current: CurrentGame = Arc::new(Mutex::new(None));

    // Server events arrive on their own schedule (the engine's reply comes
    // after ours), so print them from a separate task.
    let printer = {
        let current = current.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match parse_outbound_line(&line) {
                    Ok(Some(event)) => print_event(&event, &current),
                    Ok(None) => {}
                    Err(e) => eprintln!("unreadable server line ({e}): {line}"),
                }
            }
            println!("Server closed the connection.");
        })
    };

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = stdin.next_line().await? {
        let words: Vec<&str> = line.split_whitespace().collect();
        let event = match words.as_slice() {
            [] => continue,
            ["quit"] | ["exit"] => break,
            ["start"] => InboundEvent::StartGame,
            ["state"] => match *current.lock().unwrap() {
                Some(session_id) => InboundEvent::GetState { session_id },
                None => {
                    eprintln!("No game yet; type `start`.");
                    continue;
                }
            },
            [from, to, rest @ ..] if rest.len() <= 1 => {
                let Some(session_id) = *current.lock().unwrap() else {
                    eprintln!("No game yet; type `start`.");
                    continue;
                };
                let mut request = MoveRequest::new(*from, *to);
                if let Some(piece) = rest.first().and_then(|p| p.chars().next()) {
                    request = request.with_promotion(piece);
                }
                InboundEvent::MakeMove {
                    session_id,
                    request,
                }
            }
            _ => {
                eprintln!("Unrecognized command: {line}");
                continue;
            }
        };

        let mut out = format_inbound(&event)?;
        out.push('\n');
        write_half.write_all(out.as_bytes()).await?;
    }

    printer.abort();
    Ok(())
}

fn print_event(event: &OutboundEvent, current: &CurrentGame) {
    match event {
        OutboundEvent::GameStarted {
            session_id,
            snapshot,
        } => {
            *current.lock().unwrap() = Some(*session_id);
            println!("Game {session_id} started. You are white.");
            print_board(snapshot);
        }
        OutboundEvent::MoveResult(result) | OutboundEvent::OpponentMove(result) => {
            let who = match event {
                OutboundEvent::MoveResult(_) => "You",
                _ => "Engine",
            };
            match (&result.notation, &result.error) {
                (Some(mv), _) => println!("{who}: {mv}"),
                (None, Some(err)) => println!("{who}: error: {err}"),
                (None, None) => println!("{who}: no move"),
            }
            if let Some(res) = &result.result {
                println!("Game over: {res:?}");
            }
        }
        OutboundEvent::State { snapshot, .. } => print_board(snapshot),
        OutboundEvent::Error { message } => println!("error: {message}"),
    }
}

fn print_board(snapshot: &Snapshot) {
    for (i, rank) in snapshot.board.iter().enumerate() {
        let row: String = rank
            .iter()
            .map(|sq| match sq {
                Some(piece) if piece.color == 'w' => piece.role.to_ascii_uppercase(),
                Some(piece) => piece.role.to_ascii_lowercase(),
                None => '.',
            })
            .collect();
        println!("  {} {row}", 8 - i);
    }
    println!("    abcdefgh");
    println!(
        "  {} to move, status {}, moves: {}",
        snapshot.turn,
        snapshot.status,
        snapshot.move_history.join(" ")
    );
}
