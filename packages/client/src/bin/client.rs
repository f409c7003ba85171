//! LAN chat client.
//!
//! Logs in to a chat server and sends every line typed on stdin as a chat
//! message. `/who` (or `WHOISIN`) asks for the user list, `/quit` (or
//! `LOGOUT`) and Ctrl+D log out. A refused login exits with status 1.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin lanchat-client -- --user alice
//! cargo run --bin lanchat-client -- -u bob -s 192.168.0.10 -p 1500
//! ```

use std::sync::Arc;

use clap::Parser;
use lanchat_client::{
    ChatClient, ClientError, ClientExit, ClientHandle, MessageFormatter, TerminalPresentation,
};
use lanchat_shared::{
    ConnectionInfo, DEFAULT_PORT, TracingLog, Username,
    logger::setup_logger,
    time::{Clock, SystemClock},
};
use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(name = "lanchat-client")]
#[command(about = "LAN chat client", long_about = None)]
struct Args {
    /// Username to log in with (must be unique on the server)
    #[arg(short = 'u', long)]
    user: String,

    /// Server host name or address
    #[arg(short = 's', long, default_value = "localhost")]
    server: String,

    /// Server port
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

/// One line read from the terminal
enum Input {
    Line(String),
    Eof,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    let user = match Username::new(args.user) {
        Ok(user) => user,
        Err(e) => {
            tracing::error!("Invalid username: {}", e);
            std::process::exit(1);
        }
    };
    let info = ConnectionInfo::client(user.clone(), args.server, args.port);

    let presentation = Arc::new(TerminalPresentation::new(user.clone()));
    let client = match ChatClient::connect(&info, presentation, Arc::new(TracingLog)).await {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Client error: {}", e);
            std::process::exit(1);
        }
    };
    print!(
        "{}",
        MessageFormatter::format_connected(
            &user,
            &info.socket_address(),
            SystemClock.now_millis()
        )
    );

    let handle = client.handle();
    let input_rx = spawn_readline(user.clone());
    let exit = tokio::spawn(client.wait());

    let code = tokio::select! {
        exit = exit => report(exit.unwrap_or_else(|e| {
            ClientExit::ConnectionLost(std::io::Error::other(e).into())
        })),
        () = forward_input(input_rx, handle) => {
            tracing::debug!("Input closed");
            0
        }
    };

    std::process::exit(code);
}

/// Read terminal lines on a blocking thread (rustyline is synchronous)
fn spawn_readline(user: Username) -> mpsc::UnboundedReceiver<Input> {
    let (input_tx, input_rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                input_tx.send(Input::Eof).ok();
                return;
            }
        };

        let prompt = format!("{}> ", user);

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(Input::Line(line.to_string())).is_err() {
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    input_tx.send(Input::Eof).ok();
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    input_tx.send(Input::Eof).ok();
                    break;
                }
            }
        }
    });

    input_rx
}

/// Turn terminal lines into client requests until the user logs out.
///
/// Never returns while the session is alive; the caller races it against
/// the client's exit.
async fn forward_input(mut input_rx: mpsc::UnboundedReceiver<Input>, handle: ClientHandle) {
    while let Some(input) = input_rx.recv().await {
        let submitted = match input {
            Input::Line(line) => match line.as_str() {
                "/who" | "WHOISIN" => handle.request_roster().map_err(ClientError::from),
                "/quit" | "LOGOUT" => handle.logout().map_err(ClientError::from),
                text => handle.send_text(text),
            },
            Input::Eof => handle.logout().map_err(ClientError::from),
        };

        match submitted {
            Ok(()) => {}
            Err(e @ ClientError::MessageTooLong { .. }) => {
                tracing::warn!("{}", e);
                lanchat_client::presentation::redisplay_prompt(handle.user().as_str());
            }
            Err(_) => break,
        }
    }

    // keep waiting so the client's exit decides the status
    std::future::pending::<()>().await;
}

fn report(exit: ClientExit) -> i32 {
    match exit {
        ClientExit::LoggedOut => {
            tracing::info!("Logged out");
            0
        }
        ClientExit::Closed => {
            tracing::info!("Connection closed");
            0
        }
        ClientExit::Rejected(reason) => {
            print!("{}", MessageFormatter::format_rejected(&reason));
            tracing::error!("Login refused: {}", reason);
            1
        }
        ClientExit::ConnectionLost(e) => {
            tracing::error!("Connection to the server lost: {}", e);
            1
        }
    }
}
