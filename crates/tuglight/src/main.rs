mod cli;
mod console;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tuglight::{DISCONNECT_CLOSED, Session, SessionEvent, SessionHandle, WsConnector};

use crate::console::{ConsoleInput, HELP, clear_sequence};

#[tokio::main]
async fn main() {
    // Logs go to stderr so stdout stays a clean message log
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = cli::Cli::parse();

    let endpoint = match cli.endpoint() {
        Ok(endpoint) => endpoint,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };

    info!(
        endpoint = %endpoint,
        wire = %cli.wire,
        heartbeat_ms = cli.heartbeat_ms,
        json = cli.json,
        "tuglight starting"
    );

    let mut session = Session::new(endpoint, cli.session_config());
    let events = session.subscribe();
    let handle = session.open(WsConnector);

    let cancel = CancellationToken::new();
    let printer = tokio::spawn(print_events(events, cli.json, cancel.clone()));

    // Input typed or piped before the handshake would only be refused
    if handle.connected().await {
        run_console(&handle, cli.json, cancel.clone()).await;
    }

    handle.close().await;
    let reason = printer.await.ok().flatten();
    info!("tuglight shut down");

    if reason.is_some_and(|reason| reason != DISCONNECT_CLOSED) {
        std::process::exit(1);
    }
}

/// Print every session event; returns the disconnect reason
async fn print_events(
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    json: bool,
    cancel: CancellationToken,
) -> Option<String> {
    let mut reason = None;
    while let Some(event) = events.recv().await {
        if json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("failed to serialize event: {}", e),
            }
        }

        match event {
            SessionEvent::Connected => {
                if !json {
                    println!("Connected. Type \"help\" for commands.");
                }
            }
            SessionEvent::StatusReceived(message) => {
                if !json {
                    if let Some(line) = message.log_line() {
                        println!("{}", line);
                    }
                }
            }
            SessionEvent::Disconnected(why) => {
                if !json {
                    println!("Closing connection: {}", why);
                }
                reason = Some(why);
                cancel.cancel();
            }
        }
    }
    reason
}

/// Read console lines until quit, end of input, or disconnect
async fn run_console(handle: &SessionHandle, json: bool, cancel: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("stdin read failed: {}", e);
                break;
            }
        };

        match console::parse_line(&line) {
            Ok(ConsoleInput::Command(command)) => {
                if let Err(e) = handle.send(command).await {
                    eprintln!("error: {}", e);
                }
            }
            Ok(ConsoleInput::Help) => println!("{}", HELP),
            Ok(ConsoleInput::Clear) => {
                if let Some(sequence) = clear_sequence(json) {
                    print!("{}", sequence);
                    let _ = std::io::Write::flush(&mut std::io::stdout());
                }
            }
            Ok(ConsoleInput::Empty) => {}
            Ok(ConsoleInput::Quit) => break,
            Err(e) => eprintln!("error: {}", e),
        }
    }
}
