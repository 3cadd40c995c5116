use std::io::{self, BufRead, IsTerminal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use roio_client::Client;
use tracing::{info, warn};

use crate::cmd::{check_channel, install_ctrlc_handler, AgentArgs, ChatArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_delivery, OutputFormat};

const POLL: Duration = Duration::from_millis(100);
const PROMPT: &str = "Enter message to publish (or 'exit' to quit):";

#[derive(Debug, PartialEq, Eq)]
enum LineAction<'a> {
    Skip,
    Exit,
    Publish(&'a str),
}

fn classify_line(line: &str) -> LineAction<'_> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        LineAction::Skip
    } else if line.trim().eq_ignore_ascii_case("exit") {
        LineAction::Exit
    } else {
        LineAction::Publish(line)
    }
}

pub fn run(args: ChatArgs, agent: &AgentArgs, format: OutputFormat) -> CliResult<i32> {
    check_channel(args.channel)?;
    let running = install_ctrlc_handler()?;

    let client = agent.start_client()?;
    client.set_callback(move |msg| print_delivery(msg, format));

    let result = chat(&client, args.channel, &running);
    client.stop();
    result
}

fn chat(client: &Client, channel: u16, running: &AtomicBool) -> CliResult<i32> {
    match client.subscribe(channel) {
        Ok(true) => info!(channel, "subscribed"),
        Ok(false) => warn!(channel, "subscribe not confirmed, keepalive will retry"),
        Err(err) => return Err(client_error("subscribe failed", err)),
    }

    let interactive = io::stdin().is_terminal();
    let lines = spawn_stdin_reader();

    while running.load(Ordering::SeqCst) {
        if interactive {
            eprintln!("{PROMPT}");
        }
        let Some(line) = next_line(&lines, running) else {
            break;
        };
        match classify_line(&line) {
            LineAction::Skip => continue,
            LineAction::Exit => break,
            LineAction::Publish(text) => match client.publish(channel, text.as_bytes().to_vec()) {
                Ok(true) => {}
                Ok(false) => warn!(channel, "publish not acknowledged"),
                Err(err) => warn!(channel, error = %err, "publish failed"),
            },
        }
    }

    info!("chat finished");
    Ok(SUCCESS)
}

/// Wait for the next stdin line. `None` on EOF, read error or Ctrl-C.
fn next_line(lines: &Receiver<io::Result<String>>, running: &AtomicBool) -> Option<String> {
    while running.load(Ordering::SeqCst) {
        match lines.recv_timeout(POLL) {
            Ok(Ok(line)) => return Some(line),
            Ok(Err(err)) => {
                warn!(error = %err, "stdin read failed");
                return None;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return None,
        }
    }
    None
}

// Blocking stdin reads cannot be interrupted, so they run on their own
// thread; it is left behind when the chat ends.
fn spawn_stdin_reader() -> Receiver<io::Result<String>> {
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("roio-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(err) = spawned {
        warn!(error = %err, "failed to spawn stdin reader");
    }
    rx
}
