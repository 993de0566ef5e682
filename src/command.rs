//! Operator commands read from standard input.
//!
//! Input is read line by line on a dedicated thread so the protocol path
//! never blocks on the terminal. Each recognized line is forwarded as an
//! [`Intent`] to the session controller, which acts on it between
//! messages.

use std::io::BufRead;
use std::thread::JoinHandle;

use tokio::sync::mpsc;
use tracing::debug;

use crate::persist::SaveCause;

/// Something the session controller should do at its next loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Ask the server for a fresh snapshot.
    RequestSnapshot,
    /// Persist the current book.
    Save(SaveCause),
    /// Stop the controller.
    Exit,
}

/// Prompt shown to the operator.
pub const PROMPT: &str = "Enter a command ('send', 'save' or 'exit'):";

/// Maps an input line to an intent. Case and surrounding whitespace are
/// ignored.
#[must_use]
pub fn parse_command(line: &str) -> Option<Intent> {
    match line.trim().to_ascii_lowercase().as_str() {
        "send" => Some(Intent::RequestSnapshot),
        "save" => Some(Intent::Save(SaveCause::Manual)),
        "exit" => Some(Intent::Exit),
        _ => None,
    }
}

/// Reads commands from `reader` until `exit`, end of input, or the
/// receiving side is gone.
pub fn read_commands<R: BufRead>(reader: R, tx: &mpsc::UnboundedSender<Intent>) {
    println!("{PROMPT}");
    for line in reader.lines() {
        let Ok(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            Some(intent) => {
                debug!(?intent, "Operator command");
                if tx.send(intent).is_err() || intent == Intent::Exit {
                    return;
                }
            }
            None => println!("Unknown command. Use 'send', 'save' or 'exit'."),
        }
        println!("{PROMPT}");
    }
    debug!("Command input closed");
}

/// Spawns the stdin reader thread.
///
/// # Errors
///
/// Returns an error if the thread cannot be spawned.
pub fn spawn_command_reader(tx: mpsc::UnboundedSender<Intent>) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("command-input".into())
        .spawn(move || read_commands(std::io::stdin().lock(), &tx))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!(parse_command("send"), Some(Intent::RequestSnapshot));
        assert_eq!(parse_command("  SAVE \n"), Some(Intent::Save(SaveCause::Manual)));
        assert_eq!(parse_command("Exit"), Some(Intent::Exit));
        assert_eq!(parse_command("quit"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn forwards_commands_in_order_and_stops_at_exit() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let input = Cursor::new("save\nbogus\n\nsend\nexit\nsave\n");

        read_commands(input, &tx);

        assert_eq!(rx.try_recv(), Ok(Intent::Save(SaveCause::Manual)));
        assert_eq!(rx.try_recv(), Ok(Intent::RequestSnapshot));
        assert_eq!(rx.try_recv(), Ok(Intent::Exit));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn end_of_input_stops_reader_without_exit() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        read_commands(Cursor::new("send\n"), &tx);

        assert_eq!(rx.try_recv(), Ok(Intent::RequestSnapshot));
        assert!(rx.try_recv().is_err());
    }
}
