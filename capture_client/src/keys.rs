//! Keyboard shortcuts of the terminal front-end.
//!
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    sync::mpsc::Sender,
};

use crate::session::Command;

/// Mapping of input keys to session commands.
#[derive(Clone, Copy, Debug)]
pub struct KeyBindings {
    pub toggle: char,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self { toggle: ' ' }
    }
}

impl KeyBindings {
    /// Map one line of terminal input to a command.
    ///
    /// The terminal is line buffered, so a key press arrives as a line holding
    /// that key.
    pub fn command(&self, line: &str) -> Option<Command> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut chars = line.chars();
        let (Some(key), None) = (chars.next(), chars.next()) else {
            return None;
        };

        match key {
            key if key == self.toggle => Some(Command::Toggle),
            'r' => Some(Command::Recheck),
            'h' => Some(Command::Visibility { hidden: true }),
            'v' => Some(Command::Visibility { hidden: false }),
            'q' => Some(Command::Shutdown),
            _ => None,
        }
    }
}

/// Forward key presses read from `input` to the session.
///
/// Ends when the input is closed or the session went away.
pub async fn forward_keys<R>(input: R, bindings: KeyBindings, commands: Sender<Command>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(input).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let Some(command) = bindings.command(&line) else {
                    log::debug!("Ignoring input {:?}", line);
                    continue;
                };
                if commands.send(command).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                log::warn!("Error reading keyboard input: {}", err);
                break;
            }
        }
    }
}
