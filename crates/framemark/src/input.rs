//! Input delivery for the control loop.
//!
//! Pointer gestures and key presses arrive as [`InputEvent`]s through an
//! [`EventSource`]. Both sources here speak the same line grammar:
//!
//! ```text
//! down X Y | move X Y | up X Y | key C
//! next | prev | quit | commit | undo | clear | class N
//! ```
//!
//! Blank lines and `#` comments are ignored.

use std::collections::VecDeque;
use std::fs;
use std::io::{self, BufRead};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::session::{KEY_CLEAR, KEY_COMMIT, KEY_NEXT, KEY_PREV, KEY_QUIT, KEY_UNDO};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    PointerDown { x: i32, y: i32 },
    PointerMove { x: i32, y: i32 },
    PointerUp { x: i32, y: i32 },
    Key(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polled {
    Event(InputEvent),
    Idle,
    /// No more input will arrive; the loop treats this as quit.
    Closed,
}

pub trait EventSource {
    /// Waits at most `timeout` for the next event.
    fn poll(&mut self, timeout: Duration) -> Polled;
}

impl<E: EventSource + ?Sized> EventSource for Box<E> {
    fn poll(&mut self, timeout: Duration) -> Polled {
        (**self).poll(timeout)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("'{command}' expects {expected}")]
    Arguments {
        command: String,
        expected: &'static str,
    },
}

/// Parses one line; `Ok(None)` for blank lines and comments.
pub fn parse_line(line: &str) -> Result<Option<InputEvent>, ParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = parts.collect();
    let command = command.to_ascii_lowercase();

    let event = match command.as_str() {
        "down" | "move" | "up" => {
            let (x, y) = point_args(&command, &args)?;
            match command.as_str() {
                "down" => InputEvent::PointerDown { x, y },
                "move" => InputEvent::PointerMove { x, y },
                _ => InputEvent::PointerUp { x, y },
            }
        }
        "key" => {
            let mut chars = args.first().map(|key| key.chars()).into_iter().flatten();
            match (chars.next(), chars.next(), args.len()) {
                (Some(key), None, 1) => InputEvent::Key(key),
                _ => return Err(arguments(&command, "a single character")),
            }
        }
        "class" => {
            let digit = match args.as_slice() {
                [id] => id.parse::<u32>().ok().and_then(|id| char::from_digit(id, 10)),
                _ => None,
            };
            match digit {
                Some(digit) => InputEvent::Key(digit),
                None => return Err(arguments(&command, "a class id between 0 and 9")),
            }
        }
        verb => {
            let key = match verb {
                "next" => KEY_NEXT,
                "prev" => KEY_PREV,
                "quit" => KEY_QUIT,
                "commit" => KEY_COMMIT,
                "undo" => KEY_UNDO,
                "clear" => KEY_CLEAR,
                other => return Err(ParseError::UnknownCommand(other.to_string())),
            };
            if !args.is_empty() {
                return Err(arguments(verb, "no arguments"));
            }
            InputEvent::Key(key)
        }
    };
    Ok(Some(event))
}

fn point_args(command: &str, args: &[&str]) -> Result<(i32, i32), ParseError> {
    match args {
        [x, y] => match (x.parse(), y.parse()) {
            (Ok(x), Ok(y)) => Ok((x, y)),
            _ => Err(arguments(command, "two integer coordinates")),
        },
        _ => Err(arguments(command, "two integer coordinates")),
    }
}

fn arguments(command: &str, expected: &'static str) -> ParseError {
    ParseError::Arguments {
        command: command.to_string(),
        expected,
    }
}

/// Replays a pre-recorded script, then reports [`Polled::Closed`].
#[derive(Debug, Default)]
pub struct ScriptedEvents {
    events: VecDeque<InputEvent>,
    skipped: usize,
}

impl ScriptedEvents {
    pub fn parse(script: &str) -> Self {
        let mut events = VecDeque::new();
        let mut skipped = 0;
        for (number, line) in script.lines().enumerate() {
            match parse_line(line) {
                Ok(Some(event)) => events.push_back(event),
                Ok(None) => {}
                Err(err) => {
                    log::warn!("script line {}: {err}; skipped", number + 1);
                    skipped += 1;
                }
            }
        }
        Self { events, skipped }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        fs::read_to_string(path).map(|script| Self::parse(&script))
    }

    pub fn from_events(events: impl IntoIterator<Item = InputEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
            skipped: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.events.len()
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl EventSource for ScriptedEvents {
    fn poll(&mut self, _timeout: Duration) -> Polled {
        match self.events.pop_front() {
            Some(event) => Polled::Event(event),
            None => Polled::Closed,
        }
    }
}

/// Reads commands typed on stdin.
///
/// A reader thread owns stdin and forwards raw lines over a channel; parsing
/// happens on the polling side so session state has a single owner.
pub struct TerminalEvents {
    lines: Receiver<String>,
    line_number: usize,
}

impl TerminalEvents {
    pub fn spawn() -> io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("framemark-stdin".into())
            .spawn(move || {
                let stdin = io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            })?;
        Ok(Self::from_receiver(rx))
    }

    pub fn from_receiver(lines: Receiver<String>) -> Self {
        Self {
            lines,
            line_number: 0,
        }
    }
}

impl EventSource for TerminalEvents {
    fn poll(&mut self, timeout: Duration) -> Polled {
        match self.lines.recv_timeout(timeout) {
            Ok(line) => {
                self.line_number += 1;
                match parse_line(&line) {
                    Ok(Some(event)) => Polled::Event(event),
                    Ok(None) => Polled::Idle,
                    Err(err) => {
                        log::warn!("input line {}: {err}", self.line_number);
                        Polled::Idle
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => Polled::Idle,
            Err(RecvTimeoutError::Disconnected) => Polled::Closed,
        }
    }
}
