//! In-memory stand-in for the controller, used by the host tests.

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};

use slip::Command;

use crate::app::comms::Port;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Command(Command),
    Line(String),
}

pub struct MockDevice {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    pending: Vec<u8>,
    events: Vec<Event>,
    /// wire bytes sent back after each start command
    runs: VecDeque<Vec<u8>>,
    raw_values: VecDeque<u16>,
    connected: bool,
    clears: usize,
}

impl MockDevice {
    pub fn new() -> MockDevice {
        MockDevice {
            rx: VecDeque::new(),
            tx: Vec::new(),
            pending: Vec::new(),
            events: Vec::new(),
            runs: VecDeque::new(),
            raw_values: VecDeque::new(),
            connected: true,
            clears: 0,
        }
    }

    pub fn queue_bytes(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }

    /// Telemetry rows streamed after the next start command.
    pub fn queue_run(&mut self, rows: &[&str]) {
        let mut wire = Vec::new();
        for row in rows {
            wire.extend(slip::encode(row.as_bytes()));
        }
        self.runs.push_back(wire);
    }

    /// Values answered to successive `READRAW` lines.
    pub fn queue_raw_values(&mut self, values: &[u16]) {
        self.raw_values.extend(values);
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    pub fn written(&self) -> &[u8] {
        &self.tx
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn commands(&self) -> Vec<Command> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Command(c) => Some(*c),
                _ => None,
            })
            .collect()
    }

    pub fn lines(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Line(l) => Some(l.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clears(&self) -> usize {
        self.clears
    }

    fn handle(&mut self, event: Event) {
        match &event {
            Event::Command(Command::Start { .. }) => {
                if let Some(run) = self.runs.pop_front() {
                    self.rx.extend(run);
                }
            }
            Event::Line(line) if line == "READRAW" => {
                if let Some(value) = self.raw_values.pop_front() {
                    self.rx.extend(value.to_le_bytes());
                }
            }
            _ => {}
        }
        self.events.push(event);
    }

    /// ASCII lines start with an upper case letter, commands with a lower case tag.
    fn process(&mut self) {
        loop {
            let line_mode = self.pending.first().map_or(false, |b| b.is_ascii_uppercase());
            let terminator = if line_mode { b'\n' } else { slip::END };
            let end = match self.pending.iter().position(|&b| b == terminator) {
                Some(end) => end,
                None => return,
            };
            let chunk: Vec<u8> = self.pending.drain(..=end).collect();
            let body = &chunk[..chunk.len() - 1];

            if line_mode {
                self.handle(Event::Line(String::from_utf8_lossy(body).into_owned()));
            } else if !body.is_empty() {
                let command = Command::from_payload(&slip::decode(body)).expect("host sent a malformed command");
                self.handle(Event::Command(command));
            }
        }
    }
}

impl Read for MockDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.connected {
            return Err(ErrorKind::BrokenPipe.into());
        }
        if self.rx.is_empty() {
            return Err(ErrorKind::TimedOut.into());
        }
        let n = buf.len().min(self.rx.len());
        for (slot, b) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = b;
        }
        Ok(n)
    }
}

impl Write for MockDevice {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.connected {
            return Err(ErrorKind::BrokenPipe.into());
        }
        self.tx.extend_from_slice(buf);
        self.pending.extend_from_slice(buf);
        self.process();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Port for MockDevice {
    fn clear_input(&mut self) -> io::Result<()> {
        self.rx.clear();
        self.clears += 1;
        Ok(())
    }
}
