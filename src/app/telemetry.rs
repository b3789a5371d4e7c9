//! Telemetry frames streamed by the controller during a run.

use std::fmt;
use std::io::{self, Write};
use std::time::{Duration, Instant};

use log::{debug, warn};
use slip::Frame;

use crate::app::comms::{Link, Port};

#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Field {
    /// Integer, else float, else the token as text.
    pub fn parse(token: &str) -> Field {
        if let Ok(i) = token.parse::<i64>() {
            Field::Int(i)
        } else if let Ok(f) = token.parse::<f64>() {
            Field::Float(f)
        } else {
            Field::Text(token.to_string())
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Field::Int(i) => Some(i as f64),
            Field::Float(f) => Some(f),
            Field::Text(_) => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(i) => write!(f, "{}", i),
            Field::Float(x) => write!(f, "{:?}", x),
            Field::Text(t) => write!(f, "{}", t),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Telemetry {
    Row(Vec<Field>),
    Raw(Vec<u8>),
}

impl Telemetry {
    /// Tab separated text becomes a row, anything else stays opaque.
    pub fn parse(payload: &[u8]) -> Telemetry {
        let text = String::from_utf8_lossy(payload);
        let text = text.trim();
        if text.contains('\t') {
            Telemetry::Row(text.split('\t').map(Field::parse).collect())
        } else {
            Telemetry::Raw(payload.to_vec())
        }
    }

    pub fn row(&self) -> Option<&[Field]> {
        match self {
            Telemetry::Row(fields) => Some(fields),
            Telemetry::Raw(_) => None,
        }
    }

    pub fn write_tsv<W: Write>(&self, out: &mut W) -> io::Result<()> {
        match self {
            Telemetry::Row(fields) => {
                let line: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
                writeln!(out, "{}", line.join("\t"))
            }
            Telemetry::Raw(bytes) => writeln!(out, "{}", String::from_utf8_lossy(bytes).trim()),
        }
    }
}

/// Reads frames until the controller goes quiet or `budget` runs out,
/// writing each one to `sink` as a TSV line.
pub fn capture_run<P: Port, W: Write>(link: &mut Link<P>, budget: Duration, sink: &mut W) -> io::Result<Vec<Telemetry>> {
    let start = Instant::now();
    let mut samples = Vec::new();

    loop {
        match link.recv()? {
            Frame::EndOfRun => break,
            Frame::Partial => debug!("dropped a partial frame"),
            Frame::Payload(payload) => {
                let sample = Telemetry::parse(&payload);
                sample.write_tsv(sink)?;
                samples.push(sample);
            }
        }
        if start.elapsed() >= budget {
            warn!("run still streaming after {:?}, stopping capture", budget);
            break;
        }
    }

    sink.flush()?;
    Ok(samples)
}
