//! SLIP byte stuffing.
//!
//! A frame is the escaped payload followed by a single [`END`]. Decoding is
//! tolerant: bad escapes and stray delimiters never fail, they are passed
//! through or dropped so a noisy link keeps making progress.

use alloc::vec::Vec;

pub const END: u8 = 0xC0;
pub const ESC: u8 = 0xDB;
pub const ESC_END: u8 = 0xDC;
pub const ESC_ESC: u8 = 0xDD;

pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 2);
    for &b in payload {
        match b {
            END => {
                out.push(ESC);
                out.push(ESC_END);
            }
            ESC => {
                out.push(ESC);
                out.push(ESC_ESC);
            }
            _ => out.push(b),
        }
    }
    out.push(END);
    out
}

/// Decodes a frame body, without its trailing [`END`].
pub fn decode(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    let mut bytes = body.iter().copied();
    while let Some(b) = bytes.next() {
        match b {
            ESC => match bytes.next() {
                Some(ESC_END) => out.push(END),
                Some(ESC_ESC) => out.push(ESC),
                Some(other) => out.push(other),
                None => break,
            },
            // an unescaped END inside a body is dropped, not treated as a boundary
            END => {}
            _ => out.push(b),
        }
    }
    out
}

/// Blocking byte input with a read timeout.
pub trait ByteSource {
    type Error;

    /// Reads one byte. `Ok(None)` means the read timed out.
    fn read_byte(&mut self) -> Result<Option<u8>, Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Payload(Vec<u8>),
    /// Timed out in the middle of a frame. The partial bytes are discarded.
    Partial,
    /// Timed out with nothing pending: no more frames right now.
    EndOfRun,
}

impl Frame {
    pub fn is_end_of_run(&self) -> bool {
        matches!(self, Frame::EndOfRun)
    }
}

/// Reads bytes until a complete frame or a timeout.
///
/// Empty frames (back to back [`END`]s) are separators and are skipped.
pub fn read_frame<S: ByteSource>(source: &mut S) -> Result<Frame, S::Error> {
    let mut buf = Vec::new();
    loop {
        match source.read_byte()? {
            None if buf.is_empty() => return Ok(Frame::EndOfRun),
            None => return Ok(Frame::Partial),
            Some(END) if buf.is_empty() => continue,
            Some(END) => return Ok(Frame::Payload(decode(&buf))),
            Some(b) => buf.push(b),
        }
    }
}
