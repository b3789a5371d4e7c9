//! Host to device commands.
//!
//! Every command payload is six bytes: an ASCII tag, the ASCII digit of the
//! target fader and a little endian `f32`.

use alloc::vec::Vec;
use bincode::config::{Configuration, Fixint, LittleEndian, NoLimit};
use bincode::{Decode, Encode};

use crate::codec;

pub static BINCODE_CFG: Configuration<LittleEndian, Fixint, NoLimit> = bincode::config::standard()
    .with_little_endian()
    .with_fixed_int_encoding();

pub const PAYLOAD_LEN: usize = 6;

const START_TAG: u8 = b's';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GainKind {
    Proportional,
    Integral,
    Derivative,
    SampleTime,
    Cutoff,
}

impl GainKind {
    /// In the order the sweep sends them.
    pub const ALL: [GainKind; 5] = [
        GainKind::Proportional,
        GainKind::Integral,
        GainKind::Derivative,
        GainKind::SampleTime,
        GainKind::Cutoff,
    ];

    pub fn tag(self) -> u8 {
        match self {
            GainKind::Proportional => b'p',
            GainKind::Integral => b'i',
            GainKind::Derivative => b'd',
            GainKind::SampleTime => b't',
            GainKind::Cutoff => b'c',
        }
    }

    pub fn from_tag(tag: u8) -> Option<GainKind> {
        GainKind::ALL.into_iter().find(|k| k.tag() == tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    SetGain { index: u8, kind: GainKind, value: f32 },
    Start { index: u8, speed_divisor: f32 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("fader index {0} does not fit in one ASCII digit")]
    IndexOutOfRange(u8),
    #[error("payload is {0} bytes, expected 6")]
    Length(usize),
    #[error("unknown command tag {0:#04x}")]
    UnknownTag(u8),
    #[error("index byte {0:#04x} is not an ASCII digit")]
    BadIndex(u8),
    #[error("bincode failed on the command payload")]
    Bincode,
}

/// The on-wire layout. With fixed int encoding bincode writes the two `u8`s
/// as-is and the `f32` as four little endian bytes.
#[derive(Encode, Decode)]
struct WireCommand {
    tag: u8,
    index: u8,
    value: f32,
}

impl Command {
    pub fn index(&self) -> u8 {
        match *self {
            Command::SetGain { index, .. } | Command::Start { index, .. } => index,
        }
    }

    fn to_wire(&self) -> Result<WireCommand, CommandError> {
        let index = self.index();
        if index > 9 {
            return Err(CommandError::IndexOutOfRange(index));
        }
        let (tag, value) = match *self {
            Command::SetGain { kind, value, .. } => (kind.tag(), value),
            Command::Start { speed_divisor, .. } => (START_TAG, speed_divisor),
        };
        Ok(WireCommand { tag, index: b'0' + index, value })
    }

    pub fn to_payload(&self) -> Result<Vec<u8>, CommandError> {
        let wire = self.to_wire()?;
        bincode::encode_to_vec(wire, BINCODE_CFG).map_err(|_| CommandError::Bincode)
    }

    /// Payload wrapped in a SLIP frame, ready for the wire.
    pub fn to_frame(&self) -> Result<Vec<u8>, CommandError> {
        Ok(codec::encode(&self.to_payload()?))
    }

    pub fn from_payload(payload: &[u8]) -> Result<Command, CommandError> {
        if payload.len() != PAYLOAD_LEN {
            return Err(CommandError::Length(payload.len()));
        }
        let (wire, _): (WireCommand, usize) =
            bincode::decode_from_slice(payload, BINCODE_CFG).map_err(|_| CommandError::Bincode)?;

        if !wire.index.is_ascii_digit() {
            return Err(CommandError::BadIndex(wire.index));
        }
        let index = wire.index - b'0';

        match wire.tag {
            START_TAG => Ok(Command::Start { index, speed_divisor: wire.value }),
            tag => match GainKind::from_tag(tag) {
                Some(kind) => Ok(Command::SetGain { index, kind, value: wire.value }),
                None => Err(CommandError::UnknownTag(tag)),
            },
        }
    }
}
