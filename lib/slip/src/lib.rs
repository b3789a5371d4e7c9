#![no_std]

#[cfg(any(feature = "std", test))]
#[macro_use]
extern crate std;

extern crate alloc;

pub mod codec;
pub mod command;

pub use codec::{decode, encode, read_frame, ByteSource, Frame, END, ESC, ESC_END, ESC_ESC};
pub use command::{Command, CommandError, GainKind};
