use std::io::{self, ErrorKind, Read, Write};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use serialport::{ClearBuffer, SerialPort, SerialPortType};

use config::LinkConfig;
use slip::{ByteSource, Command, Frame};

const PORT_NAME_HINTS: [&str; 4] = ["usbmodem", "usbserial", "ttyACM", "ttyUSB"];

/// Byte link to the controller.
pub trait Port: Read + Write {
    /// Drops whatever the device sent that has not been read yet.
    fn clear_input(&mut self) -> io::Result<()>;
}

impl Port for Box<dyn SerialPort> {
    fn clear_input(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}

/// Picks the controller among `(name, usb vendor id)` candidates: the
/// preferred vendor first, then anything that looks like a USB serial device.
pub fn pick_port<I>(candidates: I, preferred_vid: u16) -> Option<String>
where
    I: IntoIterator<Item = (String, Option<u16>)>,
{
    let mut fallback = None;
    for (name, vid) in candidates {
        if vid == Some(preferred_vid) {
            return Some(name);
        }
        if fallback.is_none() && PORT_NAME_HINTS.iter().any(|hint| name.contains(hint)) {
            fallback = Some(name);
        }
    }
    fallback
}

pub fn list_ports() -> Result<Vec<(String, Option<u16>)>> {
    let ports = serialport::available_ports().context("failed to enumerate serial ports")?;
    Ok(ports
        .into_iter()
        .map(|p| {
            let vid = match p.port_type {
                SerialPortType::UsbPort(usb) => Some(usb.vid),
                _ => None,
            };
            (p.port_name, vid)
        })
        .collect())
}

pub fn open_port(link: &LinkConfig, baud_rate: u32) -> Result<Box<dyn SerialPort>> {
    let name = match &link.port {
        Some(name) => name.clone(),
        None => pick_port(list_ports()?, link.preferred_vid)
            .ok_or_else(|| anyhow!("no serial port found, plug in the controller or pass --port"))?,
    };
    info!("using serial port {} at {} baud", name, baud_rate);

    serialport::new(&name, baud_rate)
        .timeout(Duration::from_millis(link.timeout_ms))
        .open()
        .with_context(|| format!("failed to open {}", name))
}

/// Single byte reads where a timeout or an empty read means "nothing yet".
struct PortBytes<'a, P>(&'a mut P);

impl<P: Read> ByteSource for PortBytes<'_, P> {
    type Error = io::Error;

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.0.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => return Ok(None),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }
}

pub struct Link<P: Port> {
    port: P,
}

impl<P: Port> Link<P> {
    pub fn new(port: P) -> Self {
        Link { port }
    }

    pub fn send(&mut self, command: &Command) -> Result<()> {
        let frame = command.to_frame()?;
        debug!("-> {:?}", command);
        self.port.write_all(&frame).context("failed to write command")?;
        self.port.flush().context("failed to flush command")
    }

    pub fn recv(&mut self) -> io::Result<Frame> {
        slip::read_frame(&mut PortBytes(&mut self.port))
    }

    pub fn send_line(&mut self, line: &str) -> io::Result<()> {
        debug!("-> {:?}", line);
        self.port.write_all(line.as_bytes())?;
        self.port.write_all(b"\n")?;
        self.port.flush()
    }

    pub fn cue(&mut self, on: bool) -> io::Result<()> {
        self.send_line(if on { "CUE ON" } else { "CUE OFF" })
    }

    /// One raw ADC count, `None` if the device did not answer in time.
    ///
    /// Stale input is dropped first so a late byte from a short reply cannot
    /// shift the next one.
    pub fn read_raw_adc(&mut self) -> io::Result<Option<u16>> {
        self.purge()?;
        self.send_line("READRAW")?;

        let mut bytes = PortBytes(&mut self.port);
        let mut reply = [0u8; 2];
        for slot in reply.iter_mut() {
            match bytes.read_byte()? {
                Some(b) => *slot = b,
                None => return Ok(None),
            }
        }
        Ok(Some(u16::from_le_bytes(reply)))
    }

    pub fn purge(&mut self) -> io::Result<()> {
        self.port.clear_input()
    }

    #[cfg(test)]
    pub fn port(&self) -> &P {
        &self.port
    }

    #[cfg(test)]
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::mock::MockDevice;
    use slip::GainKind;

    fn candidates(list: &[(&str, Option<u16>)]) -> Vec<(String, Option<u16>)> {
        list.iter().map(|(n, v)| (n.to_string(), *v)).collect()
    }

    #[test]
    fn test_pick_port() {
        let ports = candidates(&[
            ("/dev/ttyS0", None),
            ("/dev/ttyUSB0", Some(0x0403)),
            ("/dev/ttyACM1", Some(0x2E8A)),
        ]);
        assert_eq!(pick_port(ports, 0x2E8A).as_deref(), Some("/dev/ttyACM1"));

        let ports = candidates(&[("/dev/ttyS0", None), ("/dev/tty.usbmodem101", None), ("/dev/ttyUSB0", None)]);
        assert_eq!(pick_port(ports, 0x2E8A).as_deref(), Some("/dev/tty.usbmodem101"));

        assert_eq!(pick_port(candidates(&[("/dev/ttyS0", None)]), 0x2E8A), None);
    }

    #[test]
    fn test_send_frames_command() {
        let mut link = Link::new(MockDevice::new());
        let cmd = Command::SetGain { index: 0, kind: GainKind::Proportional, value: 3.5 };
        link.send(&cmd).unwrap();

        assert_eq!(link.port().written(), &[b'p', b'0', 0x00, 0x00, 0x60, 0x40, slip::END]);
        assert_eq!(link.port().commands(), vec![cmd]);
    }

    #[test]
    fn test_send_rejects_bad_index() {
        let mut link = Link::new(MockDevice::new());
        assert!(link.send(&Command::Start { index: 12, speed_divisor: 1.0 }).is_err());
        assert!(link.port().written().is_empty());
    }

    #[test]
    fn test_recv_until_end_of_run() {
        let mut device = MockDevice::new();
        device.queue_bytes(&slip::encode(b"1\t2"));
        device.queue_bytes(&[slip::END, slip::END]);
        let mut link = Link::new(device);

        assert_eq!(link.recv().unwrap(), Frame::Payload(b"1\t2".to_vec()));
        assert_eq!(link.recv().unwrap(), Frame::EndOfRun);
    }

    #[test]
    fn test_read_raw_adc() {
        let mut device = MockDevice::new();
        device.queue_raw_values(&[0x0ABC, 4095]);
        let mut link = Link::new(device);

        assert_eq!(link.read_raw_adc().unwrap(), Some(0x0ABC));
        assert_eq!(link.read_raw_adc().unwrap(), Some(4095));
        assert_eq!(link.read_raw_adc().unwrap(), None);
        assert_eq!(link.port().lines(), vec!["READRAW"; 3]);
    }

    #[test]
    fn test_short_raw_reply() {
        let mut device = MockDevice::new();
        device.queue_bytes(&[0x12]);
        let mut link = Link::new(device);
        assert_eq!(link.read_raw_adc().unwrap(), None);
    }

    #[test]
    fn test_late_raw_byte_is_dropped() {
        let mut device = MockDevice::new();
        device.queue_bytes(&[0x12]);
        let mut link = Link::new(device);
        assert_eq!(link.read_raw_adc().unwrap(), None);

        // the second half of the short reply shows up after the timeout
        link.port_mut().queue_bytes(&[0x34]);
        link.port_mut().queue_raw_values(&[0x0ABC]);
        assert_eq!(link.read_raw_adc().unwrap(), Some(0x0ABC));
    }

    #[test]
    fn test_io_error_propagates() {
        let mut device = MockDevice::new();
        device.disconnect();
        let mut link = Link::new(device);
        assert!(link.recv().is_err());
    }
}
