// Byte channel abstraction and the serial port implementation

use serialport::{SerialPort, SerialPortType};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info};

use super::controller::{GantryError, Result};
use crate::config::{BAUDRATE, CONTROLLER_USB_PID, SERIAL_TIMEOUT_MS};

/// Bidirectional byte channel to the motion controller
pub trait ByteChannel {
    /// Write the whole command
    fn send(&mut self, bytes: &[u8]) -> std::io::Result<()>;

    /// Read whatever is currently buffered, possibly nothing
    fn drain(&mut self) -> std::io::Result<Vec<u8>>;
}

/// Serial connection to the motion controller
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
}

impl SerialChannel {
    /// Find the controller by its USB product id and open it
    pub fn discover() -> Result<Self> {
        let ports = serialport::available_ports()?;
        let port_name = ports
            .into_iter()
            .find(|p| {
                matches!(&p.port_type, SerialPortType::UsbPort(usb) if usb.pid == CONTROLLER_USB_PID)
            })
            .map(|p| p.port_name)
            .ok_or(GantryError::DeviceNotFound {
                pid: CONTROLLER_USB_PID,
            })?;

        info!("Motion controller found at {}", port_name);
        Self::open(&port_name)
    }

    /// Open a known port at the controller's fixed baudrate
    pub fn open(port_name: &str) -> Result<Self> {
        let port = serialport::new(port_name, BAUDRATE)
            .timeout(Duration::from_millis(SERIAL_TIMEOUT_MS))
            .open()
            .map_err(|source| GantryError::ChannelOpen {
                port: port_name.to_string(),
                source,
            })?;

        Ok(Self { port })
    }
}

impl ByteChannel for SerialChannel {
    fn send(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        debug!("Sending: {:?}", String::from_utf8_lossy(bytes));
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn drain(&mut self) -> std::io::Result<Vec<u8>> {
        let mut received = Vec::new();
        loop {
            let waiting = self.port.bytes_to_read()? as usize;
            if waiting == 0 {
                return Ok(received);
            }
            let mut chunk = vec![0u8; waiting];
            let n = self.port.read(&mut chunk)?;
            received.extend_from_slice(&chunk[..n]);
        }
    }
}
