use std::io::{self, Read, Write};

use serialport::SerialPort;

use crate::error::TransportError;
use crate::transport::{READ_TIMEOUT, Transport};

/// Serial link to a radio modem or TNC.
pub struct SerialTransport {
    name: String,
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    pub fn available_ports() -> impl Iterator<Item = String> {
        serialport::available_ports()
            .unwrap_or_else(|_| vec![])
            .into_iter()
            .map(|i| i.port_name)
    }

    pub fn new(port_name: &str, baud: u32) -> Result<Self, TransportError> {
        let port = serialport::new(port_name, baud)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| TransportError::SerialOpen(port_name.to_owned(), e))?;
        log::info!("opened {port_name} at {baud} baud");
        Ok(Self {
            name: port_name.to_owned(),
            port,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Read for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl Transport for SerialTransport {
    fn try_clone(&mut self) -> Result<Self, TransportError> {
        Ok(Self {
            name: self.name.clone(),
            port: self.port.try_clone()?,
        })
    }

    fn close(&mut self) -> Result<(), TransportError> {
        // the port is released when the last handle drops; push out anything queued
        self.port.flush()?;
        Ok(())
    }
}
