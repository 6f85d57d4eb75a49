use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use crate::error::TransportError;
use crate::serial::SerialTransport;

/// Read timeout applied to transports so the receive loop can notice cancellation.
pub const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// A byte link to the radio.
///
/// Transports must be cloneable so that reading and writing can happen on different
/// threads. We do not require `Clone` directly as this could not be fulfilled by
/// `TcpStream` or a serial port handle.
///
/// Reads should return within a short bounded time. Returning `Ok(0)` or an error of
/// kind `WouldBlock`/`TimedOut` means no data was available and is not a failure.
pub trait Transport: Read + Write + Sized + Send + 'static {
    /// Return a second handle onto the same link.
    ///
    /// `RadioApp` uses one copy for reading and one for writing, concurrently across
    /// two threads.
    fn try_clone(&mut self) -> Result<Self, TransportError>;

    /// Shut down I/O. It is assumed we cannot restart.
    fn close(&mut self) -> Result<(), TransportError>;
}

impl Transport for TcpStream {
    fn try_clone(&mut self) -> Result<Self, TransportError> {
        Ok(TcpStream::try_clone(self)?)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        match self.shutdown(Shutdown::Both) {
            // the other handle may already have shut the socket down
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            r => Ok(r?),
        }
    }
}

/// Either of the concrete transports, chosen at runtime from a device string.
pub enum AnyTransport {
    Tcp(TcpStream),
    Serial(SerialTransport),
}

/// Open `device` as a transport.
///
/// `tcp:HOST:PORT` connects to a network TNC. Anything else is treated as a serial
/// device path and opened at `baud`.
pub fn open(device: &str, baud: u32) -> Result<AnyTransport, TransportError> {
    match device.strip_prefix("tcp:") {
        Some(addr) => {
            let stream = TcpStream::connect(addr)?;
            stream.set_read_timeout(Some(READ_TIMEOUT))?;
            stream.set_nodelay(true)?;
            log::info!("connected to {addr}");
            Ok(AnyTransport::Tcp(stream))
        }
        None => Ok(AnyTransport::Serial(SerialTransport::new(device, baud)?)),
    }
}

impl Read for AnyTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            AnyTransport::Tcp(t) => t.read(buf),
            AnyTransport::Serial(s) => s.read(buf),
        }
    }
}

impl Write for AnyTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            AnyTransport::Tcp(t) => t.write(buf),
            AnyTransport::Serial(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            AnyTransport::Tcp(t) => t.flush(),
            AnyTransport::Serial(s) => s.flush(),
        }
    }
}

impl Transport for AnyTransport {
    fn try_clone(&mut self) -> Result<Self, TransportError> {
        Ok(match self {
            AnyTransport::Tcp(t) => AnyTransport::Tcp(Transport::try_clone(t)?),
            AnyTransport::Serial(s) => AnyTransport::Serial(s.try_clone()?),
        })
    }

    fn close(&mut self) -> Result<(), TransportError> {
        match self {
            AnyTransport::Tcp(t) => t.close(),
            AnyTransport::Serial(s) => s.close(),
        }
    }
}

/// True for read errors that only mean "nothing arrived yet".
pub(crate) fn is_idle(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
