use std::io::{Read, Write};

use ax25core::frame::Frame;
use ax25core::ssdv::SsdvHeader;
use ax25core::tnc::{Framing, PacketKind, SoftTnc, TncStats};

use crate::error::RadioError;
use crate::transport::{Transport, is_idle};

/// Bytes pulled from the input handle per read.
const READ_CHUNK: usize = 512;

/// A `SoftTnc` attached to real input and output handles.
///
/// The input and output are set independently, so one multiplexer can serve a
/// receive-only loop, a transmit-only writer, or both on a single link. Handles are
/// owned; `set_fdin`/`set_fdout` replace and drop whatever was there before.
pub struct PacketMultiplexer<T: Transport> {
    tnc: SoftTnc,
    fdin: Option<T>,
    fdout: Option<T>,
    read_buf: Box<[u8]>,
}

impl<T: Transport> PacketMultiplexer<T> {
    pub fn new(capacity: usize, framing: Framing) -> Self {
        Self {
            tnc: SoftTnc::new(capacity, framing),
            fdin: None,
            fdout: None,
            read_buf: vec![0u8; READ_CHUNK].into_boxed_slice(),
        }
    }

    /// Multiplexer using one link for both directions.
    pub fn with_transport(
        mut transport: T,
        capacity: usize,
        framing: Framing,
    ) -> Result<Self, RadioError> {
        let mut mux = Self::new(capacity, framing);
        mux.fdout = Some(transport.try_clone()?);
        mux.fdin = Some(transport);
        Ok(mux)
    }

    pub fn set_fdin(&mut self, fdin: T) {
        self.fdin = Some(fdin);
    }

    pub fn set_fdout(&mut self, fdout: T) {
        self.fdout = Some(fdout);
    }

    pub fn capacity(&self) -> usize {
        self.tnc.capacity()
    }

    /// Addressing used for every payload passed to `write`.
    pub fn tx_frame(&self) -> &Frame {
        self.tnc.tx_frame()
    }

    pub fn tx_frame_mut(&mut self) -> &mut Frame {
        self.tnc.tx_frame_mut()
    }

    /// Check the input for one new packet.
    ///
    /// Frames already buffered are returned first. Only when none is left does this
    /// read from the input handle, at most once, and never for longer than the
    /// transport's read timeout. `PacketKind::None` means nothing complete arrived.
    pub fn poll(&mut self) -> Result<PacketKind, RadioError> {
        let kind = self.tnc.poll();
        if kind != PacketKind::None {
            return Ok(kind);
        }
        let fdin = self.fdin.as_mut().ok_or(RadioError::NoInput)?;
        let n = match fdin.read(&mut self.read_buf) {
            Ok(n) => n,
            Err(e) if is_idle(&e) => 0,
            Err(e) => return Err(e.into()),
        };
        if n == 0 {
            return Ok(PacketKind::None);
        }
        self.tnc.receive_bytes(&self.read_buf[..n]);
        Ok(self.tnc.poll())
    }

    /// Classification from the latest `poll`.
    pub fn kind(&self) -> PacketKind {
        self.tnc.kind()
    }

    /// Frame behind the latest packet. Only meaningful after a non-`None` poll.
    pub fn frame(&self) -> &Frame {
        self.tnc.frame()
    }

    pub fn ssdv_header(&self) -> Option<&SsdvHeader> {
        self.tnc.ssdv_header()
    }

    pub fn ssdv_image_id(&self) -> Option<u8> {
        self.tnc.ssdv_image_id()
    }

    pub fn ssdv_packet_id(&self) -> Option<u16> {
        self.tnc.ssdv_packet_id()
    }

    pub fn rx_len(&self) -> usize {
        self.tnc.rx_len()
    }

    pub fn payload(&self) -> &[u8] {
        self.tnc.payload()
    }

    /// Copy the latest payload into `buf`, returning the number of bytes copied.
    pub fn read(&self, buf: &mut [u8]) -> usize {
        self.tnc.read(buf)
    }

    /// Send `payload` inside the transmit frame. Returns the number of payload bytes sent.
    pub fn write(&mut self, payload: &[u8]) -> Result<usize, RadioError> {
        let fdout = self.fdout.as_mut().ok_or(RadioError::NoOutput)?;
        let wire = self.tnc.encode_tx(payload)?;
        fdout.write_all(wire)?;
        fdout.flush()?;
        Ok(payload.len())
    }

    /// Send a complete frame with its own addressing.
    pub fn send(&mut self, frame: &Frame) -> Result<(), RadioError> {
        let fdout = self.fdout.as_mut().ok_or(RadioError::NoOutput)?;
        let wire = self.tnc.encode_frame(frame)?;
        fdout.write_all(wire)?;
        fdout.flush()?;
        Ok(())
    }

    pub fn stats(&self) -> TncStats {
        self.tnc.stats()
    }

    /// Close and release both handles.
    pub fn close(&mut self) -> Result<(), RadioError> {
        let mut result = Ok(());
        for mut handle in [self.fdin.take(), self.fdout.take()].into_iter().flatten() {
            if let Err(e) = handle.close() {
                log::warn!("error closing transport: {e}");
                result = Err(e.into());
            }
        }
        result
    }
}
