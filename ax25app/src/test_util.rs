use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

use ax25core::ssdv::{PACKET_LEN, PacketType, SsdvHeader, encode_callsign};

use crate::error::TransportError;
use crate::reassembler::StreamStore;
use crate::transport::Transport;

#[derive(Default)]
struct Pipe {
    data: VecDeque<u8>,
    closed: bool,
    fail_reads: bool,
}

/// In-memory loopback link. Every clone shares the same queue, so whatever is written
/// through one handle can be read back through any other.
#[derive(Clone, Default)]
pub(crate) struct PipeTransport {
    pipe: Arc<Mutex<Pipe>>,
}

impl PipeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue bytes as if they had arrived from the radio.
    pub(crate) fn inject(&self, bytes: &[u8]) {
        self.pipe.lock().unwrap().data.extend(bytes.iter().copied());
    }

    pub(crate) fn fail_reads(&self) {
        self.pipe.lock().unwrap().fail_reads = true;
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.pipe.lock().unwrap().closed
    }
}

impl Read for PipeTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut pipe = self.pipe.lock().unwrap();
        if pipe.fail_reads {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "link lost"));
        }
        let n = buf.len().min(pipe.data.len());
        for (dst, src) in buf.iter_mut().zip(pipe.data.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl Write for PipeTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pipe.lock().unwrap().data.extend(buf.iter().copied());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for PipeTransport {
    fn try_clone(&mut self) -> Result<Self, TransportError> {
        Ok(self.clone())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.pipe.lock().unwrap().closed = true;
        Ok(())
    }
}

/// One stream handed out by `MemoryStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OpenedStream {
    pub(crate) image_id: u8,
    pub(crate) bytes: Vec<u8>,
    pub(crate) closed: bool,
}

/// Records every stream opened by a reassembler, in order.
#[derive(Clone, Default)]
pub(crate) struct MemoryStore {
    streams: Arc<Mutex<Vec<OpenedStream>>>,
}

impl MemoryStore {
    pub(crate) fn streams(&self) -> Vec<OpenedStream> {
        self.streams.lock().unwrap().clone()
    }
}

pub(crate) struct MemoryStream {
    index: usize,
    streams: Arc<Mutex<Vec<OpenedStream>>>,
}

impl Write for MemoryStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.streams.lock().unwrap()[self.index]
            .bytes
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for MemoryStream {
    fn drop(&mut self) {
        self.streams.lock().unwrap()[self.index].closed = true;
    }
}

impl StreamStore for MemoryStore {
    type Stream = MemoryStream;

    fn open(&mut self, image_id: u8) -> io::Result<MemoryStream> {
        let mut streams = self.streams.lock().unwrap();
        streams.push(OpenedStream {
            image_id,
            bytes: vec![],
            closed: false,
        });
        Ok(MemoryStream {
            index: streams.len() - 1,
            streams: self.streams.clone(),
        })
    }
}

pub(crate) fn ssdv_header(image_id: u8, packet_id: u16) -> SsdvHeader {
    SsdvHeader {
        packet_type: PacketType::Normal,
        callsign: encode_callsign("NOCALL"),
        image_id,
        packet_id,
        width: 20,
        height: 15,
        flags: 0,
        mcu_offset: 0,
        mcu_index: 0,
    }
}

/// Valid SSDV packet whose image data bytes are all `packet_id as u8`.
pub(crate) fn ssdv_packet(image_id: u8, packet_id: u16) -> Vec<u8> {
    ssdv_header(image_id, packet_id)
        .build_packet(&[packet_id as u8; PACKET_LEN])
        .to_vec()
}
