use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use ax25core::ssdv::{HEADER_LEN, SsdvHeader};

use crate::adapter::SsdvAdapter;
use crate::error::RadioError;

/// Where reassembled image streams are written.
pub trait StreamStore: Send + 'static {
    type Stream: Write + Send + 'static;

    /// Open the output for `image_id`. Data already stored for it must be kept.
    fn open(&mut self, image_id: u8) -> io::Result<Self::Stream>;
}

/// Stores each image as `rxNNN.sdv` in a directory.
pub struct DirStore {
    dir: PathBuf,
}

impl DirStore {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, image_id: u8) -> PathBuf {
        image_path(&self.dir, image_id)
    }
}

pub fn image_path(dir: &Path, image_id: u8) -> PathBuf {
    dir.join(format!("rx{image_id:03}.sdv"))
}

impl StreamStore for DirStore {
    type Stream = BufWriter<File>;

    fn open(&mut self, image_id: u8) -> io::Result<BufWriter<File>> {
        let path = self.path_for(image_id);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        log::info!("writing image {image_id} to {}", path.display());
        Ok(BufWriter::new(file))
    }
}

/// Running totals for a reassembler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassemblyStats {
    pub packets: usize,
    pub bytes: usize,
    /// Number of times an output stream was opened.
    pub streams_opened: usize,
}

/// Sorts SSDV packets into one output stream per image.
///
/// Exactly one stream is open at a time. A packet for a different image closes the
/// current stream and opens one for the new image id before anything is written, so
/// interleaved images never end up in the same output. An image id that comes back
/// after another one gets a fresh stream handle; with `DirStore` that appends to the
/// existing file.
pub struct SsdvReassembler<S: StreamStore> {
    store: S,
    current: Option<(u8, S::Stream)>,
    /// Write the 15-byte header in front of each payload, giving files the external
    /// SSDV decoder accepts.
    full_packets: bool,
    stats: ReassemblyStats,
}

impl<S: StreamStore> SsdvReassembler<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            current: None,
            full_packets: false,
            stats: ReassemblyStats::default(),
        }
    }

    pub fn with_full_packets(mut self, full_packets: bool) -> Self {
        self.full_packets = full_packets;
        self
    }

    /// Image id of the open stream, `None` before the first packet.
    pub fn current_image_id(&self) -> Option<u8> {
        self.current.as_ref().map(|(id, _)| *id)
    }

    pub fn stats(&self) -> ReassemblyStats {
        self.stats
    }

    /// Append one packet's payload to the stream for its image.
    pub fn handle_packet(&mut self, header: &SsdvHeader, payload: &[u8]) -> Result<(), RadioError> {
        let stream = match self.current.take() {
            Some((image_id, stream)) if image_id == header.image_id => stream,
            previous => {
                if let Some((image_id, stream)) = previous {
                    close_stream(image_id, stream)?;
                }
                let stream = self.store.open(header.image_id)?;
                self.stats.streams_opened += 1;
                stream
            }
        };
        let (_, stream) = self.current.insert((header.image_id, stream));
        if self.full_packets {
            stream.write_all(&header.to_bytes())?;
            self.stats.bytes += HEADER_LEN;
        }
        stream.write_all(payload)?;
        log::debug!(
            "image {} packet {}: {} bytes",
            header.image_id,
            header.packet_id,
            payload.len()
        );
        self.stats.packets += 1;
        self.stats.bytes += payload.len();
        if header.is_last_packet() {
            log::info!("image {} complete", header.image_id);
        }
        Ok(())
    }

    /// Flush and close the open stream, if any. The next packet opens a new one.
    pub fn close_current(&mut self) -> Result<(), RadioError> {
        match self.current.take() {
            Some((image_id, stream)) => close_stream(image_id, stream),
            None => Ok(()),
        }
    }

    /// Close the open stream, reporting any error from the final flush.
    pub fn finish(mut self) -> Result<(), RadioError> {
        self.close_current()
    }
}

fn close_stream<W: Write>(image_id: u8, mut stream: W) -> Result<(), RadioError> {
    log::debug!("closing stream for image {image_id}");
    stream.flush()?;
    Ok(())
}

impl<S: StreamStore> Drop for SsdvReassembler<S> {
    fn drop(&mut self) {
        if let Err(e) = self.close_current() {
            log::warn!("failed to flush image stream: {e}");
        }
    }
}

/// Runs a reassembler from the `RadioApp` receive thread.
pub struct ReassemblerAdapter<S: StreamStore> {
    inner: Mutex<SsdvReassembler<S>>,
}

impl<S: StreamStore> ReassemblerAdapter<S> {
    pub fn new(reassembler: SsdvReassembler<S>) -> Self {
        Self {
            inner: Mutex::new(reassembler),
        }
    }

    pub fn stats(&self) -> ReassemblyStats {
        self.lock().stats()
    }

    pub fn current_image_id(&self) -> Option<u8> {
        self.lock().current_image_id()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SsdvReassembler<S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: StreamStore> SsdvAdapter for ReassemblerAdapter<S> {
    fn ssdv_received(&self, header: SsdvHeader, payload: Arc<[u8]>) {
        if let Err(e) = self.lock().handle_packet(&header, &payload) {
            log::warn!("dropping packet {} of image {}: {e}", header.packet_id, header.image_id);
        }
    }

    fn closed(&self) {
        if let Err(e) = self.lock().close_current() {
            log::warn!("failed to close image stream: {e}");
        }
    }
}
