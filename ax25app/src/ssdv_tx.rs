use std::fs;
use std::path::PathBuf;
use std::process::Command;

use ax25core::ssdv::PACKET_LEN;

use crate::app::TxHandle;
use crate::error::RadioError;

/// Turns a source image into an SSDV packet stream.
pub trait ImageEncoder: Send + 'static {
    fn encode(&mut self, image_id: u8) -> Result<Vec<u8>, RadioError>;
}

/// Runs the external `ssdv` tool: `ssdv -e -c CALL -i ID input output`.
///
/// Sources are used in rotation, image id modulo the number of sources. Encoded
/// streams are left in `work_dir` as `txNNN.sdv`.
pub struct SsdvCommandEncoder {
    program: PathBuf,
    callsign: String,
    sources: Vec<PathBuf>,
    work_dir: PathBuf,
}

impl SsdvCommandEncoder {
    pub fn new(callsign: &str, sources: Vec<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: PathBuf::from("ssdv"),
            callsign: callsign.to_owned(),
            sources,
            work_dir: work_dir.into(),
        }
    }

    /// Use a different encoder binary.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn output_path(&self, image_id: u8) -> PathBuf {
        self.work_dir.join(format!("tx{image_id:03}.sdv"))
    }
}

impl ImageEncoder for SsdvCommandEncoder {
    fn encode(&mut self, image_id: u8) -> Result<Vec<u8>, RadioError> {
        let failed = |reason: String| RadioError::EncodeFailed { image_id, reason };
        if self.sources.is_empty() {
            return Err(failed("no source images".into()));
        }
        let source = &self.sources[image_id as usize % self.sources.len()];
        let output = self.output_path(image_id);
        log::info!("encoding {} as image {image_id}", source.display());
        let status = Command::new(&self.program)
            .arg("-e")
            .arg("-c")
            .arg(&self.callsign)
            .arg("-i")
            .arg(image_id.to_string())
            .arg(source)
            .arg(&output)
            .status()
            .map_err(|e| failed(format!("cannot run {}: {e}", self.program.display())))?;
        if !status.success() {
            return Err(failed(format!("{} exited with {status}", self.program.display())));
        }
        fs::read(&output).map_err(|e| failed(format!("cannot read {}: {e}", output.display())))
    }
}

/// Sends images one SSDV packet at a time.
///
/// Each `tick` sends the next packet of the current image. When an image runs out the
/// next image id is encoded. An image whose encoding fails is skipped and the
/// following id is tried on the next tick.
pub struct SsdvTransmitter<E: ImageEncoder> {
    encoder: E,
    next_image_id: u8,
    current_image_id: Option<u8>,
    data: Vec<u8>,
    offset: usize,
    packets_sent: usize,
}

impl<E: ImageEncoder> SsdvTransmitter<E> {
    pub fn new(encoder: E) -> Self {
        Self::starting_at(encoder, 0)
    }

    pub fn starting_at(encoder: E, image_id: u8) -> Self {
        Self {
            encoder,
            next_image_id: image_id,
            current_image_id: None,
            data: vec![],
            offset: 0,
            packets_sent: 0,
        }
    }

    pub fn current_image_id(&self) -> Option<u8> {
        self.current_image_id
    }

    pub fn packets_sent(&self) -> usize {
        self.packets_sent
    }

    /// Next packet to send, encoding a new image when the current one is exhausted.
    ///
    /// `None` when the encoder failed for the image it was asked for.
    pub fn next_packet(&mut self) -> Option<&[u8]> {
        if self.offset >= self.data.len() {
            let image_id = self.next_image_id;
            self.next_image_id = image_id.wrapping_add(1);
            self.data.clear();
            self.offset = 0;
            self.current_image_id = None;
            match self.encoder.encode(image_id) {
                Ok(data) if !data.is_empty() => {
                    log::info!("image {image_id}: {} packets", data.len().div_ceil(PACKET_LEN));
                    self.data = data;
                    self.current_image_id = Some(image_id);
                }
                Ok(_) => {
                    log::warn!("image {image_id} encoded to nothing, skipping");
                    return None;
                }
                Err(e) => {
                    log::warn!("skipping image: {e}");
                    return None;
                }
            }
        }
        let end = (self.offset + PACKET_LEN).min(self.data.len());
        let packet = &self.data[self.offset..end];
        self.offset = end;
        self.packets_sent += 1;
        Some(packet)
    }

    pub fn tick(&mut self, tx: &TxHandle) -> Result<(), RadioError> {
        match self.next_packet() {
            Some(packet) => tx.transmit(packet),
            None => Ok(()),
        }
    }
}
