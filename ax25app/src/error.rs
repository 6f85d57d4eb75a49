use std::io;

use ax25core::Ax25Error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RadioError {
    #[error("frame rejected: {0}")]
    Frame(#[from] Ax25Error),

    #[error("transport i/o failed: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("SSDV encoder failed for image {image_id}: {reason}")]
    EncodeFailed { image_id: u8, reason: String },

    #[error("no input transport has been set")]
    NoInput,

    #[error("no output transport has been set")]
    NoOutput,

    #[error("transport has been closed")]
    TransportClosed,

    #[error("invalid station configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("unable to open serial port '{0}': {1}")]
    SerialOpen(String, #[source] serialport::Error),

    #[error("serial port failed: {0}")]
    Serial(#[from] serialport::Error),

    #[error("network transport failed: {0}")]
    Io(#[from] io::Error),
}
