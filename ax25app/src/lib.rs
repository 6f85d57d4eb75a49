#![doc = include_str!("../README.md")]

pub mod adapter;
pub mod app;
pub mod beacon;
pub mod config;
pub mod error;
pub mod multiplexer;
pub mod reassembler;
pub mod schedule;
pub mod serial;
pub mod ssdv_tx;
pub mod transport;

#[cfg(test)]
mod test_util;

// Core types needed to build frames and interpret received packets
pub use ax25core::frame::Frame;
pub use ax25core::ssdv::SsdvHeader;
pub use ax25core::tnc::{Framing, PacketKind, TncStats};
