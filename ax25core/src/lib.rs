#![doc = include_str!("../README.md")]
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod address;
pub mod codec;
pub mod crc;
pub mod error;
pub mod frame;
pub mod hdlc;
pub mod hexlink;
pub mod ssdv;
pub mod tnc;

pub use address::AddressField;
pub use codec::LinkCodec;
pub use error::Ax25Error;
pub use frame::Frame;
pub use tnc::{PacketKind, SoftTnc};
