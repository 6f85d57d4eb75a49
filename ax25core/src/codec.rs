use alloc::vec::Vec;

use crate::address::{ADDRESS_LEN, AddressField, decode_address, encode_address};
use crate::crc::ax25_fcs;
use crate::error::Ax25Error;
use crate::frame::{CTRL_UI, DEFAULT_INFO_LEN, Frame, MAX_REPEATERS, PID_NO_LAYER3};

/// Length of the frame check sequence trailer.
pub const FCS_LEN: usize = 2;

/// Smallest decodable frame: destination, source, control and FCS.
pub const MIN_FRAME_LEN: usize = 2 * ADDRESS_LEN + 1 + FCS_LEN;

/// Poll/final bit of the control field.
const CTRL_PF: u8 = 0x10;

/// Largest encoded frame (without framing) for a given information capacity.
pub const fn max_frame_len(max_info: usize) -> usize {
    ADDRESS_LEN * (2 + MAX_REPEATERS) + 2 + max_info + FCS_LEN
}

/// Only UI frames carry a PID octet. The poll/final bit does not change that.
pub fn carries_pid(ctrl: u8) -> bool {
    ctrl & !CTRL_PF == CTRL_UI
}

/// Converts between `Frame` and its on-air byte representation (without HDLC flags).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkCodec {
    max_info: usize,
}

impl LinkCodec {
    pub fn new(max_info: usize) -> Self {
        Self { max_info }
    }

    pub fn max_info(&self) -> usize {
        self.max_info
    }

    /// Append the encoded form of `frame`, including FCS, to `out`.
    ///
    /// Returns the number of bytes appended. On error `out` is restored to its
    /// original length.
    pub fn encode(&self, frame: &Frame, out: &mut Vec<u8>) -> Result<usize, Ax25Error> {
        if frame.infolen() > self.max_info {
            return Err(Ax25Error::CapacityExceeded {
                requested: frame.infolen(),
                capacity: self.max_info,
            });
        }
        let start = out.len();
        let result = self.encode_body(frame, out);
        if let Err(e) = result {
            out.truncate(start);
            return Err(e);
        }
        let fcs = ax25_fcs(&out[start..]);
        out.extend_from_slice(&fcs.to_le_bytes());
        Ok(out.len() - start)
    }

    fn encode_body(&self, frame: &Frame, out: &mut Vec<u8>) -> Result<(), Ax25Error> {
        let repeaters = frame.repeaters();
        out.extend_from_slice(&encode_address(frame.dst(), false)?);
        out.extend_from_slice(&encode_address(frame.src(), repeaters.is_empty())?);
        for (i, r) in repeaters.iter().enumerate() {
            out.extend_from_slice(&encode_address(r, i == repeaters.len() - 1)?);
        }
        out.push(frame.ctrl());
        if carries_pid(frame.ctrl()) {
            out.push(frame.pid());
        }
        out.extend_from_slice(frame.info());
        Ok(())
    }

    /// Decode `bytes` (a complete frame including FCS) into `frame`.
    ///
    /// Every check runs before `frame` is touched, so a rejected frame leaves the
    /// target exactly as it was.
    pub fn decode(&self, bytes: &[u8], frame: &mut Frame) -> Result<(), Ax25Error> {
        if bytes.len() < MIN_FRAME_LEN {
            return Err(Ax25Error::FrameTooShort(bytes.len()));
        }
        let (body, fcs) = bytes.split_at(bytes.len() - FCS_LEN);
        let expected = u16::from_le_bytes([fcs[0], fcs[1]]);
        let computed = ax25_fcs(body);
        if expected != computed {
            return Err(Ax25Error::FrameCheckFailed { expected, computed });
        }

        let addresses = scan_addresses(body)?;
        let mut idx = addresses * ADDRESS_LEN;
        let Some(&ctrl) = body.get(idx) else {
            return Err(Ax25Error::FrameTooShort(bytes.len()));
        };
        idx += 1;
        let pid = if carries_pid(ctrl) {
            let Some(&pid) = body.get(idx) else {
                return Err(Ax25Error::FrameTooShort(bytes.len()));
            };
            idx += 1;
            pid
        } else {
            PID_NO_LAYER3
        };
        let info = &body[idx..];
        let capacity = self.max_info.min(frame.max_info());
        if info.len() > capacity {
            return Err(Ax25Error::CapacityExceeded {
                requested: info.len(),
                capacity,
            });
        }

        frame.clear();
        decode_address(&body[0..ADDRESS_LEN], frame.dst_mut())?;
        decode_address(&body[ADDRESS_LEN..2 * ADDRESS_LEN], frame.src_mut())?;
        let repeaters = frame.repeaters_vec_mut();
        for chunk in body[2 * ADDRESS_LEN..addresses * ADDRESS_LEN].chunks_exact(ADDRESS_LEN) {
            let mut r = AddressField::default();
            decode_address(chunk, &mut r)?;
            repeaters.push(r);
        }
        frame.set_ctrl(ctrl);
        frame.set_pid(pid);
        frame.info_vec_mut().extend_from_slice(info);
        Ok(())
    }
}

impl Default for LinkCodec {
    fn default() -> Self {
        Self::new(DEFAULT_INFO_LEN)
    }
}

/// Walk the address block one 7-byte group at a time until the extension bit.
///
/// There is no length prefix, so this is the only way to know how long the
/// repeater path is. Returns the number of addresses including source and destination.
fn scan_addresses(body: &[u8]) -> Result<usize, Ax25Error> {
    let mut count = 0;
    for group in body.chunks(ADDRESS_LEN) {
        if group.len() != ADDRESS_LEN {
            return Err(Ax25Error::MalformedAddressField);
        }
        if group[..ADDRESS_LEN - 1].iter().any(|b| b & 0x01 != 0) {
            return Err(Ax25Error::MalformedAddressField);
        }
        count += 1;
        if count > 2 + MAX_REPEATERS {
            return Err(Ax25Error::MalformedAddressField);
        }
        if group[ADDRESS_LEN - 1] & 0x01 != 0 {
            if count < 2 {
                return Err(Ax25Error::MalformedAddressField);
            }
            return Ok(count);
        }
    }
    Err(Ax25Error::MalformedAddressField)
}
