use alloc::vec::Vec;
use core::fmt;

use crate::address::AddressField;
use crate::error::Ax25Error;

/// Control field value for an Unnumbered Information frame.
pub const CTRL_UI: u8 = 0x03;

/// Protocol identifier meaning "no layer 3 protocol".
pub const PID_NO_LAYER3: u8 = 0xF0;

/// AX.25 allows at most eight digipeaters in the address header.
pub const MAX_REPEATERS: usize = 8;

/// Default maximum size of the information field.
pub const DEFAULT_INFO_LEN: usize = 256;

/// An AX.25 UI frame.
///
/// A `Frame` is meant to be long-lived: the receive side decodes into the same
/// instance over and over and the transmit side mutates one template between sends.
/// The information buffer is reserved up front and never grows past `max_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    src: AddressField,
    dst: AddressField,
    repeaters: Vec<AddressField>,
    ctrl: u8,
    pid: u8,
    info: Vec<u8>,
    max_info: usize,
}

impl Frame {
    /// Create an empty frame with the default 256-byte information capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INFO_LEN)
    }

    /// Create an empty frame whose information field may hold up to `max_info` bytes.
    pub fn with_capacity(max_info: usize) -> Self {
        Self {
            src: AddressField::default(),
            dst: AddressField::default(),
            repeaters: Vec::with_capacity(MAX_REPEATERS),
            ctrl: CTRL_UI,
            pid: PID_NO_LAYER3,
            info: Vec::with_capacity(max_info),
            max_info,
        }
    }

    /// Quick setup from `"SRC"` or `"SRC,DST"`.
    ///
    /// Each part is trimmed and then subject to the usual callsign truncation.
    pub fn from_route(route: &str) -> Self {
        let mut frame = Self::new();
        let mut parts = route.splitn(2, ',');
        if let Some(src) = parts.next() {
            frame.src.set_callsign(src.trim());
        }
        if let Some(dst) = parts.next() {
            frame.dst.set_callsign(dst.trim());
        }
        frame
    }

    pub fn src(&self) -> &AddressField {
        &self.src
    }

    pub fn src_mut(&mut self) -> &mut AddressField {
        &mut self.src
    }

    pub fn dst(&self) -> &AddressField {
        &self.dst
    }

    pub fn dst_mut(&mut self) -> &mut AddressField {
        &mut self.dst
    }

    /// Append a repeater to the end of the digipeat path.
    ///
    /// Returns the index of the new repeater.
    pub fn add_repeater(&mut self, callsign: &str) -> Result<usize, Ax25Error> {
        if self.repeaters.len() >= MAX_REPEATERS {
            return Err(Ax25Error::CapacityExceeded {
                requested: self.repeaters.len() + 1,
                capacity: MAX_REPEATERS,
            });
        }
        self.repeaters.push(AddressField::new(callsign));
        Ok(self.repeaters.len() - 1)
    }

    pub fn repeater(&self, index: usize) -> Result<&AddressField, Ax25Error> {
        let len = self.repeaters.len();
        self.repeaters
            .get(index)
            .ok_or(Ax25Error::IndexOutOfRange { index, len })
    }

    /// Mutable access to a repeater in place; changes are seen by the next encode.
    pub fn repeater_mut(&mut self, index: usize) -> Result<&mut AddressField, Ax25Error> {
        let len = self.repeaters.len();
        self.repeaters
            .get_mut(index)
            .ok_or(Ax25Error::IndexOutOfRange { index, len })
    }

    /// Remove the whole repeater path.
    pub fn clear_repeaters(&mut self) {
        self.repeaters.clear();
    }

    pub fn repeaters(&self) -> &[AddressField] {
        &self.repeaters
    }

    pub fn replen(&self) -> usize {
        self.repeaters.len()
    }

    pub fn ctrl(&self) -> u8 {
        self.ctrl
    }

    pub fn set_ctrl(&mut self, ctrl: u8) {
        self.ctrl = ctrl;
    }

    pub fn pid(&self) -> u8 {
        self.pid
    }

    pub fn set_pid(&mut self, pid: u8) {
        self.pid = pid;
    }

    pub fn info(&self) -> &[u8] {
        &self.info
    }

    pub fn infolen(&self) -> usize {
        self.info.len()
    }

    pub fn max_info(&self) -> usize {
        self.max_info
    }

    /// Replace the information field with exactly `info`.
    ///
    /// Fails without touching the current contents if `info` is larger than the
    /// frame's capacity.
    pub fn set_info(&mut self, info: &[u8]) -> Result<(), Ax25Error> {
        if info.len() > self.max_info {
            return Err(Ax25Error::CapacityExceeded {
                requested: info.len(),
                capacity: self.max_info,
            });
        }
        self.info.clear();
        self.info.extend_from_slice(info);
        Ok(())
    }

    /// Reset every field to its default. The information capacity is kept.
    pub fn clear(&mut self) {
        self.src.clear();
        self.dst.clear();
        self.repeaters.clear();
        self.ctrl = CTRL_UI;
        self.pid = PID_NO_LAYER3;
        self.info.clear();
    }

    pub(crate) fn repeaters_vec_mut(&mut self) -> &mut Vec<AddressField> {
        &mut self.repeaters
    }

    pub(crate) fn info_vec_mut(&mut self) -> &mut Vec<u8> {
        &mut self.info
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

/// Monitor format, e.g. `NOCALL>TLM100,TEST*:>Test 00001`.
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}>{}", self.dst, self.src)?;
        for r in &self.repeaters {
            write!(f, ",{}", r)?;
        }
        write!(f, ":")?;
        for chunk in self.info.utf8_chunks() {
            write!(f, "{}", chunk.valid())?;
            if !chunk.invalid().is_empty() {
                write!(f, "\u{FFFD}")?;
            }
        }
        Ok(())
    }
}
