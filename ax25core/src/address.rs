use alloc::string::String;
use core::fmt;

use crate::error::Ax25Error;

/// Maximum number of characters carried in an AX.25 callsign.
pub const CALLSIGN_LEN: usize = 6;

/// Size of one encoded address: six shifted callsign bytes plus the SSID byte.
pub const ADDRESS_LEN: usize = CALLSIGN_LEN + 1;

/// Largest SSID that fits the 4-bit wire field.
pub const MAX_SSID: u8 = 15;

const SSID_RESERVED_BITS: u8 = 0x60;
const SSID_FLAG_BIT: u8 = 0x80;
const EXTENSION_BIT: u8 = 0x01;

/// A single AX.25 station address.
///
/// The flag corresponds to the top bit of the SSID octet. On a repeater it means
/// "has been repeated"; on source and destination it is the command/response bit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressField {
    callsign: String,
    ssid: u8,
    flag: bool,
}

impl AddressField {
    pub fn new(callsign: &str) -> Self {
        let mut field = Self::default();
        field.set_callsign(callsign);
        field
    }

    pub fn callsign(&self) -> &str {
        &self.callsign
    }

    /// Store the callsign, keeping at most the first six characters.
    ///
    /// Longer input is truncated rather than rejected because the wire field is fixed
    /// width. Characters are validated later, when the address is encoded.
    pub fn set_callsign(&mut self, callsign: &str) {
        self.callsign.clear();
        self.callsign.extend(callsign.chars().take(CALLSIGN_LEN));
    }

    pub fn ssid(&self) -> u8 {
        self.ssid
    }

    pub fn set_ssid(&mut self, ssid: u8) -> Result<(), Ax25Error> {
        if ssid > MAX_SSID {
            return Err(Ax25Error::RangeError {
                value: ssid,
                max: MAX_SSID,
            });
        }
        self.ssid = ssid;
        Ok(())
    }

    pub fn flag(&self) -> bool {
        self.flag
    }

    pub fn set_flag(&mut self, flag: bool) {
        self.flag = flag;
    }

    pub fn clear(&mut self) {
        self.callsign.clear();
        self.ssid = 0;
        self.flag = false;
    }
}

impl fmt::Display for AddressField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.callsign)?;
        if self.ssid != 0 {
            write!(f, "-{}", self.ssid)?;
        }
        if self.flag {
            write!(f, "*")?;
        }
        Ok(())
    }
}

/// Pack an address into its 7-byte wire form.
///
/// `last` sets the extension bit that marks the final address of the header.
pub fn encode_address(address: &AddressField, last: bool) -> Result<[u8; ADDRESS_LEN], Ax25Error> {
    let mut out = [b' ' << 1; ADDRESS_LEN];
    for (i, c) in address.callsign.chars().enumerate() {
        if !(c.is_ascii_alphanumeric() || c == ' ') {
            return Err(Ax25Error::IllegalCallsign(c));
        }
        out[i] = (c as u8) << 1;
    }
    let mut ssid_byte = SSID_RESERVED_BITS | (address.ssid & MAX_SSID) << 1;
    if address.flag {
        ssid_byte |= SSID_FLAG_BIT;
    }
    if last {
        ssid_byte |= EXTENSION_BIT;
    }
    out[CALLSIGN_LEN] = ssid_byte;
    Ok(out)
}

/// Unpack a 7-byte address into `target`, returning whether the extension bit was set.
///
/// Callsign octets always have their low bit clear; a set bit means the address block
/// is misaligned.
pub fn decode_address(encoded: &[u8], target: &mut AddressField) -> Result<bool, Ax25Error> {
    if encoded.len() < ADDRESS_LEN {
        return Err(Ax25Error::MalformedAddressField);
    }
    if encoded[..CALLSIGN_LEN].iter().any(|b| b & EXTENSION_BIT != 0) {
        return Err(Ax25Error::MalformedAddressField);
    }
    target.callsign.clear();
    target
        .callsign
        .extend(encoded[..CALLSIGN_LEN].iter().map(|b| (b >> 1) as char));
    let trimmed = target.callsign.trim_end_matches(' ').len();
    target.callsign.truncate(trimmed);

    let ssid_byte = encoded[CALLSIGN_LEN];
    target.ssid = (ssid_byte >> 1) & MAX_SSID;
    target.flag = ssid_byte & SSID_FLAG_BIT != 0;
    Ok(ssid_byte & EXTENSION_BIT != 0)
}
