use core::fmt;

/// Failures raised by the frame model and the link codec.
///
/// Field and capacity errors come back to whoever asked for the mutation. The decode
/// variants are mostly seen inside `SoftTnc`, which counts and discards them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ax25Error {
    /// A field value does not fit its wire width, e.g. an SSID above 15.
    RangeError { value: u8, max: u8 },
    /// More data than the configured buffer or path limit.
    CapacityExceeded { requested: usize, capacity: usize },
    /// Repeater index past the end of the path.
    IndexOutOfRange { index: usize, len: usize },
    /// Callsign contains a character that cannot be carried in an address field.
    IllegalCallsign(char),
    /// Frame check sequence did not match the frame body.
    FrameCheckFailed { expected: u16, computed: u16 },
    /// Address block did not end on a whole 7-byte group.
    MalformedAddressField,
    /// Not enough bytes for two addresses, control and FCS.
    FrameTooShort(usize),
}

impl fmt::Display for Ax25Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ax25Error::RangeError { value, max } => {
                write!(f, "value {value} out of range, maximum is {max}")
            }
            Ax25Error::CapacityExceeded {
                requested,
                capacity,
            } => write!(f, "{requested} exceeds capacity of {capacity}"),
            Ax25Error::IndexOutOfRange { index, len } => {
                write!(f, "repeater index {index} out of range, path length is {len}")
            }
            Ax25Error::IllegalCallsign(c) => write!(f, "illegal character {c:?} in callsign"),
            Ax25Error::FrameCheckFailed { expected, computed } => write!(
                f,
                "frame check failed: received {expected:04X}, computed {computed:04X}"
            ),
            Ax25Error::MalformedAddressField => write!(f, "malformed address field"),
            Ax25Error::FrameTooShort(len) => write!(f, "frame of {len} bytes is too short"),
        }
    }
}

impl core::error::Error for Ax25Error {}
