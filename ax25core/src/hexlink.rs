//! Hex text framing for links that only pass printable characters.
//!
//! ```text
//! SOH STX <body as uppercase hex pairs> ETX <CRC as 4 hex digits> EOT
//! ```
//!
//! The CRC (CRC-16/MCRF4XX) covers the hex characters between STX and ETX exactly as
//! they appear on the line. Any other byte outside the markers is ignored, so the
//! stream can share a console with human-readable noise.

use alloc::vec::Vec;

use crate::crc::{TNC_CRC, tnc_crc};

pub const SOH: u8 = 0x01;
pub const STX: u8 = 0x02;
pub const ETX: u8 = 0x03;
pub const EOT: u8 = 0x04;

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Append `body` to `out` as one hex text frame.
pub fn wrap(body: &[u8], out: &mut Vec<u8>) {
    out.reserve(body.len() * 2 + 8);
    out.push(SOH);
    out.push(STX);
    let start = out.len();
    for &b in body {
        out.push(HEX[(b >> 4) as usize]);
        out.push(HEX[(b & 0x0f) as usize]);
    }
    let crc = tnc_crc(&out[start..]);
    out.push(ETX);
    for shift in [12, 8, 4, 0] {
        out.push(HEX[((crc >> shift) & 0x0f) as usize]);
    }
    out.push(EOT);
}

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Header,
    Text,
    Check,
}

pub struct HexDeframer {
    buf: Vec<u8>,
    max_len: usize,
    state: State,
    digest: crc::Digest<'static, u16>,
    msb: Option<u8>,
    crc_rx: u16,
    crc_digits: u8,
    delivered: bool,
    errors: usize,
}

impl HexDeframer {
    pub fn new(max_len: usize) -> Self {
        Self {
            buf: Vec::with_capacity(max_len),
            max_len,
            state: State::Idle,
            digest: TNC_CRC.digest(),
            msb: None,
            crc_rx: 0,
            crc_digits: 0,
            delivered: false,
            errors: 0,
        }
    }

    /// Frames dropped for a bad CRC, too many CRC digits or an oversize body.
    pub fn errors(&self) -> usize {
        self.errors
    }

    pub fn push(&mut self, byte: u8) -> Option<&[u8]> {
        if self.delivered {
            self.buf.clear();
            self.delivered = false;
        }

        match byte {
            SOH => {
                self.buf.clear();
                self.digest = TNC_CRC.digest();
                self.msb = None;
                self.state = State::Header;
            }
            STX => {
                self.state = if self.state == State::Header {
                    State::Text
                } else {
                    State::Idle
                };
            }
            ETX => {
                if self.state == State::Text && self.msb.is_none() {
                    self.crc_rx = 0;
                    self.crc_digits = 0;
                    self.state = State::Check;
                } else {
                    self.state = State::Idle;
                }
            }
            EOT => {
                let complete = self.state == State::Check && self.crc_digits == 4;
                self.state = State::Idle;
                if complete {
                    let digest = core::mem::replace(&mut self.digest, TNC_CRC.digest());
                    let computed = digest.finalize();
                    if computed == self.crc_rx {
                        self.delivered = true;
                        return Some(&self.buf);
                    }
                    log::debug!(
                        "hex frame crc mismatch: received {:04X}, computed {:04X}",
                        self.crc_rx,
                        computed
                    );
                    self.errors += 1;
                }
            }
            c => {
                let Some(n) = nibble(c) else {
                    return None;
                };
                match self.state {
                    State::Text => {
                        self.digest.update(&[c]);
                        match self.msb.take() {
                            None => self.msb = Some(n << 4),
                            Some(msb) => {
                                if self.buf.len() < self.max_len {
                                    self.buf.push(msb | n);
                                } else {
                                    log::debug!("hex frame exceeds {} bytes", self.max_len);
                                    self.errors += 1;
                                    self.state = State::Idle;
                                }
                            }
                        }
                    }
                    State::Check => {
                        if self.crc_digits < 4 {
                            self.crc_rx = (self.crc_rx << 4) | n as u16;
                            self.crc_digits += 1;
                        } else {
                            self.errors += 1;
                            self.state = State::Idle;
                        }
                    }
                    // hex digit outside a frame
                    State::Idle | State::Header => self.state = State::Idle,
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(d: &mut HexDeframer, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut out = vec![];
        for &b in bytes {
            if let Some(f) = d.push(b) {
                out.push(f.to_vec());
            }
        }
        out
    }

    #[test]
    fn wrap_layout() {
        let mut out = vec![];
        wrap(&[0x00, 0xAB, 0x7E], &mut out);
        let crc = tnc_crc(b"00AB7E");
        let mut expected = vec![SOH, STX];
        expected.extend_from_slice(b"00AB7E");
        expected.push(ETX);
        expected.extend_from_slice(std::format!("{crc:04X}").as_bytes());
        expected.push(EOT);
        assert_eq!(out, expected);
    }

    #[test]
    fn round_trip_with_noise() {
        let body: Vec<u8> = (0..=255).collect();
        let mut wire = b"garbage\r\n".to_vec();
        wrap(&body, &mut wire);
        wire.extend_from_slice(b"more noise");
        wrap(&body[..10], &mut wire);
        let mut d = HexDeframer::new(256);
        assert_eq!(feed(&mut d, &wire), vec![body.clone(), body[..10].to_vec()]);
        assert_eq!(d.errors(), 0);
    }

    #[test]
    fn bad_crc_dropped() {
        let mut wire = vec![];
        wrap(&[1, 2, 3, 4], &mut wire);
        // flip a data digit
        wire[2] = b'F';
        let mut d = HexDeframer::new(256);
        assert!(feed(&mut d, &wire).is_empty());
        assert_eq!(d.errors(), 1);
    }

    #[test]
    fn soh_restarts_frame() {
        let mut wire = vec![SOH, STX, b'1', b'2'];
        wrap(&[9, 8, 7], &mut wire);
        let mut d = HexDeframer::new(256);
        assert_eq!(feed(&mut d, &wire), vec![vec![9, 8, 7]]);
    }

    #[test]
    fn oversize_dropped() {
        let mut wire = vec![];
        wrap(&[0x42; 20], &mut wire);
        let mut d = HexDeframer::new(16);
        assert!(feed(&mut d, &wire).is_empty());
        assert_eq!(d.errors(), 1);
    }
}
