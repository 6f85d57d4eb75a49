// Byte-oriented HDLC-style framing for links where the serial device hands us whole
// octets. Frames are delimited by FLAG. Any FLAG, RESET or ESC inside the frame is
// preceded by ESC and then sent unchanged.

use alloc::vec::Vec;

use crate::codec::MIN_FRAME_LEN;

pub const FLAG: u8 = 0x7E;
pub const RESET: u8 = 0x7F;
pub const ESC: u8 = 0x1B;

/// Append `body` to `out` as a complete flag-delimited frame.
pub fn wrap(body: &[u8], out: &mut Vec<u8>) {
    out.reserve(body.len() + 2);
    out.push(FLAG);
    escape(body, out);
    out.push(FLAG);
}

fn escape(src: &[u8], dst: &mut Vec<u8>) {
    for &b in src {
        if b == FLAG || b == RESET || b == ESC {
            dst.push(ESC);
        }
        dst.push(b);
    }
}

/// Receive side of the framing.
///
/// Bytes may arrive in arbitrary chunks; feed them one at a time with `push`. When a
/// closing FLAG ends a candidate of plausible length it is handed back, unescaped.
/// Anything shorter is treated as idle flags between frames.
pub struct HdlcDeframer {
    buf: Vec<u8>,
    max_len: usize,
    /// Seen a FLAG and currently collecting a frame.
    sync: bool,
    /// Previous byte was an unescaped ESC.
    escape: bool,
    /// `buf` holds a frame already handed out and must be cleared before reuse.
    delivered: bool,
    overruns: usize,
}

impl HdlcDeframer {
    /// `max_len` bounds the unescaped frame, FCS included.
    pub fn new(max_len: usize) -> Self {
        Self {
            buf: Vec::with_capacity(max_len),
            max_len,
            sync: false,
            escape: false,
            delivered: false,
            overruns: 0,
        }
    }

    /// Number of frames abandoned because they outgrew the buffer.
    pub fn overruns(&self) -> usize {
        self.overruns
    }

    pub fn push(&mut self, byte: u8) -> Option<&[u8]> {
        if self.delivered {
            self.buf.clear();
            self.delivered = false;
        }

        if !self.escape {
            match byte {
                FLAG => {
                    if self.sync && self.buf.len() >= MIN_FRAME_LEN {
                        self.delivered = true;
                        // closing flag doubles as the opening flag of the next frame
                        return Some(&self.buf);
                    }
                    self.sync = true;
                    self.buf.clear();
                    return None;
                }
                RESET => {
                    log::debug!("hdlc reset");
                    self.sync = false;
                    self.buf.clear();
                    return None;
                }
                ESC => {
                    self.escape = true;
                    return None;
                }
                _ => (),
            }
        }
        self.escape = false;

        if self.sync {
            if self.buf.len() < self.max_len {
                self.buf.push(byte);
            } else {
                log::debug!("hdlc buffer overrun after {} bytes", self.buf.len());
                self.overruns += 1;
                self.sync = false;
                self.buf.clear();
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(deframer: &mut HdlcDeframer, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut frames = vec![];
        for &b in bytes {
            if let Some(f) = deframer.push(b) {
                frames.push(f.to_vec());
            }
        }
        frames
    }

    #[test]
    fn test_escape() {
        let mut buf = vec![];
        escape(&[0, 1, 2, 3], &mut buf);
        assert_eq!(buf, vec![0, 1, 2, 3]);

        let mut buf = vec![];
        escape(&[0, FLAG, 3, ESC, RESET], &mut buf);
        assert_eq!(buf, vec![0, ESC, FLAG, 3, ESC, ESC, ESC, RESET]);
    }

    #[test]
    fn wrap_then_deframe() {
        let body: Vec<u8> = (0x70..0x90).collect();
        let mut wire = vec![];
        wrap(&body, &mut wire);
        assert_eq!(wire[0], FLAG);
        assert_eq!(*wire.last().unwrap(), FLAG);

        let mut d = HdlcDeframer::new(64);
        assert_eq!(feed(&mut d, &wire), vec![body]);
    }

    #[test]
    fn back_to_back_frames_share_flags() {
        let a = vec![0x11; 20];
        let b = vec![0x22; 30];
        let mut wire = vec![];
        wrap(&a, &mut wire);
        wrap(&b, &mut wire);
        // Also strip the duplicate flag, so frames are separated by one FLAG only.
        let mut shared = vec![FLAG];
        shared.extend_from_slice(&a);
        shared.push(FLAG);
        shared.extend_from_slice(&b);
        shared.push(FLAG);

        let mut d = HdlcDeframer::new(64);
        assert_eq!(feed(&mut d, &wire), vec![a.clone(), b.clone()]);
        let mut d = HdlcDeframer::new(64);
        assert_eq!(feed(&mut d, &shared), vec![a, b]);
    }

    #[test]
    fn short_runs_and_noise_ignored() {
        let mut wire = vec![0x55, 0x66, FLAG, FLAG, FLAG, 1, 2, 3, FLAG];
        let body = vec![0x33; 18];
        wrap(&body, &mut wire);
        let mut d = HdlcDeframer::new(64);
        assert_eq!(feed(&mut d, &wire), vec![body]);
    }

    #[test]
    fn reset_aborts_frame() {
        let mut wire = vec![FLAG];
        wire.extend_from_slice(&[0x44; 20]);
        wire.push(RESET);
        wire.push(FLAG);
        let mut d = HdlcDeframer::new(64);
        assert!(feed(&mut d, &wire).is_empty());
    }

    #[test]
    fn overrun_drops_sync() {
        let mut wire = vec![];
        wrap(&[0x10; 100], &mut wire);
        let good = vec![0x20; 20];
        wrap(&good, &mut wire);
        let mut d = HdlcDeframer::new(64);
        assert_eq!(feed(&mut d, &wire), vec![good]);
        assert_eq!(d.overruns(), 1);
    }
}
