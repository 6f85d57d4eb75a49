use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::codec::{LinkCodec, max_frame_len};
use crate::error::Ax25Error;
use crate::frame::Frame;
use crate::hdlc::{self, HdlcDeframer};
use crate::hexlink::{self, HexDeframer};
use crate::ssdv::{HEADER_LEN, SsdvHeader};

/// How encoded frames are delimited on the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// FLAG-delimited frames with ESC byte stuffing.
    #[default]
    Hdlc,
    /// SOH/STX/ETX/EOT markers around a hex text body.
    HexText,
}

/// Result of one poll of the TNC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// No complete frame decoded this time round.
    None,
    /// Beacon or other text traffic.
    Generic,
    /// An SSDV image fragment.
    Ssdv,
}

/// Running counters, mostly useful for judging link quality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TncStats {
    pub frames_decoded: usize,
    pub frames_rejected: usize,
    pub ssdv_packets: usize,
    /// Candidates dropped by the framing layer itself (overruns, hex CRC).
    pub framing_errors: usize,
}

enum Deframer {
    Hdlc(HdlcDeframer),
    Hex(HexDeframer),
}

impl Deframer {
    fn new(framing: Framing, max_len: usize) -> Self {
        match framing {
            Framing::Hdlc => Deframer::Hdlc(HdlcDeframer::new(max_len)),
            Framing::HexText => Deframer::Hex(HexDeframer::new(max_len)),
        }
    }

    fn push(&mut self, byte: u8) -> Option<&[u8]> {
        match self {
            Deframer::Hdlc(d) => d.push(byte),
            Deframer::Hex(d) => d.push(byte),
        }
    }

    fn errors(&self) -> usize {
        match self {
            Deframer::Hdlc(d) => d.overruns(),
            Deframer::Hex(d) => d.errors(),
        }
    }
}

/// Turns a raw byte stream into classified AX.25 packets and back again.
///
/// This component never performs I/O. Received bytes are handed over with
/// `receive_bytes` and `poll` is called until it returns `PacketKind::None`. On the
/// transmit side `encode_tx` wraps a payload in the configured template frame and
/// returns the bytes to put on the wire.
///
/// Decode failures are normal on a radio channel. They are counted in `stats` and
/// otherwise invisible to the caller.
pub struct SoftTnc {
    codec: LinkCodec,
    framing: Framing,
    deframer: Deframer,

    /// Received bytes not yet run through the deframer.
    rx_pending: VecDeque<u8>,

    /// Most recently decoded frame. Reused for every decode.
    rx_frame: Frame,
    kind: PacketKind,
    ssdv: Option<SsdvHeader>,

    /// Addressing template for outgoing payloads.
    tx_frame: Frame,
    tx_body: Vec<u8>,
    tx_wire: Vec<u8>,

    stats: TncStats,
}

impl SoftTnc {
    /// `capacity` is the largest information field accepted in either direction.
    pub fn new(capacity: usize, framing: Framing) -> Self {
        let max_len = max_frame_len(capacity);
        Self {
            codec: LinkCodec::new(capacity),
            framing,
            deframer: Deframer::new(framing, max_len),
            rx_pending: VecDeque::with_capacity(max_len),
            rx_frame: Frame::with_capacity(capacity),
            kind: PacketKind::None,
            ssdv: None,
            tx_frame: Frame::with_capacity(capacity),
            tx_body: Vec::with_capacity(max_len),
            tx_wire: Vec::with_capacity(2 * max_len + 8),
            stats: TncStats::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.codec.max_info()
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Queue bytes read from the link for the next `poll`.
    pub fn receive_bytes(&mut self, buf: &[u8]) {
        self.rx_pending.extend(buf.iter().copied());
    }

    /// Number of received bytes still waiting for `poll`.
    pub fn pending(&self) -> usize {
        self.rx_pending.len()
    }

    /// Run queued bytes through framing and decoding until one frame is accepted.
    ///
    /// Bytes after that frame stay queued for the next call.
    pub fn poll(&mut self) -> PacketKind {
        self.kind = PacketKind::None;
        self.ssdv = None;
        while let Some(byte) = self.rx_pending.pop_front() {
            let Some(candidate) = self.deframer.push(byte) else {
                continue;
            };
            match self.codec.decode(candidate, &mut self.rx_frame) {
                Ok(()) => {
                    self.stats.frames_decoded += 1;
                    self.classify();
                    return self.kind;
                }
                Err(e) => {
                    log::debug!("discarding frame: {e}");
                    self.stats.frames_rejected += 1;
                }
            }
        }
        PacketKind::None
    }

    fn classify(&mut self) {
        match SsdvHeader::parse(self.rx_frame.info()) {
            Some(header) => {
                self.stats.ssdv_packets += 1;
                self.ssdv = Some(header);
                self.kind = PacketKind::Ssdv;
            }
            None => self.kind = PacketKind::Generic,
        }
    }

    /// Classification from the latest `poll`.
    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    /// The last successfully decoded frame.
    pub fn frame(&self) -> &Frame {
        &self.rx_frame
    }

    pub fn ssdv_header(&self) -> Option<&SsdvHeader> {
        self.ssdv.as_ref()
    }

    pub fn ssdv_image_id(&self) -> Option<u8> {
        self.ssdv.as_ref().map(|h| h.image_id)
    }

    pub fn ssdv_packet_id(&self) -> Option<u16> {
        self.ssdv.as_ref().map(|h| h.packet_id)
    }

    /// Payload of the latest packet: the whole info field for generic traffic, the
    /// bytes after the header for SSDV, empty when nothing was decoded.
    pub fn payload(&self) -> &[u8] {
        match self.kind {
            PacketKind::None => &[],
            PacketKind::Generic => self.rx_frame.info(),
            PacketKind::Ssdv => &self.rx_frame.info()[HEADER_LEN..],
        }
    }

    pub fn rx_len(&self) -> usize {
        self.payload().len()
    }

    /// Copy the latest payload into `buf`, returning how many bytes were copied.
    pub fn read(&self, buf: &mut [u8]) -> usize {
        let payload = self.payload();
        let n = payload.len().min(buf.len());
        buf[..n].copy_from_slice(&payload[..n]);
        n
    }

    /// Template used by `encode_tx`. Its info field is overwritten on each call.
    pub fn tx_frame(&self) -> &Frame {
        &self.tx_frame
    }

    pub fn tx_frame_mut(&mut self) -> &mut Frame {
        &mut self.tx_frame
    }

    /// Wrap `payload` in the template frame and return the framed bytes to transmit.
    pub fn encode_tx(&mut self, payload: &[u8]) -> Result<&[u8], Ax25Error> {
        if payload.len() > self.capacity() {
            return Err(Ax25Error::CapacityExceeded {
                requested: payload.len(),
                capacity: self.capacity(),
            });
        }
        self.tx_frame.set_info(payload)?;
        self.tx_body.clear();
        self.codec.encode(&self.tx_frame, &mut self.tx_body)?;
        self.tx_wire.clear();
        match self.framing {
            Framing::Hdlc => hdlc::wrap(&self.tx_body, &mut self.tx_wire),
            Framing::HexText => hexlink::wrap(&self.tx_body, &mut self.tx_wire),
        }
        Ok(&self.tx_wire)
    }

    /// Encode and frame an arbitrary frame rather than the template.
    pub fn encode_frame(&mut self, frame: &Frame) -> Result<&[u8], Ax25Error> {
        self.tx_body.clear();
        self.codec.encode(frame, &mut self.tx_body)?;
        self.tx_wire.clear();
        match self.framing {
            Framing::Hdlc => hdlc::wrap(&self.tx_body, &mut self.tx_wire),
            Framing::HexText => hexlink::wrap(&self.tx_body, &mut self.tx_wire),
        }
        Ok(&self.tx_wire)
    }

    pub fn stats(&self) -> TncStats {
        TncStats {
            framing_errors: self.deframer.errors(),
            ..self.stats
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::DEFAULT_INFO_LEN;
    use crate::ssdv::{PacketType, encode_callsign};

    fn ssdv_packet(image_id: u8, packet_id: u16, fill: u8) -> Vec<u8> {
        let header = SsdvHeader {
            packet_type: PacketType::Normal,
            callsign: encode_callsign("NOCALL"),
            image_id,
            packet_id,
            width: 20,
            height: 15,
            flags: 0,
            mcu_offset: 0,
            mcu_index: 0,
        };
        header.build_packet(&[fill; 256]).to_vec()
    }

    fn loopback(framing: Framing) -> (SoftTnc, SoftTnc) {
        let mut tx = SoftTnc::new(DEFAULT_INFO_LEN, framing);
        tx.tx_frame_mut().src_mut().set_callsign("nocall");
        tx.tx_frame_mut().dst_mut().set_callsign("tlm100");
        tx.tx_frame_mut().add_repeater("test").unwrap();
        let rx = SoftTnc::new(DEFAULT_INFO_LEN, framing);
        (tx, rx)
    }

    #[test]
    fn generic_packet() {
        for framing in [Framing::Hdlc, Framing::HexText] {
            let (mut tx, mut rx) = loopback(framing);
            assert_eq!(rx.poll(), PacketKind::None);
            let wire = tx.encode_tx(b">Test 00001: SolarPi APRS").unwrap().to_vec();
            rx.receive_bytes(&wire);
            assert_eq!(rx.poll(), PacketKind::Generic);
            assert_eq!(rx.frame().src().callsign(), "nocall");
            assert_eq!(rx.frame().repeater(0).unwrap().callsign(), "test");
            assert_eq!(rx.payload(), b">Test 00001: SolarPi APRS");
            assert_eq!(rx.ssdv_image_id(), None);
            let mut buf = [0u8; 8];
            assert_eq!(rx.read(&mut buf), 8);
            assert_eq!(&buf, b">Test 00");
            assert_eq!(rx.poll(), PacketKind::None);
            assert_eq!(rx.rx_len(), 0);
        }
    }

    #[test]
    fn ssdv_packet_classified() {
        let (mut tx, mut rx) = loopback(Framing::Hdlc);
        let packet = ssdv_packet(3, 17, 0xAA);
        let wire = tx.encode_tx(&packet).unwrap().to_vec();
        rx.receive_bytes(&wire);
        assert_eq!(rx.poll(), PacketKind::Ssdv);
        assert_eq!(rx.ssdv_image_id(), Some(3));
        assert_eq!(rx.ssdv_packet_id(), Some(17));
        assert_eq!(rx.rx_len(), crate::ssdv::PACKET_LEN - HEADER_LEN);
        let mut buf = [0u8; 512];
        let n = rx.read(&mut buf);
        assert_eq!(&buf[..n], &packet[HEADER_LEN..]);
        assert_eq!(rx.stats().ssdv_packets, 1);
    }

    #[test]
    fn text_resembling_ssdv_stays_generic() {
        let (mut tx, mut rx) = loopback(Framing::Hdlc);
        let wire = tx.encode_tx(b"Ugly weather on the summit today").unwrap().to_vec();
        rx.receive_bytes(&wire);
        assert_eq!(rx.poll(), PacketKind::Generic);
        assert_eq!(rx.ssdv_image_id(), None);
        assert_eq!(rx.payload(), b"Ugly weather on the summit today");

        // right length and header, broken CRC
        let mut packet = ssdv_packet(3, 17, 0xAA);
        packet[200] ^= 0x80;
        let wire = tx.encode_tx(&packet).unwrap().to_vec();
        rx.receive_bytes(&wire);
        assert_eq!(rx.poll(), PacketKind::Generic);
        assert_eq!(rx.stats().ssdv_packets, 0);
    }

    #[test]
    fn several_frames_in_one_chunk() {
        let (mut tx, mut rx) = loopback(Framing::Hdlc);
        let mut wire = vec![];
        for i in 0..3u8 {
            wire.extend_from_slice(tx.encode_tx(&[b'a' + i; 12]).unwrap());
        }
        rx.receive_bytes(&wire);
        for i in 0..3u8 {
            assert_eq!(rx.poll(), PacketKind::Generic);
            assert_eq!(rx.payload(), &[b'a' + i; 12]);
        }
        assert_eq!(rx.poll(), PacketKind::None);
        assert_eq!(rx.pending(), 0);
    }

    #[test]
    fn split_across_reads() {
        let (mut tx, mut rx) = loopback(Framing::Hdlc);
        let wire = tx.encode_tx(b"split me").unwrap().to_vec();
        let (a, b) = wire.split_at(wire.len() / 2);
        rx.receive_bytes(a);
        assert_eq!(rx.poll(), PacketKind::None);
        rx.receive_bytes(b);
        assert_eq!(rx.poll(), PacketKind::Generic);
        assert_eq!(rx.payload(), b"split me");
    }

    #[test]
    fn corrupted_frame_is_skipped() {
        let (mut tx, mut rx) = loopback(Framing::Hdlc);
        let mut wire = tx.encode_tx(b"first frame").unwrap().to_vec();
        // damage the FCS of the first frame
        let n = wire.len();
        wire[n - 2] ^= 0x01;
        wire.extend_from_slice(tx.encode_tx(b"second frame").unwrap());
        rx.receive_bytes(&wire);
        assert_eq!(rx.poll(), PacketKind::Generic);
        assert_eq!(rx.payload(), b"second frame");
        let stats = rx.stats();
        assert_eq!(stats.frames_rejected, 1);
        assert_eq!(stats.frames_decoded, 1);
    }

    #[test]
    fn oversize_payload_rejected() {
        let mut tnc = SoftTnc::new(64, Framing::Hdlc);
        tnc.tx_frame_mut().src_mut().set_callsign("nocall");
        assert_eq!(
            tnc.encode_tx(&[0u8; 65]).unwrap_err(),
            Ax25Error::CapacityExceeded {
                requested: 65,
                capacity: 64
            }
        );
        assert!(tnc.encode_tx(&[0u8; 64]).is_ok());
    }
}
