//! SSDV packet header recognition.
//!
//! Only the header and the CRC trailer are interpreted here. The payload is carried
//! opaquely; image decoding and Reed-Solomon correction are left to external SSDV tools.

use alloc::string::String;

use crate::crc::SSDV_CRC;

/// Size of a complete SSDV packet as produced by the encoder.
pub const PACKET_LEN: usize = 256;

/// Fixed header that precedes the payload of every packet.
pub const HEADER_LEN: usize = 15;

pub const SYNC: u8 = 0x55;

const CRC_LEN: usize = 4;

/// Reed-Solomon parity at the end of a normal packet.
const FEC_LEN: usize = 32;

/// Flag bit marking the final packet of an image.
const FLAG_EOI: u8 = 0x04;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Packet carries a Reed-Solomon trailer.
    Normal,
    /// Packet without FEC, more payload per packet.
    NoFec,
}

impl PacketType {
    fn from_proto(value: u8) -> Option<Self> {
        match value {
            0x66 => Some(PacketType::Normal),
            0x67 => Some(PacketType::NoFec),
            _ => None,
        }
    }

    fn proto_value(&self) -> u8 {
        match self {
            PacketType::Normal => 0x66,
            PacketType::NoFec => 0x67,
        }
    }

    /// Image data bytes between the header and the CRC.
    pub fn payload_len(&self) -> usize {
        match self {
            PacketType::Normal => PACKET_LEN - HEADER_LEN - CRC_LEN - FEC_LEN,
            PacketType::NoFec => PACKET_LEN - HEADER_LEN - CRC_LEN,
        }
    }

    /// Offset of the CRC, which covers everything from the type byte up to it.
    fn crc_offset(&self) -> usize {
        HEADER_LEN + self.payload_len()
    }
}

/// Decoded SSDV header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsdvHeader {
    pub packet_type: PacketType,
    /// Base-40 encoded callsign of the originating station.
    pub callsign: u32,
    pub image_id: u8,
    pub packet_id: u16,
    /// Image width in units of 16 pixels.
    pub width: u8,
    /// Image height in units of 16 pixels.
    pub height: u8,
    pub flags: u8,
    pub mcu_offset: u8,
    pub mcu_index: u16,
}

impl SsdvHeader {
    /// Recognise a complete SSDV packet in `info` and decode its header.
    ///
    /// The packet must be exactly `PACKET_LEN` bytes with the sync byte, a known type
    /// and a matching CRC. Anything else is `None`, which the TNC treats as generic
    /// traffic, so text that merely starts like a header is never taken for an image.
    pub fn parse(info: &[u8]) -> Option<Self> {
        if info.len() != PACKET_LEN || info[0] != SYNC {
            return None;
        }
        let packet_type = PacketType::from_proto(info[1])?;
        let at = packet_type.crc_offset();
        let received = u32::from_be_bytes([info[at], info[at + 1], info[at + 2], info[at + 3]]);
        let computed = SSDV_CRC.checksum(&info[1..at]);
        if received != computed {
            log::debug!("ssdv crc mismatch: received {received:08X}, computed {computed:08X}");
            return None;
        }
        Some(Self {
            packet_type,
            callsign: u32::from_be_bytes([info[2], info[3], info[4], info[5]]),
            image_id: info[6],
            packet_id: u16::from_be_bytes([info[7], info[8]]),
            width: info[9],
            height: info[10],
            flags: info[11],
            mcu_offset: info[12],
            mcu_index: u16::from_be_bytes([info[13], info[14]]),
        })
    }

    /// Assemble a full packet: this header, `payload` zero padded or cut to the
    /// type's payload size, then the CRC.
    ///
    /// Reed-Solomon parity is left zeroed. Receivers only consult it when the CRC
    /// fails.
    pub fn build_packet(&self, payload: &[u8]) -> [u8; PACKET_LEN] {
        let mut packet = [0u8; PACKET_LEN];
        packet[..HEADER_LEN].copy_from_slice(&self.to_bytes());
        let n = payload.len().min(self.packet_type.payload_len());
        packet[HEADER_LEN..HEADER_LEN + n].copy_from_slice(&payload[..n]);
        let at = self.packet_type.crc_offset();
        let crc = SSDV_CRC.checksum(&packet[1..at]);
        packet[at..at + CRC_LEN].copy_from_slice(&crc.to_be_bytes());
        packet
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let cs = self.callsign.to_be_bytes();
        let pid = self.packet_id.to_be_bytes();
        let mcu = self.mcu_index.to_be_bytes();
        [
            SYNC,
            self.packet_type.proto_value(),
            cs[0],
            cs[1],
            cs[2],
            cs[3],
            self.image_id,
            pid[0],
            pid[1],
            self.width,
            self.height,
            self.flags,
            self.mcu_offset,
            mcu[0],
            mcu[1],
        ]
    }

    pub fn is_last_packet(&self) -> bool {
        self.flags & FLAG_EOI != 0
    }

    /// Originating callsign in text form.
    pub fn callsign_text(&self) -> String {
        decode_callsign(self.callsign)
    }
}

static ALPHABET: [u8; 40] = [
    b'-', b'0', b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', b'-', b'-', b'-', b'A', b'B',
    b'C', b'D', b'E', b'F', b'G', b'H', b'I', b'J', b'K', b'L', b'M', b'N', b'O', b'P', b'Q', b'R',
    b'S', b'T', b'U', b'V', b'W', b'X', b'Y', b'Z',
];

/// 40^6, the first value that cannot be a six character callsign.
const CALLSIGN_LIMIT: u32 = 4_096_000_000;

/// Encode up to six characters of `callsign` as base 40. Unsupported characters count as zero.
pub fn encode_callsign(callsign: &str) -> u32 {
    let mut out: u32 = 0;
    for c in callsign.bytes().take(6).rev() {
        let c = c.to_ascii_uppercase();
        let value = match c {
            b'A'..=b'Z' => c - b'A' + 14,
            b'0'..=b'9' => c - b'0' + 1,
            _ => 0,
        };
        out = out * 40 + value as u32;
    }
    out
}

pub fn decode_callsign(mut encoded: u32) -> String {
    let mut callsign = String::new();
    if encoded >= CALLSIGN_LIMIT {
        return callsign;
    }
    while encoded > 0 {
        callsign.push(ALPHABET[(encoded % 40) as usize] as char);
        encoded /= 40;
    }
    callsign
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(image_id: u8, packet_id: u16) -> SsdvHeader {
        SsdvHeader {
            packet_type: PacketType::Normal,
            callsign: encode_callsign("NOCALL"),
            image_id,
            packet_id,
            width: 20,
            height: 15,
            flags: 0,
            mcu_offset: 0,
            mcu_index: 0,
        }
    }

    #[test]
    fn callsign_base40() {
        assert_eq!(decode_callsign(encode_callsign("NOCALL")), "NOCALL");
        assert_eq!(decode_callsign(encode_callsign("m0abc")), "M0ABC");
        assert_eq!(encode_callsign(""), 0);
        assert_eq!(decode_callsign(0xFFFF_FFFF), "");
    }

    #[test]
    fn header_parse() {
        let h = header(7, 0x0102);
        let packet = h.build_packet(&[0xAA; 300]);
        assert_eq!(packet[0], SYNC);
        assert_eq!(packet[6], 7);
        assert_eq!(&packet[7..9], &[0x01, 0x02]);
        assert_eq!(packet[HEADER_LEN + 204], 0xAA);
        let parsed = SsdvHeader::parse(&packet).unwrap();
        assert_eq!(parsed, h);
        assert_eq!(parsed.callsign_text(), "NOCALL");
        assert!(!parsed.is_last_packet());
    }

    #[test]
    fn no_fec_packet() {
        let h = SsdvHeader {
            packet_type: PacketType::NoFec,
            flags: 0x04,
            ..header(2, 40)
        };
        assert_eq!(PacketType::NoFec.payload_len(), 237);
        let packet = h.build_packet(&[0x11; 237]);
        assert_eq!(packet[HEADER_LEN + 236], 0x11);
        let parsed = SsdvHeader::parse(&packet).unwrap();
        assert_eq!(parsed.packet_type, PacketType::NoFec);
        assert!(parsed.is_last_packet());
    }

    #[test]
    fn damaged_packet_rejected() {
        let mut packet = header(1, 1).build_packet(&[0x42; 205]);
        packet[100] ^= 0x01;
        assert!(SsdvHeader::parse(&packet).is_none());
        // trailing FEC bytes are outside the CRC
        let mut packet = header(1, 1).build_packet(&[0x42; 205]);
        packet[PACKET_LEN - 1] = 0xFF;
        assert!(SsdvHeader::parse(&packet).is_some());
        assert!(SsdvHeader::parse(&packet[..PACKET_LEN - 1]).is_none());
    }

    #[test]
    fn non_ssdv_rejected() {
        assert!(SsdvHeader::parse(b">Test 00001: SolarPi APRS").is_none());
        assert!(SsdvHeader::parse(&[SYNC, 0x66, 0, 0]).is_none());
        let mut text = [b' '; PACKET_LEN];
        text[..10].copy_from_slice(b"Ugly weath");
        assert!(SsdvHeader::parse(&text).is_none());
        let mut bytes = header(1, 1).build_packet(&[]);
        bytes[1] = 0x68;
        assert!(SsdvHeader::parse(&bytes).is_none());
    }
}
