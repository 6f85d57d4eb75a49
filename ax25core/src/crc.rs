/// Frame check sequence used by AX.25 (CRC-16/IBM-SDLC, a.k.a. X.25).
pub const AX25_ALG: crc::Algorithm<u16> = crc::Algorithm {
    width: 16,
    poly: 0x1021,
    init: 0xFFFF,
    refin: true,
    refout: true,
    xorout: 0xFFFF,
    check: 0x906E,
    residue: 0xF0B8,
};

/// Checksum carried by the hex text framing (CRC-16/MCRF4XX).
///
/// Same register as the AX.25 FCS without the final inversion.
pub const TNC_ALG: crc::Algorithm<u16> = crc::Algorithm {
    width: 16,
    poly: 0x1021,
    init: 0xFFFF,
    refin: true,
    refout: true,
    xorout: 0x0000,
    check: 0x6F91,
    residue: 0x0000,
};

pub(crate) static TNC_CRC: crc::Crc<u16> = crc::Crc::<u16>::new(&TNC_ALG);

/// CRC-32 trailer of an SSDV packet, the common zlib polynomial.
pub(crate) static SSDV_CRC: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

pub fn ax25_fcs(input: &[u8]) -> u16 {
    let crc = crc::Crc::<u16>::new(&AX25_ALG);
    let mut digest = crc.digest();
    digest.update(input);
    digest.finalize()
}

pub fn tnc_crc(input: &[u8]) -> u16 {
    TNC_CRC.checksum(input)
}
