//! # CRC-8/DVB-S2
//!
//! Checksum used for the optional packet integrity trailer and for the
//! serial radio modem frames.
//!
//! **Polynomial**: 0xD5 (x^8 + x^7 + x^6 + x^4 + x^2 + 1)
//! **Initial Value**: 0x00

const POLY: u8 = 0xD5;

const TABLE: [u8; 256] = build_table();

const fn build_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u8;
        let mut j = 0;

        while j < 8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ POLY;
            } else {
                crc <<= 1;
            }
            j += 1;
        }

        table[i] = crc;
        i += 1;
    }

    table
}

/// Calculate the CRC-8/DVB-S2 of `data`.
///
/// # Examples
///
/// ```
/// use turret_link::protocol::crc::crc8;
///
/// let command = [0x42, 128, 128, 0];
/// let trailer = crc8(&command);
/// assert_ne!(trailer, crc8(&[0x42, 128, 128, 1]));
/// ```
pub fn crc8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |crc, &byte| TABLE[(crc ^ byte) as usize])
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bitwise reference implementation.
    fn crc8_bitwise(data: &[u8]) -> u8 {
        let mut crc: u8 = 0;
        for &byte in data {
            crc ^= byte;
            for _ in 0..8 {
                crc = if crc & 0x80 != 0 { (crc << 1) ^ POLY } else { crc << 1 };
            }
        }
        crc
    }

    #[test]
    fn test_crc8_empty() {
        assert_eq!(crc8(&[]), 0x00);
    }

    #[test]
    fn test_crc8_check_value() {
        // Standard check value for CRC-8/DVB-S2 over "123456789"
        assert_eq!(crc8(b"123456789"), 0xBC);
    }

    #[test]
    fn test_table_matches_bitwise() {
        let samples: [&[u8]; 5] = [
            &[0x42, 128, 128, 0],
            &[0x42, 0xD8, 0x00, 3, 1],
            &[0x05, 0x05, 0x01, 0x02, 0x03],
            &[0xFF; 12],
            &[0x00; 32],
        ];

        for data in samples {
            assert_eq!(crc8(data), crc8_bitwise(data), "mismatch for {:02X?}", data);
        }
    }

    #[test]
    fn test_crc8_detects_single_bit_flip() {
        let original = [0x42, 0x0A, 0xF6, 0x02, 0x01];
        let mut flipped = original;
        flipped[2] ^= 0x10;
        assert_ne!(crc8(&original), crc8(&flipped));
    }
}
