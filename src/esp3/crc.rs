//! # ESP3 CRC8 Implementation
//!
//! CRC-8 checksum used by ESP3 for both the header and the payload.
//!
//! **Polynomial**: 0x07 (x^8 + x^2 + x + 1)
//! **Initial Value**: 0x00

/// ESP3 CRC8 polynomial
const CRC8_POLY: u8 = 0x07;

/// Precomputed CRC8 lookup table
const CRC8_TABLE: [u8; 256] = generate_crc8_table();

/// Generate CRC8 lookup table at compile time
const fn generate_crc8_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;

    while i < 256 {
        let mut crc = i as u8;
        let mut j = 0;

        while j < 8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ CRC8_POLY;
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

/// Calculate the ESP3 CRC8 checksum of `data`
///
/// # Arguments
///
/// * `data` - Header content bytes (length, optional length, type) or payload bytes
///
/// # Examples
///
/// ```
/// use enocean_gateway::esp3::crc::crc8;
///
/// // Header of a one-byte common command
/// assert_eq!(crc8(&[0x00, 0x01, 0x00, 0x05]), 0x70);
/// ```
pub fn crc8(data: &[u8]) -> u8 {
    data.iter().fold(0, |crc, &byte| crc8_update(crc, byte))
}

/// Feed a single byte into a running CRC8
pub fn crc8_update(crc: u8, byte: u8) -> u8 {
    CRC8_TABLE[(crc ^ byte) as usize]
}

/// Bitwise CRC8, used to cross-check the lookup table
#[cfg(test)]
fn crc8_slow(data: &[u8]) -> u8 {
    let mut crc: u8 = 0;

    for &byte in data {
        crc ^= byte;

        for _ in 0..8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ CRC8_POLY;
            } else {
                crc <<= 1;
            }
        }
    }

    crc
}
