//! Hash slot calculation.

/// Number of hash slots in a Redis Cluster (16384)
pub const SLOT_COUNT: u16 = 16384;

/// CRC16 implementation for Redis cluster slot calculation (XMODEM)
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// The part of `key` that is hashed.
///
/// If the key contains a `{` followed later by a `}` with at least one byte
/// in between, only those bytes are hashed. Otherwise the whole key is.
pub fn hash_tag(key: &[u8]) -> &[u8] {
    if let Some(start) = key.iter().position(|&b| b == b'{') {
        if let Some(end) = key[start + 1..].iter().position(|&b| b == b'}') {
            if end > 0 {
                return &key[start + 1..start + 1 + end];
            }
        }
    }
    key
}

/// Calculate the slot a key belongs to.
pub fn key_slot(key: &[u8]) -> u16 {
    crc16(hash_tag(key)) % SLOT_COUNT
}
