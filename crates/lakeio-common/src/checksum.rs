//! Checksum utilities for LakeIO
//!
//! Provides CRC32C digest calculation and hex rendering for the
//! config-file integrity envelope.

/// Quick CRC32C computation
#[inline]
#[must_use]
pub fn compute_crc32c(data: &[u8]) -> u32 {
    crc32c::crc32c(data)
}

/// Quick CRC32C verification
#[inline]
#[must_use]
pub fn verify_crc32c(data: &[u8], expected: u32) -> bool {
    crc32c::crc32c(data) == expected
}

/// Format a digest as 8 lowercase hex characters
#[must_use]
pub fn format_digest(digest: u32) -> String {
    hex_encode(&digest.to_be_bytes())
}

/// Parse a hex digest back into its numeric form
#[must_use]
pub fn parse_digest(text: &str) -> Option<u32> {
    if text.len() != 8 {
        return None;
    }
    u32::from_str_radix(text, 16).ok()
}

/// Hex encode bytes
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";
    let mut result = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        result.push(HEX_CHARS[(byte >> 4) as usize] as char);
        result.push(HEX_CHARS[(byte & 0x0f) as usize] as char);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_and_verify() {
        let data = b"hoodie.table.name=test-table\n";
        let digest = compute_crc32c(data);

        assert_ne!(digest, 0);
        assert!(verify_crc32c(data, digest));
        assert!(!verify_crc32c(b"hoodie.table.name=other\n", digest));
    }

    #[test]
    fn test_digest_round_trip() {
        for digest in [0u32, 1, 0xdead_beef, u32::MAX] {
            let text = format_digest(digest);
            assert_eq!(text.len(), 8);
            assert_eq!(parse_digest(&text), Some(digest));
        }
    }

    #[test]
    fn test_parse_digest_rejects_malformed() {
        assert_eq!(parse_digest(""), None);
        assert_eq!(parse_digest("deadbeef00"), None);
        assert_eq!(parse_digest("notahex!"), None);
    }

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex_encode(&[0x12, 0xab, 0xcd]), "12abcd");
        assert_eq!(hex_encode(&[0x00, 0xff]), "00ff");
    }
}
