//! Property codec
//!
//! Serializes the table configuration to a line-oriented UTF-8 text form
//! wrapped in a CRC32C integrity envelope:
//!
//! ```text
//! #<optional comment>
//! <key>=<value>
//! ...
//! hoodie.table.checksum=<8 hex chars>
//! ```
//!
//! The digest is computed over the `key=value\n` concatenation of all
//! non-checksum entries in ascending key order, on the unescaped value
//! text. A file with no checksum entry, a digest mismatch, or a line
//! without `=` fails to decode.

use lakeio_common::checksum::{compute_crc32c, format_digest, parse_digest};
use lakeio_common::{Error, Result};
use std::collections::BTreeMap;

/// Reserved entry carrying the digest over all other entries.
pub const CHECKSUM_KEY: &str = "hoodie.table.checksum";

/// Compute the digest over all non-checksum entries.
#[must_use]
pub fn digest(props: &BTreeMap<String, String>) -> u32 {
    let mut canonical = String::new();
    for (key, value) in props {
        if key == CHECKSUM_KEY {
            continue;
        }
        canonical.push_str(key);
        canonical.push('=');
        canonical.push_str(value);
        canonical.push('\n');
    }
    compute_crc32c(canonical.as_bytes())
}

/// Serialize properties with a freshly computed checksum entry.
///
/// Any stale checksum entry in `props` is ignored; the emitted one is
/// always recomputed from the remaining entries.
#[must_use]
pub fn encode(props: &BTreeMap<String, String>) -> Vec<u8> {
    let digest = digest(props);

    let mut out = String::new();
    for (key, value) in props {
        if key == CHECKSUM_KEY {
            continue;
        }
        out.push_str(key);
        out.push('=');
        out.push_str(&escape(value));
        out.push('\n');
    }
    out.push_str(CHECKSUM_KEY);
    out.push('=');
    out.push_str(&format_digest(digest));
    out.push('\n');

    out.into_bytes()
}

/// Parse and validate an encoded config.
///
/// The returned map retains the checksum entry; the digest is recomputed
/// over the remaining entries and must match it.
pub fn decode(data: &[u8]) -> Result<BTreeMap<String, String>> {
    let text = std::str::from_utf8(data)
        .map_err(|_| Error::invalid_config("config file is not valid UTF-8"))?;

    let mut props = BTreeMap::new();
    for line in text.lines() {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(Error::invalid_config(format!("malformed line: {line}")));
        };
        props.insert(key.to_string(), unescape(value)?);
    }

    let stored = props
        .get(CHECKSUM_KEY)
        .ok_or_else(|| Error::invalid_config("missing checksum entry"))?;
    let expected = parse_digest(stored)
        .ok_or_else(|| Error::invalid_config(format!("malformed checksum value: {stored}")))?;

    let actual = digest(&props);
    if actual != expected {
        return Err(Error::ChecksumMismatch {
            expected: format_digest(expected),
            actual: format_digest(actual),
        });
    }

    Ok(props)
}

/// Escape backslash, newline, and carriage return in a value.
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(value: &str) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => {
                return Err(Error::invalid_config(format!("unknown escape \\{other}")));
            }
            None => {
                return Err(Error::invalid_config("dangling escape at end of value"));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_props() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("hoodie.table.name".to_string(), "test-table".to_string()),
            ("hoodie.table.type".to_string(), "COPY_ON_WRITE".to_string()),
            ("hoodie.archivelog.folder".to_string(), "archived".to_string()),
        ])
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let props = sample_props();
        let encoded = encode(&props);
        let decoded = decode(&encoded).unwrap();

        // Decoded map carries the checksum entry on top of the input
        assert_eq!(decoded.len(), props.len() + 1);
        assert!(decoded.contains_key(CHECKSUM_KEY));
        for (key, value) in &props {
            assert_eq!(decoded.get(key), Some(value));
        }
    }

    #[test]
    fn test_round_trip_with_escaped_values() {
        let props = BTreeMap::from([
            ("hoodie.table.name".to_string(), "line\nbreak".to_string()),
            ("a.path".to_string(), "C:\\data\\tables".to_string()),
            ("crlf".to_string(), "a\r\nb".to_string()),
        ]);

        let decoded = decode(&encode(&props)).unwrap();
        for (key, value) in &props {
            assert_eq!(decoded.get(key), Some(value));
        }
    }

    #[test]
    fn test_decode_rejects_payload_tampering() {
        let encoded = encode(&sample_props());

        // Flip one payload byte at a time; every mutation must be caught
        for i in 0..encoded.len() {
            let mut tampered = encoded.clone();
            tampered[i] ^= 0x01;
            assert!(
                decode(&tampered).is_err(),
                "tampered byte {i} went undetected"
            );
        }
    }

    #[test]
    fn test_decode_rejects_checksum_tampering() {
        let props = sample_props();
        let digest = digest(&props);

        let mut text = String::new();
        for (key, value) in &props {
            text.push_str(&format!("{key}={value}\n"));
        }
        // Stored digest off by one
        text.push_str(&format!("{CHECKSUM_KEY}={}\n", format_digest(digest ^ 1)));

        let err = decode(text.as_bytes()).unwrap_err();
        assert!(err.is_invalid_config());
    }

    #[test]
    fn test_decode_rejects_missing_checksum() {
        let err = decode(b"hoodie.table.name=test-table\n").unwrap_err();
        assert!(err.is_invalid_config());
    }

    #[test]
    fn test_decode_rejects_malformed_line() {
        let err = decode(b"not a property line\n").unwrap_err();
        assert!(err.is_invalid_config());
    }

    #[test]
    fn test_decode_skips_comments_and_blank_lines() {
        let props = sample_props();
        let digest = digest(&props);

        let mut text = String::from("#written by lakeio\n\n");
        for (key, value) in &props {
            text.push_str(&format!("{key}={value}\n"));
        }
        text.push_str(&format!("{CHECKSUM_KEY}={}\n", format_digest(digest)));

        let decoded = decode(text.as_bytes()).unwrap();
        assert_eq!(decoded.len(), props.len() + 1);
    }

    #[test]
    fn test_encode_replaces_stale_checksum() {
        let mut props = sample_props();
        props.insert(CHECKSUM_KEY.to_string(), "00000000".to_string());

        let decoded = decode(&encode(&props)).unwrap();
        assert_ne!(decoded.get(CHECKSUM_KEY).unwrap(), "00000000");
    }

    #[test]
    fn test_digest_ignores_checksum_entry() {
        let mut props = sample_props();
        let before = digest(&props);
        props.insert(CHECKSUM_KEY.to_string(), "ffffffff".to_string());
        assert_eq!(digest(&props), before);
    }
}
