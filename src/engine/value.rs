//! Stored value envelope.
//!
//! redb has no per-entry metadata, so every value is written with a small
//! header carrying its expiry:
//!
//! Value: [version][flags][expires_at: u64 BE, if flags & EXPIRES][payload]
//!
//! Callers never see the header. The store reads it to decide whether an
//! entry is live.

use crate::engine::EngineError;

/// Current encoding version for stored values
pub const VALUE_VERSION: u8 = 1;

const FLAG_EXPIRES: u8 = 0x01;
const HEADER_LEN: usize = 2;
const EXPIRY_LEN: usize = 8;

/// A decoded view over a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredValue<'a> {
    /// Expiry in milliseconds since the Unix epoch, if the entry has a TTL.
    pub expires_at: Option<u64>,
    pub payload: &'a [u8],
}

impl StoredValue<'_> {
    /// Whether the entry is past its expiry at `now` (milliseconds).
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// Wraps `payload` in the value envelope.
pub fn encode_value(payload: &[u8], expires_at: Option<u64>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + EXPIRY_LEN + payload.len());
    buf.push(VALUE_VERSION);

    match expires_at {
        Some(expires_at) => {
            buf.push(FLAG_EXPIRES);
            buf.extend_from_slice(&expires_at.to_be_bytes());
        }
        None => buf.push(0),
    }

    buf.extend_from_slice(payload);
    buf
}

/// Reads the envelope without copying the payload.
pub fn decode_value(raw: &[u8]) -> Result<StoredValue<'_>, EngineError> {
    let [version, flags, rest @ ..] = raw else {
        return Err(EngineError::InvalidValueEncoding(format!(
            "value too short: {} bytes",
            raw.len()
        )));
    };

    if *version != VALUE_VERSION {
        return Err(EngineError::UnsupportedVersion(*version));
    }

    if flags & FLAG_EXPIRES == 0 {
        return Ok(StoredValue {
            expires_at: None,
            payload: rest,
        });
    }

    if rest.len() < EXPIRY_LEN {
        return Err(EngineError::InvalidValueEncoding(
            "truncated expiry timestamp".to_string(),
        ));
    }

    let (expiry, payload) = rest.split_at(EXPIRY_LEN);
    let mut expiry_bytes = [0u8; EXPIRY_LEN];
    expiry_bytes.copy_from_slice(expiry);

    Ok(StoredValue {
        expires_at: Some(u64::from_be_bytes(expiry_bytes)),
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_without_expiry() {
        let encoded = encode_value(b"alice", None);
        assert_eq!(encoded[0], VALUE_VERSION);
        assert_eq!(encoded[1], 0);
        assert_eq!(&encoded[2..], b"alice");

        let decoded = decode_value(&encoded).unwrap();
        assert_eq!(decoded.expires_at, None);
        assert_eq!(decoded.payload, b"alice");
        assert!(!decoded.is_expired(u64::MAX));
    }

    #[test]
    fn test_encode_with_expiry() {
        let encoded = encode_value(b"session", Some(5_000));
        assert_eq!(encoded.len(), 2 + 8 + 7);

        let decoded = decode_value(&encoded).unwrap();
        assert_eq!(decoded.expires_at, Some(5_000));
        assert_eq!(decoded.payload, b"session");
        assert!(!decoded.is_expired(4_999));
        assert!(decoded.is_expired(5_000));
    }

    #[test]
    fn test_empty_payload() {
        let raw = encode_value(b"", None);
        let decoded = decode_value(&raw).unwrap();
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(matches!(
            decode_value(b""),
            Err(EngineError::InvalidValueEncoding(_))
        ));
        assert!(matches!(
            decode_value(&[9, 0, b'x']),
            Err(EngineError::UnsupportedVersion(9))
        ));
        assert!(matches!(
            decode_value(&[VALUE_VERSION, FLAG_EXPIRES, 0, 0]),
            Err(EngineError::InvalidValueEncoding(_))
        ));
    }
}
