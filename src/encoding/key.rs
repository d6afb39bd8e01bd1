//! Key encoding and decoding for bucketed storage.
//!
//! A logical key is a sequence of byte segments whose first segment is the
//! bucket. Segments are joined with a single delimiter byte:
//!
//! Encoded key:    [bucket]@[segment]@...@[segment]
//! Encoded prefix: [bucket]@[segment]@...@[segment]@
//!
//! A prefix used as a scan bound must end on a delimiter. Without it the
//! prefix `ab` would also match the unrelated key `abc`, and the bucket `a`
//! would match keys stored under the bucket `ab`.
//!
//! The codec never inspects segment content. Callers must keep [`DELIMITER`]
//! out of their segments, otherwise [`decode`] splits them further.

/// Separator placed between encoded segments.
pub const DELIMITER: u8 = b'@';

/// Joins segments with [`DELIMITER`], never emitting a trailing delimiter.
///
/// Zero segments encode to an empty key and a single segment is returned
/// unchanged. Empty segments contribute no bytes but keep their delimiters,
/// so `["a", "", "b"]` encodes to `a@@b`.
pub fn encode<S: AsRef<[u8]>>(segments: &[S]) -> Vec<u8> {
    let total: usize = segments.iter().map(|s| s.as_ref().len()).sum();
    let mut buf = Vec::with_capacity(total + segments.len());

    for (index, segment) in segments.iter().enumerate() {
        if index > 0 {
            buf.push(DELIMITER);
        }
        buf.extend_from_slice(segment.as_ref());
    }

    buf
}

/// Encodes segments and appends one trailing [`DELIMITER`].
///
/// This is the lower bound to scan with when the intent is "every key whose
/// leading segments are exactly these". For zero segments the result is the
/// bare delimiter, which only matches keys whose first segment is empty.
pub fn encode_prefix<S: AsRef<[u8]>>(segments: &[S]) -> Vec<u8> {
    let mut buf = encode(segments);
    buf.push(DELIMITER);
    buf
}

/// Builds the physical key for `key` stored under `bucket`.
pub fn bucket_key(bucket: &[u8], key: &[u8]) -> Vec<u8> {
    encode(&[bucket, key])
}

/// Splits an encoded key back into its segments.
///
/// Empty input decodes to an empty sequence.
pub fn decode(encoded: &[u8]) -> Vec<Vec<u8>> {
    if encoded.is_empty() {
        return Vec::new();
    }

    encoded
        .split(|byte| *byte == DELIMITER)
        .map(<[u8]>::to_vec)
        .collect()
}

/// Removes `prefix` and one segment boundary from `encoded`.
///
/// When `prefix` already ends on the delimiter (the output of
/// [`encode_prefix`]) that delimiter is the boundary. Otherwise a single
/// delimiter directly after the prefix is dropped as well. Keys that do not
/// start with `prefix` are returned as an owned copy.
pub fn strip_prefix(encoded: &[u8], prefix: &[u8]) -> Vec<u8> {
    let Some(rest) = encoded.strip_prefix(prefix) else {
        return encoded.to_vec();
    };

    if prefix.last() == Some(&DELIMITER) {
        return rest.to_vec();
    }

    match rest.split_first() {
        Some((&DELIMITER, tail)) => tail.to_vec(),
        _ => rest.to_vec(),
    }
}
