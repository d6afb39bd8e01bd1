//! Key encoding and decoding utilities for bucketed storage.
//!
//! This module owns the physical key layout: how a bucket and its key
//! segments are joined into one sortable byte string and split back apart.

pub mod key;

pub use key::{bucket_key, decode, encode, encode_prefix, strip_prefix, DELIMITER};
