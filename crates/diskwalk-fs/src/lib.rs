#![cfg_attr(not(test), no_std)]
//! On-disk layouts for the two formats diskwalk understands.
//!
//! Every structure here mirrors a packed little-endian record. They are
//! decoded with bincode's fixed-width integer encoding, which lays fields out
//! back to back with no padding or length prefixes, so a `#[derive(Deserialize)]`
//! struct reads exactly like its on-disk counterpart.

use bincode::config::{Configuration, Fixint, LittleEndian, NoLimit};
use bincode::error::{DecodeError, EncodeError};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub mod ext2;
pub mod fat16;

pub type Codec = Configuration<LittleEndian, Fixint, NoLimit>;

/// Packed little-endian layout: fixed-width integers, arrays without length.
pub fn codec() -> Codec {
    bincode::config::standard().with_fixed_int_encoding()
}

/// Decode a record from the start of `bytes`. Trailing bytes are ignored.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, DecodeError> {
    bincode::serde::decode_from_slice(bytes, codec()).map(|(value, _)| value)
}

/// Encode a record into the start of `buf`, returning the bytes written.
pub fn encode<T: Serialize>(value: &T, buf: &mut [u8]) -> Result<usize, EncodeError> {
    bincode::serde::encode_into_slice(value, buf, codec())
}
