//! Block serializer for records crossing a worker boundary.
//!
//! Blocks are postcard-encoded sequences. Any [`Data`](crate::dia::Data)
//! type round-trips, since `Data` requires `Serialize + DeserializeOwned`.

use crate::error::DiaError;
use anyhow::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Encode a block of records.
///
/// # Errors
///
/// A [`DiaError::Codec`] if a record fails to serialize.
pub fn encode_block<T: Serialize>(items: &[T]) -> Result<Vec<u8>> {
    postcard::to_allocvec(items).map_err(|e| DiaError::Codec(e.to_string()).into())
}

/// Decode a block produced by [`encode_block`].
///
/// # Errors
///
/// A [`DiaError::Codec`] if the bytes are not a valid block of `T`.
pub fn decode_block<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>> {
    postcard::from_bytes::<Vec<T>>(bytes).map_err(|e| DiaError::Codec(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_records_survive_a_block() {
        let block = vec![(vec![1usize, 2, 3], 0.25f64), (vec![], 1.0)];
        let bytes = encode_block(&block).unwrap();
        let back: Vec<(Vec<usize>, f64)> = decode_block(&bytes).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn truncated_block_is_a_codec_error() {
        let bytes = encode_block(&["alpha".to_string(), "beta".to_string()]).unwrap();
        let err = decode_block::<String>(&bytes[..bytes.len() - 2]).unwrap_err();
        assert!(matches!(
            crate::error::dia_error(&err),
            Some(DiaError::Codec(_))
        ));
    }
}
