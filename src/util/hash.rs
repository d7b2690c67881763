//! Raw byte hashing.

use bytemuck::Pod;
use xxhash_rust::xxh3::xxh3_64;

/// Hash raw bytes.
#[inline]
pub fn hash_raw(bytes: &[u8]) -> u64 {
    xxh3_64(bytes)
}

/// Hash the in-memory bytes of a slice of plain values.
#[inline]
pub fn hash_slice<T: Pod>(values: &[T]) -> u64 {
    hash_raw(bytemuck::cast_slice(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_slice_matches_bytes() {
        let ids: [i32; 3] = [7, 11, -1];
        let bytes: &[u8] = bytemuck::cast_slice(&ids);
        assert_eq!(hash_slice(&ids), hash_raw(bytes));
        assert_ne!(hash_slice(&ids), hash_slice(&[7i32, 11]));
    }
}
