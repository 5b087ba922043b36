//! Compact difficulty encoding.
//!
//! A compact `bits` value packs a 256-bit target as a one-byte size and a
//! 23-bit mantissa. The search primitive compares against the expanded
//! target ("boundary"), stored big-endian in a [`Hash256`].

use crate::Hash256;
use num_bigint::BigUint;
use num_traits::Zero;

/// Expand compact bits into a target. Negative or overflowing encodings yield `None`.
pub fn compact_to_target(bits: u32) -> Option<BigUint> {
    let size = (bits >> 24) as usize;
    let word = bits & 0x007f_ffff;
    if word != 0 && bits & 0x0080_0000 != 0 {
        return None;
    }

    let target = if size <= 3 {
        BigUint::from(word >> (8 * (3 - size)))
    } else {
        BigUint::from(word) << (8 * (size - 3))
    };

    if target.bits() > 256 {
        return None;
    }
    Some(target)
}

/// Compress a target into compact bits.
pub fn target_to_compact(target: &BigUint) -> u32 {
    if target.is_zero() {
        return 0;
    }
    let bytes = target.to_bytes_be();
    let mut size = bytes.len() as u32;
    let mut word: u32 = if bytes.len() <= 3 {
        let mut w = 0u32;
        for b in &bytes {
            w = (w << 8) | *b as u32;
        }
        w << (8 * (3 - bytes.len()))
    } else {
        ((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | bytes[2] as u32
    };

    // Keep the mantissa positive.
    if word & 0x0080_0000 != 0 {
        word >>= 8;
        size += 1;
    }
    (size << 24) | word
}

/// Big-endian 32-byte form of a target, saturating at all-ones.
pub fn target_to_hash(target: &BigUint) -> Hash256 {
    let bytes = target.to_bytes_be();
    if bytes.len() > 32 {
        return Hash256::new([0xff; 32]);
    }
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    Hash256::new(out)
}

/// Boundary for compact bits, or `None` if the encoding is invalid.
pub fn compact_to_boundary(bits: u32) -> Option<Hash256> {
    compact_to_target(bits).map(|t| target_to_hash(&t))
}

/// `digest <= boundary`, both big-endian.
pub fn meets_boundary(digest: &Hash256, boundary: &Hash256) -> bool {
    digest.as_bytes() <= boundary.as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_roundtrip_known_values() {
        for bits in [0x1d00ffffu32, 0x207fffff, 0x1c2dffff, 0x2100ffff, 0x1b0404cb] {
            let target = compact_to_target(bits).unwrap();
            assert_eq!(target_to_compact(&target), bits, "bits {bits:#x}");
        }
    }

    #[test]
    fn test_compact_small_size() {
        assert_eq!(compact_to_target(0x01120000).unwrap(), BigUint::from(0x12u32));
        assert_eq!(compact_to_target(0x02123400).unwrap(), BigUint::from(0x1234u32));
        assert!(compact_to_target(0).unwrap().is_zero());
    }

    #[test]
    fn test_negative_compact_rejected() {
        assert!(compact_to_target(0x04923456).is_none());
    }

    #[test]
    fn test_overflow_rejected() {
        assert!(compact_to_target(0x2200ffff).is_none());
        assert!(compact_to_target(0x2100ffff).is_some());
    }

    #[test]
    fn test_boundary_layout() {
        let boundary = compact_to_boundary(0x207fffff).unwrap();
        assert_eq!(boundary.as_bytes()[0], 0x7f);
        assert_eq!(boundary.as_bytes()[1], 0xff);
        assert_eq!(boundary.as_bytes()[3], 0x00);

        let easy = Hash256::new([0x10; 32]);
        assert!(meets_boundary(&easy, &boundary));
        assert!(!meets_boundary(&Hash256::new([0x80; 32]), &boundary));
    }
}
