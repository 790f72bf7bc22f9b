// File: src/core/difficulty.rs
//
// Score and target helpers. A candidate wins when its hash's leading
// 8 bytes, interpreted as a big-endian unsigned integer, are >= the
// current target.
//
// Tree Location:
// - src/core/difficulty.rs (score/target logic)
// - Depends on: hex

use crate::error::{ClientError, Result};

/// Parse a `set_target` hex string into a u64 target, stripping a
/// leading `0x` if present.
pub fn parse_target_hex(target_hex: &str) -> Result<u64> {
    let trimmed = target_hex.trim_start_matches("0x");
    u64::from_str_radix(trimmed, 16)
        .map_err(|e| ClientError::Malformed(format!("invalid target hex {target_hex:?}: {e}")))
}

/// Format a target back to the canonical `%016x` wire form.
pub fn format_target_hex(target: u64) -> String {
    format!("{target:016x}")
}

/// Extract the leading 8 bytes of a hash as a big-endian unsigned
/// score.
pub fn score_of(hash: &[u8; 32]) -> u64 {
    u64::from_be_bytes(hash[0..8].try_into().expect("hash is 32 bytes"))
}

/// Whether a candidate hash is a winning share against `target`.
pub fn meets_target(hash: &[u8; 32], target: u64) -> bool {
    score_of(hash) >= target
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_round_trip() {
        let target = 0xfffe_0000_0000_0000u64;
        let hex = format_target_hex(target);
        assert_eq!(hex, "fffe000000000000");
        assert_eq!(parse_target_hex(&hex).unwrap(), target);
    }

    #[test]
    fn strips_0x_prefix() {
        assert_eq!(
            parse_target_hex("0xfffe000000000000").unwrap(),
            0xfffe_0000_0000_0000u64
        );
    }

    #[test]
    fn meets_target_boundary_is_inclusive() {
        let mut hash = [0u8; 32];
        hash[0..8].copy_from_slice(&(0xfffe_0000_0000_0000u64).to_be_bytes());
        assert!(meets_target(&hash, 0xfffe_0000_0000_0000));
        assert!(!meets_target(&hash, 0xffff_0000_0000_0000));
    }
}
