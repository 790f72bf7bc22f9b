// File: src/utils/format.rs
//
// Formatting helpers for hashrate, elapsed time, and large counts, used by
// the hashrate reporter and the CLI's log output. Grounded on the teacher's
// `utils/format.rs` (`FormatUtils` with the same unit thresholds).
//
// Tree Location:
// - src/utils/format.rs (formatting utilities)
// - Depends on: std

use std::time::Duration;

/// Utility functions for formatting miner statistics.
pub struct FormatUtils;

impl FormatUtils {
    /// Format hashrate in appropriate units (H/s, KH/s, MH/s, GH/s).
    pub fn format_hashrate(hashrate: f64) -> String {
        if hashrate >= 1_000_000_000.0 {
            format!("{:.2} GH/s", hashrate / 1_000_000_000.0)
        } else if hashrate >= 1_000_000.0 {
            format!("{:.2} MH/s", hashrate / 1_000_000.0)
        } else if hashrate >= 1_000.0 {
            format!("{:.2} KH/s", hashrate / 1_000.0)
        } else {
            format!("{:.2} H/s", hashrate)
        }
    }

    /// Format duration for human-readable output (seconds, minutes, hours).
    pub fn format_duration(duration: Duration) -> String {
        let secs = duration.as_secs();
        if secs < 60 {
            format!("{secs}s ago")
        } else if secs < 3600 {
            format!("{}m ago", secs / 60)
        } else {
            format!("{}h ago", secs / 3600)
        }
    }

    /// Format large numbers with suffixes (K, M, B).
    pub fn format_number(num: u64) -> String {
        if num >= 1_000_000_000 {
            format!("{:.1}B", num as f64 / 1_000_000_000.0)
        } else if num >= 1_000_000 {
            format!("{:.1}M", num as f64 / 1_000_000.0)
        } else if num >= 1_000 {
            format!("{:.1}K", num as f64 / 1_000.0)
        } else {
            num.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_hashrate_units() {
        assert_eq!(FormatUtils::format_hashrate(500.0), "500.00 H/s");
        assert_eq!(FormatUtils::format_hashrate(2_500.0), "2.50 KH/s");
        assert_eq!(FormatUtils::format_hashrate(3_400_000.0), "3.40 MH/s");
        assert_eq!(FormatUtils::format_hashrate(1_200_000_000.0), "1.20 GH/s");
    }

    #[test]
    fn formats_duration_buckets() {
        assert_eq!(FormatUtils::format_duration(Duration::from_secs(30)), "30s ago");
        assert_eq!(FormatUtils::format_duration(Duration::from_secs(125)), "2m ago");
        assert_eq!(FormatUtils::format_duration(Duration::from_secs(7200)), "2h ago");
    }

    #[test]
    fn formats_large_numbers() {
        assert_eq!(FormatUtils::format_number(42), "42");
        assert_eq!(FormatUtils::format_number(4_200), "4.2K");
        assert_eq!(FormatUtils::format_number(4_200_000), "4.2M");
    }
}
