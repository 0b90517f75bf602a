//! Formatting helpers shared by the CLI output
//!
//! Size and ratio formatting for per-file results, plus the counter style used
//! when showing the service-wide stats.

use crate::constants::{DISPLAY_NAME_MAX_CHARS, PROGRESS_BAR_TEMPLATE, PROGRESS_SPINNER_TEMPLATE};
use crate::api::{CompressionResult, SizeDelta};
use indicatif::{ProgressBar, ProgressStyle};

/// Format file size in human-readable format
///
/// # Arguments
/// * `bytes` - Size in bytes
///
/// # Returns
/// * Human-readable size string (e.g., "1.2 MB", "512 KB")
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Calculate compression ratio as a percentage
///
/// # Returns
/// * Positive means reduction, negative means the output grew
pub fn calculate_compression_ratio(original_size: u64, compressed_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    ((original_size as f64 - compressed_size as f64) / original_size as f64) * 100.0
}

/// Shorten a file name for display, keeping the first `max_chars` characters
pub fn truncate_name(name: &str, max_chars: usize) -> String {
    if name.chars().count() <= max_chars {
        return name.to_string();
    }
    let head: String = name.chars().take(max_chars).collect();
    format!("{}...", head)
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Files-converted counter: `1,234`, then `1M+`, `2M+`...
pub fn format_stat_count(count: u64) -> String {
    if count >= 1_000_000 {
        return if count >= 2_000_000 {
            format!("{}M+", count / 1_000_000)
        } else {
            "1M+".to_string()
        };
    }
    group_thousands(count)
}

/// Bytes-saved counter: `512Bytes`, `1Kb`, `12Kb`, `1Mb`, `1,024Mb`
pub fn format_stat_bytes(bytes: i64) -> String {
    let sign = if bytes < 0 { "-" } else { "" };
    let magnitude = bytes.unsigned_abs();
    let body = if magnitude >= 1_000_000 {
        if magnitude >= 2_000_000 {
            format!("{}Mb", group_thousands(magnitude / 1_000_000))
        } else {
            "1Mb".to_string()
        }
    } else if magnitude >= 1_000 {
        if magnitude >= 2_000 {
            format!("{}Kb", group_thousands(magnitude / 1_000))
        } else {
            "1Kb".to_string()
        }
    } else {
        format!("{}Bytes", magnitude)
    };
    format!("{}{}", sign, body)
}

/// One result line: format, new size, change against the original, time taken
pub fn describe_result(result: &CompressionResult, original_size: u64) -> String {
    let ratio = calculate_compression_ratio(original_size, result.new_size_bytes);
    let change = match result.size_delta(original_size) {
        SizeDelta::Shrank => format!("-{:.1}%", ratio),
        SizeDelta::Grew => format!("+{:.1}%", ratio.abs()),
        SizeDelta::Unchanged => "±0%".to_string(),
    };
    format!(
        "{:>5} {:>10} {:>7} {:>6}ms",
        result.format,
        format_file_size(result.new_size_bytes),
        change,
        result.elapsed_ms
    )
}

/// Display name for the file list
pub fn display_name(name: &str) -> String {
    truncate_name(name, DISPLAY_NAME_MAX_CHARS)
}

pub fn create_progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(PROGRESS_BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

pub fn create_progress_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template(PROGRESS_SPINNER_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(new_size: u64) -> CompressionResult {
        CompressionResult {
            saved_bytes: 1000 - new_size as i64,
            new_size_bytes: new_size,
            elapsed_ms: 42,
            artifact_url: "u".into(),
            format: "webp".into(),
        }
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1024 * 1024), "1.0 MB");
    }

    #[test]
    fn test_calculate_compression_ratio() {
        assert_eq!(calculate_compression_ratio(1000, 800), 20.0);
        assert_eq!(calculate_compression_ratio(1000, 1200), -20.0);
        assert_eq!(calculate_compression_ratio(1000, 1000), 0.0);
        assert_eq!(calculate_compression_ratio(0, 500), 0.0);
    }

    #[test]
    fn test_truncate_name() {
        assert_eq!(truncate_name("short.png", 25), "short.png");
        assert_eq!(truncate_name("abcdefghij.png", 5), "abcde...");
        assert_eq!(display_name(&"x".repeat(30)), format!("{}...", "x".repeat(25)));
    }

    #[test]
    fn test_format_stat_count() {
        assert_eq!(format_stat_count(0), "0");
        assert_eq!(format_stat_count(999), "999");
        assert_eq!(format_stat_count(12_345), "12,345");
        assert_eq!(format_stat_count(999_999), "999,999");
        assert_eq!(format_stat_count(1_500_000), "1M+");
        assert_eq!(format_stat_count(7_200_000), "7M+");
    }

    #[test]
    fn test_format_stat_bytes() {
        assert_eq!(format_stat_bytes(512), "512Bytes");
        assert_eq!(format_stat_bytes(1_500), "1Kb");
        assert_eq!(format_stat_bytes(25_000), "25Kb");
        assert_eq!(format_stat_bytes(1_999_999), "1Mb");
        assert_eq!(format_stat_bytes(3_000_000_000), "3,000Mb");
        assert_eq!(format_stat_bytes(-500), "-500Bytes");
    }

    #[test]
    fn test_describe_result() {
        let line = describe_result(&result(800), 1000);
        assert!(line.contains("webp"));
        assert!(line.contains("-20.0%"));
        assert!(line.contains("42ms"));

        let line = describe_result(&result(1200), 1000);
        assert!(line.contains("+20.0%"));

        let line = describe_result(&result(1000), 1000);
        assert!(line.contains("±0%"));
    }

    #[test]
    fn test_describe_result_small_change_keeps_sign() {
        // 2 bytes out of 1000 still reads as a reduction
        let line = describe_result(&result(998), 1000);
        assert!(line.contains("-0.2%"));
        assert!(!line.contains("-0%"));

        let line = describe_result(&result(1003), 1000);
        assert!(line.contains("+0.3%"));
    }
}
