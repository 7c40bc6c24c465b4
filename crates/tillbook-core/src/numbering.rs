//! # Numbering Service
//!
//! Template-driven generation of human-readable document identifiers
//! (receipt numbers, purchase order numbers).
//!
//! ## Template tokens
//! ```text
//! {YYYY}  4-digit year
//! {MM}    2-digit month
//! {DD}    2-digit day
//! {0000}  sequence value
//! ```
//!
//! ## Sequence semantics
//! The default sequence is the last six digits of
//! `concat(unix_seconds, microseconds)` for the supplied instant. The
//! `{0000}` token is always replaced with a SIX-digit zero-padded value,
//! regardless of the token's literal width; this matches the behavior the
//! format string has always produced, and existing receipt archives depend
//! on it.
//!
//! Uniqueness is probabilistic (sub-microsecond collisions aside), not
//! guaranteed. Callers that need formal uniqueness should rely on the
//! unique index on the document number and retry on conflict.

use chrono::{DateTime, Datelike, Timelike, Utc};

/// Width the sequence is padded to, independent of the `{0000}` token.
const SEQUENCE_WIDTH: usize = 6;

/// Substitutes date tokens and the sequence token in `template`.
///
/// ## Example
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use tillbook_core::numbering::generate;
///
/// let now = Utc.with_ymd_and_hms(2024, 12, 25, 10, 0, 0).unwrap();
/// let number = generate("POS-{YYYY}-{MM}-{DD}-{0000}", now, 42);
/// assert_eq!(number, "POS-2024-12-25-000042");
/// ```
pub fn generate(template: &str, now: DateTime<Utc>, sequence: u64) -> String {
    let seq = format!("{:0width$}", sequence % 1_000_000, width = SEQUENCE_WIDTH);

    template
        .replace("{YYYY}", &format!("{:04}", now.year()))
        .replace("{MM}", &format!("{:02}", now.month()))
        .replace("{DD}", &format!("{:02}", now.day()))
        .replace("{0000}", &seq)
}

/// Default sequence derivation: the tail six digits of the instant's
/// unix-seconds and microseconds concatenated.
pub fn timestamp_sequence(now: DateTime<Utc>) -> u64 {
    let concat = format!(
        "{}{:06}",
        now.timestamp(),
        now.timestamp_subsec_micros() % 1_000_000
    );
    let tail = &concat[concat.len().saturating_sub(SEQUENCE_WIDTH)..];
    tail.parse().unwrap_or(0)
}

/// Generates a document number from a template using the default
/// timestamp-derived sequence.
pub fn generate_with_timestamp(template: &str, now: DateTime<Utc>) -> String {
    generate(template, now, timestamp_sequence(now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generate_substitutes_date_tokens() {
        let now = Utc.with_ymd_and_hms(2024, 12, 25, 10, 0, 0).unwrap();
        let number = generate("POS-{YYYY}-{MM}-{DD}-{0000}", now, 123456);
        assert_eq!(number, "POS-2024-12-25-123456");
    }

    #[test]
    fn test_sequence_padded_to_six_digits_regardless_of_token_width() {
        let now = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();
        // {0000} is four characters wide but the output is always six digits
        assert_eq!(generate("R-{0000}", now, 42), "R-000042");
        assert_eq!(generate("R-{0000}", now, 9_999_999), "R-999999");
    }

    #[test]
    fn test_template_without_tokens_is_returned_verbatim() {
        let now = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();
        assert_eq!(generate("PLAIN", now, 7), "PLAIN");
    }

    #[test]
    fn test_timestamp_sequence_is_six_digits() {
        let now = Utc
            .with_ymd_and_hms(2024, 12, 25, 10, 0, 0)
            .unwrap()
            .with_nanosecond(123_456_789)
            .unwrap();
        let seq = timestamp_sequence(now);
        assert!(seq < 1_000_000);
        // tail of concat(seconds, micros) is the microsecond fraction
        assert_eq!(seq, 123_456);
    }

    #[test]
    fn test_generated_number_matches_expected_shape() {
        let now = Utc.with_ymd_and_hms(2024, 12, 25, 10, 0, 0).unwrap();
        let number = generate_with_timestamp("POS-{YYYY}-{MM}-{DD}-{0000}", now);
        assert!(number.starts_with("POS-2024-12-25-"));
        let suffix = number.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_distinct_instants_yield_distinct_sequences() {
        let a = Utc
            .with_ymd_and_hms(2024, 12, 25, 10, 0, 0)
            .unwrap()
            .with_nanosecond(111_111_000)
            .unwrap();
        let b = Utc
            .with_ymd_and_hms(2024, 12, 25, 10, 0, 0)
            .unwrap()
            .with_nanosecond(222_222_000)
            .unwrap();
        assert_ne!(timestamp_sequence(a), timestamp_sequence(b));
    }
}
