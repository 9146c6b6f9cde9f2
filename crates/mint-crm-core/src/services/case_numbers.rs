// Copyright (C) 2025 MINT CRM contributors
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Human-facing case numbers: `CASE-` followed by a zero padded sequence.

/// Prefix shared by every case number.
pub const PREFIX: &str = "CASE-";

/// Advisory lock key serialising number allocation ("CASENUM" in ASCII).
pub const ALLOCATION_LOCK_KEY: i64 = 0x4341_5345_4e55_4d;

/// Format a sequence value, padding to at least six digits.
pub fn format_case_number(n: i64) -> String {
    format!("{PREFIX}{n:06}")
}

/// Sequence value of a case number, taken from after the last `-`.
pub fn parse_case_number(case_number: &str) -> Option<i64> {
    case_number
        .rsplit_once('-')
        .and_then(|(_, digits)| digits.parse::<i64>().ok())
        .filter(|n| *n > 0)
}

/// Number following the highest one in use, or `CASE-000001` when none is.
pub fn next_case_number(highest: Option<i64>) -> String {
    format_case_number(highest.unwrap_or(0) + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_number() {
        assert_eq!(next_case_number(None), "CASE-000001");
    }

    #[test]
    fn test_increments_highest() {
        assert_eq!(next_case_number(Some(41)), "CASE-000042");
        assert_eq!(next_case_number(Some(999_999)), "CASE-1000000");
    }

    #[test]
    fn test_parse() {
        assert_eq!(parse_case_number("CASE-000123"), Some(123));
        assert_eq!(parse_case_number("CASE-1000000"), Some(1_000_000));
        assert_eq!(parse_case_number("CASE-abc"), None);
        assert_eq!(parse_case_number("garbage"), None);
        assert_eq!(parse_case_number("CASE-000000"), None);
    }

    #[test]
    fn test_unparsable_highest_restarts_sequence() {
        assert_eq!(
            next_case_number(parse_case_number("legacy ticket")),
            "CASE-000001"
        );
    }
}
