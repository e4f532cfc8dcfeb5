// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Derrick Contributors

use super::*;

define_id! {
    /// Test-only id type.
    pub struct TestId;
}

#[test]
fn define_id_roundtrips_through_string() {
    let id = TestId::new("abc-123");
    assert_eq!(id.as_str(), "abc-123");
    assert_eq!(id.to_string(), "abc-123");
    assert_eq!(TestId::from("abc-123".to_string()), id);
}

#[test]
fn define_id_compares_against_str() {
    let id = TestId::new("abc");
    assert_eq!(id, *"abc");
    assert_eq!(id, "abc");
}

#[yare::parameterized(
    shorter_than_limit = { "abc", 8, "abc" },
    exactly_limit      = { "abcdefgh", 8, "abcdefgh" },
    longer_than_limit  = { "abcdefghij", 8, "abcdefgh" },
)]
fn short_truncates(input: &str, n: usize, expected: &str) {
    assert_eq!(input.short(n), expected);
    assert_eq!(TestId::new(input).short(n), expected);
}

#[test]
fn short_token_is_eight_hex_chars() {
    let token = short_token();
    assert_eq!(token.len(), 8);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn short_tokens_are_unique_enough() {
    let a = short_token();
    let b = short_token();
    assert_ne!(a, b);
}

#[test]
fn uuid_id_gen_produces_unique_ids() {
    let generator = UuidIdGen;
    assert_ne!(generator.next(), generator.next());
}

#[test]
fn sequential_id_gen_counts_up() {
    let generator = SequentialIdGen::new("t");
    assert_eq!(generator.next(), "t-1");
    assert_eq!(generator.next(), "t-2");
}
