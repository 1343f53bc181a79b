//! Assertion helpers for tests.

use pretty_assertions::assert_eq;
use tileward::services::{TileBatch, WritePlan};

/// Assert the plan has batches and return them
pub fn assert_batches(plan: &WritePlan) -> &[TileBatch] {
    match plan {
        WritePlan::Batches(batches) => batches,
        WritePlan::Exhausted => panic!("Expected batches, got an exhausted plan"),
    }
}

/// Assert a write request body is well formed and return its colours
pub fn assert_paint_body(body: &serde_json::Value, token: &str) -> Vec<u64> {
    assert_eq!(body["t"].as_str(), Some(token), "Unexpected token in {body}");

    let colors: Vec<u64> = body["colors"]
        .as_array()
        .unwrap_or_else(|| panic!("Missing colors in {body}"))
        .iter()
        .map(|c| c.as_u64().unwrap())
        .collect();
    let coords = body["coords"]
        .as_array()
        .unwrap_or_else(|| panic!("Missing coords in {body}"));
    assert_eq!(
        coords.len(),
        colors.len() * 2,
        "Every colour needs an x, y pair: {body}"
    );
    colors
}
