//! Result-Log Integration Tests
//!
//! LogBlock formatting plus the idempotent per-provider merge into a
//! shared log cell.

use chrono::{TimeZone, Utc};

use promptgrid::services::result_log::{merge_into, LogBlock};

fn block_at(label: &str, model: &str, elapsed: i64) -> String {
    let sent = Utc.with_ymd_and_hms(2026, 8, 29, 9, 0, 0).unwrap();
    LogBlock::new(
        label,
        Some(model.to_string()),
        "F20",
        sent,
        sent + chrono::Duration::seconds(elapsed),
    )
    .format()
}

#[test]
fn test_merge_into_empty_cell_returns_block() {
    let a = block_at("Claude", "sonnet", 30);
    assert_eq!(merge_into("", &a, "Claude"), a);
}

#[test]
fn test_remerge_replaces_with_latest_content() {
    let a = block_at("Claude", "sonnet", 30);
    let a2 = block_at("Claude", "opus", 95);

    let cell = merge_into("", &a, "Claude");
    let cell = merge_into(&cell, &a2, "Claude");

    assert_eq!(cell.matches("=== Claude ===").count(), 1);
    assert!(cell.contains("Model: opus"));
    assert!(cell.contains("Elapsed: 95s"));
    assert!(!cell.contains("Model: sonnet"));
}

#[test]
fn test_three_providers_share_one_cell() {
    let mut cell = String::new();
    for (label, model) in [
        ("ChatGPT", "gpt-5"),
        ("Claude", "sonnet"),
        ("Gemini", "2.5-pro"),
    ] {
        cell = merge_into(&cell, &block_at(label, model, 10), label);
    }

    for label in ["ChatGPT", "Claude", "Gemini"] {
        assert_eq!(cell.matches(&format!("=== {} ===", label)).count(), 1);
    }

    // Re-log the middle provider; neighbors stay intact and ordered
    let cell = merge_into(&cell, &block_at("Claude", "opus", 77), "Claude");
    let chatgpt = cell.find("=== ChatGPT ===").unwrap();
    let claude = cell.find("=== Claude ===").unwrap();
    let gemini = cell.find("=== Gemini ===").unwrap();
    assert!(chatgpt < claude && claude < gemini);
    assert!(cell.contains("Model: opus"));
    assert!(cell.contains("Model: gpt-5"));
    assert!(cell.contains("Model: 2.5-pro"));
}

#[test]
fn test_merge_preserves_foreign_text() {
    let existing = "manual note left by an operator";
    let merged = merge_into(existing, &block_at("Grok", "fast", 5), "Grok");
    assert!(merged.starts_with(existing));
    assert!(merged.contains("=== Grok ==="));
}

#[test]
fn test_double_merge_is_stable() {
    let a = block_at("ChatGPT", "gpt-5", 12);
    let once = merge_into("", &a, "ChatGPT");
    let twice = merge_into(&once, &a, "ChatGPT");
    let thrice = merge_into(&twice, &a, "ChatGPT");
    assert_eq!(once, twice);
    assert_eq!(twice, thrice);
}
