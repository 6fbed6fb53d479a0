//! Balance extraction.
//!
//! Tries, per label and in order: the value laid out next to the label, the
//! next non-empty line of page text, and finally any decimal number on the
//! page. Missing balances are never fatal.

use std::sync::OnceLock;

use regex::Regex;

use crate::browser::ExplorerPage;
use crate::models::{BalanceReading, BalanceStrategy};

fn decimal_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+\.\d+").expect("decimal regex is valid")
    })
}

fn is_plausible(candidate: &str) -> bool {
    candidate.chars().any(|c| c.is_ascii_digit())
}

/// First non-empty line following a line that contains `label`.
///
/// A value on the label line itself (`"SUI Balance 12.5"`) also counts.
pub fn balance_from_next_line(text: &str, label: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    for (i, line) in lines.iter().enumerate() {
        let Some(pos) = line.find(label) else {
            continue;
        };

        let rest = line[pos + label.len()..].trim_start_matches([':', ' ']).trim();
        if !rest.is_empty() && is_plausible(rest) {
            return Some(rest.to_string());
        }

        if let Some(next) = lines[i + 1..].iter().find(|l| !l.is_empty()) {
            if is_plausible(next) {
                return Some((*next).to_string());
            }
        }
    }
    None
}

/// First decimal-looking number anywhere in `text`.
pub fn balance_from_pattern(text: &str) -> Option<String> {
    decimal_regex().find(text).map(|m| m.as_str().to_string())
}

/// Read the balance from an already-settled page.
pub async fn extract_balance(page: &dyn ExplorerPage, labels: &[String]) -> BalanceReading {
    for label in labels {
        match page.text_near_label(label).await {
            Ok(Some(value)) if is_plausible(&value) => {
                tracing::info!(label = %label, strategy = "layout_adjacent", "Balance found");
                return BalanceReading::found(value.trim(), BalanceStrategy::LayoutAdjacent);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(label = %label, error = %e, "Layout lookup for balance failed"),
        }
    }

    let text = match page.body_text().await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "Could not read page text for balance");
            return BalanceReading::not_found();
        }
    };

    for label in labels {
        if let Some(value) = balance_from_next_line(&text, label) {
            tracing::info!(label = %label, strategy = "next_line", "Balance found");
            return BalanceReading::found(value, BalanceStrategy::NextLine);
        }
    }

    if let Some(value) = balance_from_pattern(&text) {
        tracing::info!(strategy = "decimal_pattern", "Balance found");
        return BalanceReading::found(value, BalanceStrategy::DecimalPattern);
    }

    tracing::warn!("Balance not found on page");
    BalanceReading::not_found()
}
