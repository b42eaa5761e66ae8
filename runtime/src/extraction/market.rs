//! Market classification from the outcome column.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of betting market an alert refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketType {
    Total,
    Spread,
    Moneyline,
    Unknown,
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MarketType::Total => "Total",
            MarketType::Spread => "Spread",
            MarketType::Moneyline => "Moneyline",
            MarketType::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// The bet an alert describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bet {
    pub market: MarketType,
    /// Team name, or "Over"/"Under" for totals.
    pub team: String,
    pub line: String,
    pub description: String,
}

/// Classify the outcome cell's team and line texts.
pub fn classify_market(team: &str, line: &str) -> Bet {
    let lower = team.to_lowercase();

    if lower.starts_with("over ") || lower.starts_with("under ") {
        let mut words = team.split(' ');
        let side = words.next().unwrap_or_default().to_string();
        let rest: Vec<&str> = words.collect();
        let line = if rest.is_empty() {
            line.to_string()
        } else {
            rest.join(" ")
        };
        return Bet {
            market: MarketType::Total,
            description: format!("{side} {line}"),
            team: side,
            line,
        };
    }

    if !line.is_empty() && (line.starts_with('+') || line.starts_with('-') || has_numeric_prefix(line)) {
        return Bet {
            market: MarketType::Spread,
            team: team.to_string(),
            line: line.to_string(),
            description: format!("{team} {line}").trim().to_string(),
        };
    }

    if team != "N/A" {
        return Bet {
            market: MarketType::Moneyline,
            team: team.to_string(),
            line: String::new(),
            description: team.to_string(),
        };
    }

    Bet {
        market: MarketType::Unknown,
        team: team.to_string(),
        line: line.to_string(),
        description: format!("{team} {line}").trim().to_string(),
    }
}

/// Whether the text starts with something a lenient float parser accepts.
fn has_numeric_prefix(s: &str) -> bool {
    let s = s.trim_start();
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('.') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        _ => s.starts_with("Infinity"),
    }
}
