//! Raw row snapshots and the alert records built from them.

use super::columns;
use super::market::{classify_market, MarketType};
use super::matchup::parse_matchup;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

const NOT_AVAILABLE: &str = "N/A";

/// Structural snapshot of one grid row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    pub row_id: Option<String>,
    /// Cells keyed by column id.
    #[serde(default)]
    pub cells: HashMap<String, RawCell>,
}

/// Text content of one cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCell {
    /// Full text content.
    #[serde(default)]
    pub text: String,
    /// `<p>` children in document order.
    #[serde(default)]
    pub paragraphs: Vec<RawParagraph>,
    /// `<span>` texts in document order.
    #[serde(default)]
    pub spans: Vec<String>,
}

/// One `<p>` of a cell, with its first `<time>` element if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawParagraph {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub time_title: Option<String>,
    #[serde(default)]
    pub time_text: Option<String>,
}

impl RawRow {
    pub fn cell(&self, column: &str) -> Option<&RawCell> {
        self.cells.get(column)
    }

    /// Row id if present and non-empty.
    pub fn id(&self) -> Option<&str> {
        self.row_id.as_deref().filter(|id| !id.is_empty())
    }
}

impl RawCell {
    fn paragraph(&self, idx: usize) -> Option<&RawParagraph> {
        self.paragraphs.get(idx)
    }

    fn paragraph_text(&self, idx: usize) -> Option<&str> {
        self.paragraph(idx).and_then(|p| non_empty(&p.text))
    }

    fn span_text(&self, idx: usize) -> Option<&str> {
        self.spans.get(idx).and_then(|s| non_empty(s))
    }
}

/// An alert ready for correlation and forwarding. Field names on the wire
/// are what the sink expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    pub row_id: String,
    /// Leading segment of the row id; used only when no event id is sniffed.
    pub event_id_from_row_attribute: String,
    /// Event id captured from the network; `None` until correlated.
    pub event_id: Option<String>,
    /// Extraction time, RFC 3339.
    pub timestamp: String,
    pub time: String,
    pub date: String,
    pub home_team: String,
    pub away_team: String,
    pub league: String,
    pub alert_type: String,
    pub alert_time: String,
    pub period: String,
    pub team_for_bet: String,
    pub line_value_for_bet: String,
    pub bet_description: String,
    pub market_type: MarketType,
    pub old_odds: String,
    pub new_odds: String,
    pub no_vig_price_from_alert: String,
}

/// Whether a row carries an alert of interest: it has an id and an alert
/// cell whose text contains `keyword` (case-insensitive).
pub fn is_alert_row(row: &RawRow, keyword: &str) -> bool {
    if row.id().is_none() {
        return false;
    }
    row.cell(columns::ALERT)
        .map(|cell| cell.text.to_lowercase().contains(&keyword.to_lowercase()))
        .unwrap_or(false)
}

/// Build an [`AlertRecord`] from a row snapshot.
pub fn extract_alert<S: AsRef<str>>(
    row: &RawRow,
    leagues: &[S],
    extracted_at: DateTime<Utc>,
) -> Option<AlertRecord> {
    let row_id = row.id()?;

    let (Some(match_cell), Some(alert_cell), Some(outcome_cell), Some(no_vig_cell), Some(price_cell)) = (
        row.cell(columns::MATCH),
        row.cell(columns::ALERT),
        row.cell(columns::OUTCOME),
        row.cell(columns::NO_VIG_PRICE),
        row.cell(columns::PRICE),
    ) else {
        warn!(row_id, "row is missing one or more cells");
        return None;
    };

    let Some(matchup) = parse_matchup(match_cell.text.trim(), leagues) else {
        warn!(row_id, text = %match_cell.text.trim(), "unparseable match cell");
        return None;
    };

    let alert_type = or_na(alert_cell.paragraph_text(0));
    let alert_time = or_na(alert_cell.paragraph(1).and_then(|p| {
        p.time_title
            .as_deref()
            .and_then(non_empty)
            .or_else(|| p.time_text.as_deref().and_then(non_empty))
            .or_else(|| non_empty(&p.text))
    }));

    let period = or_na(outcome_cell.paragraph_text(0));
    let team = or_na(outcome_cell.paragraph_text(1));
    let line = outcome_cell.paragraph_text(2).unwrap_or_default();
    let bet = classify_market(&team, line);

    let no_vig = or_na(
        no_vig_cell
            .span_text(0)
            .or_else(|| non_empty(&no_vig_cell.text)),
    );

    Some(AlertRecord {
        row_id: row_id.to_string(),
        event_id_from_row_attribute: row_id.split('-').next().unwrap_or_default().to_string(),
        event_id: None,
        timestamp: extracted_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        time: matchup.time,
        date: matchup.date,
        home_team: matchup.home_team,
        away_team: matchup.away_team,
        league: matchup.league,
        alert_type,
        alert_time,
        period,
        team_for_bet: bet.team,
        line_value_for_bet: bet.line,
        bet_description: bet.description,
        market_type: bet.market,
        old_odds: or_na(price_cell.span_text(0)),
        new_odds: or_na(price_cell.span_text(1)),
        no_vig_price_from_alert: no_vig,
    })
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

fn or_na(s: Option<&str>) -> String {
    s.unwrap_or(NOT_AVAILABLE).to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::extraction::matchup::DEFAULT_LEAGUES;
    use chrono::TimeZone;

    fn para(text: &str) -> RawParagraph {
        RawParagraph {
            text: text.to_string(),
            ..Default::default()
        }
    }

    /// A complete spread alert row.
    pub(crate) fn sample_row(row_id: &str) -> RawRow {
        let mut cells = HashMap::new();
        cells.insert(
            "match".to_string(),
            RawCell {
                text: " 19:00 05/14 H: Boston Celtics A: New York Knicks NBA ".to_string(),
                ..Default::default()
            },
        );
        cells.insert(
            "alert".to_string(),
            RawCell {
                text: "Line move 2 seconds ago".to_string(),
                paragraphs: vec![
                    para("Line move"),
                    RawParagraph {
                        text: "2 seconds ago".to_string(),
                        time_title: Some("2025-05-14T18:58:01Z".to_string()),
                        time_text: Some("2 seconds ago".to_string()),
                    },
                ],
                spans: vec![],
            },
        );
        cells.insert(
            "rowOutcome".to_string(),
            RawCell {
                text: "Full Game New York Knicks +4.5".to_string(),
                paragraphs: vec![para("Full Game"), para("New York Knicks"), para("+4.5")],
                spans: vec![],
            },
        );
        cells.insert(
            "noVigPrice".to_string(),
            RawCell {
                text: "-104".to_string(),
                paragraphs: vec![],
                spans: vec!["-104".to_string()],
            },
        );
        cells.insert(
            "current".to_string(),
            RawCell {
                text: "-110 -120".to_string(),
                paragraphs: vec![],
                spans: vec!["-110".to_string(), "-120".to_string()],
            },
        );
        RawRow {
            row_id: Some(row_id.to_string()),
            cells,
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 14, 18, 58, 3).unwrap()
    }

    #[test]
    fn test_extract_full_row() {
        let record = extract_alert(&sample_row("48213-spread-7"), DEFAULT_LEAGUES, at()).unwrap();
        assert_eq!(record.row_id, "48213-spread-7");
        assert_eq!(record.event_id_from_row_attribute, "48213");
        assert_eq!(record.event_id, None);
        assert_eq!(record.timestamp, "2025-05-14T18:58:03.000Z");
        assert_eq!(record.home_team, "Boston Celtics");
        assert_eq!(record.away_team, "New York Knicks");
        assert_eq!(record.league, "NBA");
        assert_eq!(record.alert_type, "Line move");
        assert_eq!(record.alert_time, "2025-05-14T18:58:01Z");
        assert_eq!(record.period, "Full Game");
        assert_eq!(record.market_type, MarketType::Spread);
        assert_eq!(record.bet_description, "New York Knicks +4.5");
        assert_eq!(record.line_value_for_bet, "+4.5");
        assert_eq!(record.old_odds, "-110");
        assert_eq!(record.new_odds, "-120");
        assert_eq!(record.no_vig_price_from_alert, "-104");
    }

    #[test]
    fn test_missing_cell_rejects_row() {
        let mut row = sample_row("1-a");
        row.cells.remove("noVigPrice");
        assert!(extract_alert(&row, DEFAULT_LEAGUES, at()).is_none());
    }

    #[test]
    fn test_missing_row_id_rejects_row() {
        let mut row = sample_row("");
        assert!(extract_alert(&row, DEFAULT_LEAGUES, at()).is_none());
        row.row_id = None;
        assert!(extract_alert(&row, DEFAULT_LEAGUES, at()).is_none());
    }

    #[test]
    fn test_fallbacks_to_not_available() {
        let mut row = sample_row("9");
        row.cells.get_mut("alert").unwrap().paragraphs.clear();
        row.cells.get_mut("current").unwrap().spans.truncate(1);
        let nv = row.cells.get_mut("noVigPrice").unwrap();
        nv.spans.clear();
        nv.text = "  ".to_string();

        let record = extract_alert(&row, DEFAULT_LEAGUES, at()).unwrap();
        assert_eq!(record.event_id_from_row_attribute, "9");
        assert_eq!(record.alert_type, "N/A");
        assert_eq!(record.alert_time, "N/A");
        assert_eq!(record.new_odds, "N/A");
        assert_eq!(record.no_vig_price_from_alert, "N/A");
    }

    #[test]
    fn test_alert_time_prefers_title_then_text() {
        let mut row = sample_row("9");
        let p = &mut row.cells.get_mut("alert").unwrap().paragraphs[1];
        p.time_title = Some(String::new());
        let record = extract_alert(&row, DEFAULT_LEAGUES, at()).unwrap();
        assert_eq!(record.alert_time, "2 seconds ago");
    }

    #[test]
    fn test_no_vig_falls_back_to_cell_text() {
        let mut row = sample_row("9");
        row.cells.get_mut("noVigPrice").unwrap().spans.clear();
        let record = extract_alert(&row, DEFAULT_LEAGUES, at()).unwrap();
        assert_eq!(record.no_vig_price_from_alert, "-104");
    }

    #[test]
    fn test_is_alert_row() {
        let row = sample_row("1");
        assert!(is_alert_row(&row, "second"));
        assert!(is_alert_row(&row, "SECOND"));
        assert!(!is_alert_row(&row, "minute"));

        let mut no_alert = sample_row("1");
        no_alert.cells.remove("alert");
        assert!(!is_alert_row(&no_alert, "second"));

        let mut no_id = sample_row("1");
        no_id.row_id = None;
        assert!(!is_alert_row(&no_id, "second"));
    }

    #[test]
    fn test_wire_format_is_camel_case_with_null_event_id() {
        let record = extract_alert(&sample_row("7-x"), DEFAULT_LEAGUES, at()).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_json_diff::assert_json_include!(
            actual: json,
            expected: serde_json::json!({
                "rowId": "7-x",
                "eventIdFromRowAttribute": "7",
                "eventId": null,
                "homeTeam": "Boston Celtics",
                "awayTeam": "New York Knicks",
                "league": "NBA",
                "marketType": "Spread",
                "teamForBet": "New York Knicks",
                "lineValueForBet": "+4.5",
                "noVigPriceFromAlert": "-104",
                "timestamp": "2025-05-14T18:58:03.000Z"
            })
        );
    }
}
