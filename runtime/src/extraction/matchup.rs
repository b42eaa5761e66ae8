//! Parse the grid's match column: `"<time> <date> H: <home> A: <away> <league>"`.

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

/// Leagues recognised at the end of the away text.
pub const DEFAULT_LEAGUES: &[&str] = &[
    "NCAA",
    "NBA",
    "NHL",
    "MLB",
    "Copa Do Nordeste",
    "Brazil - Cup",
    "Qatar - Emir Cup",
    "Kenya - Premier League",
];

pub const UNKNOWN_LEAGUE: &str = "Unknown";

/// Teams, kickoff and league of one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matchup {
    pub time: String,
    pub date: String,
    pub home_team: String,
    pub away_team: String,
    pub league: String,
}

/// Parse a match cell. Returns `None` when the `H:`/`A:` markers are missing.
pub fn parse_matchup<S: AsRef<str>>(text: &str, leagues: &[S]) -> Option<Matchup> {
    let mut parts = text.split("H:");
    let time_date = parts.next()?.trim();
    let rest = parts.next()?;

    let mut tokens = time_date.split(' ');
    let time = tokens.next().unwrap_or_default().to_string();
    let date = tokens.next().unwrap_or_default().to_string();

    let mut sides = rest.split("A:");
    let home_team = sides.next()?.trim().to_string();
    let away_text = sides.next()?.trim();

    let (away_team, league) = split_league(away_text, leagues);

    Some(Matchup {
        time,
        date,
        home_team,
        away_team,
        league,
    })
}

/// Split `"<away team> <league>"` into its parts.
fn split_league<S: AsRef<str>>(away_text: &str, leagues: &[S]) -> (String, String) {
    let mut league = UNKNOWN_LEAGUE.to_string();
    let mut away = away_text.to_string();

    for known in leagues {
        let pattern = format!(r"\b{}\b", regex::escape(known.as_ref()));
        let Ok(re) = RegexBuilder::new(&pattern).case_insensitive(true).build() else {
            continue;
        };
        let Some(m) = re.find(away_text) else {
            continue;
        };
        let trailing = away_text[m.end()..].trim().len();
        if m.start() > away_text.len() / 2 || trailing < 5 {
            league = m.as_str().to_string();
            away = away_text[..m.start()].trim().to_string();
            break;
        }
    }

    if league == UNKNOWN_LEAGUE {
        if let Some(idx) = away_text.rfind(" - ").filter(|&i| i > 0) {
            let tail = away_text[idx + 3..].trim();
            let head = away_text[..idx].trim();
            let lower = tail.to_lowercase();
            if tail.len() < head.len() || lower.contains("league") || lower.contains("cup") {
                league = tail.to_string();
                away = head.to_string();
            }
        }
    }

    if away == league {
        away = away_text.replacen(&league, "", 1).trim().to_string();
    }

    (away, league)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_league_at_end() {
        let m = parse_matchup("19:00 05/14 H: Boston Celtics A: New York Knicks NBA", DEFAULT_LEAGUES)
            .unwrap();
        assert_eq!(m.time, "19:00");
        assert_eq!(m.date, "05/14");
        assert_eq!(m.home_team, "Boston Celtics");
        assert_eq!(m.away_team, "New York Knicks");
        assert_eq!(m.league, "NBA");
    }

    #[test]
    fn test_league_match_is_case_insensitive_and_keeps_page_text() {
        let m = parse_matchup("20:30 05/14 H: Duke A: North Carolina ncaa", DEFAULT_LEAGUES).unwrap();
        assert_eq!(m.league, "ncaa");
        assert_eq!(m.away_team, "North Carolina");
    }

    #[test]
    fn test_league_containing_dash() {
        let m = parse_matchup(
            "15:00 05/15 H: Gor Mahia A: AFC Leopards Kenya - Premier League",
            DEFAULT_LEAGUES,
        )
        .unwrap();
        assert_eq!(m.away_team, "AFC Leopards");
        assert_eq!(m.league, "Kenya - Premier League");
    }

    #[test]
    fn test_dash_fallback_for_unlisted_league() {
        let m = parse_matchup(
            "18:00 05/15 H: Rosenborg A: Molde FK Norway - Eliteserien",
            DEFAULT_LEAGUES,
        )
        .unwrap();
        assert_eq!(m.away_team, "Molde FK Norway");
        assert_eq!(m.league, "Eliteserien");
    }

    #[test]
    fn test_dash_fallback_rejects_long_tail() {
        let m = parse_matchup("18:00 05/15 H: A A: Zed - Something Rather Long", DEFAULT_LEAGUES)
            .unwrap();
        assert_eq!(m.league, UNKNOWN_LEAGUE);
        assert_eq!(m.away_team, "Zed - Something Rather Long");
    }

    #[test]
    fn test_league_early_in_text_is_ignored() {
        // "NBA" sits in the first half with plenty of text after it.
        let m = parse_matchup("19:00 05/14 H: X A: NBA Legends Exhibition Squad", DEFAULT_LEAGUES)
            .unwrap();
        assert_eq!(m.league, UNKNOWN_LEAGUE);
        assert_eq!(m.away_team, "NBA Legends Exhibition Squad");
    }

    #[test]
    fn test_missing_markers() {
        assert!(parse_matchup("19:00 05/14 Boston vs New York", DEFAULT_LEAGUES).is_none());
        assert!(parse_matchup("19:00 05/14 H: Boston New York", DEFAULT_LEAGUES).is_none());
    }

    #[test]
    fn test_missing_date_is_empty() {
        let m = parse_matchup("LIVE H: Home A: Away NHL", DEFAULT_LEAGUES).unwrap();
        assert_eq!(m.time, "LIVE");
        assert_eq!(m.date, "");
        assert_eq!(m.league, "NHL");
    }
}
