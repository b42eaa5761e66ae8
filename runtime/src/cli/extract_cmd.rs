//! `pod-alert extract`: run the row extractor over a saved grid snapshot.

use crate::cli::output::{self, Styled};
use crate::config::AgentConfig;
use crate::extraction::rows::{extract_alert, is_alert_row, AlertRecord};
use crate::extraction::snapshot::rows_from_html;
use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Saved HTML of the terminal page (or just the grid).
    pub file: PathBuf,

    /// Extract every row, not only those whose alert text matches the keyword.
    #[arg(long)]
    pub all: bool,
}

/// Alert records found in `html`, in row order.
pub fn extract_records(html: &str, config: &AgentConfig, all: bool) -> Result<Vec<AlertRecord>> {
    let now = Utc::now();
    let rows = rows_from_html(html, &config.selectors)?;
    Ok(rows
        .iter()
        .filter(|row| all || is_alert_row(row, &config.alert_keyword))
        .filter_map(|row| extract_alert(row, &config.leagues, now))
        .collect())
}

pub fn run(config_path: Option<&Path>, args: ExtractArgs) -> Result<()> {
    let config = AgentConfig::load(config_path)?;
    let html = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let records = extract_records(&html, &config, args.all)?;

    if output::is_json() || output::is_quiet() {
        output::print_json(&serde_json::to_value(&records)?);
        return Ok(());
    }

    let s = Styled::new();
    eprintln!(
        "  {} {} alert record(s) in {}",
        s.ok_sym(),
        records.len(),
        args.file.display()
    );
    for record in &records {
        eprintln!(
            "    {} {} vs {} ({}) {} {} {} -> {}",
            s.dim(&record.row_id),
            record.home_team,
            record.away_team,
            record.league,
            record.market_type,
            record.bet_description,
            record.old_odds,
            record.new_odds,
        );
    }
    output::print_json(&serde_json::to_value(&records)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRID: &str = r#"
        <div class="ag-center-cols-container">
          <div class="ag-row" row-id="9001-spread-3">
            <div col-id="match">19:00 05/14 H: Boston Celtics A: New York Knicks NBA</div>
            <div col-id="alert"><p>Line move</p><p><time title="2025-05-14T18:58:01Z">2 seconds ago</time></p></div>
            <div col-id="rowOutcome"><p>Full Game</p><p>New York Knicks</p><p>+4.5</p></div>
            <div col-id="noVigPrice"><span>-104</span></div>
            <div col-id="current"><span>-110</span><span>-120</span></div>
          </div>
          <div class="ag-row" row-id="9002-ml-1">
            <div col-id="match">19:00 05/14 H: Boston Celtics A: New York Knicks NBA</div>
            <div col-id="alert"><p>Line move</p><p>5 minutes ago</p></div>
            <div col-id="rowOutcome"><p>Full Game</p><p>Boston Celtics</p></div>
            <div col-id="noVigPrice"><span>-180</span></div>
            <div col-id="current"><span>-175</span><span>-190</span></div>
          </div>
        </div>
    "#;

    #[test]
    fn test_keyword_filters_rows() {
        let config = AgentConfig::default();
        let records = tokio_test::assert_ok!(extract_records(GRID, &config, false));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].row_id, "9001-spread-3");
        assert_eq!(records[0].event_id_from_row_attribute, "9001");
        assert!(records[0].event_id.is_none());

        let all = tokio_test::assert_ok!(extract_records(GRID, &config, true));
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].bet_description, "Boston Celtics");
    }
}
