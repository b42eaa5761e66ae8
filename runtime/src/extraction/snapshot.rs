//! Build row snapshots from saved grid HTML.

use super::rows::{RawCell, RawParagraph, RawRow};
use super::{columns, GridSelectors};
use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {css:?}: {e}"))
}

/// Snapshot every grid row in `html`, in document order.
///
/// Rows are looked up inside the grid container when one exists, otherwise
/// anywhere in the document.
pub fn rows_from_html(html: &str, selectors: &GridSelectors) -> Result<Vec<RawRow>> {
    let document = Html::parse_document(html);
    let container_sel = selector(&selectors.container)?;
    let row_sel = selector(&selectors.row)?;
    let cell_sel = selector(&format!("[{}]", selectors.column_attr))?;
    let p_sel = selector("p")?;
    let span_sel = selector("span")?;
    let time_sel = selector("time")?;

    let rows: Vec<ElementRef> = match document.select(&container_sel).next() {
        Some(container) => container.select(&row_sel).collect(),
        None => document.select(&row_sel).collect(),
    };

    Ok(rows
        .into_iter()
        .map(|row| {
            let mut cells = HashMap::new();
            for cell in row.select(&cell_sel) {
                let Some(column) = cell.value().attr(&selectors.column_attr) else {
                    continue;
                };
                if !columns::ALL.contains(&column) || cells.contains_key(column) {
                    continue;
                }
                let paragraphs = cell
                    .select(&p_sel)
                    .map(|p| {
                        let time = p.select(&time_sel).next();
                        RawParagraph {
                            text: text_of(p),
                            time_title: time.and_then(|t| t.value().attr("title")).map(str::to_string),
                            time_text: time.map(text_of),
                        }
                    })
                    .collect();
                let spans = cell.select(&span_sel).map(text_of).collect();
                cells.insert(
                    column.to_string(),
                    RawCell {
                        text: text_of(cell),
                        paragraphs,
                        spans,
                    },
                );
            }
            RawRow {
                row_id: row.value().attr(&selectors.row_id_attr).map(str::to_string),
                cells,
            }
        })
        .collect())
}

fn text_of(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::matchup::DEFAULT_LEAGUES;
    use crate::extraction::rows::{extract_alert, is_alert_row};

    const GRID: &str = r#"
        <html><body>
        <div class="ag-center-cols-container">
          <div class="ag-row" row-id="55012-ml-1">
            <div col-id="match">20:00 05/20 H: Flamengo A: Palmeiras Brazil - Cup</div>
            <div col-id="alert"><p>Steam</p><p><time title="2025-05-20T19:59:58Z">2 seconds ago</time></p></div>
            <div col-id="rowOutcome"><p>Full Game</p><p>Palmeiras</p><p></p></div>
            <div col-id="noVigPrice"><span>+141</span></div>
            <div col-id="current"><span>+150</span><span>+135</span></div>
          </div>
          <div class="ag-row" row-id="55013-total-2">
            <div col-id="match">20:00 05/20 H: Santos A: Bahia Copa Do Nordeste</div>
            <div col-id="alert"><p>Steam</p><p>3 minutes ago</p></div>
            <div col-id="rowOutcome"><p>1st Half</p><p>Over 1.5</p></div>
            <div col-id="noVigPrice">-102</div>
            <div col-id="current"><span>-105</span><span>-115</span></div>
          </div>
        </div>
        </body></html>
    "#;

    #[test]
    fn test_rows_from_html() {
        let rows = rows_from_html(GRID, &GridSelectors::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row_id.as_deref(), Some("55012-ml-1"));

        let alert = rows[0].cell("alert").unwrap();
        assert_eq!(alert.paragraphs.len(), 2);
        assert_eq!(alert.paragraphs[1].time_title.as_deref(), Some("2025-05-20T19:59:58Z"));
        assert_eq!(alert.paragraphs[1].time_text.as_deref(), Some("2 seconds ago"));
        assert_eq!(rows[0].cell("current").unwrap().spans, vec!["+150", "+135"]);
    }

    #[test]
    fn test_snapshot_feeds_extraction() {
        let rows = rows_from_html(GRID, &GridSelectors::default()).unwrap();
        assert!(is_alert_row(&rows[0], "second"));
        assert!(!is_alert_row(&rows[1], "second"));

        let ml = extract_alert(&rows[0], DEFAULT_LEAGUES, chrono::Utc::now()).unwrap();
        assert_eq!(ml.league, "Brazil - Cup");
        assert_eq!(ml.away_team, "Palmeiras");
        assert_eq!(ml.bet_description, "Palmeiras");
        assert_eq!(ml.old_odds, "+150");

        let total = extract_alert(&rows[1], DEFAULT_LEAGUES, chrono::Utc::now()).unwrap();
        assert_eq!(total.league, "Copa Do Nordeste");
        assert_eq!(total.team_for_bet, "Over");
        assert_eq!(total.line_value_for_bet, "1.5");
        assert_eq!(total.alert_time, "3 minutes ago");
        assert_eq!(total.no_vig_price_from_alert, "-102");
    }

    #[test]
    fn test_rows_without_container() {
        let html = r#"<div class="ag-row" row-id="1"><div col-id="match">x</div></div>"#;
        let rows = rows_from_html(html, &GridSelectors::default()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cell("match").unwrap().text, "x");
    }

    #[test]
    fn test_invalid_selector() {
        let selectors = GridSelectors {
            row: "[[".to_string(),
            ..Default::default()
        };
        assert!(rows_from_html("<div></div>", &selectors).is_err());
    }
}
