//! Alert row extraction.
//!
//! Rows reach Rust as structural [`rows::RawRow`] snapshots, either from the
//! in-page observer ([`scripts`]) or from a saved HTML file ([`snapshot`]),
//! and are turned into [`rows::AlertRecord`]s here.

pub mod market;
pub mod matchup;
pub mod rows;
pub mod scripts;
pub mod snapshot;

use serde::{Deserialize, Serialize};

/// DOM wiring of the alert grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSelectors {
    /// Container holding the grid rows.
    pub container: String,
    /// A single row inside the container.
    pub row: String,
    /// Attribute carrying the row id.
    pub row_id_attr: String,
    /// Attribute naming a cell's column.
    pub column_attr: String,
}

impl Default for GridSelectors {
    fn default() -> Self {
        Self {
            container: ".ag-center-cols-container".to_string(),
            row: ".ag-row".to_string(),
            row_id_attr: "row-id".to_string(),
            column_attr: "col-id".to_string(),
        }
    }
}

/// Column ids read from each row.
pub mod columns {
    pub const MATCH: &str = "match";
    pub const ALERT: &str = "alert";
    pub const OUTCOME: &str = "rowOutcome";
    pub const NO_VIG_PRICE: &str = "noVigPrice";
    pub const PRICE: &str = "current";

    pub const ALL: &[&str] = &[MATCH, ALERT, OUTCOME, NO_VIG_PRICE, PRICE];
}
