use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::report::JobOutcome;

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn color_coded_outcome_cell(outcome: &JobOutcome) -> Cell {
    match outcome {
        JobOutcome::Extracted { skipped_entries, .. } if skipped_entries.is_empty() => {
            Cell::new("extracted").fg(TableColor::Green)
        }
        JobOutcome::Extracted { .. } => Cell::new("partial").fg(TableColor::Yellow),
        JobOutcome::NoResults { .. } => Cell::new("no results").fg(TableColor::Yellow),
        JobOutcome::Failed { .. } => Cell::new("failed").fg(TableColor::Red),
    }
}

pub fn count_cell(count: usize) -> Cell {
    if count == 0 {
        Cell::new(count).fg(TableColor::DarkGrey)
    } else {
        Cell::new(count)
    }
}
