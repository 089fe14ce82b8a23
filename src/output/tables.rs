use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::gitlab::PipelineStatus;

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn cyan_header(titles: &[&str]) -> Vec<Cell> {
    titles
        .iter()
        .map(|title| Cell::new(title).fg(TableColor::Cyan))
        .collect()
}

pub fn status_cell(status: &PipelineStatus) -> Cell {
    let cell = Cell::new(status.as_str());
    match status {
        PipelineStatus::Running => cell.fg(TableColor::Blue),
        PipelineStatus::Pending | PipelineStatus::Created | PipelineStatus::Preparing => {
            cell.fg(TableColor::Yellow)
        }
        PipelineStatus::Success => cell.fg(TableColor::Green),
        PipelineStatus::Failed => cell.fg(TableColor::Red),
        _ => cell,
    }
}

/// What happened to a selected pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    Failed,
    /// Selected but left alone (dry run)
    Planned,
}

pub fn outcome_cell(outcome: CancelOutcome) -> Cell {
    match outcome {
        CancelOutcome::Cancelled => Cell::new("cancelled").fg(TableColor::Green),
        CancelOutcome::Failed => Cell::new("cancel failed").fg(TableColor::Red),
        CancelOutcome::Planned => Cell::new("would cancel").fg(TableColor::DarkGrey),
    }
}
