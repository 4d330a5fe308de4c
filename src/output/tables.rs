use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::providers::gitlab::PipelineStatus;

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn create_cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

fn status_color(status: PipelineStatus) -> TableColor {
    match status {
        PipelineStatus::Success => TableColor::Green,
        PipelineStatus::Failed => TableColor::Red,
        PipelineStatus::Running | PipelineStatus::Preparing => TableColor::Blue,
        PipelineStatus::Pending
        | PipelineStatus::Canceling
        | PipelineStatus::Created
        | PipelineStatus::WaitingForResource
        | PipelineStatus::Scheduled => TableColor::Yellow,
        PipelineStatus::Canceled
        | PipelineStatus::Skipped
        | PipelineStatus::Manual
        | PipelineStatus::Unknown => TableColor::DarkGrey,
    }
}

pub fn status_cell(status: Option<PipelineStatus>) -> Cell {
    match status {
        Some(status) => Cell::new(status.as_str()).fg(status_color(status)),
        None => Cell::new("no pipeline").fg(TableColor::DarkGrey),
    }
}
