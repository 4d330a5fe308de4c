use std::fmt::Display;

use console::{style, Color, StyledObject};

use crate::providers::gitlab::PipelineStatus;

type Styled = StyledObject<String>;

fn tinted(text: impl Display, color: Color) -> Styled {
    style(text.to_string()).fg(color)
}

pub fn bright(text: impl Display) -> Styled {
    style(text.to_string()).bright()
}

pub fn bright_yellow(text: impl Display) -> Styled {
    tinted(text, Color::Yellow).bright()
}

pub fn bright_green(text: impl Display) -> Styled {
    tinted(text, Color::Green).bright()
}

pub fn bright_red(text: impl Display) -> Styled {
    tinted(text, Color::Red).bright()
}

pub fn cyan(text: impl Display) -> Styled {
    tinted(text, Color::Cyan)
}

pub fn dim(text: impl Display) -> Styled {
    style(text.to_string()).dim()
}

pub fn magenta_bold(text: impl Display) -> Styled {
    tinted(text, Color::Magenta).bold()
}

/// A pipeline status colored the same way as the status table column.
pub fn status(status: PipelineStatus) -> Styled {
    match status {
        PipelineStatus::Success => bright_green(status),
        PipelineStatus::Failed => bright_red(status),
        PipelineStatus::Running | PipelineStatus::Preparing => tinted(status, Color::Blue),
        PipelineStatus::Pending
        | PipelineStatus::Canceling
        | PipelineStatus::Created
        | PipelineStatus::WaitingForResource
        | PipelineStatus::Scheduled => bright_yellow(status),
        PipelineStatus::Canceled
        | PipelineStatus::Skipped
        | PipelineStatus::Manual
        | PipelineStatus::Unknown => dim(status),
    }
}
