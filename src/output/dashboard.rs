use std::fmt::Write;

use comfy_table::{Cell, Color as TableColor, Table};

use crate::dashboard::{can_retry, DashboardState, DashboardView, ProjectView};
use crate::providers::gitlab::Job;

use super::styling::{bright, bright_red, bright_yellow, cyan, dim};
use super::tables::{create_cyan_header, create_table, status_cell};

const SHORT_SHA_LEN: usize = 8;

/// Prints the dashboard to stdout.
pub fn print_dashboard(state: &DashboardState, view: &DashboardView) {
    println!("{}", render_dashboard(state, view));
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", bright(emoji), bright(title).underlined());
}

fn short_sha(sha: &str) -> &str {
    sha.get(..SHORT_SHA_LEN).unwrap_or(sha)
}

fn action_cell(state: &DashboardState, view: &ProjectView) -> Cell {
    if state.is_retrying(view.id()) {
        return Cell::new("retrying…").fg(TableColor::Yellow);
    }

    match &view.pipeline {
        Some(pipeline) if can_retry(Some(pipeline.status)) => {
            Cell::new(format!("pipedash retry {}", view.id())).fg(TableColor::DarkGrey)
        }
        _ => Cell::new(""),
    }
}

fn projects_table(state: &DashboardState, views: &[ProjectView], numbered: bool) -> Table {
    let mut table = create_table();
    table.set_header(create_cyan_header(&[
        if numbered { "#" } else { "ID" },
        "Project",
        "Status",
        "Ref",
        "Commit",
        "Updated",
        "Action",
    ]));

    for (index, view) in views.iter().enumerate() {
        let pipeline = view.pipeline.as_ref();
        let updated = pipeline
            .and_then(|p| p.updated_at.or(p.created_at))
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();

        table.add_row(vec![
            Cell::new(if numbered {
                index.to_string()
            } else {
                view.id().to_string()
            }),
            Cell::new(&view.project.path_with_namespace),
            status_cell(pipeline.map(|p| p.status)),
            Cell::new(pipeline.map_or("", |p| p.ref_.as_str())),
            Cell::new(pipeline.map_or("", |p| short_sha(&p.sha))),
            Cell::new(updated),
            action_cell(state, view),
        ]);
    }

    table
}

pub fn render_dashboard(state: &DashboardState, view: &DashboardView) -> String {
    let mut output = String::new();

    if state.loading && state.snapshot.is_empty() {
        let _ = writeln!(output, "{}", bright_yellow("Loading projects…"));
    }

    if let Some(error) = &state.error {
        let _ = writeln!(output, "{} {}\n", bright_red("✗"), bright_red(error));
    }

    if let Some(notice) = &state.notice {
        let _ = writeln!(output, "{} {}\n", bright_yellow("!"), notice);
    }

    if !view.pinned.is_empty() {
        add_section_header(&mut output, "📌", "Pinned");
        let _ = writeln!(output, "{}\n", projects_table(state, &view.pinned, true));
    }

    if !view.others.is_empty() {
        add_section_header(&mut output, "📦", "Projects");
        let _ = writeln!(output, "{}\n", projects_table(state, &view.others, false));
    }

    if view.pinned.is_empty() && view.others.is_empty() && !state.loading {
        let _ = writeln!(output, "{}", bright_yellow("No projects found."));
    }

    let refreshed = state.last_refreshed.map_or_else(
        || "never".to_string(),
        |at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );
    let _ = write!(
        output,
        "  {} {}  {} {}",
        dim("Projects:"),
        cyan(state.snapshot.len()),
        dim("Last refresh:"),
        dim(refreshed)
    );
    if state.refreshing {
        let _ = write!(output, "  {}", bright_yellow("refreshing…"));
    }

    output
}

pub fn render_jobs(jobs: &[Job]) -> String {
    if jobs.is_empty() {
        return bright_yellow("No jobs found.").to_string();
    }

    let mut table = create_table();
    table.set_header(create_cyan_header(&["Stage", "Job", "Status", "ID"]));
    for job in jobs {
        table.add_row(vec![
            Cell::new(&job.stage),
            Cell::new(&job.name),
            status_cell(Some(job.status)),
            Cell::new(job.id),
        ]);
    }

    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::gitlab::{Pipeline, PipelineStatus, Project};
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn view(id: u64, status: Option<PipelineStatus>) -> ProjectView {
        ProjectView {
            project: Project {
                id,
                name: format!("p{id}"),
                path_with_namespace: format!("group/p{id}"),
                web_url: String::new(),
            },
            pipeline: status.map(|status| Pipeline {
                id: 100 + id,
                status,
                ref_: "main".to_string(),
                sha: "0123456789abcdef".to_string(),
                web_url: String::new(),
                created_at: None,
                updated_at: None,
                jobs: None,
            }),
        }
    }

    #[test]
    fn test_render_sections_and_retry_hint() {
        let views = vec![
            view(1, Some(PipelineStatus::Failed)),
            view(2, Some(PipelineStatus::Success)),
            view(3, None),
        ];
        let state = DashboardState {
            snapshot: views.clone().into(),
            ..DashboardState::default()
        };
        let dashboard = DashboardView {
            pinned: vec![views[0].clone()],
            others: views[1..].to_vec(),
        };

        let output = render_dashboard(&state, &dashboard);

        assert!(output.contains("Pinned"));
        assert!(output.contains("group/p1"));
        assert!(output.contains("pipedash retry 1"));
        assert!(!output.contains("pipedash retry 2"));
        assert!(output.contains("no pipeline"));
        assert!(output.contains("01234567"));
        assert!(!output.contains("0123456789"));
    }

    #[test]
    fn test_render_retrying_and_notice() {
        let views = vec![view(1, Some(PipelineStatus::Failed))];
        let state = DashboardState {
            snapshot: views.clone().into(),
            retrying: Arc::new(BTreeSet::from([1])),
            notice: Some("Failed to retry pipeline #101".to_string()),
            ..DashboardState::default()
        };
        let dashboard = DashboardView {
            pinned: Vec::new(),
            others: views,
        };

        let output = render_dashboard(&state, &dashboard);

        assert!(output.contains("retrying…"));
        assert!(output.contains("Failed to retry pipeline #101"));
    }

    #[test]
    fn test_render_empty_dashboard() {
        let output = render_dashboard(&DashboardState::default(), &DashboardView::default());
        assert!(output.contains("No projects found."));
        assert!(output.contains("never"));
    }

    #[test]
    fn test_render_jobs() {
        let jobs = vec![Job {
            id: 5,
            status: PipelineStatus::Failed,
            name: "rspec".to_string(),
            stage: "test".to_string(),
        }];

        let output = render_jobs(&jobs);
        assert!(output.contains("rspec"));
        assert!(output.contains("failed"));
        assert!(render_jobs(&[]).contains("No jobs found."));
    }
}
