mod styling;
mod tables;

use comfy_table::Cell;

use crate::engine::CancelReport;
use crate::gitlab::{MergeRequestEvent, PipelineRecord};

use styling::{bright_green, bright_red, bright_yellow, cyan, dim, magenta_bold};
use tables::{create_table, cyan_header, outcome_cell, status_cell, CancelOutcome};

pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🧹 pipeline-sweeper"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Redundant merge request pipeline canceller")
    );
}

/// Renders the result of a one-off sweep.
///
/// `report` is `None` for a dry run, in which case every selected pipeline is
/// shown as planned.
pub fn render_sweep_report(
    event: &MergeRequestEvent,
    found: usize,
    selected: &[PipelineRecord],
    report: Option<&CancelReport>,
) -> String {
    let mut output = format!(
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n\n",
        dim("Merge request:"),
        cyan(format!("!{}", event.merge_request_iid)),
        dim("Action:"),
        cyan(&event.action),
        dim("Pipelines found:"),
        bright_yellow(found),
        dim("Redundant:"),
        bright_yellow(selected.len()),
    );

    if selected.is_empty() {
        output.push_str(&format!("{}\n", bright_green("Nothing to cancel.")));
        return output;
    }

    let mut table = create_table();
    table.set_header(cyan_header(&["Pipeline", "Status", "Ref", "Created", "Outcome"]));

    for pipeline in selected {
        let outcome = match report {
            None => CancelOutcome::Planned,
            Some(report) if report.failed.contains(&pipeline.id) => CancelOutcome::Failed,
            Some(_) => CancelOutcome::Cancelled,
        };

        table.add_row(vec![
            Cell::new(pipeline.id),
            status_cell(&pipeline.status),
            Cell::new(pipeline.ref_.as_deref().unwrap_or("-")),
            Cell::new(
                pipeline
                    .created_at
                    .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            outcome_cell(outcome),
        ]);
    }

    output.push_str(&table.to_string());
    output.push('\n');

    if let Some(report) = report {
        if !report.failed.is_empty() {
            output.push_str(&format!(
                "\n{} {}\n",
                bright_red("Failed to cancel:"),
                report
                    .failed
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_with_nothing_selected() {
        let event = MergeRequestEvent::new(4, "update");
        let output = render_sweep_report(&event, 2, &[], None);

        assert!(output.contains("!4"));
        assert!(output.contains("Nothing to cancel."));
    }

    #[test]
    fn test_dry_run_report_lists_planned_pipelines() {
        let event = MergeRequestEvent::new(42, "update");
        let selected = vec![PipelineRecord::new(11, "running")];

        let output = render_sweep_report(&event, 3, &selected, None);

        assert!(output.contains("11"));
        assert!(output.contains("running"));
        assert!(output.contains("would cancel"));
    }

    #[test]
    fn test_report_marks_failures() {
        let event = MergeRequestEvent::new(7, "close");
        let selected = vec![
            PipelineRecord::new(9, "running"),
            PipelineRecord::new(8, "pending"),
        ];
        let report = CancelReport {
            cancelled: vec![9],
            failed: vec![8],
        };

        let output = render_sweep_report(&event, 2, &selected, Some(&report));

        assert!(output.contains("cancelled"));
        assert!(output.contains("cancel failed"));
        assert!(output.contains("Failed to cancel:"));
    }
}
