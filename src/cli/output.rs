//! CLI output formatting

use crate::{
    core::{NodeRunState, RunState, StepType},
    execution::{RunError, RunEvent},
    graph::{ConnectionVerdict, Issue, IssueSeverity, Severity},
    persistence::{AuditEvent, PipelineSummary},
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static LOCK: Emoji<'_, '_> = Emoji("🔐 ", "* ");

/// Create a progress bar over the pipeline's nodes
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a run state for display
pub fn format_run_state(state: RunState) -> String {
    match state {
        RunState::Idle => style("IDLE").dim().to_string(),
        RunState::Running => style("RUNNING").yellow().to_string(),
        RunState::Success => style("SUCCESS").green().to_string(),
        RunState::Error => style("ERROR").red().to_string(),
    }
}

/// Format a node's run state for display
pub fn format_node_state(state: NodeRunState) -> String {
    match state {
        NodeRunState::Unvisited => style("UNVISITED").dim().to_string(),
        NodeRunState::Active => style("ACTIVE").yellow().to_string(),
        NodeRunState::Completed => style("COMPLETED").green().to_string(),
        NodeRunState::Simulated => style("SIMULATED").blue().to_string(),
    }
}

/// Format a run event for display
pub fn format_run_event(event: &RunEvent) -> String {
    match event {
        RunEvent::Started { snapshot, warnings } => {
            let mut line = format!(
                "{} Starting run {} ({} steps)",
                ROCKET,
                style(&snapshot.run_id.to_string()[..8]).dim(),
                snapshot.nodes.len()
            );
            for issue in warnings {
                line.push('\n');
                line.push_str(&format_issue(issue));
            }
            line
        }
        RunEvent::NodeActive { node_id, .. } => format!("{} {}", SPINNER, style(node_id).cyan()),
        RunEvent::NodeCompleted { node_id, .. } => format!("{} {}", CHECK, style(node_id).green()),
        RunEvent::Finished { snapshot, error } => match error {
            None => format!(
                "{} Run ({}) {}",
                INFO,
                style(&snapshot.run_id.to_string()[..8]).dim(),
                format!("{} completed", style("successfully").green())
            ),
            Some(e) => format!(
                "{} Run ({}) {}",
                INFO,
                style(&snapshot.run_id.to_string()[..8]).dim(),
                style("failed").red()
            ) + "\n"
                + &format_run_error(e),
        },
    }
}

/// Format a run failure with its remediation hint
pub fn format_run_error(error: &RunError) -> String {
    let icon = match error {
        RunError::Auth { .. } => LOCK,
        RunError::Validation(_) | RunError::InputRejected { .. } => WARN,
        _ => CROSS,
    };
    let mut text = format!("{} {}", icon, style(error).red());
    if let RunError::Validation(report) = error {
        for issue in &report.errors {
            text.push('\n');
            text.push_str(&format_issue(issue));
        }
    }
    if let Some(node_id) = error.node_id() {
        text.push_str(&format!(" {}", style(format!("[{}]", node_id)).dim()));
    }
    if let Some(hint) = error.remediation() {
        text.push_str(&format!("\n   {}", style(hint).dim()));
    }
    text
}

/// Format a pre-flight finding
pub fn format_issue(issue: &Issue) -> String {
    let (icon, code) = match issue.severity {
        IssueSeverity::Error => (CROSS, style(issue.code).red()),
        IssueSeverity::Warning => (WARN, style(issue.code).yellow()),
    };
    format!(
        "{} {} {}\n   {}",
        icon,
        code,
        issue.message,
        style(&issue.suggestion).dim()
    )
}

/// Format a connection verdict
pub fn format_verdict(source: StepType, target: StepType, verdict: &ConnectionVerdict) -> String {
    let (icon, label) = match verdict.severity {
        Severity::Recommended => (CHECK, style("allowed").green()),
        Severity::Discouraged => (WARN, style("allowed, discouraged").yellow()),
        Severity::Rejected => (CROSS, style("rejected").red()),
    };
    format!(
        "{} {} → {}: {}\n   {}",
        icon,
        style(source).bold(),
        style(target).bold(),
        label,
        verdict.message
    )
}

/// Format a saved pipeline listing entry
pub fn format_pipeline_summary(summary: &PipelineSummary) -> String {
    format!(
        "{} {} - {} steps, {} connections - {}",
        INFO,
        style(&summary.name).bold(),
        summary.node_count,
        summary.edge_count,
        style(summary.saved_at.format("%Y-%m-%d %H:%M")).dim()
    )
}

/// Format an audit event
pub fn format_audit_event(event: &AuditEvent) -> String {
    format!(
        "{} {} {} {} ({})",
        style(event.created_at.format("%Y-%m-%d %H:%M:%S")).dim(),
        style(&event.action).cyan(),
        event.entity_type,
        style(&event.entity_name).bold(),
        style(&event.entity_id).dim()
    )
}

/// Format generated content with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}
