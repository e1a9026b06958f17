//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying plans, apply
//! reports, state, and outputs in text or JSON.

use colored::Colorize;
use std::collections::BTreeMap;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::module::{AttrHasher, AttrValue};
use crate::planner::{ActionType, ApplyReport, ChangeStatus, ExecutionPhase, Plan};
use crate::state::StateDocument;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Planned change row for table display.
#[derive(Tabled)]
struct PlanChangeRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

/// State record row for table display.
#[derive(Tabled)]
struct StateRecordRow {
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Hash")]
    hash: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a change plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &Plan, detailed: bool) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&PlanJson::from(plan)).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_plan_text(plan, detailed),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(plan: &Plan, detailed: bool) -> String {
        if plan.is_empty() {
            return format!(
                "{} No changes required - resources match the module.\n",
                "✓".green()
            );
        }

        let mut output = String::new();

        let _ = write!(
            output,
            "\nChange plan for {}/{}\n\n",
            plan.module, plan.environment
        );

        let rows: Vec<PlanChangeRow> = plan
            .changes
            .iter()
            .enumerate()
            .map(|(i, c)| PlanChangeRow {
                index: i + 1,
                action: Self::format_action_type(c.action),
                resource: c.key.to_string(),
                reason: Self::truncate(&c.reason, 48),
            })
            .collect();

        let table = Table::new(rows).to_string();
        output.push_str(&table);
        output.push('\n');

        if detailed {
            for change in &plan.changes {
                if change.details.is_empty() {
                    continue;
                }
                let _ = write!(output, "\n{}:\n", change.key);
                for detail in &change.details {
                    let _ = writeln!(
                        output,
                        "   {}: {} -> {}",
                        detail.field,
                        detail.old_value.as_deref().unwrap_or("(none)"),
                        detail.new_value.as_deref().unwrap_or("(none)")
                    );
                }
            }
        }

        let _ = write!(
            output,
            "\nPlan: {} to create, {} to update, {} to destroy\n",
            plan.create_count().to_string().green(),
            plan.update_count().to_string().yellow(),
            plan.delete_count().to_string().red()
        );

        output
    }

    /// Formats an apply report for display.
    #[must_use]
    pub fn format_report(&self, report: &ApplyReport) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&ReportJson::from(report)).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    /// Formats an apply report as text.
    fn format_report_text(report: &ApplyReport) -> String {
        let status = if report.success {
            format!("{} Apply complete", "✓".green())
        } else {
            format!("{} Apply incomplete", "✗".red())
        };

        let mut output = format!("{status}\n\n");
        let _ = writeln!(output, "   Created: {}", report.created);
        let _ = writeln!(output, "   Updated: {}", report.updated);
        let _ = writeln!(output, "   Deleted: {}", report.deleted);
        let _ = writeln!(output, "   Unchanged: {}", report.unchanged);

        if report.failed > 0 || report.blocked > 0 || report.aborted > 0 {
            let _ = write!(output, "\n{} Problems:\n", "⚠".yellow());
            for outcome in &report.outcomes {
                match &outcome.status {
                    ChangeStatus::Failed { error } => {
                        let _ = writeln!(output, "   ✗ {}: {error}", outcome.key);
                    }
                    ChangeStatus::Blocked { blocked_on } => {
                        let _ = writeln!(
                            output,
                            "   - {}: blocked by {blocked_on}",
                            outcome.key
                        );
                    }
                    ChangeStatus::Aborted => {
                        let _ = writeln!(output, "   - {}: aborted", outcome.key);
                    }
                    ChangeStatus::Created { .. }
                    | ChangeStatus::Updated { .. }
                    | ChangeStatus::Deleted => {}
                }
            }
        }

        output
    }

    /// Formats a state document.
    #[must_use]
    pub fn format_state(&self, state: &StateDocument) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(state).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();

                let _ = write!(
                    output,
                    "\nState: {}/{}\n\n",
                    state.module, state.environment
                );

                let _ = writeln!(output, "   Version: {}", state.version);
                let _ = writeln!(output, "   Serial: {}", state.serial);
                let _ = writeln!(output, "   Last updated: {}", state.last_updated);
                let _ = writeln!(output, "   Resources: {}", state.len());

                if !state.is_empty() {
                    let hasher = AttrHasher::new();
                    let rows: Vec<StateRecordRow> = state
                        .records
                        .values()
                        .map(|r| StateRecordRow {
                            resource: r.key.to_string(),
                            id: Self::truncate(&r.id, 24),
                            hash: hasher.short_hash(&r.attributes_hash),
                            updated: r.updated_at.format("%Y-%m-%d %H:%M").to_string(),
                        })
                        .collect();

                    output.push('\n');
                    output.push_str(&Table::new(rows).to_string());
                    output.push('\n');
                }

                output
            }
        }
    }

    /// Formats resolved module outputs.
    #[must_use]
    pub fn format_outputs(&self, outputs: &BTreeMap<String, AttrValue>) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(outputs).unwrap_or_default(),
            OutputFormat::Text => {
                if outputs.is_empty() {
                    return String::from("No outputs declared.\n");
                }
                let mut output = String::new();
                for (name, value) in outputs {
                    let _ = writeln!(output, "{name} = {value}");
                }
                output
            }
        }
    }

    /// Formats an action type with color.
    fn format_action_type(action: ActionType) -> String {
        match action {
            ActionType::Create => "+create".green().to_string(),
            ActionType::Update => "~update".yellow().to_string(),
            ActionType::Delete => "-delete".red().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{cut}...")
        }
    }
}

// JSON serialization helpers

#[derive(serde::Serialize)]
struct PlanJson {
    module: String,
    environment: String,
    change_count: usize,
    creates: usize,
    updates: usize,
    deletes: usize,
    changes: Vec<ChangeJson>,
}

#[derive(serde::Serialize)]
struct ChangeJson {
    action: String,
    phase: &'static str,
    resource: String,
    reason: String,
    depends_on: Vec<usize>,
}

impl From<&Plan> for PlanJson {
    fn from(plan: &Plan) -> Self {
        Self {
            module: plan.module.clone(),
            environment: plan.environment.clone(),
            change_count: plan.change_count(),
            creates: plan.create_count(),
            updates: plan.update_count(),
            deletes: plan.delete_count(),
            changes: plan
                .changes
                .iter()
                .map(|c| ChangeJson {
                    action: c.action.to_string(),
                    phase: match c.phase {
                        ExecutionPhase::Mutate => "mutate",
                        ExecutionPhase::Cleanup => "cleanup",
                    },
                    resource: c.key.to_string(),
                    reason: c.reason.clone(),
                    depends_on: c.depends_on.clone(),
                })
                .collect(),
        }
    }
}

#[derive(serde::Serialize)]
struct ReportJson {
    success: bool,
    created: usize,
    updated: usize,
    deleted: usize,
    unchanged: usize,
    failed: usize,
    blocked: usize,
    aborted: usize,
    outcomes: Vec<OutcomeJson>,
}

#[derive(serde::Serialize)]
struct OutcomeJson {
    resource: String,
    action: String,
    status: String,
    error: Option<String>,
}

impl From<&ApplyReport> for ReportJson {
    fn from(report: &ApplyReport) -> Self {
        Self {
            success: report.success,
            created: report.created,
            updated: report.updated,
            deleted: report.deleted,
            unchanged: report.unchanged,
            failed: report.failed,
            blocked: report.blocked,
            aborted: report.aborted,
            outcomes: report
                .outcomes
                .iter()
                .map(|o| OutcomeJson {
                    resource: o.key.to_string(),
                    action: o.action.to_string(),
                    status: match &o.status {
                        ChangeStatus::Created { .. } => String::from("created"),
                        ChangeStatus::Updated { .. } => String::from("updated"),
                        ChangeStatus::Deleted => String::from("deleted"),
                        ChangeStatus::Failed { .. } => String::from("failed"),
                        ChangeStatus::Blocked { blocked_on } => {
                            format!("blocked by {blocked_on}")
                        }
                        ChangeStatus::Aborted => String::from("aborted"),
                    },
                    error: match &o.status {
                        ChangeStatus::Failed { error } => Some(error.clone()),
                        _ => None,
                    },
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ResourceKey;
    use crate::planner::PlannedChange;
    use chrono::Utc;

    fn sample_plan() -> Plan {
        Plan {
            created_at: Utc::now(),
            module: String::from("network"),
            environment: String::from("dev"),
            changes: vec![PlannedChange {
                action: ActionType::Create,
                phase: ExecutionPhase::Mutate,
                key: ResourceKey::new("vpc", "main"),
                attributes: None,
                prior_id: None,
                reason: String::from("Resource does not exist"),
                depends_on: vec![],
                details: vec![],
            }],
        }
    }

    #[test]
    fn test_plan_json_output() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let rendered = formatter.format_plan(&sample_plan(), false);

        let parsed: serde_json::Value =
            serde_json::from_str(&rendered).expect("valid json");
        assert_eq!(parsed["creates"], 1);
        assert_eq!(parsed["changes"][0]["resource"], "vpc.main");
        assert_eq!(parsed["changes"][0]["phase"], "mutate");
    }

    #[test]
    fn test_empty_plan_text() {
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let plan = Plan {
            created_at: Utc::now(),
            module: String::from("network"),
            environment: String::from("dev"),
            changes: vec![],
        };
        let rendered = formatter.format_plan(&plan, false);
        assert!(rendered.contains("No changes required"));
    }

    #[test]
    fn test_truncate_multibyte() {
        // Cut point lands inside a multi-byte character.
        let truncated = OutputFormatter::truncate("cidr überschritten für vpc", 10);
        assert_eq!(truncated, "cidr üb...");
        assert_eq!(OutputFormatter::truncate("vpc-1", 10), "vpc-1");
    }

    #[test]
    fn test_outputs_text() {
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let mut outputs = BTreeMap::new();
        outputs.insert(
            String::from("vpc_id"),
            AttrValue::String(String::from("vpc-1")),
        );
        let rendered = formatter.format_outputs(&outputs);
        assert_eq!(rendered, "vpc_id = vpc-1\n");
    }
}
