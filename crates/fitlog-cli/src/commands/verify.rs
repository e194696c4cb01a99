use fitlog_core::models::IntegrityReport;

use crate::config::AppContext;
use crate::error::CliError;

/// Run an integrity audit and print the report.
pub async fn run_verify(ctx: &AppContext, as_json: bool) -> Result<(), CliError> {
    let report = ctx.checker.verify_integrity(&ctx.owner_id).await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_report_lines(&report) {
            println!("{line}");
        }
    }

    if report.success {
        Ok(())
    } else {
        Err(CliError::IntegrityIssuesFound(report.issues.len()))
    }
}

fn format_report_lines(report: &IntegrityReport) -> Vec<String> {
    if report.success {
        return vec!["Integrity check passed: no issues found.".to_string()];
    }

    let mut lines = Vec::with_capacity(report.issues.len() + 1);
    for issue in &report.issues {
        let state = if issue.repaired {
            "repaired"
        } else if issue.auto_repairable {
            "repair failed"
        } else {
            "needs sync"
        };
        let kind = format!("{:?}", issue.kind);
        let item = issue.item_id.as_deref().unwrap_or("-");
        lines.push(format!(
            "{kind:<20} {:<17} {item:<38} {state:<14} {}",
            issue.domain.as_str(),
            issue.description
        ));
    }
    lines.push(format!(
        "{} issue(s) found, {} repaired.",
        report.issues.len(),
        report.repaired_count
    ));
    lines
}
