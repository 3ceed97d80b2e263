use crate::core::gists::{GistRecord, GistStatus, SyncOutcome};
use crate::utils::error::{ForgeError, Result};

fn cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

/// Markdown table of every gist touched by a sync, followed by the counts.
pub fn markdown_report(outcome: &SyncOutcome) -> String {
    let mut lines = vec![
        "| Gist ID | Filename | Status | Description |".to_string(),
        "|---------|----------|--------|-------------|".to_string(),
    ];

    for record in &outcome.records {
        lines.push(format!(
            "| {} | {} | {} | {} |",
            cell(&record.id),
            cell(&record.filename),
            record.status,
            cell(&record.description)
        ));
    }

    lines.push(String::new());
    lines.push("Summary:".to_string());
    for (status, count) in outcome.summary() {
        lines.push(format!("- {}: {}", status, count));
    }

    lines.join("\n") + "\n"
}

pub fn csv_report(records: &[GistRecord]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["Gist ID", "Filename", "Status", "Description"])?;

    for record in records {
        let status = record.status.to_string();
        writer.write_record([
            record.id.as_str(),
            record.filename.as_str(),
            status.as_str(),
            record.description.as_str(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ForgeError::IoError(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| ForgeError::ValidationError {
        message: format!("CSV report is not UTF-8: {}", e),
    })
}

/// 任何失敗都應讓程式以非零結束
pub fn failed_count(outcome: &SyncOutcome) -> usize {
    outcome.count(GistStatus::Failed)
}
