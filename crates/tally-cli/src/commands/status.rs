//! Status command - show session progress and summary.

use colored::Colorize;
use tally::mapping::{group_by_confidence, ConfidenceBand};
use tally::session::{ApprovalRecord, ProgressService, SessionSnapshot};
use tally::ConfidenceThresholds;

use super::{CmdResult, Env};

pub fn run(env: &Env, upload_id: &str, json_output: bool) -> CmdResult {
    let thresholds = env.config()?.confidence;
    let snapshot = env.store().load(upload_id, None)?;
    let decisions = env.store().decisions(upload_id)?;

    if snapshot.is_none() && decisions.is_empty() {
        return Err(format!(
            "No session found for '{}'.\nRun 'tally ingest <EXTRACTION_JSON> --upload-id {}' first.",
            upload_id, upload_id
        )
        .into());
    }

    if json_output {
        let status = serde_json::json!({
            "upload_id": upload_id,
            "session": snapshot,
            "decisions": decisions,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{} {}", "Review status for".cyan().bold(), upload_id.white());
    println!();

    if let Some(snapshot) = &snapshot {
        print_session(snapshot, &thresholds);
    }

    if !decisions.is_empty() {
        println!("{}", "Decisions:".yellow().bold());
        for record in &decisions {
            match record {
                ApprovalRecord::Approved { .. } => println!("  {}", "Approved".green()),
                ApprovalRecord::Rejected { reason, .. } => {
                    println!("  {} {}", "Rejected:".red(), reason)
                }
                ApprovalRecord::Pending { .. } => println!("  {}", "Sent to pending".blue()),
            }
        }
    }

    Ok(())
}

fn print_session(snapshot: &SessionSnapshot, thresholds: &ConfidenceThresholds) {
    let payload = &snapshot.payload;
    println!(
        "Step:   {} {}",
        snapshot.step.label().white().bold(),
        format!("(saved {} by {})", snapshot.saved_at.format("%Y-%m-%d %H:%M"), snapshot.actor_id).dimmed()
    );
    if let Some(method) = &payload.extraction_method {
        println!("Method: {}", method);
    }
    println!();

    println!("{}", "Tables:".yellow().bold());
    for (index, table) in payload.tables.iter().enumerate() {
        let marker = if index == payload.selected_table { "*" } else { " " };
        let summary: Vec<String> = table.summary_rows.iter().map(|i| i.to_string()).collect();
        println!(
            "  {} [{}] {} ({} rows, {} columns)",
            marker,
            index,
            table.name.as_deref().unwrap_or("unnamed"),
            table.row_count(),
            table.column_count()
        );
        println!("      header:  {}", table.header.join(" | "));
        if !summary.is_empty() {
            println!("      summary: {}", summary.join(", ").yellow());
        }
    }
    println!();

    if !payload.mapping.is_empty() {
        println!("{}", "Mapping:".yellow().bold());
        for (field, column) in payload.mapping.iter() {
            println!("  {} ← {}", field.white(), column);
        }
        println!();
    }

    let pending: Vec<_> = payload.suggestions.iter().filter(|s| !s.accepted).cloned().collect();
    if !pending.is_empty() {
        let groups = group_by_confidence(&pending, thresholds);
        println!("{}", "Open suggestions:".yellow().bold());
        for band in [ConfidenceBand::High, ConfidenceBand::Medium, ConfidenceBand::Low] {
            for s in groups.band(band) {
                let confidence = format!("{:.0}%", s.confidence * 100.0);
                let confidence = match band {
                    ConfidenceBand::High => confidence.green(),
                    ConfidenceBand::Medium => confidence.yellow(),
                    ConfidenceBand::Low => confidence.red(),
                };
                println!("  {} ← {} {}", s.field_key.white(), s.source_column, confidence);
            }
        }
        println!();
    }

    if let Some(date) = payload.selected_statement_date {
        println!("Statement date: {}", date);
    }
    if let Some(carrier) = &payload.carrier {
        println!("Carrier:        {}", carrier);
    }
    if payload.skipped {
        println!("{}", "Mapping was skipped".dimmed());
    }
}
