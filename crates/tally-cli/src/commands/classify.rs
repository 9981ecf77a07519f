//! Classify command - detect summary rows and save.

use colored::Colorize;

use super::{CmdResult, Env};

pub fn run(env: &Env, upload_id: &str, table: Option<usize>, similar_to: Option<usize>) -> CmdResult {
    let mut session = env.resume(upload_id)?;

    let flagged: Vec<(usize, Vec<usize>)> = match table {
        Some(index) => {
            session.select_table(index)?;
            let mut rows = session.auto_detect_summary_rows()?;
            if let Some(reference) = similar_to {
                rows.extend(session.mark_similar_rows(reference)?);
                rows.sort_unstable();
                rows.dedup();
            }
            vec![(index, rows)]
        }
        None => {
            let classifier = session.classifier().clone();
            session
                .store_mut()?
                .auto_detect_all(&classifier)
                .into_iter()
                .enumerate()
                .collect()
        }
    };

    if !session.on_page_exit() {
        return Err("Failed to save the session; see the log for details".into());
    }

    let total: usize = flagged.iter().map(|(_, rows)| rows.len()).sum();
    for (index, rows) in &flagged {
        if rows.is_empty() {
            continue;
        }
        let rows: Vec<String> = rows.iter().map(|r| r.to_string()).collect();
        println!("  table {}: rows {}", index, rows.join(", ").yellow());
    }
    if total == 0 {
        println!("{}", "No new summary rows found".dimmed());
    } else {
        println!("{} {} new summary row(s)", "Flagged".green().bold(), total);
    }
    Ok(())
}
