//! Ingest command - start a review session from an extraction result.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use colored::Colorize;
use tally::session::{ExtractionResult, Upload};

use super::{print_outcome, CmdResult, Env};

pub fn run(
    env: &Env,
    extraction: PathBuf,
    upload_id: String,
    file: Option<String>,
    environment: Option<String>,
) -> CmdResult {
    if env.store().uploads()?.contains(&upload_id) {
        return Err(format!(
            "A session for '{}' already exists. Run 'tally status {}' to inspect it.",
            upload_id, upload_id
        )
        .into());
    }
    if !extraction.exists() {
        return Err(format!("Extraction file not found: {}", extraction.display()).into());
    }

    let mut session = env.controller(environment)?;

    let outcome = match file {
        // A separate document reference: read the result here.
        Some(file) => {
            let reader = BufReader::new(File::open(&extraction)?);
            let result = ExtractionResult::from_reader(reader)?;
            session.receive_extraction(Upload::new(upload_id.clone(), file), result)?
        }
        // Otherwise the extractor reads the result from the upload's file.
        None => {
            let upload = Upload::new(upload_id.clone(), extraction.to_string_lossy());
            session.start_extraction(upload, None)?
        }
    };

    print_outcome(&outcome);
    for (index, table) in session.store().tables().iter().enumerate() {
        let marker = if index == session.store().selected_index() {
            "*".green().bold()
        } else {
            " ".normal()
        };
        println!(
            "  {} [{}] {} ({} rows x {} columns, {} summary)",
            marker,
            index,
            table.name.as_deref().unwrap_or("unnamed"),
            table.row_count(),
            table.column_count(),
            table.summary_rows.len().to_string().yellow()
        );
    }
    println!();
    println!(
        "Run {} to map columns.",
        format!("tally map {}", upload_id).cyan().bold()
    );
    Ok(())
}
