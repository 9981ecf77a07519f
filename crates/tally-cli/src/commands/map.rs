//! Map command - map columns onto canonical fields and move to the dashboard.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use colored::Colorize;
use tally::mapping::FieldMapping;
use tally::WorkflowStep;

use super::{print_outcome, CmdResult, Env};

pub fn run(
    env: &Env,
    upload_id: &str,
    mapping: Option<PathBuf>,
    accept_high: bool,
    skip: bool,
) -> CmdResult {
    let mut session = env.resume(upload_id)?;

    if session.step() == WorkflowStep::TableEditor {
        print_outcome(&session.save_tables()?);
    }

    if skip {
        print_outcome(&session.skip_mapping()?);
        return Ok(());
    }

    if let Some(path) = mapping {
        let reader = BufReader::new(File::open(&path)?);
        let mapping: FieldMapping = serde_json::from_reader(reader)?;
        for (field, column) in mapping.iter() {
            session.set_mapping(field, column)?;
        }
    }
    if accept_high {
        let accepted = session.accept_high_confidence()?;
        println!("Accepted {} high-confidence suggestion(s)", accepted);
    }

    let validation = session.validate_mapping();
    for (field, column) in &validation.unknown_columns {
        println!(
            "{} '{}' is mapped to '{}', which is not in the table header",
            "warning:".yellow().bold(),
            field,
            column
        );
    }
    if !validation.is_valid() {
        println!(
            "{} {}",
            "Unmapped required fields:".red().bold(),
            validation.missing_required.join(", ")
        );
    }

    print_outcome(&session.apply_mapping()?);
    for (field, column) in session.mapping().iter() {
        println!("  {} ← {}", field.white(), column);
    }
    Ok(())
}
