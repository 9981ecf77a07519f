//! Decide command - approve, reject or park a reviewed document.

use chrono::NaiveDate;
use colored::Colorize;
use tally::session::CompletionStatus;
use tally::WorkflowStep;

use super::{print_outcome, CmdResult, Env};

/// What to do with the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject(String),
    Pending,
}

pub fn run(
    env: &Env,
    upload_id: &str,
    decision: Decision,
    date: Option<NaiveDate>,
    carrier: Option<String>,
) -> CmdResult {
    let mut session = env.resume(upload_id)?;

    if date.is_some() {
        session.set_statement_date(date)?;
    }
    if carrier.is_some() {
        session.set_carrier(carrier)?;
    }

    let result = match &decision {
        Decision::Approve => session.approve(),
        Decision::Reject(reason) => session.reject(reason),
        Decision::Pending => session.send_to_pending(),
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            // Keep the date and carrier for the next attempt.
            session.on_page_exit();
            return Err(e.into());
        }
    };

    print_outcome(&outcome);
    match outcome.step {
        WorkflowStep::Completed(CompletionStatus::Approved) => {
            println!(
                "Run {} to write the canonical rows.",
                format!("tally export {}", upload_id).cyan().bold()
            );
        }
        WorkflowStep::Pending => {
            println!(
                "Run {} later to pick it up again.",
                format!("tally status {}", upload_id).cyan().bold()
            );
        }
        _ => {}
    }
    Ok(())
}
