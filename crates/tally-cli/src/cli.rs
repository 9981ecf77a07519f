//! CLI argument definitions using clap.

use chrono::NaiveDate;
use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

/// Tally: review machine-extracted statement tables
#[derive(Parser)]
#[command(name = "tally")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding sessions, decisions and learned mappings
    #[arg(long, global = true, default_value = ".tally")]
    pub store: PathBuf,

    /// Review configuration file (JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Reviewer id recorded on snapshots and decisions
    #[arg(long, global = true, default_value = "cli")]
    pub actor: String,

    /// Enable verbose output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a review session from an extraction result
    Ingest {
        /// Extraction result JSON
        #[arg(value_name = "EXTRACTION_JSON")]
        extraction: PathBuf,

        /// Upload id for the session
        #[arg(long)]
        upload_id: String,

        /// Original document reference (default: the extraction path)
        #[arg(long)]
        file: Option<String>,

        /// Environment id
        #[arg(long)]
        env: Option<String>,
    },

    /// Show session step, tables and mapping
    Status {
        /// Upload id
        #[arg(value_name = "UPLOAD_ID")]
        upload_id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Detect summary rows and save
    Classify {
        /// Upload id
        #[arg(value_name = "UPLOAD_ID")]
        upload_id: String,

        /// Table to classify (default: every table)
        #[arg(long)]
        table: Option<usize>,

        /// Also flag rows similar to this row of the table
        #[arg(long, requires = "table")]
        similar_to: Option<usize>,
    },

    /// Map columns onto canonical fields and move to the dashboard
    #[command(group(ArgGroup::new("how").args(["mapping", "skip"])))]
    Map {
        /// Upload id
        #[arg(value_name = "UPLOAD_ID")]
        upload_id: String,

        /// Mapping file: a JSON object of field key to source column
        #[arg(long)]
        mapping: Option<PathBuf>,

        /// Accept every high-confidence suggestion
        #[arg(long, conflicts_with = "skip")]
        accept_high: bool,

        /// Skip mapping and keep the extracted headers
        #[arg(long)]
        skip: bool,
    },

    /// Approve, reject or park a reviewed document
    #[command(group(ArgGroup::new("decision").args(["approve", "reject", "pending"]).required(true)))]
    Decide {
        /// Upload id
        #[arg(value_name = "UPLOAD_ID")]
        upload_id: String,

        /// Approve the document
        #[arg(long)]
        approve: bool,

        /// Reject the document with a reason
        #[arg(long, value_name = "REASON")]
        reject: Option<String>,

        /// Send the document to pending
        #[arg(long)]
        pending: bool,

        /// Statement date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Carrier name
        #[arg(long)]
        carrier: Option<String>,
    },

    /// Write canonical rows as CSV
    Export {
        /// Upload id
        #[arg(value_name = "UPLOAD_ID")]
        upload_id: String,

        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Leave summary rows out
        #[arg(long)]
        no_summary: bool,
    },
}
