//! Export command - write canonical rows as CSV.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use colored::Colorize;
use tally::session::ProgressService;
use tally::Table;

use super::{CmdResult, Env};

pub fn run(env: &Env, upload_id: &str, output: Option<PathBuf>, no_summary: bool) -> CmdResult {
    let tables = final_tables(env, upload_id)?;
    if tables.is_empty() {
        return Err(format!("'{}' has no tables to export", upload_id).into());
    }

    let writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };
    let written = write_csv(writer, &tables, !no_summary)?;

    if let Some(path) = output {
        eprintln!(
            "{} {} row(s) to {}",
            "Wrote".green().bold(),
            written,
            path.display()
        );
    }
    Ok(())
}

/// Mapped tables of the session, or of the last decision once completed.
fn final_tables(env: &Env, upload_id: &str) -> Result<Vec<Table>, Box<dyn std::error::Error>> {
    if let Some(snapshot) = env.store().load(upload_id, None)? {
        return match snapshot.payload.final_data {
            Some(tables) => Ok(tables),
            None => Err(format!(
                "'{}' is at {}; run 'tally map {}' first",
                upload_id,
                snapshot.step.label().to_lowercase(),
                upload_id
            )
            .into()),
        };
    }

    match env.store().decisions(upload_id)?.last() {
        Some(record) => Ok(record.request().final_data.clone()),
        None => Err(format!("No session found for '{}'", upload_id).into()),
    }
}

/// Write every table under the first table's header.
///
/// A leading `table` column is added when there is more than one table and a
/// trailing `summary` column when summary rows are included.
fn write_csv<W: Write>(writer: W, tables: &[Table], with_summary: bool) -> Result<usize, Box<dyn std::error::Error>> {
    let mut csv = csv::Writer::from_writer(writer);
    let multi = tables.len() > 1;

    let mut header: Vec<&str> = Vec::new();
    if multi {
        header.push("table");
    }
    header.extend(tables[0].header.iter().map(String::as_str));
    if with_summary {
        header.push("summary");
    }
    csv.write_record(&header)?;

    let mut written = 0;
    for (index, table) in tables.iter().enumerate() {
        let label = table.name.clone().unwrap_or_else(|| index.to_string());
        for (row_index, row) in table.rows.iter().enumerate() {
            let is_summary = table.is_summary_row(row_index);
            if is_summary && !with_summary {
                continue;
            }

            let mut record: Vec<&str> = Vec::with_capacity(header.len());
            if multi {
                record.push(&label);
            }
            record.extend(row.iter().map(String::as_str));
            if with_summary {
                record.push(if is_summary { "true" } else { "false" });
            }
            csv.write_record(&record)?;
            written += 1;
        }
    }

    csv.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_write_csv_flags_summary_rows() {
        let table = Table::new(
            s(&["agent_name", "commission"]),
            vec![s(&["Alice", "120.00"]), s(&["Total", "120.00"])],
        )
        .with_summary_rows([1]);

        let mut out = Vec::new();
        let written = write_csv(&mut out, &[table.clone()], true).unwrap();
        assert_eq!(written, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "agent_name,commission,summary\nAlice,120.00,false\nTotal,120.00,true\n"
        );

        let mut out = Vec::new();
        assert_eq!(write_csv(&mut out, &[table], false).unwrap(), 1);
    }

    #[test]
    fn test_write_csv_labels_tables() {
        let tables = vec![
            Table::new(s(&["agent_name"]), vec![s(&["Alice"])]).with_name("West"),
            Table::new(s(&["agent_name"]), vec![s(&["Bob"])]),
        ];
        let mut out = Vec::new();
        write_csv(&mut out, &tables, false).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "table,agent_name\nWest,Alice\n1,Bob\n");
    }
}
