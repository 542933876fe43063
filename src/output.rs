//! Writes the ordered, filtered result set to CSV and to the console.

use anyhow::{Context, Result};
use colored::Colorize;

use crate::report::DelaySet;

const CSV_HEADER: [&str; 3] = ["IP:Port", "Loss", "Latency"];

/// Writes the result set to `path`. An empty path or an empty set skips the
/// file entirely.
pub fn export_csv(set: &DelaySet, path: &str) -> Result<()> {
    if path.trim().is_empty() || set.is_empty() {
        return Ok(());
    }

    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("could not create {path:?}"))?;
    writer.write_record(CSV_HEADER)?;
    for record in set.iter() {
        writer.write_record(record.to_row())?;
    }
    writer.flush()?;
    Ok(())
}

/// Prints up to `print_num` rows of the result set as an aligned table.
///
/// An empty set prints a notice and returns; `print_num == 0` prints nothing
/// at all. "No results" is a normal outcome, not an error.
pub fn print_results(set: &DelaySet, print_num: usize, output: &str, accessible: bool) {
    if print_num == 0 {
        return;
    }
    if set.is_empty() {
        println!("No endpoint produced a valid handshake reply, skipping output.");
        return;
    }

    let rows: Vec<[String; 3]> = set.iter().take(print_num).map(|r| r.to_row()).collect();

    // IPv6 endpoints need a wider first column.
    let wide = rows.iter().any(|row| row[0].len() > 15);
    let addr_width = if wide { 45 } else { 25 };

    println!(
        "\n{:<addr_width$}{:<9}{:<10}",
        CSV_HEADER[0], CSV_HEADER[1], CSV_HEADER[2]
    );
    for row in &rows {
        // pad before colouring so ANSI escapes don't skew the columns
        let addr = format!("{:<addr_width$}", row[0]);
        if accessible {
            println!("{addr}{:<9}{:<10}", row[1], row[2]);
        } else {
            println!("{}{:<9}{:<10}", addr.green(), row[1], row[2]);
        }
    }

    if !output.trim().is_empty() {
        println!("\nResults written to {output}.");
    }
}
