//! Rendering a [`Run`] to the console or to a CSV file.

use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

use crate::errors::{Error, Result};
use crate::types::{CostRecord, Run};

/// Label of the trailing totals row in CSV output
pub const TOTAL_ROW_LABEL: &str = "TOTAL";

/// Where a report is written.
#[derive(Debug, Clone, PartialEq)]
pub enum Destination {
    /// Table of the `top` most expensive functions on stdout
    Console { top: usize },
    /// Every record, overwriting the file at `path`
    Csv { path: PathBuf },
}

/// One CSV row. The trailing totals row leaves the per-function columns empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvRow {
    pub function: String,
    pub region: String,
    pub memory_mb: Option<u32>,
    pub invocations: u64,
    pub avg_duration_ms: Option<f64>,
    pub window_cost: f64,
    pub monthly_cost: f64,
}

impl From<&CostRecord> for CsvRow {
    fn from(record: &CostRecord) -> Self {
        Self {
            function: record.descriptor.name.clone(),
            region: record.descriptor.region.clone(),
            memory_mb: Some(record.descriptor.memory_size_mb),
            invocations: record.sample.invocation_count,
            avg_duration_ms: Some(record.sample.average_duration_ms),
            window_cost: record.window_cost,
            monthly_cost: record.estimated_monthly_cost,
        }
    }
}

pub fn render(run: &Run, destination: &Destination) -> Result<()> {
    match destination {
        Destination::Console { top } => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            write_console(run, *top, &mut out).map_err(|source| Error::Render {
                destination: "stdout".to_string(),
                source,
            })
        }
        Destination::Csv { path } => {
            let render_error = |source: io::Error| Error::Render {
                destination: path.display().to_string(),
                source,
            };

            let mut file = BufWriter::new(File::create(path).map_err(render_error)?);
            write_csv(run, &mut file).map_err(render_error)?;
            file.flush().map_err(render_error)?;
            info!(path = %path.display(), rows = run.records.len(), "Wrote CSV report");

            let stdout = io::stdout();
            let mut out = stdout.lock();
            writeln!(out, "Wrote {} functions to {}", run.records.len(), path.display())
                .and_then(|_| write_summary(run, &mut out))
                .map_err(|source| Error::Render {
                    destination: "stdout".to_string(),
                    source,
                })
        }
    }
}

/// Table of the `top` most expensive functions, then totals and the skipped count.
pub fn write_console<W: Write>(run: &Run, top: usize, out: &mut W) -> io::Result<()> {
    if run.records.is_empty() {
        if run.skipped.is_empty() {
            writeln!(out, "No functions found")?;
        } else {
            writeln!(out, "No functions could be priced")?;
        }
    } else {
        let ranked = run.by_cost_descending();
        let shown = &ranked[..top.min(ranked.len())];
        writeln!(out, "{}", cost_table(shown, run))?;

        if shown.len() < ranked.len() {
            writeln!(out, "Showing top {} of {} functions (use --csv for the full report)", shown.len(), ranked.len())?;
        }
    }

    write_summary(run, out)
}

fn cost_table(records: &[&CostRecord], run: &Run) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Function").fg(Color::Cyan),
        Cell::new("Region").fg(Color::Cyan),
        Cell::new("Memory (MB)").fg(Color::Cyan),
        Cell::new("Invocations").fg(Color::Cyan),
        Cell::new("Avg Duration (ms)").fg(Color::Cyan),
        Cell::new(format!("Cost in {} ($)", run.window)).fg(Color::Cyan),
        Cell::new("Monthly Estimate ($)").fg(Color::Cyan),
    ]);

    for record in records {
        table.add_row(vec![
            Cell::new(&record.descriptor.name),
            Cell::new(&record.descriptor.region),
            Cell::new(record.descriptor.memory_size_mb),
            Cell::new(record.sample.invocation_count),
            Cell::new(format!("{:.1}", record.sample.average_duration_ms)),
            Cell::new(format!("{:.3}", record.window_cost)),
            Cell::new(format!("{:.3}", record.estimated_monthly_cost)),
        ]);
    }

    for index in 2..7 {
        if let Some(column) = table.column_mut(index) {
            column.set_cell_alignment(CellAlignment::Right);
        }
    }

    table
}

fn write_summary<W: Write>(run: &Run, out: &mut W) -> io::Result<()> {
    writeln!(out, "Total monthly cost estimation: ${:.3}", run.total_cost)?;
    if run.skipped.is_empty() {
        writeln!(out, "Skipped functions: 0")
    } else {
        writeln!(
            out,
            "Warning: {} function(s) skipped because their metrics could not be fetched",
            run.skipped_count()
        )
    }
}

/// Every record with full precision, followed by a totals row.
pub fn write_csv<W: Write>(run: &Run, out: W) -> io::Result<()> {
    let mut writer = csv::Writer::from_writer(out);

    for record in &run.records {
        writer.serialize(CsvRow::from(record))?;
    }
    writer.serialize(CsvRow {
        function: TOTAL_ROW_LABEL.to_string(),
        region: String::new(),
        memory_mb: None,
        invocations: run.total_invocations(),
        avg_duration_ms: None,
        window_cost: run.total_window_cost(),
        monthly_cost: run.total_cost,
    })?;

    writer.flush()
}
