//! Result Formatter
//!
//! Renders an `ExecutionOutcome` as chat-ready text: a pipe-delimited table
//! for rows, a one-line confirmation for writes, a tagged diagnostic for
//! failures.

use crate::db::RowSet;
use crate::execution::result::ExecutionOutcome;
use itertools::Itertools;
use serde_json::Value;

pub const NO_RESULTS: &str = "No results found.";

#[derive(Debug, Clone)]
pub struct ResultFormatter {
    /// Rendered as the value of SQL NULL cells
    pub null_text: String,
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self {
            null_text: String::new(),
        }
    }
}

impl ResultFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(&self, outcome: &ExecutionOutcome) -> String {
        match outcome {
            ExecutionOutcome::Rows(rows) if rows.is_empty() => NO_RESULTS.to_string(),
            ExecutionOutcome::Rows(rows) => self.table(rows),
            ExecutionOutcome::Affected(n) => {
                format!("Query executed successfully ({} rows affected).", n)
            }
            ExecutionOutcome::Failure(diagnostic) => {
                format!("[{}] {}", diagnostic.kind.tag(), diagnostic)
            }
        }
    }

    fn table(&self, rows: &RowSet) -> String {
        let cells: Vec<Vec<String>> = rows
            .rows
            .iter()
            .map(|row| row.iter().map(|v| self.cell(v)).collect())
            .collect();

        let mut widths: Vec<usize> = rows.columns.iter().map(|c| c.chars().count()).collect();
        for row in &cells {
            for (idx, cell) in row.iter().enumerate() {
                if let Some(width) = widths.get_mut(idx) {
                    *width = (*width).max(cell.chars().count());
                }
            }
        }

        let mut lines = Vec::with_capacity(cells.len() + 2);
        lines.push(render_line(&rows.columns, &widths));
        lines.push(format!(
            "|{}|",
            widths.iter().map(|w| "-".repeat(w + 2)).join("|")
        ));
        for row in &cells {
            lines.push(render_line(row, &widths));
        }
        lines.join("\n")
    }

    fn cell(&self, value: &Value) -> String {
        match value {
            Value::Null => self.null_text.clone(),
            Value::String(s) => s.replace('\n', " ").replace('|', "\\|"),
            other => other.to_string(),
        }
    }
}

fn render_line(cells: &[String], widths: &[usize]) -> String {
    let padded: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(idx, width)| {
            let cell = cells.get(idx).map(String::as_str).unwrap_or("");
            let pad = width.saturating_sub(cell.chars().count());
            format!(" {}{} ", cell, " ".repeat(pad))
        })
        .collect();
    format!("|{}|", padded.join("|"))
}
