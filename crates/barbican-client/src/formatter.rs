//! Display formatting for entities
//!
//! Every entity exposes a fixed list of column names and one row of values.
//! Rows may need the lazy load, so [`Formatted::row`] is async. The render
//! functions themselves are pure.

use std::fmt::Write as _;
use std::str::FromStr;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;

/// Something that can be shown as a `Field | Value` table or a list row
#[async_trait]
pub trait Formatted: Send {
    /// Column names for the detailed view
    fn columns(&self) -> &'static [&'static str];

    /// Values for [`Formatted::columns`], in the same order
    async fn row(&mut self) -> Result<Vec<Option<String>>>;

    /// Column names when shown in a list next to other variants
    fn list_columns(&self) -> &'static [&'static str] {
        self.columns()
    }

    /// Values for [`Formatted::list_columns`]
    async fn list_row(&mut self) -> Result<Vec<Option<String>>> {
        self.row().await
    }
}

/// Output format selected on the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Value,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "value" => Ok(Self::Value),
            other => Err(format!(
                "unknown format '{other}' (expected table, json or value)"
            )),
        }
    }
}

/// Render one entity
pub async fn format_entity<T: Formatted + ?Sized>(
    entity: &mut T,
    format: OutputFormat,
) -> Result<String> {
    let row = entity.row().await?;
    Ok(render_entity(entity.columns(), &row, format))
}

/// Render a list of entities using the first item's list columns
pub async fn format_list<T: Formatted>(items: &mut [T], format: OutputFormat) -> Result<String> {
    let columns = items.first().map(|i| i.list_columns()).unwrap_or(&[]);
    let mut rows = Vec::with_capacity(items.len());
    for item in items.iter_mut() {
        rows.push(item.list_row().await?);
    }
    Ok(render_list(columns, &rows, format))
}

pub fn render_entity(columns: &[&str], row: &[Option<String>], format: OutputFormat) -> String {
    match format {
        OutputFormat::Table => {
            let rows: Vec<Vec<Option<String>>> = columns
                .iter()
                .zip(row)
                .map(|(name, value)| vec![Some(name.to_string()), value.clone()])
                .collect();
            table(&["Field", "Value"], &rows)
        }
        OutputFormat::Json => pretty(&Value::Object(json_row(columns, row))),
        OutputFormat::Value => value_line(row),
    }
}

pub fn render_list(columns: &[&str], rows: &[Vec<Option<String>>], format: OutputFormat) -> String {
    match format {
        OutputFormat::Table if columns.is_empty() => String::new(),
        OutputFormat::Table => table(columns, rows),
        OutputFormat::Json => pretty(&Value::Array(
            rows.iter()
                .map(|row| Value::Object(json_row(columns, row)))
                .collect(),
        )),
        OutputFormat::Value => rows
            .iter()
            .map(|row| value_line(row))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn json_row(columns: &[&str], row: &[Option<String>]) -> Map<String, Value> {
    columns
        .iter()
        .zip(row)
        .map(|(name, value)| {
            let value = value.clone().map(Value::String).unwrap_or(Value::Null);
            (name.to_string(), value)
        })
        .collect()
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn value_line(row: &[Option<String>]) -> String {
    row.iter()
        .map(|v| v.as_deref().unwrap_or_default())
        .collect::<Vec<_>>()
        .join("\t")
}

/// Boxed table; cells may span several lines
fn table(header: &[&str], rows: &[Vec<Option<String>>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            let widest = cell
                .as_deref()
                .unwrap_or_default()
                .lines()
                .map(|l| l.chars().count())
                .max()
                .unwrap_or(0);
            widths[i] = widths[i].max(widest);
        }
    }

    let border = widths.iter().fold(String::from("+"), |mut acc, w| {
        acc.push_str(&"-".repeat(w + 2));
        acc.push('+');
        acc
    });

    let mut out = String::new();
    let _ = writeln!(out, "{border}");
    write_line(&mut out, &widths, header.iter().copied());
    let _ = writeln!(out, "{border}");
    for row in rows {
        let cells: Vec<Vec<&str>> = (0..widths.len())
            .map(|i| {
                row.get(i)
                    .and_then(|c| c.as_deref())
                    .map(|c| c.lines().collect())
                    .unwrap_or_default()
            })
            .collect();
        let height = cells.iter().map(Vec::len).max().unwrap_or(0).max(1);
        for line in 0..height {
            write_line(
                &mut out,
                &widths,
                cells.iter().map(|c| c.get(line).copied().unwrap_or_default()),
            );
        }
    }
    out.push_str(&border);
    out
}

fn write_line<'a>(out: &mut String, widths: &[usize], cells: impl Iterator<Item = &'a str>) {
    out.push('|');
    for (cell, width) in cells.zip(widths) {
        let pad = width - cell.chars().count();
        let _ = write!(out, " {cell}{} |", " ".repeat(pad));
    }
    out.push('\n');
}
