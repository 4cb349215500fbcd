//! Tab-delimited metadata upload.
//!
//! Parsing is separated from applying so a malformed file is rejected before
//! any metadata is touched.

use petgraph::stable_graph::NodeIndex;
use serde::Serialize;
use thiserror::Error;

use super::{AttributeKind, Metadata, Value};
use crate::error::UploadError;
use crate::tree::PhyloTree;

/// Non-fatal problem with a single row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum UploadWarning {
    #[error("line {line}: unknown node id `{id}`, row skipped")]
    UnknownNode { line: usize, id: String },
}

/// Summary of an applied upload, handed back to JavaScript.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub attributes: Vec<String>,
    pub rows_applied: usize,
    pub warnings: Vec<UploadWarning>,
}

/// One uploaded column with its inferred kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    /// `None` when every cell of the column is blank.
    pub kind: Option<AttributeKind>,
}

/// A validated upload ready to be merged.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedUpload {
    pub columns: Vec<Column>,
    pub rows: Vec<(NodeIndex, Vec<Value>)>,
    pub warnings: Vec<UploadWarning>,
    pub had_header: bool,
}

/// Parse and validate tab-delimited text against the tree's node ids.
///
/// The first line is a header unless its first cell is a known node id.
/// Blank lines are ignored. Every remaining line must contain a tab and the
/// same number of cells as the first line.
pub fn parse_upload(text: &str, tree: &PhyloTree) -> Result<ParsedUpload, UploadError> {
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.trim().is_empty())
        .collect();

    let Some(&(_, first)) = lines.first() else {
        return Err(UploadError::Empty);
    };
    let expected = first.split('\t').count();

    let mut table: Vec<(usize, Vec<&str>)> = Vec::with_capacity(lines.len());
    for &(line, content) in &lines {
        if !content.contains('\t') {
            return Err(UploadError::NoTabDelimiter { line });
        }
        let cells: Vec<&str> = content.split('\t').map(str::trim).collect();
        if cells.len() != expected {
            return Err(UploadError::ColumnMismatch {
                line,
                expected,
                found: cells.len(),
            });
        }
        table.push((line, cells));
    }

    let had_header = tree.index_of(table[0].1[0]).is_none();
    let names: Vec<String> = if had_header {
        table[0].1[1..]
            .iter()
            .enumerate()
            .map(|(k, name)| {
                if name.is_empty() {
                    format!("column_{}", k + 1)
                } else {
                    (*name).to_string()
                }
            })
            .collect()
    } else {
        (1..expected).map(|k| format!("column_{k}")).collect()
    };
    let body = if had_header { &table[1..] } else { &table[..] };

    let mut known: Vec<(NodeIndex, &[&str])> = Vec::with_capacity(body.len());
    let mut warnings = Vec::new();
    for (line, cells) in body {
        match tree.index_of(cells[0]) {
            Some(node) => known.push((node, &cells[1..])),
            None => {
                let warning = UploadWarning::UnknownNode {
                    line: *line,
                    id: cells[0].to_string(),
                };
                log::warn!("{warning}");
                warnings.push(warning);
            }
        }
    }

    let columns: Vec<Column> = names
        .into_iter()
        .enumerate()
        .map(|(k, name)| {
            let mut filled = known.iter().map(|(_, cells)| cells[k]).filter(|c| !c.is_empty());
            let mut any = false;
            let numeric = filled.all(|cell| {
                any = true;
                cell.parse::<f64>().is_ok()
            });
            let kind = match (any, numeric) {
                (false, _) => None,
                (true, true) => Some(AttributeKind::Numeric),
                (true, false) => Some(AttributeKind::Categorical),
            };
            Column { name, kind }
        })
        .collect();

    let rows = known
        .into_iter()
        .map(|(node, cells)| {
            let values = cells
                .iter()
                .zip(&columns)
                .map(|(cell, column)| match column.kind {
                    _ if cell.is_empty() => Value::Null,
                    Some(AttributeKind::Numeric) => Value::from_cell(cell),
                    _ => Value::Categorical((*cell).to_string()),
                })
                .collect();
            (node, values)
        })
        .collect();

    Ok(ParsedUpload {
        columns,
        rows,
        warnings,
        had_header,
    })
}

impl Metadata {
    /// Merge a validated upload, column by column. Columns with no values
    /// are skipped and blank cells leave existing values alone.
    pub fn apply_upload(&mut self, upload: ParsedUpload) -> UploadReport {
        let ParsedUpload {
            columns,
            rows,
            warnings,
            ..
        } = upload;

        let mut attributes = Vec::with_capacity(columns.len());
        for (k, column) in columns.into_iter().enumerate() {
            let Some(kind) = column.kind else {
                log::debug!("column `{}` has no values, skipped", column.name);
                continue;
            };
            let cells = rows.iter().map(|(node, values)| (*node, values[k].clone()));
            self.merge_column(&column.name, kind, cells);
            attributes.push(column.name);
        }

        log::info!(
            "applied metadata upload: {} rows, {} columns, {} warnings",
            rows.len(),
            attributes.len(),
            warnings.len()
        );

        UploadReport {
            attributes,
            rows_applied: rows.len(),
            warnings,
        }
    }
}
