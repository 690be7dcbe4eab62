//! Read-only view over a completed extraction.
//!
//! Header fields come from `formData`; line items from `tableData`, one row
//! per inner sequence. Nothing here mutates the record.

use std::collections::HashMap;
use std::fmt;

use crate::models::{DocumentRecord, FieldResult};

/// Column whose values carry the line item's matching status
pub const ITEM_STATUS_COLUMN: &str = "itemStatus";

/// Outcome of matching a line item, classified from the status cell text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Mismatch,
    Matched,
    Unknown,
    Other,
}

impl ItemStatus {
    /// Case-insensitive substring classification; "mismatch" wins over "matched".
    pub fn classify(value: &str) -> Self {
        let value = value.to_lowercase();
        if value.contains("mismatch") {
            ItemStatus::Mismatch
        } else if value.contains("matched") || value.contains("success") {
            ItemStatus::Matched
        } else if value.contains("unknown") {
            ItemStatus::Unknown
        } else {
            ItemStatus::Other
        }
    }
}

/// One extracted value with its presentation metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedValue {
    pub column_name: String,
    pub display_name: String,
    pub value: String,
    pub confidence_score: f64,
    pub exception: bool,
}

impl ExtractedValue {
    /// Confidence worth showing, if any
    pub fn confidence(&self) -> Option<f64> {
        (self.confidence_score > 0.0).then_some(self.confidence_score)
    }

    /// Status classification, only for the item status column
    pub fn item_status(&self) -> Option<ItemStatus> {
        (self.column_name == ITEM_STATUS_COLUMN).then(|| ItemStatus::classify(&self.value))
    }

    /// Text as shown in a table cell: matched statuses are normalized to `MATCHED`
    pub fn display_value(&self) -> &str {
        match self.item_status() {
            Some(ItemStatus::Matched) => "MATCHED",
            _ => &self.value,
        }
    }
}

impl From<&FieldResult> for ExtractedValue {
    fn from(field: &FieldResult) -> Self {
        Self {
            column_name: field.column_name.clone(),
            display_name: field.display_name.clone(),
            value: field.column_value.clone(),
            confidence_score: field.confidence_score,
            exception: field.assess_exception,
        }
    }
}

/// Header fields in extraction order, addressable by column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderFields {
    fields: Vec<ExtractedValue>,
    index: HashMap<String, usize>,
}

impl HeaderFields {
    pub fn parse(form_data: &[FieldResult]) -> Self {
        let mut header = Self::default();
        for field in form_data {
            let value = ExtractedValue::from(field);
            // Later duplicates win the lookup, as a keyed object would
            header
                .index
                .insert(value.column_name.clone(), header.fields.len());
            header.fields.push(value);
        }
        header
    }

    pub fn by_column(&self, column_name: &str) -> Option<&ExtractedValue> {
        self.index.get(column_name).map(|&i| &self.fields[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtractedValue> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A numbered line item
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemRow {
    /// 1-based
    pub row_number: usize,
    pub cells: Vec<ExtractedValue>,
}

impl LineItemRow {
    pub fn cell(&self, column_name: &str) -> Option<&ExtractedValue> {
        self.cells.iter().rev().find(|c| c.column_name == column_name)
    }

    pub fn status(&self) -> Option<ItemStatus> {
        self.cell(ITEM_STATUS_COLUMN).and_then(ExtractedValue::item_status)
    }
}

pub fn parse_line_items(table_data: &[Vec<FieldResult>]) -> Vec<LineItemRow> {
    table_data
        .iter()
        .enumerate()
        .map(|(i, row)| LineItemRow {
            row_number: i + 1,
            cells: row.iter().map(ExtractedValue::from).collect(),
        })
        .collect()
}

/// Everything extracted from one document, ready to display
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentView {
    pub header: HeaderFields,
    /// Display names from the first row
    pub columns: Vec<String>,
    pub rows: Vec<LineItemRow>,
}

impl DocumentView {
    pub fn from_record(record: &DocumentRecord) -> Self {
        let rows = parse_line_items(&record.data.table_data);
        let columns = rows
            .first()
            .map(|row| row.cells.iter().map(|c| c.display_name.clone()).collect())
            .unwrap_or_default();
        Self {
            header: HeaderFields::parse(&record.data.form_data),
            columns,
            rows,
        }
    }

    pub fn mismatches(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| row.status() == Some(ItemStatus::Mismatch))
            .count()
    }
}

impl fmt::Display for DocumentView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Header Information ({} data fields detected)",
            self.header.len()
        )?;
        let label_width = self
            .header
            .iter()
            .map(|h| h.display_name.chars().count())
            .max()
            .unwrap_or(0);
        for field in self.header.iter() {
            write!(f, "  {:<label_width$}  {}", field.display_name, field.value)?;
            if let Some(confidence) = field.confidence() {
                write!(f, "  ({}%)", confidence)?;
            }
            if field.exception {
                write!(f, "  [exception]")?;
            }
            writeln!(f)?;
        }

        writeln!(f)?;
        writeln!(f, "Line Item Information ({} items detected)", self.rows.len())?;
        if self.rows.is_empty() {
            return Ok(());
        }

        let mut table: Vec<Vec<&str>> = Vec::with_capacity(self.rows.len() + 1);
        let numbers: Vec<String> = self.rows.iter().map(|r| r.row_number.to_string()).collect();
        table.push(
            std::iter::once("No")
                .chain(self.columns.iter().map(String::as_str))
                .collect(),
        );
        for (row, number) in self.rows.iter().zip(&numbers) {
            table.push(
                std::iter::once(number.as_str())
                    .chain(row.cells.iter().map(ExtractedValue::display_value))
                    .collect(),
            );
        }

        let width_count = table.iter().map(Vec::len).max().unwrap_or(0);
        let widths: Vec<usize> = (0..width_count)
            .map(|col| {
                table
                    .iter()
                    .filter_map(|line| line.get(col))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        for line in &table {
            let rendered: Vec<String> = line
                .iter()
                .zip(&widths)
                .map(|(cell, &width)| format!("{:<width$}", cell))
                .collect();
            writeln!(f, "  {}", rendered.join("  ").trim_end())?;
        }
        Ok(())
    }
}
