//! File body variants.
//!
//! # Responsibility
//! - Hold the serialized state of text, table and list documents.
//! - Keep column width ratios normalized across structural edits.
//!
//! # Invariants
//! - The variant of a file body never changes after creation.
//! - After `add_column`/`delete_column`, ratios sum to 1.0.
//! - Structural edits keep exactly one cell per header in every row.

use serde::{Deserialize, Serialize};

/// Row ordering applied by `TableBody::set_sorting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileBody {
    Text(TextBody),
    Table(TableBody),
    List(ListBody),
}

impl FileBody {
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Table(_) => "table",
            Self::List(_) => "list",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextBody {
    pub text: String,
}

impl TextBody {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableHeader {
    pub title: String,
    /// Relative width in `[0, 1]`.
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableBody {
    headers: Vec<TableHeader>,
    rows: Vec<Vec<String>>,
    sort_column: usize,
    sort_direction: SortDirection,
}

impl TableBody {
    /// Creates `columns` equally wide headers (at least one) and one empty row.
    pub fn with_columns(columns: usize) -> Self {
        let count = columns.max(1);
        let ratio = 1.0 / count as f64;
        let headers = (1..=count)
            .map(|index| TableHeader {
                title: format!("Header {index}"),
                ratio,
            })
            .collect();
        Self {
            headers,
            rows: vec![vec![String::new(); count]],
            sort_column: 0,
            sort_direction: SortDirection::Ascending,
        }
    }

    /// Restores a persisted table as-is. Rows are expected to be as wide as
    /// `headers`; the record serializer refuses tables where they are not.
    pub fn from_parts(
        headers: Vec<TableHeader>,
        rows: Vec<Vec<String>>,
        sort_column: usize,
        sort_direction: SortDirection,
    ) -> Self {
        Self {
            headers,
            rows,
            sort_column,
            sort_direction,
        }
    }

    pub fn headers(&self) -> &[TableHeader] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn sort_column(&self) -> usize {
        self.sort_column
    }

    pub fn sort_direction(&self) -> SortDirection {
        self.sort_direction
    }

    pub fn add_row(&mut self) {
        self.rows.push(vec![String::new(); self.headers.len()]);
    }

    pub fn set_cell(&mut self, row: usize, column: usize, text: impl Into<String>) -> bool {
        match self.rows.get_mut(row).and_then(|cells| cells.get_mut(column)) {
            Some(cell) => {
                *cell = text.into();
                true
            }
            None => false,
        }
    }

    pub fn set_header_title(&mut self, column: usize, title: impl Into<String>) -> bool {
        match self.headers.get_mut(column) {
            Some(header) => {
                header.title = title.into();
                true
            }
            None => false,
        }
    }

    pub fn add_column(&mut self) {
        let ratio = insert_ratio(self.headers.iter_mut().map(|header| &mut header.ratio));
        let title = format!("Header {}", self.headers.len() + 1);
        self.headers.push(TableHeader { title, ratio });
        for row in &mut self.rows {
            row.push(String::new());
        }
    }

    /// Removes one column. The last remaining column cannot be deleted.
    pub fn delete_column(&mut self, column: usize) -> bool {
        if self.headers.len() <= 1 || column >= self.headers.len() {
            return false;
        }
        self.headers.remove(column);
        normalize_ratios(self.headers.iter_mut().map(|header| &mut header.ratio));
        for row in &mut self.rows {
            if column < row.len() {
                row.remove(column);
            }
        }
        if self.sort_column > column || (self.sort_column == column && column > 0) {
            self.sort_column -= 1;
        }
        true
    }

    pub fn move_column(&mut self, from: usize, to: usize) -> bool {
        let count = self.headers.len();
        if from >= count || to >= count || from == to {
            return false;
        }
        let header = self.headers.remove(from);
        self.headers.insert(to, header);
        for row in &mut self.rows {
            if from < row.len() && to < row.len() {
                let cell = row.remove(from);
                row.insert(to, cell);
            }
        }
        self.sort_column = moved_index(self.sort_column, from, to);
        true
    }

    /// Sorts rows by one column's text. Out-of-range columns are rejected.
    pub fn set_sorting(&mut self, column: usize, direction: SortDirection) -> bool {
        if column >= self.headers.len() {
            return false;
        }
        self.sort_column = column;
        self.sort_direction = direction;
        self.rows.sort_by(|left, right| {
            let ordering = left
                .get(column)
                .map(String::as_str)
                .unwrap_or("")
                .cmp(right.get(column).map(String::as_str).unwrap_or(""));
            match direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListColumn {
    pub title: String,
    pub text: String,
    /// Relative width in `[0, 1]`.
    pub ratio: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListBody {
    columns: Vec<ListColumn>,
}

impl ListBody {
    pub fn with_columns(columns: usize) -> Self {
        let count = columns.max(1);
        let ratio = 1.0 / count as f64;
        Self {
            columns: (1..=count)
                .map(|index| ListColumn {
                    title: format!("Column {index}"),
                    text: String::new(),
                    ratio,
                })
                .collect(),
        }
    }

    pub fn from_columns(columns: Vec<ListColumn>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[ListColumn] {
        &self.columns
    }

    pub fn add_column(&mut self) {
        let ratio = insert_ratio(self.columns.iter_mut().map(|column| &mut column.ratio));
        let title = format!("Column {}", self.columns.len() + 1);
        self.columns.push(ListColumn {
            title,
            text: String::new(),
            ratio,
        });
    }

    pub fn delete_column(&mut self, column: usize) -> bool {
        if self.columns.len() <= 1 || column >= self.columns.len() {
            return false;
        }
        self.columns.remove(column);
        normalize_ratios(self.columns.iter_mut().map(|column| &mut column.ratio));
        true
    }

    pub fn set_column_text(&mut self, column: usize, text: impl Into<String>) -> bool {
        match self.columns.get_mut(column) {
            Some(entry) => {
                entry.text = text.into();
                true
            }
            None => false,
        }
    }

    pub fn set_column_title(&mut self, column: usize, title: impl Into<String>) -> bool {
        match self.columns.get_mut(column) {
            Some(entry) => {
                entry.title = title.into();
                true
            }
            None => false,
        }
    }
}

/// Shrinks existing ratios by `n / (n + 1)` and returns the newcomer's share.
fn insert_ratio<'a>(ratios: impl Iterator<Item = &'a mut f64>) -> f64 {
    let mut ratios: Vec<&mut f64> = ratios.collect();
    if ratios.is_empty() {
        return 1.0;
    }
    normalize_ratios(ratios.iter_mut().map(|ratio| &mut **ratio));
    let count = ratios.len() as f64;
    let factor = count / (count + 1.0);
    for ratio in ratios {
        *ratio *= factor;
    }
    1.0 - factor
}

/// Rescales ratios proportionally so they sum to 1.0; equal shares when the
/// current sum is not positive.
fn normalize_ratios<'a>(ratios: impl Iterator<Item = &'a mut f64>) {
    let mut ratios: Vec<&mut f64> = ratios.collect();
    if ratios.is_empty() {
        return;
    }
    let sum: f64 = ratios.iter().map(|ratio| **ratio).sum();
    if sum > 0.0 && sum.is_finite() {
        for ratio in ratios.iter_mut() {
            **ratio /= sum;
        }
    } else {
        let share = 1.0 / ratios.len() as f64;
        for ratio in ratios.iter_mut() {
            **ratio = share;
        }
    }
}

fn moved_index(index: usize, from: usize, to: usize) -> usize {
    if index == from {
        to
    } else if from < index && index <= to {
        index - 1
    } else if to <= index && index < from {
        index + 1
    } else {
        index
    }
}
