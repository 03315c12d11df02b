//! Cell contents and cached values.
//!
//! A cell's *contents* is what the user typed, classified; its *value* is
//! the cached result of evaluating those contents against the current values
//! of referenced cells. The two are kept consistent by the workbook: value
//! is always a pure function of contents and of the values of the cells the
//! contents name.

use crate::formula::Formula;

/// What a cell holds: a finite number, a text literal, or a parsed formula.
///
/// `Text("")` is the sentinel for an empty cell; a name absent from the
/// workbook map reads the same way.
#[derive(Debug, Clone, PartialEq)]
pub enum CellContents {
    Number(f64),
    Text(String),
    Formula(Formula),
}

impl CellContents {
    /// The empty-cell sentinel.
    pub fn empty() -> Self {
        CellContents::Text(String::new())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellContents::Text(t) if t.is_empty())
    }
}

/// A cell's cached computed result.
///
/// Errors are values here, not exceptions: a formula that divides by zero or
/// reads a non-numeric cell stores `Error` and downstream formulas see it as
/// a non-numeric dependency.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Error(String),
}

impl CellValue {
    /// The value of an empty cell.
    pub fn empty() -> Self {
        CellValue::Text(String::new())
    }

    /// Numeric payload, if this value is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// One stored cell: contents, cached value, and the exact text the user
/// supplied (replayed on reload to rebuild contents, graph, and values).
#[derive(Debug, Clone)]
pub struct Cell {
    pub contents: CellContents,
    pub value: CellValue,
    pub source_text: String,
}

impl Cell {
    pub fn new(contents: CellContents, source_text: impl Into<String>) -> Self {
        Self {
            contents,
            value: CellValue::empty(),
            source_text: source_text.into(),
        }
    }
}
