//! Workbook: named cells, dependency tracking, ordered recomputation.
//!
//! Every write goes through [`Workbook::set_contents_of_cell`], which keeps
//! three things in lockstep: the cell map, the dependency graph, and the
//! cached values. A write that would close a dependency loop is rejected and
//! rolled back so the workbook is observationally unchanged.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::cell::{Cell, CellContents, CellValue};
use crate::dep_graph::DependencyGraph;
use crate::formula::{Formula, FormulaFormatError};
use crate::name::NamePolicy;
use crate::recalc::CycleError;

/// Errors surfaced by workbook operations.
///
/// Runtime evaluation failures are *not* here: divide-by-zero and unresolved
/// references become [`CellValue::Error`] and propagate through values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkbookError {
    /// The cell name fails the base shape or the workbook validator.
    InvalidName(String),
    /// Formula text could not be parsed under the workbook's name policy.
    Format(FormulaFormatError),
    /// The write would create a circular reference; the workbook rolled back.
    Cycle(CycleError),
}

impl std::fmt::Display for WorkbookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkbookError::InvalidName(name) => write!(f, "invalid cell name '{}'", name),
            WorkbookError::Format(err) => write!(f, "{}", err),
            WorkbookError::Cycle(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for WorkbookError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkbookError::InvalidName(_) => None,
            WorkbookError::Format(err) => Some(err),
            WorkbookError::Cycle(err) => Some(err),
        }
    }
}

impl From<FormulaFormatError> for WorkbookError {
    fn from(err: FormulaFormatError) -> Self {
        WorkbookError::Format(err)
    }
}

impl From<CycleError> for WorkbookError {
    fn from(err: CycleError) -> Self {
        WorkbookError::Cycle(err)
    }
}

/// A named collection of reactive cells.
#[derive(Debug)]
pub struct Workbook {
    /// Normalized name -> cell record. An absent key is an empty cell.
    cells: FxHashMap<String, Cell>,

    /// Edges `(s, t)`: cell t's formula references cell s.
    /// Never survives a rolled-back write.
    graph: DependencyGraph,

    policy: NamePolicy,
    version: String,

    /// Set on every successful content change, cleared when saved.
    dirty: bool,
}

impl Workbook {
    /// Create a workbook with the permissive name policy and version
    /// `"default"`.
    pub fn new() -> Self {
        Self::with_policy(NamePolicy::default(), "default")
    }

    /// Create a workbook with an explicit name policy and version string.
    pub fn with_policy(policy: NamePolicy, version: impl Into<String>) -> Self {
        Self {
            cells: FxHashMap::default(),
            graph: DependencyGraph::new(),
            policy,
            version: version.into(),
            dirty: false,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// True when the workbook has unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear the unsaved-changes flag. The persistence layer calls this after
    /// a successful save, and after a load completes.
    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    /// Set a cell's contents from user text and recompute everything that
    /// transitively depends on it.
    ///
    /// The text is classified in order: a parseable finite double makes a
    /// number cell, a leading `=` makes a formula cell (the rest is parsed
    /// under the workbook policy), anything else is text. The empty string
    /// empties the cell.
    ///
    /// Returns the recomputation order: the written cell first, then its
    /// transitive dependents, each after the dependees the traversal reached.
    /// If the write would close a dependency loop, contents, values, and
    /// edges are restored exactly and `Cycle` is returned.
    pub fn set_contents_of_cell(
        &mut self,
        name: &str,
        text: &str,
    ) -> Result<Vec<String>, WorkbookError> {
        let n = self
            .policy
            .check(name)
            .ok_or_else(|| WorkbookError::InvalidName(name.to_string()))?;
        let contents = self.classify(text)?;

        // Snapshot for rollback: the record and the in-edges about to change.
        let prior_cell = self.cells.get(&n).cloned();
        let prior_in: FxHashSet<String> =
            self.graph.dependees(&n).map(str::to_string).collect();

        let new_in: FxHashSet<String> = match &contents {
            CellContents::Formula(formula) => {
                formula.variables().iter().cloned().collect()
            }
            _ => FxHashSet::default(),
        };

        // Tentative install. A first assignment of the empty string leaves
        // the cell unmaterialized (absent key ≡ empty cell).
        if prior_cell.is_some() || !contents.is_empty() {
            let record = self
                .cells
                .entry(n.clone())
                .or_insert_with(|| Cell::new(CellContents::empty(), ""));
            record.contents = contents;
            record.source_text = text.to_string();
        }
        self.graph.replace_dependees(&n, new_in);

        let order = match self.graph.recompute_order(&n) {
            Ok(order) => order,
            Err(cycle) => {
                // Roll back: record and edges exactly as snapshotted.
                match prior_cell {
                    Some(cell) => {
                        self.cells.insert(n.clone(), cell);
                    }
                    None => {
                        self.cells.remove(&n);
                    }
                }
                self.graph.replace_dependees(&n, prior_in);
                return Err(WorkbookError::Cycle(cycle));
            }
        };

        self.recompute(&order);
        self.dirty = true;
        Ok(order)
    }

    /// A cell's contents. Empty cells read as `Text("")`.
    pub fn get_cell_contents(&self, name: &str) -> Result<CellContents, WorkbookError> {
        let n = self
            .policy
            .check(name)
            .ok_or_else(|| WorkbookError::InvalidName(name.to_string()))?;
        Ok(self
            .cells
            .get(&n)
            .map(|cell| cell.contents.clone())
            .unwrap_or_else(CellContents::empty))
    }

    /// A cell's cached value. Empty cells read as `Text("")`.
    pub fn get_cell_value(&self, name: &str) -> Result<CellValue, WorkbookError> {
        let n = self
            .policy
            .check(name)
            .ok_or_else(|| WorkbookError::InvalidName(name.to_string()))?;
        Ok(self
            .cells
            .get(&n)
            .map(|cell| cell.value.clone())
            .unwrap_or_else(CellValue::empty))
    }

    /// The text the user supplied for a cell, exactly as given. Empty cells
    /// read as `""`.
    pub fn cell_source_text(&self, name: &str) -> Result<String, WorkbookError> {
        let n = self
            .policy
            .check(name)
            .ok_or_else(|| WorkbookError::InvalidName(name.to_string()))?;
        Ok(self
            .cells
            .get(&n)
            .map(|cell| cell.source_text.clone())
            .unwrap_or_default())
    }

    /// Every cell whose contents is not the empty text, in no particular
    /// order.
    pub fn nonempty_cell_names(&self) -> impl Iterator<Item = &str> {
        self.nonempty_cells().map(|(name, _)| name)
    }

    /// Nonempty cells with their records, in no particular order. The
    /// persistence layer iterates this to snapshot source texts.
    pub fn nonempty_cells(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.cells
            .iter()
            .filter(|(_, cell)| !cell.contents.is_empty())
            .map(|(name, cell)| (name.as_str(), cell))
    }

    /// Direct dependents of a cell: cells whose formulas reference it.
    pub fn dependents_of(&self, name: &str) -> Result<Vec<String>, WorkbookError> {
        let n = self
            .policy
            .check(name)
            .ok_or_else(|| WorkbookError::InvalidName(name.to_string()))?;
        Ok(self.graph.dependents(&n).map(str::to_string).collect())
    }

    /// Direct dependees of a cell: cells its formula references.
    pub fn dependees_of(&self, name: &str) -> Result<Vec<String>, WorkbookError> {
        let n = self
            .policy
            .check(name)
            .ok_or_else(|| WorkbookError::InvalidName(name.to_string()))?;
        Ok(self.graph.dependees(&n).map(str::to_string).collect())
    }

    /// The dependency graph, read-only. Exposed for tooling and tests.
    pub fn dep_graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Classify user text as number, formula, or text contents.
    fn classify(&self, text: &str) -> Result<CellContents, WorkbookError> {
        if let Ok(n) = text.trim().parse::<f64>() {
            // Non-finite spellings ("inf", "NaN") fall through to text.
            if n.is_finite() {
                return Ok(CellContents::Number(n));
            }
        }
        if let Some(expression) = text.strip_prefix('=') {
            let formula = Formula::parse(expression, &self.policy)?;
            return Ok(CellContents::Formula(formula));
        }
        Ok(CellContents::Text(text.to_string()))
    }

    /// Re-evaluate cells in recomputation order, caching each value before
    /// its dependents read it.
    fn recompute(&mut self, order: &[String]) {
        for name in order {
            let Some(cell) = self.cells.get(name) else {
                // The written cell can be absent (emptied); dependents still
                // re-evaluate against its absence.
                continue;
            };
            let new_value = match &cell.contents {
                CellContents::Number(n) => CellValue::Number(*n),
                CellContents::Text(t) => CellValue::Text(t.clone()),
                CellContents::Formula(formula) => {
                    let cells = &self.cells;
                    match formula
                        .evaluate(|var| cells.get(var).and_then(|c| c.value.as_number()))
                    {
                        Ok(n) => CellValue::Number(n),
                        Err(err) => CellValue::Error(err.reason),
                    }
                }
            };
            if let Some(cell) = self.cells.get_mut(name) {
                cell.value = new_value;
            }
        }
    }
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}
