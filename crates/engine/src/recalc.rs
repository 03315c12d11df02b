//! Cycle reporting for recomputation.
//!
//! The dependency graph stays acyclic by construction: every write runs a
//! reachability check before values are touched, and a detected cycle aborts
//! the write with a [`CycleError`] while the workbook rolls back. This module
//! defines that report type.

/// Report when cycle detection finds a circular reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError {
    /// Cells participating in the cycle, in traversal order.
    pub cells: Vec<String>,

    /// Human-readable description of the cycle.
    pub message: String,
}

impl CycleError {
    pub fn new(cells: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            cells,
            message: message.into(),
        }
    }

    /// A cell whose formula references the cell itself.
    pub fn self_reference(cell: &str) -> Self {
        Self {
            cells: vec![cell.to_string()],
            message: format!("cell {} references itself", cell),
        }
    }

    /// A multi-cell cycle. Long cycles are abbreviated in the message; the
    /// full membership stays in `cells`.
    pub fn cycle(cells: Vec<String>) -> Self {
        let message = if cells.len() <= 5 {
            format!("circular reference: {}", cells.join(" -> "))
        } else {
            format!(
                "circular reference involving {} cells: {} -> ... -> {}",
                cells.len(),
                cells[0],
                cells[cells.len() - 1]
            )
        };
        Self { cells, message }
    }
}

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CycleError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_reference() {
        let report = CycleError::self_reference("A1");
        assert_eq!(report.cells, vec!["A1".to_string()]);
        assert!(report.message.contains("references itself"));
    }

    #[test]
    fn test_small_cycle_lists_members() {
        let report = CycleError::cycle(vec![
            "A1".to_string(),
            "B1".to_string(),
            "C1".to_string(),
        ]);
        assert!(report.message.contains("A1 -> B1 -> C1"));
        assert!(!report.message.contains("..."));
    }

    #[test]
    fn test_large_cycle_abbreviated() {
        let cells: Vec<String> = (0..10).map(|i| format!("C{}", i)).collect();
        let report = CycleError::cycle(cells);
        assert!(report.message.contains("10 cells"));
        assert!(report.message.contains("..."));
    }

    #[test]
    fn test_display() {
        let report = CycleError::new(vec!["A1".to_string()], "test message");
        assert_eq!(report.to_string(), "test message");
    }
}
