// Workbook persistence - JSON document holding the version and each
// nonempty cell's user-supplied source text. Loading replays the texts
// through the engine, which rebuilds contents, graph, and values.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::{Deserialize, Serialize};

use cellbook_engine::name::NamePolicy;
use cellbook_engine::workbook::{Workbook, WorkbookError};

/// On-disk document. Cell order is stable (BTreeMap) so repeated saves of
/// the same workbook produce identical files.
#[derive(Debug, Serialize, Deserialize)]
struct WorkbookDoc {
    #[serde(rename = "Version")]
    version: String,

    #[serde(rename = "Cells", default)]
    cells: BTreeMap<String, CellEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CellEntry {
    #[serde(rename = "StringForm")]
    string_form: String,
}

/// A save or load failure.
///
/// Load failures are deliberately narrow: I/O, document parse, version
/// mismatch, or a stored entry the engine rejects on replay. Engine bugs are
/// not caught and rebranded.
#[derive(Debug)]
pub enum ReadWriteError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    VersionMismatch { expected: String, found: String },
    Replay { cell: String, source: WorkbookError },
}

impl std::fmt::Display for ReadWriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadWriteError::Io(err) => write!(f, "workbook file error: {}", err),
            ReadWriteError::Parse(err) => write!(f, "malformed workbook document: {}", err),
            ReadWriteError::VersionMismatch { expected, found } => write!(
                f,
                "workbook version mismatch: expected '{}', file has '{}'",
                expected, found
            ),
            ReadWriteError::Replay { cell, source } => {
                write!(f, "stored cell '{}' is invalid: {}", cell, source)
            }
        }
    }
}

impl std::error::Error for ReadWriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReadWriteError::Io(err) => Some(err),
            ReadWriteError::Parse(err) => Some(err),
            ReadWriteError::VersionMismatch { .. } => None,
            ReadWriteError::Replay { source, .. } => Some(source),
        }
    }
}

impl From<std::io::Error> for ReadWriteError {
    fn from(err: std::io::Error) -> Self {
        ReadWriteError::Io(err)
    }
}

impl From<serde_json::Error> for ReadWriteError {
    fn from(err: serde_json::Error) -> Self {
        ReadWriteError::Parse(err)
    }
}

/// Write the workbook to `path` and clear its dirty flag.
pub fn save_workbook(workbook: &mut Workbook, path: &Path) -> Result<(), ReadWriteError> {
    let mut cells = BTreeMap::new();
    for (name, cell) in workbook.nonempty_cells() {
        cells.insert(
            name.to_string(),
            CellEntry {
                string_form: cell.source_text.clone(),
            },
        );
    }
    let doc = WorkbookDoc {
        version: workbook.version().to_string(),
        cells,
    };

    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &doc)?;

    workbook.mark_saved();
    Ok(())
}

/// Read a workbook from `path`, verifying that the stored version matches
/// `version`, and rebuild it by replaying each stored cell through
/// `set_contents_of_cell`. The returned workbook is not dirty.
pub fn load_workbook(
    path: &Path,
    policy: NamePolicy,
    version: &str,
) -> Result<Workbook, ReadWriteError> {
    let doc = read_doc(path)?;
    if doc.version != version {
        return Err(ReadWriteError::VersionMismatch {
            expected: version.to_string(),
            found: doc.version,
        });
    }

    let mut workbook = Workbook::with_policy(policy, doc.version);
    for (name, entry) in &doc.cells {
        workbook
            .set_contents_of_cell(name, &entry.string_form)
            .map_err(|source| ReadWriteError::Replay {
                cell: name.clone(),
                source,
            })?;
    }
    workbook.mark_saved();
    Ok(workbook)
}

/// Read just the version string of a saved workbook.
pub fn saved_version(path: &Path) -> Result<String, ReadWriteError> {
    Ok(read_doc(path)?.version)
}

fn read_doc(path: &Path) -> Result<WorkbookDoc, ReadWriteError> {
    let text = std::fs::read_to_string(path)?;
    let doc: WorkbookDoc = serde_json::from_str(&text)?;
    Ok(doc)
}
