use std::path::Path;

use crate::library::LibError;

/// A tab separated file split into its header and data rows.
///
/// No quoting or escaping is understood: every `'\t'` separates a field and
/// every `'\n'` ends a row. A file ending in a newline therefore has a final
/// data row holding one empty field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TsvTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TsvTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

pub fn parse_tsv(text: &str) -> TsvTable {
    let mut lines = text.split('\n').map(|line| {
        line.strip_suffix('\r')
            .unwrap_or(line)
            .split('\t')
            .map(str::to_string)
            .collect::<Vec<_>>()
    });

    //split always yields at least one item, even for an empty string.
    let header = lines.next().unwrap_or_default();
    let rows = lines.collect();

    TsvTable { header, rows }
}

pub fn read_tsv(path: impl AsRef<Path>) -> Result<TsvTable, LibError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| LibError::TsvReadError {
        src: e.to_string(),
        path: path.to_path_buf(),
    })?;

    let table = parse_tsv(&text);

    trace!(target: "tsv",
        "Read {} with {} columns and {} rows",
        path.display(),
        table.header.len(),
        table.len()
    );

    Ok(table)
}
