//! In-memory record source.

use std::collections::BTreeMap;

use super::{ColumnValue, DatabaseError, DatabaseResult, RecordSource, Row};

#[derive(Debug, Clone, Default)]
struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

/// Tables of rows held in memory.
///
/// Every table has a fixed column list; columns left out of an insert read
/// back as NULL, the way a SQL table fills them.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: BTreeMap<String, Table>,
}

impl MemoryStore {
    /// Store with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty table with the given columns. An existing table is
    /// left untouched.
    pub fn create_table<I, K>(&mut self, table: impl Into<String>, columns: I)
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.tables.entry(table.into()).or_insert_with(|| Table {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        });
    }

    /// Append a row to `table`.
    pub fn insert<I, K>(&mut self, table: &str, columns: I) -> DatabaseResult<()>
    where
        I: IntoIterator<Item = (K, ColumnValue)>,
        K: Into<String>,
    {
        let entry = self
            .tables
            .get_mut(table)
            .ok_or_else(|| DatabaseError::UnknownTable(table.to_string()))?;

        let mut row: Row = entry
            .columns
            .iter()
            .map(|c| (c.clone(), ColumnValue::Null))
            .collect();
        for (column, value) in columns {
            let column = column.into();
            match row.get_mut(&column) {
                Some(slot) => *slot = value,
                None => {
                    return Err(DatabaseError::UnknownColumn {
                        table: table.to_string(),
                        column,
                    })
                }
            }
        }
        entry.rows.push(row);
        Ok(())
    }

    /// Number of rows in `table`, if it exists.
    pub fn len(&self, table: &str) -> Option<usize> {
        self.tables.get(table).map(|t| t.rows.len())
    }

    fn table(&self, table: &str) -> DatabaseResult<&Table> {
        self.tables
            .get(table)
            .ok_or_else(|| DatabaseError::UnknownTable(table.to_string()))
    }
}

impl RecordSource for MemoryStore {
    fn columns(&self, table: &str) -> DatabaseResult<Vec<String>> {
        Ok(self.table(table)?.columns.clone())
    }

    fn rows(&self, table: &str) -> DatabaseResult<Vec<Row>> {
        Ok(self.table(table)?.rows.clone())
    }
}
