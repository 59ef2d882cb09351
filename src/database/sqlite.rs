//! SQLite record source.

use std::path::Path;

use log::debug;
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension};

use super::{validate_identifier, ColumnValue, DatabaseError, DatabaseResult, RecordSource, Row};

/// TEXT that is not valid UTF-8 is kept as raw bytes, so comparing it as
/// JSON reports the encoding error instead of matching replacement characters.
impl From<ValueRef<'_>> for ColumnValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => ColumnValue::Null,
            ValueRef::Integer(i) => ColumnValue::Integer(i),
            ValueRef::Real(f) => ColumnValue::Real(f),
            ValueRef::Text(t) => match std::str::from_utf8(t) {
                Ok(text) => ColumnValue::Text(text.to_string()),
                Err(_) => ColumnValue::Blob(t.to_vec()),
            },
            ValueRef::Blob(b) => ColumnValue::Blob(b.to_vec()),
        }
    }
}

impl ToSql for ColumnValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            ColumnValue::Null => ValueRef::Null,
            ColumnValue::Integer(i) => ValueRef::Integer(*i),
            ColumnValue::Real(f) => ValueRef::Real(*f),
            ColumnValue::Text(s) => ValueRef::Text(s.as_bytes()),
            ColumnValue::Blob(b) => ValueRef::Blob(b),
        };
        Ok(ToSqlOutput::Borrowed(value))
    }
}

/// Record source over a SQLite connection.
///
/// Rows are read with `SELECT *`, so any table or view the connection can see
/// is searchable. Names are restricted to plain identifiers before being
/// quoted into SQL.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Private in-memory database.
    pub fn open_in_memory() -> DatabaseResult<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Database file at `path`, created if missing.
    pub fn open(path: impl AsRef<Path>) -> DatabaseResult<Self> {
        let path = path.as_ref();
        debug!("opening sqlite database {}", path.display());
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// The underlying connection, for schema setup and fixtures.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Run one or more `;`-separated statements.
    pub fn execute_batch(&self, sql: &str) -> DatabaseResult<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Insert a row built from column/value pairs.
    pub fn insert(&self, table: &str, row: &Row) -> DatabaseResult<()> {
        validate_identifier(table)?;
        let columns = row
            .keys()
            .map(|c| validate_identifier(c).map(|c| format!("\"{}\"", c)))
            .collect::<DatabaseResult<Vec<_>>>()?;
        let placeholders = (1..=columns.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>();
        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders.join(", ")
        );
        self.conn.execute(&sql, params_from_iter(row.values()))?;
        Ok(())
    }

    fn table_exists(&self, table: &str) -> DatabaseResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn select_all(&self, table: &str) -> DatabaseResult<rusqlite::Statement<'_>> {
        validate_identifier(table)?;
        if !self.table_exists(table)? {
            return Err(DatabaseError::UnknownTable(table.to_string()));
        }
        Ok(self.conn.prepare(&format!("SELECT * FROM \"{}\"", table))?)
    }
}

impl RecordSource for SqliteStore {
    fn columns(&self, table: &str) -> DatabaseResult<Vec<String>> {
        let stmt = self.select_all(table)?;
        let names = stmt.column_names().into_iter().map(String::from).collect();
        Ok(names)
    }

    fn rows(&self, table: &str) -> DatabaseResult<Vec<Row>> {
        let mut stmt = self.select_all(table)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut out = Vec::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (i, name) in names.iter().enumerate() {
                record.insert(name.clone(), ColumnValue::from(row.get_ref(i)?));
            }
            out.push(record);
        }
        debug!("read {} rows from {}", out.len(), table);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .execute_batch(
                "CREATE TABLE items (id INTEGER PRIMARY KEY, label TEXT, price REAL, data BLOB, tags TEXT);",
            )
            .unwrap();
        store
    }

    #[test]
    fn test_insert_and_read_back_all_kinds() {
        let store = store();
        let row: Row = [
            ("id".to_string(), ColumnValue::Integer(7)),
            ("label".to_string(), "seven".into()),
            ("price".to_string(), ColumnValue::Real(1.5)),
            ("data".to_string(), ColumnValue::Blob(vec![1, 2])),
            ("tags".to_string(), ColumnValue::Null),
        ]
        .into_iter()
        .collect();
        store.insert("items", &row).unwrap();

        let rows = store.rows("items").unwrap();
        assert_eq!(rows, vec![row]);
    }

    #[test]
    fn test_unknown_table() {
        assert!(matches!(
            store().rows("nope"),
            Err(DatabaseError::UnknownTable(t)) if t == "nope"
        ));
    }

    #[test]
    fn test_rejects_unsafe_identifiers() {
        let store = store();
        assert!(matches!(
            store.rows("items\" --"),
            Err(DatabaseError::InvalidIdentifier(_))
        ));

        let row: Row = [("la bel".to_string(), ColumnValue::Null)].into_iter().collect();
        assert!(matches!(
            store.insert("items", &row),
            Err(DatabaseError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_invalid_utf8_text_read_as_bytes() {
        let store = store();
        store
            .execute_batch("INSERT INTO items (id, tags) VALUES (1, CAST(x'22ff22' AS TEXT));")
            .unwrap();
        let rows = store.rows("items").unwrap();
        assert_eq!(rows[0]["tags"], ColumnValue::Blob(vec![0x22, 0xff, 0x22]));
    }

    #[test]
    fn test_columns_of_empty_table() {
        assert_eq!(
            store().columns("items").unwrap(),
            vec!["id", "label", "price", "data", "tags"]
        );
        assert!(matches!(
            store().columns("nope"),
            Err(DatabaseError::UnknownTable(_))
        ));
    }

    #[test]
    fn test_views_are_searchable() {
        let store = store();
        store
            .execute_batch(
                "INSERT INTO items (id, label) VALUES (1, 'a');
                 CREATE VIEW labels AS SELECT label FROM items;",
            )
            .unwrap();
        let rows = store.rows("labels").unwrap();
        assert_eq!(rows[0]["label"], ColumnValue::Text("a".into()));
    }
}
