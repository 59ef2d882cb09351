//! Record-existence assertions with canonical JSON columns.
//!
//! [`assert_database_has`] looks for a row in a table whose columns equal an
//! expected mapping. Literal columns compare by value; columns given as a
//! [`JsonMatcher`] compare by canonical form, so a `days` column stored as
//! `[\n  "mon",\n  "tue"\n]` matches an expected `vec!["mon", "tue"]`.
//!
//! ```
//! use jsoneq::database::{assert_database_has, ExpectedRow, MemoryStore};
//!
//! let mut store = MemoryStore::new();
//! store.create_table("prices", ["name", "days"]);
//! store
//!     .insert("prices", [("name", "weekday".into()), ("days", r#"[ "mon", "tue" ]"#.into())])
//!     .unwrap();
//!
//! let expected = ExpectedRow::new()
//!     .literal("name", "weekday")
//!     .json("days", &["mon", "tue"])
//!     .unwrap();
//! assert_database_has(&store, "prices", &expected).unwrap();
//! ```

mod memory;
mod sqlite;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use log::{debug, trace};
use serde::Serialize;
use thiserror::Error;

use crate::error::{MatchError, MatchResult};
use crate::matcher::JsonMatcher;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// A single column value as a SQL database stores it.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    /// SQL NULL
    Null,
    /// Integer affinity
    Integer(i64),
    /// Floating point affinity
    Real(f64),
    /// Text; JSON columns usually live here
    Text(String),
    /// Raw bytes
    Blob(Vec<u8>),
}

impl ColumnValue {
    /// Literal comparison: integers and reals compare numerically,
    /// everything else by exact equality.
    pub fn literal_eq(&self, other: &ColumnValue) -> bool {
        match (self, other) {
            (ColumnValue::Integer(a), ColumnValue::Real(b))
            | (ColumnValue::Real(b), ColumnValue::Integer(a)) => (*a as f64) == *b,
            _ => self == other,
        }
    }

    /// The column's content as JSON text for canonical comparison.
    ///
    /// NULL reads as `null`, numbers as their decimal text. Blobs must be
    /// UTF-8; otherwise the result is [`MatchError::MalformedJson`].
    pub fn json_text(&self) -> MatchResult<Cow<'_, str>> {
        match self {
            ColumnValue::Null => Ok(Cow::Borrowed("null")),
            ColumnValue::Integer(i) => Ok(Cow::Owned(i.to_string())),
            ColumnValue::Real(f) => Ok(Cow::Owned(f.to_string())),
            ColumnValue::Text(s) => Ok(Cow::Borrowed(s)),
            ColumnValue::Blob(b) => std::str::from_utf8(b).map(Cow::Borrowed).map_err(|_| {
                MatchError::MalformedJson {
                    code: crate::error::ErrorCode::E105_InvalidUTF8,
                    raw: String::from_utf8_lossy(b).into_owned(),
                }
            }),
        }
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Null => f.write_str("NULL"),
            ColumnValue::Integer(i) => write!(f, "{}", i),
            ColumnValue::Real(r) => write!(f, "{:?}", r),
            ColumnValue::Text(s) => write!(f, "{:?}", s),
            ColumnValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<i64> for ColumnValue {
    fn from(value: i64) -> Self {
        ColumnValue::Integer(value)
    }
}

impl From<i32> for ColumnValue {
    fn from(value: i32) -> Self {
        ColumnValue::Integer(i64::from(value))
    }
}

impl From<bool> for ColumnValue {
    fn from(value: bool) -> Self {
        ColumnValue::Integer(i64::from(value))
    }
}

impl From<f64> for ColumnValue {
    fn from(value: f64) -> Self {
        ColumnValue::Real(value)
    }
}

impl From<&str> for ColumnValue {
    fn from(value: &str) -> Self {
        ColumnValue::Text(value.to_string())
    }
}

impl From<String> for ColumnValue {
    fn from(value: String) -> Self {
        ColumnValue::Text(value)
    }
}

impl From<Vec<u8>> for ColumnValue {
    fn from(value: Vec<u8>) -> Self {
        ColumnValue::Blob(value)
    }
}

impl<T: Into<ColumnValue>> From<Option<T>> for ColumnValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ColumnValue::Null, Into::into)
    }
}

/// One row, keyed by column name.
pub type Row = BTreeMap<String, ColumnValue>;

/// Somewhere rows can be read from.
pub trait RecordSource {
    /// Column names of `table`, known even when it has no rows.
    fn columns(&self, table: &str) -> Result<Vec<String>, DatabaseError>;

    /// All rows of `table`.
    fn rows(&self, table: &str) -> Result<Vec<Row>, DatabaseError>;
}

impl<S: RecordSource + ?Sized> RecordSource for &S {
    fn columns(&self, table: &str) -> Result<Vec<String>, DatabaseError> {
        (**self).columns(table)
    }

    fn rows(&self, table: &str) -> Result<Vec<Row>, DatabaseError> {
        (**self).rows(table)
    }
}

/// Expected value for one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Expected {
    /// Compared with [`ColumnValue::literal_eq`].
    Literal(ColumnValue),
    /// Compared by canonical JSON form.
    Json(JsonMatcher),
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::Literal(v) => write!(f, "{}", v),
            Expected::Json(m) => write!(f, "{}", m),
        }
    }
}

impl From<JsonMatcher> for Expected {
    fn from(matcher: JsonMatcher) -> Self {
        Expected::Json(matcher)
    }
}

impl From<ColumnValue> for Expected {
    fn from(value: ColumnValue) -> Self {
        Expected::Literal(value)
    }
}

macro_rules! literal_expected_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Expected {
                fn from(value: $ty) -> Self {
                    Expected::Literal(ColumnValue::from(value))
                }
            }
        )*
    };
}

literal_expected_from!(i64, i32, bool, f64, &str, String);

/// Expected column mapping for a record assertion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpectedRow {
    columns: BTreeMap<String, Expected>,
}

impl ExpectedRow {
    /// Empty mapping; matches any row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect a literal column value.
    pub fn literal(mut self, column: impl Into<String>, value: impl Into<ColumnValue>) -> Self {
        self.columns
            .insert(column.into(), Expected::Literal(value.into()));
        self
    }

    /// Expect a column holding JSON logically equal to `value`.
    pub fn json<T: Serialize + ?Sized>(
        self,
        column: impl Into<String>,
        value: &T,
    ) -> MatchResult<Self> {
        Ok(self.matcher(column, JsonMatcher::new(value)?))
    }

    /// Expect a column checked by an already-built matcher.
    pub fn matcher(mut self, column: impl Into<String>, matcher: JsonMatcher) -> Self {
        self.columns.insert(column.into(), Expected::Json(matcher));
        self
    }

    /// Expected columns in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Expected)> {
        self.columns.iter()
    }

    /// Number of expected columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True if no column is constrained.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<K: Into<String>, V: Into<Expected>> FromIterator<(K, V)> for ExpectedRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            columns: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl fmt::Display for ExpectedRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (column, expected)) in self.columns.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", column, expected)?;
        }
        f.write_str("}")
    }
}

/// Why one column of a candidate row did not match.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnMismatch {
    /// Literal values differ.
    Literal {
        /// Column name.
        column: String,
        /// Expected value.
        expected: ColumnValue,
        /// Stored value.
        actual: ColumnValue,
    },
    /// Canonical JSON forms differ.
    Json {
        /// Column name.
        column: String,
        /// Expected canonical form.
        expected: String,
        /// Stored canonical form.
        actual: String,
    },
}

impl fmt::Display for ColumnMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnMismatch::Literal {
                column,
                expected,
                actual,
            } => write!(f, "{}: expected {}, found {}", column, expected, actual),
            ColumnMismatch::Json {
                column,
                expected,
                actual,
            } => write!(
                f,
                "{}: expected json {}, found json {}",
                column, expected, actual
            ),
        }
    }
}

/// A row that came close, with the columns that kept it from matching.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Position of the row in the table scan.
    pub row_index: usize,
    /// Columns that differ.
    pub mismatches: Vec<ColumnMismatch>,
}

/// Details of a failed [`assert_database_has`].
#[derive(Debug, Clone, PartialEq)]
pub struct MissingRecord {
    /// Table searched.
    pub table: String,
    /// Rendering of the expected mapping.
    pub expected: String,
    /// Number of rows in the table.
    pub rows_searched: usize,
    /// Rows with the fewest differing columns.
    pub closest: Vec<Candidate>,
}

impl fmt::Display for MissingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no row in table {:?} matches {} ({} rows searched)",
            self.table, self.expected, self.rows_searched
        )?;
        for candidate in &self.closest {
            write!(f, "\n  row {}:", candidate.row_index)?;
            for mismatch in &candidate.mismatches {
                write!(f, "\n    {}", mismatch)?;
            }
        }
        Ok(())
    }
}

/// Errors from record assertions and record sources.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// SQLite failure.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Table does not exist in the source.
    #[error("table {0:?} does not exist")]
    UnknownTable(String),

    /// Expected column does not exist in the table.
    #[error("column {column:?} does not exist in table {table:?}")]
    UnknownColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// Table or column name that cannot be safely quoted.
    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),

    /// A JSON column could not be compared.
    #[error("column {column:?}: {source}")]
    Match {
        /// Column name.
        column: String,
        /// Underlying matcher error.
        #[source]
        source: MatchError,
    },

    /// No row matched.
    #[error("{0}")]
    RecordMissing(MissingRecord),

    /// A row matched where none should.
    #[error("table {table:?} has row {row_index} matching {expected}")]
    RecordPresent {
        /// Table searched.
        table: String,
        /// Rendering of the expected mapping.
        expected: String,
        /// Position of the matching row.
        row_index: usize,
    },
}

/// Result type for database assertions.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

const MAX_CANDIDATES: usize = 3;

/// Compare one row against the expected mapping.
///
/// Literal columns are checked first; JSON columns are only decoded when all
/// literal columns agree, so a malformed JSON column in an unrelated row does
/// not fail the assertion.
fn compare_row(
    table: &str,
    row: &Row,
    expected: &ExpectedRow,
) -> DatabaseResult<Vec<ColumnMismatch>> {
    let mut mismatches = Vec::new();

    for (column, exp) in expected.iter() {
        let actual = row
            .get(column)
            .ok_or_else(|| DatabaseError::UnknownColumn {
                table: table.to_string(),
                column: column.clone(),
            })?;
        if let Expected::Literal(value) = exp {
            if !value.literal_eq(actual) {
                mismatches.push(ColumnMismatch::Literal {
                    column: column.clone(),
                    expected: value.clone(),
                    actual: actual.clone(),
                });
            }
        }
    }

    let literals_match = mismatches.is_empty();

    for (column, exp) in expected.iter() {
        let Expected::Json(matcher) = exp else {
            continue;
        };
        let Some(actual) = row.get(column) else {
            continue;
        };
        let checked = actual.json_text().and_then(|text| matcher.check(&text));
        match checked {
            Ok(()) => {}
            Err(MatchError::ComparisonMismatch { expected, actual }) => {
                mismatches.push(ColumnMismatch::Json {
                    column: column.clone(),
                    expected,
                    actual,
                });
            }
            Err(source) if literals_match => {
                return Err(DatabaseError::Match {
                    column: column.clone(),
                    source,
                });
            }
            Err(source) => {
                trace!("ignoring undecodable {} in non-matching row: {}", column, source);
                mismatches.push(ColumnMismatch::Json {
                    column: column.clone(),
                    expected: matcher.canonical().to_string(),
                    actual: actual.to_string(),
                });
            }
        }
    }

    Ok(mismatches)
}

/// Every expected column must exist in the table, whether or not it has rows.
fn check_columns<S: RecordSource + ?Sized>(
    source: &S,
    table: &str,
    expected: &ExpectedRow,
) -> DatabaseResult<()> {
    let columns = source.columns(table)?;
    for (column, _) in expected.iter() {
        if !columns.iter().any(|c| c == column) {
            return Err(DatabaseError::UnknownColumn {
                table: table.to_string(),
                column: column.clone(),
            });
        }
    }
    Ok(())
}

/// Succeeds iff some row of `table` matches every expected column.
pub fn assert_database_has<S: RecordSource + ?Sized>(
    source: &S,
    table: &str,
    expected: &ExpectedRow,
) -> DatabaseResult<()> {
    check_columns(source, table, expected)?;
    let rows = source.rows(table)?;
    let mut candidates: Vec<Candidate> = Vec::new();

    for (row_index, row) in rows.iter().enumerate() {
        let mismatches = compare_row(table, row, expected)?;
        if mismatches.is_empty() {
            debug!("table {} row {} matches {}", table, row_index, expected);
            return Ok(());
        }
        trace!(
            "table {} row {}: {} column(s) differ",
            table,
            row_index,
            mismatches.len()
        );
        candidates.push(Candidate {
            row_index,
            mismatches,
        });
    }

    candidates.sort_by_key(|c| c.mismatches.len());
    candidates.truncate(MAX_CANDIDATES);

    let missing = MissingRecord {
        table: table.to_string(),
        expected: expected.to_string(),
        rows_searched: rows.len(),
        closest: candidates,
    };
    debug!("{}", missing);
    Err(DatabaseError::RecordMissing(missing))
}

/// Succeeds iff no row of `table` matches every expected column.
pub fn assert_database_missing<S: RecordSource + ?Sized>(
    source: &S,
    table: &str,
    expected: &ExpectedRow,
) -> DatabaseResult<()> {
    check_columns(source, table, expected)?;
    let rows = source.rows(table)?;
    for (row_index, row) in rows.iter().enumerate() {
        if compare_row(table, row, expected)?.is_empty() {
            return Err(DatabaseError::RecordPresent {
                table: table.to_string(),
                expected: expected.to_string(),
                row_index,
            });
        }
    }
    Ok(())
}

/// Check that a name is a plain SQL identifier before it is quoted into a
/// statement.
pub(crate) fn validate_identifier(name: &str) -> DatabaseResult<&str> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(name)
    } else {
        Err(DatabaseError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store.create_table("prices", ["id", "name", "days"]);
        store
            .insert(
                "prices",
                [
                    ("id", ColumnValue::Integer(1)),
                    ("name", "weekday".into()),
                    ("days", "[\n  \"mon\",\n  \"tue\"\n]".into()),
                ],
            )
            .unwrap();
        store
            .insert(
                "prices",
                [
                    ("id", ColumnValue::Integer(2)),
                    ("name", "weekend".into()),
                    ("days", r#"["sat","sun"]"#.into()),
                ],
            )
            .unwrap();
        store
    }

    #[test]
    fn test_literal_eq_cross_numeric() {
        assert!(ColumnValue::Integer(2).literal_eq(&ColumnValue::Real(2.0)));
        assert!(ColumnValue::Real(2.0).literal_eq(&ColumnValue::Integer(2)));
        assert!(!ColumnValue::Integer(2).literal_eq(&ColumnValue::Text("2".into())));
        assert!(ColumnValue::Null.literal_eq(&ColumnValue::Null));
    }

    #[test]
    fn test_json_text_of_columns() {
        assert_eq!(ColumnValue::Null.json_text().unwrap(), "null");
        assert_eq!(ColumnValue::Integer(3).json_text().unwrap(), "3");
        assert_eq!(ColumnValue::Real(0.5).json_text().unwrap(), "0.5");
        assert!(ColumnValue::Blob(vec![0xFF]).json_text().unwrap_err().is_malformed());
    }

    #[test]
    fn test_finds_row_with_pretty_printed_json() {
        let expected = ExpectedRow::new()
            .literal("name", "weekday")
            .json("days", &["mon", "tue"])
            .unwrap();
        assert_database_has(&store(), "prices", &expected).unwrap();
    }

    #[test]
    fn test_reordered_array_is_missing() {
        let expected = ExpectedRow::new()
            .literal("name", "weekday")
            .json("days", &["tue", "mon"])
            .unwrap();
        let err = assert_database_has(&store(), "prices", &expected).unwrap_err();
        let DatabaseError::RecordMissing(missing) = err else {
            panic!("expected RecordMissing");
        };
        assert_eq!(missing.rows_searched, 2);
        assert_eq!(missing.closest[0].row_index, 0);
        assert_eq!(
            missing.closest[0].mismatches,
            vec![ColumnMismatch::Json {
                column: "days".to_string(),
                expected: r#"["tue","mon"]"#.to_string(),
                actual: r#"["mon","tue"]"#.to_string(),
            }]
        );
        let message = missing.to_string();
        assert!(message.contains(r#"expected json ["tue","mon"], found json ["mon","tue"]"#));
    }

    #[test]
    fn test_malformed_json_in_matching_row_surfaces() {
        let mut store = store();
        store
            .insert(
                "prices",
                [
                    ("id", ColumnValue::Integer(3)),
                    ("name", "broken".into()),
                    ("days", "not json".into()),
                ],
            )
            .unwrap();

        let expected = ExpectedRow::new()
            .literal("name", "broken")
            .json("days", &["mon"])
            .unwrap();
        match assert_database_has(&store, "prices", &expected) {
            Err(DatabaseError::Match { column, source }) => {
                assert_eq!(column, "days");
                assert!(source.is_malformed());
            }
            other => panic!("expected Match error, got {other:?}"),
        }

        // With no literal columns to rule it out, the broken row is reached.
        let unknown = ExpectedRow::new().json("days", &["wed"]).unwrap();
        assert!(matches!(
            assert_database_has(&store, "prices", &unknown),
            Err(DatabaseError::Match { .. })
        ));

        // A literal mismatch makes the broken row a plain miss.
        let unknown = unknown.literal("name", "weekday");
        assert!(matches!(
            assert_database_has(&store, "prices", &unknown),
            Err(DatabaseError::RecordMissing(_))
        ));
    }

    #[test]
    fn test_unknown_column() {
        let expected = ExpectedRow::new().literal("colour", "red");
        assert!(matches!(
            assert_database_has(&store(), "prices", &expected),
            Err(DatabaseError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_unknown_column_in_empty_table() {
        let mut store = MemoryStore::new();
        store.create_table("prices", ["name", "days"]);
        let expected = ExpectedRow::new().json("dayz", &["mon"]).unwrap();

        for result in [
            assert_database_has(&store, "prices", &expected),
            assert_database_missing(&store, "prices", &expected),
        ] {
            assert!(matches!(
                result,
                Err(DatabaseError::UnknownColumn { column, .. }) if column == "dayz"
            ));
        }

        let expected = ExpectedRow::new().json("days", &["mon"]).unwrap();
        assert!(matches!(
            assert_database_has(&store, "prices", &expected),
            Err(DatabaseError::RecordMissing(MissingRecord { rows_searched: 0, .. }))
        ));
    }

    #[test]
    fn test_missing_assertion() {
        let expected = ExpectedRow::new().json("days", &["mon", "wed"]).unwrap();
        assert_database_missing(&store(), "prices", &expected).unwrap();

        let expected = ExpectedRow::new().json("days", &["sat", "sun"]).unwrap();
        assert!(matches!(
            assert_database_missing(&store(), "prices", &expected),
            Err(DatabaseError::RecordPresent { row_index: 1, .. })
        ));
    }

    #[test]
    fn test_expected_row_from_iter_and_display() {
        let expected: ExpectedRow = [
            ("id", Expected::from(1)),
            ("days", JsonMatcher::new(&["mon"]).unwrap().into()),
        ]
        .into_iter()
        .collect();
        assert_eq!(expected.len(), 2);
        assert_eq!(expected.to_string(), r#"{days: json(["mon"]), id: 1}"#);
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("price_schedules").is_ok());
        assert!(validate_identifier("_t1").is_ok());
        assert!(validate_identifier("1t").is_err());
        assert!(validate_identifier("t; DROP TABLE x").is_err());
        assert!(validate_identifier("").is_err());
    }
}
