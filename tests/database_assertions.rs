//! Record assertions against SQLite.
//!
//! Models a price schedule whose `days` attribute is persisted as a JSON
//! text column by an encoder that pretty-prints.

use jsoneq::database::{
    assert_database_has, assert_database_missing, ColumnMismatch, ColumnValue, DatabaseError,
    ExpectedRow, Row, SqliteStore,
};
use jsoneq::error::ErrorCode;
use jsoneq::{JsonMatcher, MatchError};
use serde::Serialize;
use tempfile::TempDir;

#[derive(Serialize, Clone, Copy)]
#[serde(rename_all = "lowercase")]
enum Weekday {
    Mon,
    Tue,
    Wed,
    Sat,
    Sun,
}

struct PriceSchedule {
    id: i64,
    name: &'static str,
    price: f64,
    days: Vec<Weekday>,
}

impl PriceSchedule {
    fn row(&self) -> Row {
        let days = serde_json::to_string_pretty(&self.days).unwrap();
        [
            ("id".to_string(), ColumnValue::Integer(self.id)),
            ("name".to_string(), self.name.into()),
            ("price".to_string(), ColumnValue::Real(self.price)),
            ("days".to_string(), days.into()),
        ]
        .into_iter()
        .collect()
    }
}

const SCHEMA: &str = "CREATE TABLE price_schedules (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    price REAL NOT NULL,
    days TEXT
);";

fn seeded(store: SqliteStore) -> SqliteStore {
    store.execute_batch(SCHEMA).unwrap();
    let schedules = [
        PriceSchedule {
            id: 1,
            name: "weekday",
            price: 12.5,
            days: vec![Weekday::Mon, Weekday::Tue, Weekday::Wed],
        },
        PriceSchedule {
            id: 2,
            name: "weekend",
            price: 20.0,
            days: vec![Weekday::Sat, Weekday::Sun],
        },
    ];
    for schedule in &schedules {
        store.insert("price_schedules", &schedule.row()).unwrap();
    }
    store
}

fn store() -> SqliteStore {
    seeded(SqliteStore::open_in_memory().unwrap())
}

#[test]
fn finds_row_by_json_column() {
    let expected = ExpectedRow::new()
        .literal("name", "weekday")
        .json("days", &vec![Weekday::Mon, Weekday::Tue, Weekday::Wed])
        .unwrap();
    assert_database_has(&store(), "price_schedules", &expected).unwrap();
}

#[test]
fn literal_integer_matches_real_column() {
    let expected = ExpectedRow::new().literal("price", 20).literal("id", 2);
    assert_database_has(&store(), "price_schedules", &expected).unwrap();
}

#[test]
fn stored_text_differs_from_expected_canonical_text() {
    let store = store();
    let stored: String = store
        .connection()
        .query_row("SELECT days FROM price_schedules WHERE id = 2", [], |row| row.get(0))
        .unwrap();
    assert_ne!(stored, r#"["sat","sun"]"#);

    let expected = ExpectedRow::new().json("days", &["sat", "sun"]).unwrap();
    assert_database_has(&store, "price_schedules", &expected).unwrap();
}

#[test]
fn reordered_days_are_missing() {
    let expected = ExpectedRow::new()
        .literal("name", "weekend")
        .json("days", &[Weekday::Sun, Weekday::Sat])
        .unwrap();
    let err = assert_database_has(&store(), "price_schedules", &expected).unwrap_err();

    let DatabaseError::RecordMissing(missing) = err else {
        panic!("expected RecordMissing, got {:?}", err);
    };
    assert_eq!(missing.rows_searched, 2);
    let closest = &missing.closest[0];
    assert_eq!(closest.row_index, 1);
    assert_eq!(
        closest.mismatches,
        vec![ColumnMismatch::Json {
            column: "days".to_string(),
            expected: r#"["sun","sat"]"#.to_string(),
            actual: r#"["sat","sun"]"#.to_string(),
        }]
    );
    assert_database_missing(&store(), "price_schedules", &expected).unwrap();
}

#[test]
fn null_column_matches_only_json_null() {
    let store = store();
    store
        .execute_batch("INSERT INTO price_schedules (id, name, price, days) VALUES (3, 'unscheduled', 0, NULL)")
        .unwrap();

    let null_days = ExpectedRow::new()
        .literal("id", 3)
        .matcher("days", JsonMatcher::from_json_text("null").unwrap());
    assert_database_has(&store, "price_schedules", &null_days).unwrap();

    let empty_days = ExpectedRow::new()
        .literal("id", 3)
        .json("days", &Vec::<Weekday>::new())
        .unwrap();
    assert!(matches!(
        assert_database_has(&store, "price_schedules", &empty_days),
        Err(DatabaseError::RecordMissing(_))
    ));
}

#[test]
fn malformed_column_is_reported_with_raw_text() {
    let store = store();
    store
        .execute_batch("INSERT INTO price_schedules (id, name, price, days) VALUES (4, 'broken', 1, 'mon,tue')")
        .unwrap();

    let expected = ExpectedRow::new()
        .literal("id", 4)
        .json("days", &["mon", "tue"])
        .unwrap();
    match assert_database_has(&store, "price_schedules", &expected) {
        Err(DatabaseError::Match { column, source }) => {
            assert_eq!(column, "days");
            assert!(source.is_malformed());
            assert!(source.to_string().contains("mon,tue"));
        }
        other => panic!("expected Match error, got {:?}", other),
    }
}

#[test]
fn invalid_utf8_text_column_is_malformed() {
    let store = store();
    store
        .execute_batch(
            "INSERT INTO price_schedules (id, name, price, days) VALUES (5, 'garbled', 1, CAST(x'22ff22' AS TEXT))",
        )
        .unwrap();

    let expected = ExpectedRow::new()
        .literal("id", 5)
        .json("days", "\u{FFFD}")
        .unwrap();
    match assert_database_has(&store, "price_schedules", &expected) {
        Err(DatabaseError::Match { column, source }) => {
            assert_eq!(column, "days");
            assert!(matches!(
                source,
                MatchError::MalformedJson {
                    code: ErrorCode::E105_InvalidUTF8,
                    ..
                }
            ));
        }
        other => panic!("expected Match error, got {:?}", other),
    }
}

#[test]
fn typo_in_column_reported_on_empty_table() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.execute_batch(SCHEMA).unwrap();

    let expected = ExpectedRow::new().json("dayz", &["mon"]).unwrap();
    assert!(matches!(
        assert_database_has(&store, "price_schedules", &expected),
        Err(DatabaseError::UnknownColumn { column, .. }) if column == "dayz"
    ));
    assert!(matches!(
        assert_database_missing(&store, "price_schedules", &expected),
        Err(DatabaseError::UnknownColumn { .. })
    ));
}

#[test]
fn unknown_table_and_column() {
    let store = store();
    let expected = ExpectedRow::new().literal("id", 1);
    assert!(matches!(
        assert_database_has(&store, "schedules", &expected),
        Err(DatabaseError::UnknownTable(_))
    ));

    let expected = ExpectedRow::new().literal("colour", "red");
    assert!(matches!(
        assert_database_has(&store, "price_schedules", &expected),
        Err(DatabaseError::UnknownColumn { .. })
    ));
}

#[test]
fn file_backed_database() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("schedules.db");
    drop(seeded(SqliteStore::open(&path).unwrap()));

    let reopened = SqliteStore::open(&path).unwrap();
    let expected = ExpectedRow::new()
        .json("days", &["mon", "tue", "wed"])
        .unwrap();
    assert_database_has(&reopened, "price_schedules", &expected).unwrap();
}
