//! `#[derive(Record)]` expansion checks. No database needed.

#![cfg(feature = "derive")]

use chrono::NaiveDate;
use lazyorm::{FieldType, Record, ToValues, Value, map_row, qb};

#[derive(Debug, Clone, PartialEq, Record)]
#[orm(table = "app_users", model = "AppUser")]
struct User {
    id: i64,
    #[orm(column = "user_name")]
    name: String,
    score: f64,
    active: bool,
    joined: Option<NaiveDate>,
}

#[derive(Debug, Clone, Record)]
struct OrderLine {
    line_no: i32,
    note: Option<String>,
}

#[test]
fn metadata_follows_declaration_order() {
    assert_eq!(User::MODEL, "AppUser");
    assert_eq!(User::TABLE, "app_users");
    assert_eq!(
        User::column_names(),
        vec!["id", "user_name", "score", "active", "joined"]
    );

    let fields = User::fields();
    assert_eq!(fields[2].ty, FieldType::Float);
    assert_eq!(fields[3].ty, FieldType::Bool);
    assert!(fields[4].nullable);
    assert!(!fields[0].nullable);
    assert_eq!(fields[4].ordinal, 4);
}

#[test]
fn defaults_use_struct_name() {
    assert_eq!(OrderLine::MODEL, "OrderLine");
    assert_eq!(OrderLine::TABLE, "order_line");
    assert_eq!(OrderLine::fields()[0].ty, FieldType::Int);
}

#[test]
fn rows_map_and_values_extract() {
    let joined = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    let user: User = map_row(vec![
        Value::Int(7),
        Value::Text("ann".into()),
        Value::Int(3),
        Value::Bool(true),
        Value::Text("2024-01-15".into()),
    ])
    .unwrap();
    assert_eq!(
        user,
        User {
            id: 7,
            name: "ann".into(),
            score: 3.0,
            active: true,
            joined: Some(joined),
        }
    );
    assert_eq!(
        user.to_values(),
        vec![
            Value::Int(7),
            Value::Text("ann".into()),
            Value::Float(3.0),
            Value::Bool(true),
            Value::Date(joined),
        ]
    );

    let line: OrderLine = map_row(vec![Value::Int(1), Value::Null]).unwrap();
    assert_eq!(line.note, None);
    assert!(map_row::<OrderLine>(vec![Value::Null, Value::Null]).is_err());
}

#[test]
fn builders_use_derived_table_and_columns() {
    assert_eq!(
        qb::select::<User>().to_sql(),
        "SELECT id, user_name, score, active, joined FROM app_users"
    );
}
