//! Column typing for CSV loads.

use std::fmt;

use crate::clause::Statement;
use crate::date::{is_date, parse_date};
use crate::error::{OrmError, OrmResult};
use crate::ident::{Ident, validate_identifier};
use crate::value::Value;

/// Inferred SQL type of a CSV column.
///
/// Inference only widens: `Unknown -> Integer -> Float -> Text`, and
/// `Unknown -> Date -> Text`. Mixing dates with numbers gives `Text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnType {
    /// No non-empty sample seen yet. Rendered as `TEXT`.
    #[default]
    Unknown,
    Integer,
    Float,
    Date,
    Text,
}

impl ColumnType {
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnType::Integer => "BIGINT",
            ColumnType::Float => "DOUBLE PRECISION",
            ColumnType::Date => "DATE",
            ColumnType::Unknown | ColumnType::Text => "TEXT",
        }
    }

    /// Type of a single non-empty cell. Integers win over compact dates like `20240115`.
    pub fn of_cell(cell: &str) -> Self {
        let cell = cell.trim();
        if cell.parse::<i64>().is_ok() {
            ColumnType::Integer
        } else if cell.parse::<f64>().is_ok_and(f64::is_finite) {
            ColumnType::Float
        } else if is_date(cell) {
            ColumnType::Date
        } else {
            ColumnType::Text
        }
    }

    /// The narrowest type holding both `self` and `other`.
    pub fn widen(self, other: ColumnType) -> ColumnType {
        use ColumnType::*;
        match (self, other) {
            (Unknown, t) | (t, Unknown) => t,
            (a, b) if a == b => a,
            (Integer, Float) | (Float, Integer) => Float,
            _ => Text,
        }
    }

    /// Map an `information_schema.columns.data_type` to the type cells are converted to.
    /// Types the loader cannot produce give `None`.
    pub fn from_data_type(data_type: &str) -> Option<Self> {
        match data_type.trim().to_ascii_lowercase().as_str() {
            "smallint" | "integer" | "bigint" => Some(ColumnType::Integer),
            "real" | "double precision" => Some(ColumnType::Float),
            "date" => Some(ColumnType::Date),
            "text" | "character varying" | "character" => Some(ColumnType::Text),
            _ => None,
        }
    }

    /// Convert a cell into a bind value of this type. Empty cells are NULL.
    pub fn to_value(self, cell: &str) -> Result<Value, String> {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            return Ok(Value::Null);
        }
        match self {
            ColumnType::Integer => trimmed
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| format!("'{trimmed}' is not an integer")),
            ColumnType::Float => trimmed
                .parse::<f64>()
                .ok()
                .filter(|x| x.is_finite())
                .map(Value::Float)
                .ok_or_else(|| format!("'{trimmed}' is not a finite number")),
            ColumnType::Date => parse_date(trimmed)
                .map(Value::Date)
                .map_err(|e| e.to_string()),
            ColumnType::Unknown | ColumnType::Text => Ok(Value::Text(cell.to_string())),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_type())
    }
}

/// Trim, replace spaces with underscores and lower-case a CSV header, then validate it.
pub fn normalize_header(raw: &str) -> OrmResult<String> {
    let name = raw.trim().replace(' ', "_").to_lowercase();
    Ident::simple(&name).map_err(|e| {
        OrmError::validation(format!("CSV header '{raw}' is not a valid column name: {e}"))
    })?;
    Ok(name)
}

/// Ordered `(column, type)` pairs for one load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    columns: Vec<(String, ColumnType)>,
}

impl TableSchema {
    /// Normalize `headers` and give every column the `Unknown` type.
    pub fn from_headers<'a>(headers: impl IntoIterator<Item = &'a str>) -> OrmResult<Self> {
        let mut columns: Vec<(String, ColumnType)> = Vec::new();
        for raw in headers {
            let name = normalize_header(raw)?;
            if columns.iter().any(|(existing, _)| *existing == name) {
                return Err(OrmError::validation(format!(
                    "Duplicate CSV column '{name}' after normalization"
                )));
            }
            columns.push((name, ColumnType::Unknown));
        }
        if columns.is_empty() {
            return Err(OrmError::validation("CSV source has no header row"));
        }
        Ok(Self { columns })
    }

    /// Widen every column by one sampled record. Empty cells say nothing.
    pub fn observe<'a>(&mut self, record: impl IntoIterator<Item = &'a str>) {
        for ((_, ty), cell) in self.columns.iter_mut().zip(record) {
            if !cell.trim().is_empty() {
                *ty = ty.widen(ColumnType::of_cell(cell));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, ty)| *ty)
    }

    /// Switch columns to the types an existing table declares for them.
    /// Columns the table does not have, or declares with another type, keep the inferred type.
    pub fn adopt<'a>(&mut self, existing: impl IntoIterator<Item = (&'a str, &'a str)>) {
        for (name, data_type) in existing {
            let Some(ty) = ColumnType::from_data_type(data_type) else {
                continue;
            };
            if let Some((_, slot)) = self.columns.iter_mut().find(|(n, _)| n == name) {
                *slot = ty;
            }
        }
    }

    /// Name of the identity key `create_table` prepends, checked against the CSV columns.
    pub fn identity_column(&self, table: &Ident) -> OrmResult<String> {
        let name = format!("{}_id", table.name());
        validate_identifier(&name)?;
        if self.column_type(&name).is_some() {
            return Err(OrmError::validation(format!(
                "CSV column '{name}' clashes with the auto-increment key of {table}"
            )));
        }
        Ok(name)
    }

    /// Convert one CSV record into bind values. `line` is used in error messages.
    pub fn values<'a>(
        &self,
        record: impl IntoIterator<Item = &'a str>,
        line: u64,
    ) -> OrmResult<Vec<Value>> {
        self.columns
            .iter()
            .zip(record)
            .map(|((name, ty), cell)| {
                ty.to_value(cell).map_err(|message| {
                    OrmError::validation(format!("CSV line {line}, column {name}: {message}"))
                })
            })
            .collect()
    }

    /// `CREATE TABLE IF NOT EXISTS t (...)`, with a leading identity key when
    /// `auto_increment` is set.
    pub fn create_table(&self, table: &Ident, auto_increment: bool) -> Statement {
        let mut stmt = Statement::new("CREATE TABLE IF NOT EXISTS ");
        stmt.push_ident(table).push(" (");
        if auto_increment {
            stmt.push(&format!("{}_id", table.name()))
                .push(" BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY, ");
        }
        for (i, (name, ty)) in self.columns.iter().enumerate() {
            if i > 0 {
                stmt.push(", ");
            }
            stmt.push(name).push(" ").push(ty.sql_type());
        }
        stmt.push(")");
        stmt
    }
}

pub(crate) fn drop_table(table: &Ident) -> Statement {
    let mut stmt = Statement::new("DROP TABLE IF EXISTS ");
    stmt.push_ident(table);
    stmt
}

/// `SELECT EXISTS (...)` against `information_schema.tables`.
pub(crate) fn table_exists(table: &Ident) -> Statement {
    let mut stmt = Statement::new(
        "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_schema = ",
    );
    match table.schema() {
        Some(schema) => stmt.push_bind(schema),
        None => stmt.push("current_schema()"),
    };
    stmt.push(" AND table_name = ").push_bind(table.name()).push(")");
    stmt
}

/// Names and declared types of the table's columns.
pub(crate) fn table_columns(table: &Ident) -> Statement {
    let mut stmt = Statement::new(
        "SELECT column_name::text, data_type::text FROM information_schema.columns WHERE table_schema = ",
    );
    match table.schema() {
        Some(schema) => stmt.push_bind(schema),
        None => stmt.push("current_schema()"),
    };
    stmt.push(" AND table_name = ")
        .push_bind(table.name())
        .push(" ORDER BY ordinal_position");
    stmt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infer(column: &[&str]) -> ColumnType {
        let mut schema = TableSchema::from_headers(["c"]).unwrap();
        for cell in column {
            schema.observe([*cell]);
        }
        schema.column_type("c").unwrap()
    }

    #[test]
    fn integers_widen_to_float() {
        assert_eq!(infer(&["1", "2", "3.5"]), ColumnType::Float);
        assert_eq!(infer(&["3.5", "1"]), ColumnType::Float);
        assert_eq!(infer(&["1", "-2", "30"]), ColumnType::Integer);
    }

    #[test]
    fn widening_is_monotonic() {
        assert_eq!(infer(&["1", "abc", "2"]), ColumnType::Text);
        assert_eq!(infer(&["2024-01-15", "1"]), ColumnType::Text);
        assert_eq!(infer(&["2024-01-15", "01/02/2024"]), ColumnType::Date);
    }

    #[test]
    fn empty_cells_do_not_count() {
        assert_eq!(infer(&["", "4", " "]), ColumnType::Integer);
        assert_eq!(infer(&["", ""]), ColumnType::Unknown);
        assert_eq!(ColumnType::Unknown.sql_type(), "TEXT");
    }

    #[test]
    fn compact_dates_are_integers() {
        assert_eq!(ColumnType::of_cell("20240115"), ColumnType::Integer);
        assert_eq!(ColumnType::of_cell("January 15, 2024"), ColumnType::Date);
        assert_eq!(ColumnType::of_cell("NaN"), ColumnType::Text);
    }

    #[test]
    fn headers_are_normalized() {
        let schema = TableSchema::from_headers([" First Name", "AGE"]).unwrap();
        assert_eq!(schema.column_names(), vec!["first_name", "age"]);

        assert!(TableSchema::from_headers(["id", "ID"]).unwrap_err().is_validation());
        assert!(TableSchema::from_headers(["name; DROP TABLE x"]).is_err());
        assert!(TableSchema::from_headers(Vec::<&str>::new()).is_err());
    }

    #[test]
    fn create_table_ddl() {
        let mut schema = TableSchema::from_headers(["id", "price", "day", "note"]).unwrap();
        schema.observe(["1", "9.99", "2024-01-15", "x"]);
        let table = Ident::parse("sales").unwrap();

        assert_eq!(
            schema.create_table(&table, false).sql(),
            "CREATE TABLE IF NOT EXISTS sales (id BIGINT, price DOUBLE PRECISION, day DATE, note TEXT)"
        );
        assert!(
            schema
                .create_table(&table, true)
                .sql()
                .starts_with("CREATE TABLE IF NOT EXISTS sales (sales_id BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY, id BIGINT")
        );
    }

    #[test]
    fn cells_convert_by_column_type() {
        let mut schema = TableSchema::from_headers(["n", "d"]).unwrap();
        schema.observe(["1", "2024-01-15"]);
        assert_eq!(
            schema.values(["7", ""], 2).unwrap(),
            vec![Value::Int(7), Value::Null]
        );
        let err = schema.values(["x", "2024-01-15"], 9).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("line 9"));
    }

    #[test]
    fn non_finite_floats_are_rejected_after_the_sample() {
        assert_eq!(ColumnType::of_cell("inf"), ColumnType::Text);
        assert_eq!(ColumnType::Float.to_value("2.5"), Ok(Value::Float(2.5)));
        assert!(ColumnType::Float.to_value("NaN").is_err());
        assert!(ColumnType::Float.to_value("-inf").is_err());
    }

    #[test]
    fn identity_column_must_be_free_and_valid() {
        let table = Ident::parse("sales").unwrap();
        let schema = TableSchema::from_headers(["amount"]).unwrap();
        assert_eq!(schema.identity_column(&table).unwrap(), "sales_id");

        let clash = TableSchema::from_headers(["Sales ID", "amount"]).unwrap();
        assert!(clash.identity_column(&table).unwrap_err().is_validation());

        let long = Ident::parse(&"t".repeat(61)).unwrap();
        assert!(schema.identity_column(&long).unwrap_err().is_validation());
    }

    #[test]
    fn existing_column_types_win() {
        let mut schema = TableSchema::from_headers(["code", "qty", "note"]).unwrap();
        schema.observe(["001", "5", "7"]);
        schema.adopt([
            ("code", "text"),
            ("qty", "double precision"),
            ("note", "jsonb"),
            ("other", "bigint"),
        ]);
        assert_eq!(schema.column_type("code"), Some(ColumnType::Text));
        assert_eq!(schema.column_type("qty"), Some(ColumnType::Float));
        assert_eq!(schema.column_type("note"), Some(ColumnType::Integer));
        assert_eq!(
            schema.values(["001", "5", "7"], 2).unwrap(),
            vec![Value::Text("001".into()), Value::Float(5.0), Value::Int(7)]
        );
    }

    #[test]
    fn existence_probe() {
        let stmt = table_exists(&Ident::parse("users").unwrap());
        assert!(stmt.sql().contains("table_schema = current_schema()"));
        assert_eq!(stmt.params(), &[Value::Text("users".into())]);

        let stmt = table_exists(&Ident::parse("staging.users").unwrap());
        assert_eq!(stmt.placeholder_count(), 2);
        assert_eq!(stmt.params()[0], Value::Text("staging".into()));
    }
}
