//! Record shapes and positional row mapping.
//!
//! A [`Record`] declares its fields as a static descriptor table; result columns are
//! matched to fields by position, so a SELECT must list columns in declared order.
//! Raw values are coerced to the declared [`FieldType`] before the record's own
//! constructor sees them.

use crate::date::parse_date;
use crate::error::{OrmError, OrmResult};
use crate::value::{FromValue, Value};
use chrono::{NaiveDateTime, NaiveTime};

/// One result row as returned by a connection, in column order.
pub type RawRow = Vec<Value>;

/// Declared type of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Bool,
    Int,
    Float,
    Text,
    Date,
    Timestamp,
}

impl FieldType {
    /// PostgreSQL column type used when this field is created or cast.
    pub fn sql_type(self) -> &'static str {
        match self {
            FieldType::Bool => "BOOLEAN",
            FieldType::Int => "BIGINT",
            FieldType::Float => "DOUBLE PRECISION",
            FieldType::Text => "TEXT",
            FieldType::Date => "DATE",
            FieldType::Timestamp => "TIMESTAMP",
        }
    }
}

/// A field descriptor: column name, type, nullability and position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub ty: FieldType,
    pub nullable: bool,
    pub ordinal: usize,
}

impl Field {
    pub const fn new(ordinal: usize, name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
            ordinal,
        }
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// A caller-declared record shape.
///
/// Usually derived with `#[derive(Record)]`:
///
/// ```ignore
/// use lazyorm::Record;
///
/// #[derive(Debug, Record)]
/// #[orm(table = "users")]
/// struct User {
///     id: i64,
///     name: String,
///     email: Option<String>,
/// }
/// ```
pub trait Record: Sized + Send + Sync + 'static {
    /// Model identity; scopes cache entries and cache invalidation.
    const MODEL: &'static str;

    /// Default table for builders.
    const TABLE: &'static str;

    /// Field descriptors in declared order.
    fn fields() -> &'static [Field];

    /// Build an instance from a row already coerced to the declared field types.
    fn from_row(row: MappedRow) -> OrmResult<Self>;

    fn column_names() -> Vec<&'static str> {
        Self::fields().iter().map(|f| f.name).collect()
    }
}

/// Values of a record in declared field order, for INSERT.
pub trait ToValues {
    fn to_values(&self) -> Vec<Value>;
}

/// A row whose values match the declared field types of a record.
#[derive(Debug)]
pub struct MappedRow {
    fields: &'static [Field],
    values: Vec<Value>,
}

impl MappedRow {
    /// Move the value at `idx` out of the row, converting it to `T`.
    pub fn take<T: FromValue>(&mut self, idx: usize) -> OrmResult<T> {
        let field = self.field_name(idx);
        let slot = self
            .values
            .get_mut(idx)
            .ok_or_else(|| OrmError::mapping(field, format!("no column at position {idx}")))?;
        T::from_value(std::mem::replace(slot, Value::Null))
            .map_err(|message| OrmError::mapping(field, message))
    }

    pub fn get<T: FromValue>(&self, idx: usize) -> OrmResult<T> {
        let field = self.field_name(idx);
        let value = self
            .values
            .get(idx)
            .cloned()
            .ok_or_else(|| OrmError::mapping(field, format!("no column at position {idx}")))?;
        T::from_value(value).map_err(|message| OrmError::mapping(field, message))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn field_name(&self, idx: usize) -> &'static str {
        self.fields.get(idx).map_or("?", |f| f.name)
    }
}

/// Map one raw row onto `M`.
pub fn map_row<M: Record>(raw: RawRow) -> OrmResult<M> {
    let fields = M::fields();
    if raw.len() != fields.len() {
        return Err(OrmError::mapping(
            M::MODEL,
            format!(
                "row has {} columns but the record declares {} fields",
                raw.len(),
                fields.len()
            ),
        ));
    }
    let values = raw
        .into_iter()
        .zip(fields)
        .map(|(value, field)| coerce(field, value))
        .collect::<OrmResult<Vec<_>>>()?;
    M::from_row(MappedRow { fields, values })
}

/// Map every raw row onto `M`, failing on the first row that does not fit.
pub fn map_rows<M: Record>(raw: Vec<RawRow>) -> OrmResult<Vec<M>> {
    raw.into_iter().map(map_row::<M>).collect()
}

/// Coerce a raw value to the declared type of `field`.
pub fn coerce(field: &Field, value: Value) -> OrmResult<Value> {
    let fail = |value: &Value| {
        OrmError::mapping(
            field.name,
            format!("cannot convert {} value '{value}' to {:?}", value.kind(), field.ty),
        )
    };

    if value.is_null() {
        return if field.nullable {
            Ok(Value::Null)
        } else {
            Err(OrmError::mapping(field.name, "unexpected NULL in non-nullable field"))
        };
    }

    let coerced = match (field.ty, value) {
        (FieldType::Bool, v @ Value::Bool(_)) => v,
        (FieldType::Bool, Value::Int(0)) => Value::Bool(false),
        (FieldType::Bool, Value::Int(1)) => Value::Bool(true),
        (FieldType::Bool, Value::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" => Value::Bool(true),
            "false" | "f" | "no" | "n" | "0" => Value::Bool(false),
            _ => return Err(fail(&Value::Text(s))),
        },

        (FieldType::Int, v @ Value::Int(_)) => v,
        (FieldType::Int, Value::Float(x)) if x.fract() == 0.0 && x.abs() < i64::MAX as f64 => {
            Value::Int(x as i64)
        }
        (FieldType::Int, Value::Text(s)) => match s.trim().parse::<i64>() {
            Ok(n) => Value::Int(n),
            Err(_) => return Err(fail(&Value::Text(s))),
        },

        (FieldType::Float, v @ Value::Float(_)) => v,
        (FieldType::Float, Value::Int(n)) => Value::Float(n as f64),
        (FieldType::Float, Value::Text(s)) => match s.trim().parse::<f64>() {
            Ok(x) => Value::Float(x),
            Err(_) => return Err(fail(&Value::Text(s))),
        },

        (FieldType::Text, v @ Value::Text(_)) => v,
        (FieldType::Text, v) => Value::Text(v.to_string()),

        (FieldType::Date, v @ Value::Date(_)) => v,
        (FieldType::Date, Value::Timestamp(ts)) => Value::Date(ts.date()),
        (FieldType::Date, Value::Text(s)) => match parse_date(&s) {
            Ok(d) => Value::Date(d),
            Err(_) => return Err(fail(&Value::Text(s))),
        },

        (FieldType::Timestamp, v @ Value::Timestamp(_)) => v,
        (FieldType::Timestamp, Value::Date(d)) => Value::Timestamp(d.and_time(NaiveTime::MIN)),
        (FieldType::Timestamp, Value::Text(s)) => match parse_timestamp(&s) {
            Some(ts) => Value::Timestamp(ts),
            None => return Err(fail(&Value::Text(s))),
        },

        (_, other) => return Err(fail(&other)),
    };
    Ok(coerced)
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| parse_date(s).ok().map(|d| d.and_time(NaiveTime::MIN)))
}
