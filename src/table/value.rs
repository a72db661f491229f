//! Typed scalar attribute values.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use itertools::Itertools;

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// A single attribute value of a row.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
    StringList(Vec<String>),
}

impl Value {
    /// Whether this value is null. A floating point NaN counts as null.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(value) => value.is_nan(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    /// Numeric view of the value, used for coordinate columns.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            Value::String(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    /// Short name of the variant, used in log messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::IntList(_) => "int_list",
            Value::FloatList(_) => "float_list",
            Value::StringList(_) => "string_list",
        }
    }

    /// Parse a date or datetime from its textual form.
    pub fn parse_datetime(text: &str) -> Option<Value> {
        let text = text.trim();
        for format in DATETIME_FORMATS {
            if let Ok(value) = NaiveDateTime::parse_from_str(text, format) {
                return Some(Value::DateTime(value));
            }
        }
        for format in DATE_FORMATS {
            if let Ok(value) = NaiveDate::parse_from_str(text, format) {
                return Some(Value::Date(value));
            }
        }
        None
    }
}

/// Textual form used when writing delimited text. Nulls become empty strings and floats always
/// carry a decimal point so that they read back as floats.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(value) => write!(f, "{}", value),
            Value::Int(value) => write!(f, "{}", value),
            Value::Float(value) if value.is_nan() => Ok(()),
            Value::Float(value) => write!(f, "{:?}", value),
            Value::String(value) => f.write_str(value),
            Value::Date(value) => write!(f, "{}", value.format("%Y-%m-%d")),
            Value::DateTime(value) => write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S")),
            Value::IntList(values) => write!(f, "[{}]", values.iter().join(", ")),
            Value::FloatList(values) => {
                write!(f, "[{}]", values.iter().map(|x| format!("{:?}", x)).join(", "))
            }
            Value::StringList(values) => write!(f, "[{}]", values.iter().join(", ")),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Infer one typed column from raw text cells.
///
/// Every non-empty cell must parse for a type to be chosen: integers, then floats, then
/// booleans, falling back to text. Empty cells are null. Dates are only parsed when
/// `parse_dates` is set, and unparseable date cells are kept as text.
pub(crate) fn infer_column(cells: &[&str], parse_dates: bool) -> Vec<Value> {
    let present = || cells.iter().map(|cell| cell.trim()).filter(|cell| !cell.is_empty());
    let to_values = |parse: &dyn Fn(&str) -> Option<Value>| -> Vec<Value> {
        cells
            .iter()
            .map(|cell| {
                let cell = cell.trim();
                if cell.is_empty() {
                    Value::Null
                } else {
                    parse(cell).unwrap_or_else(|| Value::String(cell.to_string()))
                }
            })
            .collect()
    };

    if parse_dates {
        return to_values(&Value::parse_datetime);
    }
    if present().all(|cell| cell.parse::<i64>().is_ok()) {
        return to_values(&|cell| cell.parse().ok().map(Value::Int));
    }
    if present().all(|cell| cell.parse::<f64>().is_ok()) {
        return to_values(&|cell| cell.parse().ok().map(Value::Float));
    }
    if present().all(|cell| parse_bool(cell).is_some()) {
        return to_values(&|cell| parse_bool(cell).map(Value::Bool));
    }
    cells
        .iter()
        .map(|cell| {
            if cell.trim().is_empty() {
                Value::Null
            } else {
                Value::String(cell.to_string())
            }
        })
        .collect()
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}
