//! Conversions between GDAL field values and [`Value`]s, and inference of output field types.

use gdal::vector::{FieldValue, OGRFieldType};

use crate::table::Value;

/// Convert a native field value. Missing values are null.
pub(crate) fn value_from_field(value: Option<FieldValue>) -> Value {
    let value = match value {
        Some(value) => value,
        None => return Value::Null,
    };
    match value {
        FieldValue::IntegerValue(value) => Value::Int(value.into()),
        FieldValue::Integer64Value(value) => Value::Int(value),
        FieldValue::RealValue(value) => Value::Float(value),
        FieldValue::StringValue(value) => Value::String(value),
        FieldValue::IntegerListValue(values) => {
            Value::IntList(values.into_iter().map(i64::from).collect())
        }
        FieldValue::Integer64ListValue(values) => Value::IntList(values),
        FieldValue::RealListValue(values) => Value::FloatList(values),
        FieldValue::StringListValue(values) => Value::StringList(values),
        FieldValue::DateValue(value) => Value::Date(value),
        FieldValue::DateTimeValue(value) => Value::DateTime(value.naive_local()),
        #[allow(unreachable_patterns)]
        other => {
            log::warn!("field value unsupported ({:?})", other);
            Value::Null
        }
    }
}

/// The output field type of an attribute column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldKind {
    Integer,
    Integer64,
    Real,
    Date,
    String,
}

impl FieldKind {
    pub(crate) fn ogr_type(self) -> OGRFieldType::Type {
        match self {
            FieldKind::Integer => OGRFieldType::OFTInteger,
            FieldKind::Integer64 => OGRFieldType::OFTInteger64,
            FieldKind::Real => OGRFieldType::OFTReal,
            FieldKind::Date => OGRFieldType::OFTDate,
            FieldKind::String => OGRFieldType::OFTString,
        }
    }

    fn of(value: &Value) -> Option<FieldKind> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(FieldKind::Integer),
            Value::Int(value) if i32::try_from(*value).is_ok() => Some(FieldKind::Integer),
            Value::Int(_) => Some(FieldKind::Integer64),
            Value::Float(value) if value.is_nan() => None,
            Value::Float(_) => Some(FieldKind::Real),
            Value::Date(_) | Value::DateTime(_) => Some(FieldKind::Date),
            Value::String(_) => Some(FieldKind::String),
            Value::IntList(_) | Value::FloatList(_) | Value::StringList(_) => {
                log::warn!(
                    "value type unrecognized, writing as string (type={})",
                    value.type_name()
                );
                Some(FieldKind::String)
            }
        }
    }

    fn merge(self, other: FieldKind) -> FieldKind {
        use FieldKind::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Integer, Integer64) | (Integer64, Integer) => Integer64,
            (Integer | Integer64 | Real, Integer | Integer64 | Real) => Real,
            _ => String,
        }
    }

    /// The field type able to hold every value of a column, or `None` when the column is
    /// entirely null. Columns mixing unrelated types are coerced to strings.
    pub(crate) fn infer<'a>(values: impl IntoIterator<Item = &'a Value>) -> Option<FieldKind> {
        values
            .into_iter()
            .filter_map(FieldKind::of)
            .reduce(FieldKind::merge)
    }

    /// Convert a value for a field of this type. Nulls are `None`.
    pub(crate) fn to_field_value(self, value: &Value) -> Option<FieldValue> {
        if value.is_null() {
            return None;
        }
        match (self, value) {
            (FieldKind::Integer, Value::Bool(value)) => Some(FieldValue::IntegerValue(*value as i32)),
            (FieldKind::Integer, Value::Int(value)) => {
                i32::try_from(*value).ok().map(FieldValue::IntegerValue)
            }
            (FieldKind::Integer64, Value::Bool(value)) => {
                Some(FieldValue::Integer64Value(*value as i64))
            }
            (FieldKind::Integer64, Value::Int(value)) => Some(FieldValue::Integer64Value(*value)),
            (FieldKind::Real, Value::Bool(value)) => Some(FieldValue::RealValue(*value as i64 as f64)),
            (FieldKind::Real, Value::Int(value)) => Some(FieldValue::RealValue(*value as f64)),
            (FieldKind::Real, Value::Float(value)) => Some(FieldValue::RealValue(*value)),
            (FieldKind::Date, Value::Date(value)) => Some(FieldValue::DateValue(*value)),
            (FieldKind::Date, Value::DateTime(value)) => Some(FieldValue::DateValue(value.date())),
            (_, value) => Some(FieldValue::StringValue(value.to_string())),
        }
    }
}
