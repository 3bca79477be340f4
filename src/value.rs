//! Plain scalar values and row records produced from Arrow columns.

use std::sync::Arc;

use arrow::{
    array::{timezone::Tz, Array, ArrayRef, AsArray},
    compute::cast,
    datatypes::{
        ArrowTimestampType, DataType, Date32Type, Date64Type, Float16Type, Float32Type,
        Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, Time32MillisecondType,
        Time32SecondType, Time64MicrosecondType, Time64NanosecondType, TimeUnit,
        TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
        TimestampSecondType, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
    },
};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{ser::SerializeMap, Serialize, Serializer};

use crate::error::ValueError;

/// A language-native scalar taken out of a columnar array.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    /// Unsigned value above `i64::MAX`; smaller ones are [`Value::Integer`].
    UInteger(u64),
    Number(f64),
    String(String),
    Binary(Vec<u8>),
    DateTime(NaiveDateTime),
    DateTimeTz(DateTime<FixedOffset>),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Integer(v) => u64::try_from(*v).ok(),
            Value::UInteger(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Boolean(v) => serializer.serialize_bool(*v),
            Value::Integer(v) => serializer.serialize_i64(*v),
            Value::UInteger(v) => serializer.serialize_u64(*v),
            Value::Number(v) => serializer.serialize_f64(*v),
            Value::String(v) => serializer.serialize_str(v),
            Value::Binary(v) => serializer.serialize_bytes(v),
            Value::DateTime(v) => {
                serializer.collect_str(&v.format("%Y-%m-%dT%H:%M:%S%.f"))
            }
            Value::DateTimeTz(v) => serializer.serialize_str(&v.to_rfc3339()),
            Value::Date(v) => serializer.collect_str(&v.format("%Y-%m-%d")),
            Value::Time(v) => serializer.collect_str(&v.format("%H:%M:%S%.f")),
        }
    }
}

/// One logical row: column names paired with values, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    entries: Vec<(String, Value)>,
}

impl Record {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.entries.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<(String, Value)> {
        self.entries
    }
}

impl<K> FromIterator<(K, Value)> for Record
where
    K: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, Value)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Decode dictionary columns to their value type so cells can be read
/// positionally.
pub(crate) fn prepare_column(array: &ArrayRef) -> Result<ArrayRef, ValueError> {
    match array.data_type() {
        DataType::Dictionary(_, value_type) => Ok(cast(array, value_type)?),
        _ => Ok(Arc::clone(array)),
    }
}

macro_rules! integer_value {
    ($array:expr, $row:expr, $ty:ty) => {
        Value::Integer(i64::from($array.as_primitive::<$ty>().value($row)))
    };
}

fn out_of_range(data_type: &DataType) -> ValueError {
    ValueError::OutOfRange {
        data_type: data_type.to_string(),
    }
}

fn timestamp_value<T>(array: &dyn Array, row: usize, tz: Option<&str>) -> Result<Value, ValueError>
where
    T: ArrowTimestampType,
{
    let array = array.as_primitive::<T>();
    let value = match tz {
        None => array.value_as_datetime(row).map(Value::DateTime),
        Some(tz) => {
            let tz = tz.parse::<Tz>()?;
            array
                .value_as_datetime_with_tz(row, tz)
                .map(|dt| Value::DateTimeTz(dt.fixed_offset()))
        }
    };
    value.ok_or_else(|| out_of_range(array.data_type()))
}

/// Read the cell at `row` as a plain [`Value`].
///
/// Dictionary arrays must go through [`prepare_column`] first.
pub(crate) fn value_at(array: &dyn Array, row: usize) -> Result<Value, ValueError> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }
    let value = match array.data_type() {
        DataType::Null => Value::Null,
        DataType::Boolean => Value::Boolean(array.as_boolean().value(row)),
        DataType::Int8 => integer_value!(array, row, Int8Type),
        DataType::Int16 => integer_value!(array, row, Int16Type),
        DataType::Int32 => integer_value!(array, row, Int32Type),
        DataType::Int64 => integer_value!(array, row, Int64Type),
        DataType::UInt8 => integer_value!(array, row, UInt8Type),
        DataType::UInt16 => integer_value!(array, row, UInt16Type),
        DataType::UInt32 => integer_value!(array, row, UInt32Type),
        DataType::UInt64 => {
            let value = array.as_primitive::<UInt64Type>().value(row);
            i64::try_from(value).map_or(Value::UInteger(value), Value::Integer)
        }
        DataType::Float16 => {
            Value::Number(array.as_primitive::<Float16Type>().value(row).to_f64())
        }
        DataType::Float32 => {
            Value::Number(f64::from(array.as_primitive::<Float32Type>().value(row)))
        }
        DataType::Float64 => Value::Number(array.as_primitive::<Float64Type>().value(row)),
        DataType::Utf8 => Value::String(array.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Value::String(array.as_string::<i64>().value(row).to_string()),
        DataType::Utf8View => Value::String(array.as_string_view().value(row).to_string()),
        DataType::Binary => Value::Binary(array.as_binary::<i32>().value(row).to_vec()),
        DataType::LargeBinary => Value::Binary(array.as_binary::<i64>().value(row).to_vec()),
        DataType::BinaryView => Value::Binary(array.as_binary_view().value(row).to_vec()),
        DataType::FixedSizeBinary(_) => {
            Value::Binary(array.as_fixed_size_binary().value(row).to_vec())
        }
        DataType::Timestamp(unit, tz) => {
            let tz = tz.as_deref();
            return match unit {
                TimeUnit::Second => timestamp_value::<TimestampSecondType>(array, row, tz),
                TimeUnit::Millisecond => {
                    timestamp_value::<TimestampMillisecondType>(array, row, tz)
                }
                TimeUnit::Microsecond => {
                    timestamp_value::<TimestampMicrosecondType>(array, row, tz)
                }
                TimeUnit::Nanosecond => timestamp_value::<TimestampNanosecondType>(array, row, tz),
            };
        }
        DataType::Date32 => array
            .as_primitive::<Date32Type>()
            .value_as_date(row)
            .map(Value::Date)
            .ok_or_else(|| out_of_range(array.data_type()))?,
        DataType::Date64 => array
            .as_primitive::<Date64Type>()
            .value_as_date(row)
            .map(Value::Date)
            .ok_or_else(|| out_of_range(array.data_type()))?,
        DataType::Time32(TimeUnit::Second) => array
            .as_primitive::<Time32SecondType>()
            .value_as_time(row)
            .map(Value::Time)
            .ok_or_else(|| out_of_range(array.data_type()))?,
        DataType::Time32(TimeUnit::Millisecond) => array
            .as_primitive::<Time32MillisecondType>()
            .value_as_time(row)
            .map(Value::Time)
            .ok_or_else(|| out_of_range(array.data_type()))?,
        DataType::Time64(TimeUnit::Microsecond) => array
            .as_primitive::<Time64MicrosecondType>()
            .value_as_time(row)
            .map(Value::Time)
            .ok_or_else(|| out_of_range(array.data_type()))?,
        DataType::Time64(TimeUnit::Nanosecond) => array
            .as_primitive::<Time64NanosecondType>()
            .value_as_time(row)
            .map(Value::Time)
            .ok_or_else(|| out_of_range(array.data_type()))?,
        other => return Err(ValueError::Unsupported(other.to_string())),
    };
    Ok(value)
}
