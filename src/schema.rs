//! Portable schema inference from Arrow physical types.
//!
//! Physical types are rendered to their canonical lowercase tags (`int64`,
//! `timestamp[ns]`, `struct<a: int64>`, ...) and resolved against an ordered
//! rule table. The first matching rule wins; tags matched by no rule are
//! rejected with [`UnmappableTypeError`].

use arrow::datatypes::{DataType, Field, IntervalUnit, Schema, TimeUnit, UnionMode};
use serde_json::{json, Map, Value as JsonValue};

use crate::error::UnmappableTypeError;

/// Storage-agnostic type vocabulary used to describe records downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortableType {
    Integer,
    Number,
    String,
    Boolean,
    DateTime,
}

impl PortableType {
    /// JSON-schema fragment for a nullable property of this type.
    pub fn json_schema(&self) -> JsonValue {
        match self {
            PortableType::Integer => json!({ "type": ["integer", "null"] }),
            PortableType::Number => json!({ "type": ["number", "null"] }),
            PortableType::String => json!({ "type": ["string", "null"] }),
            PortableType::Boolean => json!({ "type": ["boolean", "null"] }),
            PortableType::DateTime => {
                json!({ "type": ["string", "null"], "format": "date-time" })
            }
        }
    }
}

/// Tag prefixes of container types whose values are not scalars.
const CONTAINER_PREFIXES: &[&str] = &[
    "struct<",
    "list<",
    "large_list<",
    "fixed_size_list<",
    "list_view<",
    "large_list_view<",
    "map<",
    "sparse_union<",
    "dense_union<",
    "run_end_encoded<",
];

/// Predicate half of a type mapping rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRule {
    /// Tag names a container type.
    Container,
    /// Tag contains the given substring anywhere.
    Contains(&'static str),
}

impl TypeRule {
    pub fn matches(&self, tag: &str) -> bool {
        match self {
            TypeRule::Container => CONTAINER_PREFIXES.iter().any(|p| tag.starts_with(p)),
            TypeRule::Contains(needle) => tag.contains(needle),
        }
    }
}

/// Result half of a type mapping rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    Reject,
    Map(PortableType),
}

/// Default mapping table.
///
/// Substring matching is deliberately loose: `uint32` maps to Integer and
/// `large_string` to String. Containers and intervals are rejected up front,
/// otherwise `struct<a: int64>` and `month_interval` would be accepted as
/// Integer through `"int"` with no scalar to read back.
pub const TYPE_RULES: &[(TypeRule, RuleOutcome)] = &[
    (TypeRule::Container, RuleOutcome::Reject),
    (TypeRule::Contains("interval"), RuleOutcome::Reject),
    (
        TypeRule::Contains("int"),
        RuleOutcome::Map(PortableType::Integer),
    ),
    (
        TypeRule::Contains("double"),
        RuleOutcome::Map(PortableType::Number),
    ),
    (
        TypeRule::Contains("string"),
        RuleOutcome::Map(PortableType::String),
    ),
    (
        TypeRule::Contains("bool"),
        RuleOutcome::Map(PortableType::Boolean),
    ),
    (
        TypeRule::Contains("timestamp[ns]"),
        RuleOutcome::Map(PortableType::DateTime),
    ),
    (
        TypeRule::Contains("timestamp[us]"),
        RuleOutcome::Map(PortableType::DateTime),
    ),
];

/// Map a physical type tag with the default rule table.
pub fn map_type(tag: &str) -> Result<PortableType, UnmappableTypeError> {
    map_type_with(TYPE_RULES, tag)
}

/// Map a physical type tag against an explicit rule table, first match wins.
pub fn map_type_with(
    rules: &[(TypeRule, RuleOutcome)],
    tag: &str,
) -> Result<PortableType, UnmappableTypeError> {
    match rules.iter().find(|(rule, _)| rule.matches(tag)) {
        Some((_, RuleOutcome::Map(portable))) => Ok(*portable),
        Some((_, RuleOutcome::Reject)) | None => Err(UnmappableTypeError::new(tag)),
    }
}

fn time_unit_tag(unit: &TimeUnit) -> &'static str {
    match unit {
        TimeUnit::Second => "s",
        TimeUnit::Millisecond => "ms",
        TimeUnit::Microsecond => "us",
        TimeUnit::Nanosecond => "ns",
    }
}

fn child_tag(field: &Field) -> String {
    format!("{}: {}", field.name(), physical_type_tag(field.data_type()))
}

/// Render an Arrow data type as its canonical physical type tag.
#[allow(unreachable_patterns)]
pub fn physical_type_tag(data_type: &DataType) -> String {
    match data_type {
        DataType::Null => "null".to_string(),
        DataType::Boolean => "bool".to_string(),
        DataType::Int8 => "int8".to_string(),
        DataType::Int16 => "int16".to_string(),
        DataType::Int32 => "int32".to_string(),
        DataType::Int64 => "int64".to_string(),
        DataType::UInt8 => "uint8".to_string(),
        DataType::UInt16 => "uint16".to_string(),
        DataType::UInt32 => "uint32".to_string(),
        DataType::UInt64 => "uint64".to_string(),
        DataType::Float16 => "halffloat".to_string(),
        DataType::Float32 => "float".to_string(),
        DataType::Float64 => "double".to_string(),
        DataType::Utf8 => "string".to_string(),
        DataType::LargeUtf8 => "large_string".to_string(),
        DataType::Utf8View => "string_view".to_string(),
        DataType::Binary => "binary".to_string(),
        DataType::LargeBinary => "large_binary".to_string(),
        DataType::BinaryView => "binary_view".to_string(),
        DataType::FixedSizeBinary(width) => format!("fixed_size_binary[{width}]"),
        DataType::Date32 => "date32[day]".to_string(),
        DataType::Date64 => "date64[ms]".to_string(),
        DataType::Time32(unit) => format!("time32[{}]", time_unit_tag(unit)),
        DataType::Time64(unit) => format!("time64[{}]", time_unit_tag(unit)),
        DataType::Timestamp(unit, None) => format!("timestamp[{}]", time_unit_tag(unit)),
        DataType::Timestamp(unit, Some(tz)) => {
            format!("timestamp[{}, tz={tz}]", time_unit_tag(unit))
        }
        DataType::Duration(unit) => format!("duration[{}]", time_unit_tag(unit)),
        DataType::Interval(IntervalUnit::YearMonth) => "month_interval".to_string(),
        DataType::Interval(IntervalUnit::DayTime) => "day_time_interval".to_string(),
        DataType::Interval(IntervalUnit::MonthDayNano) => "month_day_nano_interval".to_string(),
        DataType::Decimal128(precision, scale) => format!("decimal128({precision}, {scale})"),
        DataType::Decimal256(precision, scale) => format!("decimal256({precision}, {scale})"),
        DataType::List(item) => format!("list<{}>", child_tag(item)),
        DataType::LargeList(item) => format!("large_list<{}>", child_tag(item)),
        DataType::ListView(item) => format!("list_view<{}>", child_tag(item)),
        DataType::LargeListView(item) => format!("large_list_view<{}>", child_tag(item)),
        DataType::FixedSizeList(item, size) => {
            format!("fixed_size_list<{}>[{size}]", child_tag(item))
        }
        DataType::Struct(fields) => {
            let children = fields
                .iter()
                .map(|f| child_tag(f))
                .collect::<Vec<_>>()
                .join(", ");
            format!("struct<{children}>")
        }
        DataType::Map(entries, _) => match entries.data_type() {
            DataType::Struct(kv) if kv.len() == 2 => format!(
                "map<{}, {}>",
                physical_type_tag(kv[0].data_type()),
                physical_type_tag(kv[1].data_type())
            ),
            other => format!("map<{}>", physical_type_tag(other)),
        },
        DataType::Union(fields, mode) => {
            let prefix = match mode {
                UnionMode::Sparse => "sparse_union",
                UnionMode::Dense => "dense_union",
            };
            let children = fields
                .iter()
                .map(|(type_id, f)| format!("{}={type_id}", child_tag(f)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{prefix}<{children}>")
        }
        DataType::Dictionary(key, value) => format!(
            "dictionary<values={}, indices={}, ordered=0>",
            physical_type_tag(value),
            physical_type_tag(key)
        ),
        DataType::RunEndEncoded(run_ends, values) => format!(
            "run_end_encoded<run_ends: {}, values: {}>",
            physical_type_tag(run_ends.data_type()),
            physical_type_tag(values.data_type())
        ),
        other => other.to_string().to_lowercase(),
    }
}

/// Name and physical type tag of one stored column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalColumn {
    pub name: String,
    pub tag: String,
}

impl PhysicalColumn {
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
        }
    }
}

impl From<&Field> for PhysicalColumn {
    fn from(field: &Field) -> Self {
        PhysicalColumn::new(field.name(), physical_type_tag(field.data_type()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    pub name: String,
    pub portable_type: PortableType,
}

/// Ordered list of portable fields describing a stream's records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortableSchema {
    fields: Vec<SchemaField>,
}

impl PortableSchema {
    /// Map every column in order. A single unmappable column fails the whole
    /// schema; partial schemas are never produced.
    pub fn discover<'a, I>(columns: I) -> Result<Self, UnmappableTypeError>
    where
        I: IntoIterator<Item = &'a PhysicalColumn>,
    {
        let fields = columns
            .into_iter()
            .map(|column| {
                map_type(&column.tag)
                    .map(|portable_type| SchemaField {
                        name: column.name.clone(),
                        portable_type,
                    })
                    .map_err(|err| err.with_column(&column.name))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { fields })
    }

    /// Discover a schema from the fields of an Arrow schema.
    pub fn from_arrow(schema: &Schema) -> Result<Self, UnmappableTypeError> {
        let columns = schema
            .fields()
            .iter()
            .map(|f| PhysicalColumn::from(f.as_ref()))
            .collect::<Vec<_>>();
        Self::discover(&columns)
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, portable_type: PortableType) {
        self.fields.push(SchemaField {
            name: name.into(),
            portable_type,
        });
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render the schema as a JSON-schema object document, properties in
    /// field order.
    pub fn to_json_schema(&self) -> JsonValue {
        let properties = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.portable_type.json_schema()))
            .collect::<Map<_, _>>();
        json!({ "type": "object", "properties": properties })
    }
}
