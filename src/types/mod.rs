//! # ClickHouse Type System
//!
//! This module models ClickHouse's surface type system: a recursive,
//! parenthesized grammar of 60+ parametric types such as
//! `Array(Nullable(Tuple(String, DateTime64(3, 'UTC'))))`.
//!
//! [`Type`] is a closed tagged tree. [`Type::parse`] turns a type string
//! into a tree, [`Type::name`] renders the canonical round-trip string, and
//! the binary codec in [`crate::codec`] dispatches on the tree to read and
//! write `RowBinary` values.
//!
//! ## Type Nesting Rules
//!
//! ClickHouse enforces strict nesting rules, which [`Type::validate`]
//! mirrors:
//!
//! **✅ Allowed:**
//! - `Array(Nullable(T))`
//! - `LowCardinality(Nullable(T))`
//! - `Array(LowCardinality(T))`
//!
//! **❌ NOT Allowed:**
//! - `Nullable(Array(T))` - arrays themselves cannot be NULL
//! - `Nullable(LowCardinality(T))` - wrong nesting order
//! - `Nullable(Nullable(T))` - double-nullable is invalid

mod parser;

pub use parser::parse_type_name;

use crate::{
    Error,
    Result,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Enum item for Enum8/Enum16 types, mapping a name to its integer value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumItem {
    /// The string name of this enum variant.
    pub name: String,
    /// The integer value associated with this enum variant.
    pub value: i32,
}

impl EnumItem {
    /// Creates an enum item from a name and value.
    pub fn new(name: impl Into<String>, value: i32) -> Self {
        Self { name: name.into(), value }
    }
}

/// A named field inside `Nested(...)` or a typed path inside `JSON(...)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedField {
    /// Field name (for `JSON`, a dotted path such as `a.b`).
    pub name: String,
    /// The field's type.
    pub field_type: Type,
}

impl NamedField {
    /// Creates a named field.
    pub fn new(name: impl Into<String>, field_type: Type) -> Self {
        Self { name: name.into(), field_type }
    }
}

/// ClickHouse type definition, representing both simple and parametric types.
///
/// The tree is immutable once parsed; parsing is pure and memoized by type
/// string, so cloning parsed types is cheap via [`TypeRef`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// The `Nothing` type of NULL-only columns.
    Nothing,
    /// Boolean stored as a single byte.
    Bool,
    /// Signed 8-bit integer.
    Int8,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// Signed 128-bit integer.
    Int128,
    /// Signed 256-bit integer.
    Int256,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Unsigned 64-bit integer.
    UInt64,
    /// Unsigned 128-bit integer.
    UInt128,
    /// Unsigned 256-bit integer.
    UInt256,
    /// 32-bit IEEE 754 floating-point number.
    Float32,
    /// 64-bit IEEE 754 floating-point number.
    Float64,
    /// Fixed-point decimal with the given precision and scale. The storage
    /// width (4, 8, 16 or 32 bytes) is derived from the precision.
    Decimal {
        /// Total number of significant digits, 1 to 76.
        precision: u8,
        /// Number of digits after the decimal point, 0 to `precision`.
        scale: u8,
    },
    /// Variable-length byte string.
    String,
    /// Fixed-length byte string of exactly `size` bytes.
    FixedString {
        /// Length of the fixed string in bytes.
        size: usize,
    },
    /// Universally unique identifier (128-bit).
    Uuid,
    /// IPv4 address stored as a little-endian UInt32.
    Ipv4,
    /// IPv6 address stored as 16 bytes in network byte order.
    Ipv6,
    /// Date stored as unsigned days since 1970-01-01 (2 bytes).
    Date,
    /// Extended-range date stored as signed days since 1970-01-01 (4 bytes).
    Date32,
    /// Date and time as a Unix timestamp, with optional timezone.
    ///
    /// `DateTime` without a zone is a distinct type from `DateTime('UTC')`;
    /// the reader surfaces the former with an unspecified-zone marker.
    DateTime {
        /// Optional IANA timezone name (e.g. "UTC", "Europe/Amsterdam").
        timezone: Option<String>,
    },
    /// High-precision date and time with sub-second precision.
    DateTime64 {
        /// Number of sub-second decimal digits, 0 to 9.
        precision: u8,
        /// Optional IANA timezone name.
        timezone: Option<String>,
    },
    /// Time of day stored as signed seconds (4 bytes).
    Time,
    /// High-precision time of day stored as signed ticks (8 bytes).
    Time64 {
        /// Number of sub-second decimal digits, 0 to 9.
        precision: u8,
    },
    /// Enumeration with Int8 storage.
    Enum8 {
        /// The declared name/value pairs, in declaration order.
        items: Vec<EnumItem>,
    },
    /// Enumeration with Int16 storage.
    Enum16 {
        /// The declared name/value pairs, in declaration order.
        items: Vec<EnumItem>,
    },
    /// Variable-length array of the given element type.
    Array {
        /// The type of each element.
        item_type: Box<Type>,
    },
    /// Nullable wrapper around the given nested type.
    Nullable {
        /// The type that is made nullable.
        nested_type: Box<Type>,
    },
    /// Dictionary-encoded wrapper. In `RowBinary` row mode the value is
    /// framed as a plain nested value on the wire.
    LowCardinality {
        /// The type that is dictionary-encoded.
        nested_type: Box<Type>,
    },
    /// Fixed-size tuple of heterogeneous element types.
    Tuple {
        /// The ordered element types.
        item_types: Vec<Type>,
    },
    /// Nested table column: semantically `Array(Tuple(fields...))`.
    Nested {
        /// The named inner columns.
        fields: Vec<NamedField>,
    },
    /// Key-value map with typed keys and values.
    Map {
        /// The type of map keys.
        key_type: Box<Type>,
        /// The type of map values.
        value_type: Box<Type>,
    },
    /// Server-side sum type; the wire form carries a one-byte discriminator.
    Variant {
        /// The alternative types, in declaration order.
        item_types: Vec<Type>,
    },
    /// Semi-structured JSON column with optional declared typed paths.
    Json {
        /// The declared typed paths, in declaration order.
        typed_paths: Vec<NamedField>,
    },
    /// Transposed bit-quantized vector column.
    QBit {
        /// The declared element type of the original vector.
        element_type: Box<Type>,
        /// Element bit width; elements occupy `ceil(bits / 8)` bytes.
        bits: usize,
    },
}

impl Type {
    /// Creates an Array type with the given element type.
    pub fn array(item_type: Type) -> Self {
        Type::Array { item_type: Box::new(item_type) }
    }

    /// Creates a Nullable wrapper around the given type.
    pub fn nullable(nested_type: Type) -> Self {
        Type::Nullable { nested_type: Box::new(nested_type) }
    }

    /// Creates a LowCardinality wrapper around the given type.
    pub fn low_cardinality(nested_type: Type) -> Self {
        Type::LowCardinality { nested_type: Box::new(nested_type) }
    }

    /// Creates a Tuple type with the given element types.
    pub fn tuple(item_types: Vec<Type>) -> Self {
        Type::Tuple { item_types }
    }

    /// Creates a Map type with the given key and value types.
    pub fn map(key_type: Type, value_type: Type) -> Self {
        Type::Map {
            key_type: Box::new(key_type),
            value_type: Box::new(value_type),
        }
    }

    /// Creates a FixedString type with the given size in bytes.
    pub fn fixed_string(size: usize) -> Self {
        Type::FixedString { size }
    }

    /// Creates a DateTime type with an optional timezone.
    pub fn datetime(timezone: Option<String>) -> Self {
        Type::DateTime { timezone }
    }

    /// Creates a DateTime64 type with the given precision and optional
    /// timezone.
    pub fn datetime64(precision: u8, timezone: Option<String>) -> Self {
        Type::DateTime64 { precision, timezone }
    }

    /// Creates a Decimal type with the given precision and scale.
    pub fn decimal(precision: u8, scale: u8) -> Self {
        Type::Decimal { precision, scale }
    }

    /// Returns true if this is a `Nullable` type.
    pub fn is_nullable(&self) -> bool {
        matches!(self, Type::Nullable { .. })
    }

    /// Strips a `Nullable` wrapper, if present.
    pub fn strip_null(&self) -> &Type {
        match self {
            Type::Nullable { nested_type } => nested_type,
            _ => self,
        }
    }

    /// Strips `LowCardinality` and `Nullable` wrappers down to the scalar.
    pub fn strip_wrappers(&self) -> &Type {
        match self {
            Type::Nullable { nested_type }
            | Type::LowCardinality { nested_type } => {
                nested_type.strip_wrappers()
            }
            _ => self,
        }
    }

    /// Returns the integer value for the given enum variant name, if this is
    /// an enum type declaring it.
    pub fn enum_value_of(&self, name: &str) -> Option<i32> {
        self.enum_items()?
            .iter()
            .find(|item| item.name == name)
            .map(|item| item.value)
    }

    /// Returns the enum variant name for the given integer value, if this is
    /// an enum type declaring it.
    pub fn enum_name_of(&self, value: i32) -> Option<&str> {
        self.enum_items()?
            .iter()
            .find(|item| item.value == value)
            .map(|item| item.name.as_str())
    }

    /// Returns the enum items if this is an Enum8 or Enum16 type.
    pub fn enum_items(&self) -> Option<&[EnumItem]> {
        match self {
            Type::Enum8 { items } | Type::Enum16 { items } => Some(items),
            _ => None,
        }
    }

    /// Returns the storage width in bytes of a `Decimal` with the given
    /// precision: 4, 8, 16 or 32.
    pub fn decimal_width(precision: u8) -> usize {
        match precision {
            0..=9 => 4,
            10..=18 => 8,
            19..=38 => 16,
            _ => 32,
        }
    }

    /// Returns the full ClickHouse type name, including parameters. The
    /// rendering is canonical: `parse(name(t)) == t` for every valid type.
    pub fn name(&self) -> String {
        let mut out = String::new();
        self.write_name(&mut out);
        out
    }

    fn write_name(&self, out: &mut String) {
        use std::fmt::Write;
        match self {
            Type::Nothing => out.push_str("Nothing"),
            Type::Bool => out.push_str("Bool"),
            Type::Int8 => out.push_str("Int8"),
            Type::Int16 => out.push_str("Int16"),
            Type::Int32 => out.push_str("Int32"),
            Type::Int64 => out.push_str("Int64"),
            Type::Int128 => out.push_str("Int128"),
            Type::Int256 => out.push_str("Int256"),
            Type::UInt8 => out.push_str("UInt8"),
            Type::UInt16 => out.push_str("UInt16"),
            Type::UInt32 => out.push_str("UInt32"),
            Type::UInt64 => out.push_str("UInt64"),
            Type::UInt128 => out.push_str("UInt128"),
            Type::UInt256 => out.push_str("UInt256"),
            Type::Float32 => out.push_str("Float32"),
            Type::Float64 => out.push_str("Float64"),
            Type::Decimal { precision, scale } => {
                let _ = write!(out, "Decimal({}, {})", precision, scale);
            }
            Type::String => out.push_str("String"),
            Type::FixedString { size } => {
                let _ = write!(out, "FixedString({})", size);
            }
            Type::Uuid => out.push_str("UUID"),
            Type::Ipv4 => out.push_str("IPv4"),
            Type::Ipv6 => out.push_str("IPv6"),
            Type::Date => out.push_str("Date"),
            Type::Date32 => out.push_str("Date32"),
            Type::DateTime { timezone: None } => out.push_str("DateTime"),
            Type::DateTime { timezone: Some(tz) } => {
                let _ = write!(out, "DateTime('{}')", escape_quoted(tz));
            }
            Type::DateTime64 { precision, timezone: None } => {
                let _ = write!(out, "DateTime64({})", precision);
            }
            Type::DateTime64 { precision, timezone: Some(tz) } => {
                let _ = write!(
                    out,
                    "DateTime64({}, '{}')",
                    precision,
                    escape_quoted(tz)
                );
            }
            Type::Time => out.push_str("Time"),
            Type::Time64 { precision } => {
                let _ = write!(out, "Time64({})", precision);
            }
            Type::Enum8 { items } => {
                out.push_str("Enum8(");
                write_enum_items(out, items);
                out.push(')');
            }
            Type::Enum16 { items } => {
                out.push_str("Enum16(");
                write_enum_items(out, items);
                out.push(')');
            }
            Type::Array { item_type } => {
                out.push_str("Array(");
                item_type.write_name(out);
                out.push(')');
            }
            Type::Nullable { nested_type } => {
                out.push_str("Nullable(");
                nested_type.write_name(out);
                out.push(')');
            }
            Type::LowCardinality { nested_type } => {
                out.push_str("LowCardinality(");
                nested_type.write_name(out);
                out.push(')');
            }
            Type::Tuple { item_types } => {
                out.push_str("Tuple(");
                for (i, t) in item_types.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    t.write_name(out);
                }
                out.push(')');
            }
            Type::Nested { fields } => {
                out.push_str("Nested(");
                write_named_fields(out, fields);
                out.push(')');
            }
            Type::Map { key_type, value_type } => {
                out.push_str("Map(");
                key_type.write_name(out);
                out.push_str(", ");
                value_type.write_name(out);
                out.push(')');
            }
            Type::Variant { item_types } => {
                out.push_str("Variant(");
                for (i, t) in item_types.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    t.write_name(out);
                }
                out.push(')');
            }
            Type::Json { typed_paths } => {
                if typed_paths.is_empty() {
                    out.push_str("JSON");
                } else {
                    out.push_str("JSON(");
                    write_named_fields(out, typed_paths);
                    out.push(')');
                }
            }
            Type::QBit { element_type, bits } => {
                out.push_str("QBit(");
                element_type.write_name(out);
                let _ = write!(out, ", {}", bits);
                out.push(')');
            }
        }
    }

    /// Parse a type from its string representation.
    ///
    /// Results are memoized per thread by type string; repeated parses of
    /// the same column type are cheap.
    pub fn parse(type_str: &str) -> Result<TypeRef> {
        thread_local! {
            static CACHE: RefCell<HashMap<String, TypeRef>> =
                RefCell::new(HashMap::new());
        }

        if let Some(cached) =
            CACHE.with(|c| c.borrow().get(type_str).cloned())
        {
            return Ok(cached);
        }

        let parsed = Arc::new(parse_type_name(type_str)?);
        parsed.validate()?;
        CACHE.with(|c| {
            c.borrow_mut().insert(type_str.to_string(), Arc::clone(&parsed));
        });
        Ok(parsed)
    }

    /// Checks the structural invariants ClickHouse enforces on type nesting
    /// and parameters.
    pub fn validate(&self) -> Result<()> {
        match self {
            Type::Decimal { precision, scale } => {
                if *precision < 1 || *precision > 76 {
                    return Err(Error::parse(
                        format!(
                            "Decimal precision must be in 1..=76, got {}",
                            precision
                        ),
                        0,
                    ));
                }
                if scale > precision {
                    return Err(Error::parse(
                        format!(
                            "Decimal scale {} exceeds precision {}",
                            scale, precision
                        ),
                        0,
                    ));
                }
                Ok(())
            }
            Type::FixedString { size } => {
                if *size == 0 {
                    return Err(Error::parse(
                        "FixedString size must be positive",
                        0,
                    ));
                }
                Ok(())
            }
            Type::DateTime64 { precision, .. }
            | Type::Time64 { precision } => {
                if *precision > 9 {
                    return Err(Error::parse(
                        format!(
                            "sub-second precision must be in 0..=9, got {}",
                            precision
                        ),
                        0,
                    ));
                }
                Ok(())
            }
            Type::Enum8 { items } => validate_enum_items(items, i8::MIN as i32, i8::MAX as i32),
            Type::Enum16 { items } => {
                validate_enum_items(items, i16::MIN as i32, i16::MAX as i32)
            }
            Type::Array { item_type } => item_type.validate(),
            Type::Nullable { nested_type } => {
                match nested_type.as_ref() {
                    Type::Nullable { .. } => Err(Error::parse(
                        "Nullable cannot wrap Nullable",
                        0,
                    )),
                    Type::Array { .. } => Err(Error::parse(
                        "Nullable cannot wrap Array",
                        0,
                    )),
                    Type::LowCardinality { .. } => Err(Error::parse(
                        "Nullable cannot wrap LowCardinality",
                        0,
                    )),
                    inner => inner.validate(),
                }
            }
            Type::LowCardinality { nested_type } => {
                let eligible = match nested_type.strip_null() {
                    Type::String
                    | Type::FixedString { .. }
                    | Type::Date
                    | Type::Date32
                    | Type::DateTime { .. }
                    | Type::DateTime64 { .. }
                    | Type::Time
                    | Type::Time64 { .. }
                    | Type::Uuid
                    | Type::Ipv4
                    | Type::Ipv6
                    | Type::Int8
                    | Type::Int16
                    | Type::Int32
                    | Type::Int64
                    | Type::Int128
                    | Type::Int256
                    | Type::UInt8
                    | Type::UInt16
                    | Type::UInt32
                    | Type::UInt64
                    | Type::UInt128
                    | Type::UInt256
                    | Type::Float32
                    | Type::Float64
                    | Type::Bool => true,
                    _ => false,
                };
                if !eligible {
                    return Err(Error::parse(
                        format!(
                            "LowCardinality cannot wrap {}",
                            nested_type.name()
                        ),
                        0,
                    ));
                }
                nested_type.validate()
            }
            Type::Tuple { item_types } => {
                if item_types.is_empty() {
                    return Err(Error::parse(
                        "Tuple requires at least one element type",
                        0,
                    ));
                }
                item_types.iter().try_for_each(Type::validate)
            }
            Type::Nested { fields } => {
                if fields.is_empty() {
                    return Err(Error::parse(
                        "Nested requires at least one field",
                        0,
                    ));
                }
                fields.iter().try_for_each(|f| f.field_type.validate())
            }
            Type::Map { key_type, value_type } => {
                key_type.validate()?;
                value_type.validate()
            }
            Type::Variant { item_types } => {
                if item_types.is_empty() {
                    return Err(Error::parse(
                        "Variant requires at least one alternative",
                        0,
                    ));
                }
                item_types.iter().try_for_each(Type::validate)
            }
            Type::Json { typed_paths } => {
                typed_paths.iter().try_for_each(|f| f.field_type.validate())
            }
            Type::QBit { element_type, bits } => {
                if *bits == 0 || *bits > 256 {
                    return Err(Error::parse(
                        format!("QBit width must be in 1..=256, got {}", bits),
                        0,
                    ));
                }
                element_type.validate()
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Reference-counted shared pointer to a [`Type`].
pub type TypeRef = Arc<Type>;

fn validate_enum_items(items: &[EnumItem], min: i32, max: i32) -> Result<()> {
    if items.is_empty() {
        return Err(Error::parse("enum requires at least one item", 0));
    }
    for (i, item) in items.iter().enumerate() {
        if item.value < min || item.value > max {
            return Err(Error::parse(
                format!(
                    "enum value {} out of range {}..={}",
                    item.value, min, max
                ),
                0,
            ));
        }
        for other in &items[..i] {
            if other.name == item.name {
                return Err(Error::parse(
                    format!("duplicate enum name '{}'", item.name),
                    0,
                ));
            }
            if other.value == item.value {
                return Err(Error::parse(
                    format!("duplicate enum value {}", item.value),
                    0,
                ));
            }
        }
    }
    Ok(())
}

fn write_enum_items(out: &mut String, items: &[EnumItem]) {
    use std::fmt::Write;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "'{}' = {}", escape_quoted(&item.name), item.value);
    }
}

fn write_named_fields(out: &mut String, fields: &[NamedField]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&field.name);
        out.push(' ');
        field.field_type.write_name(out);
    }
}

/// Doubles single quotes, the escape used inside type-string literals.
fn escape_quoted(s: &str) -> String {
    s.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_type_name() {
        assert_eq!(Type::Int32.name(), "Int32");
        assert_eq!(Type::UInt64.name(), "UInt64");
        assert_eq!(Type::String.name(), "String");
        assert_eq!(Type::Bool.name(), "Bool");
        assert_eq!(Type::Uuid.name(), "UUID");
    }

    #[test]
    fn test_parametric_type_name() {
        assert_eq!(Type::fixed_string(16).name(), "FixedString(16)");
        assert_eq!(Type::decimal(18, 4).name(), "Decimal(18, 4)");
        assert_eq!(
            Type::datetime64(3, Some("UTC".to_string())).name(),
            "DateTime64(3, 'UTC')"
        );
        assert_eq!(
            Type::array(Type::nullable(Type::Int64)).name(),
            "Array(Nullable(Int64))"
        );
        assert_eq!(
            Type::map(Type::String, Type::UInt32).name(),
            "Map(String, UInt32)"
        );
    }

    #[test]
    fn test_enum_name_preserves_declaration_order() {
        let t = Type::Enum8 {
            items: vec![EnumItem::new("b", 2), EnumItem::new("a", 1)],
        };
        assert_eq!(t.name(), "Enum8('b' = 2, 'a' = 1)");
    }

    #[test]
    fn test_nullable_nesting_rejected() {
        assert!(Type::nullable(Type::nullable(Type::Int8))
            .validate()
            .is_err());
        assert!(Type::nullable(Type::array(Type::Int8)).validate().is_err());
        assert!(Type::nullable(Type::low_cardinality(Type::String))
            .validate()
            .is_err());
    }

    #[test]
    fn test_low_cardinality_nullable_accepted() {
        assert!(Type::low_cardinality(Type::nullable(Type::String))
            .validate()
            .is_ok());
        assert!(Type::low_cardinality(Type::tuple(vec![Type::Int8]))
            .validate()
            .is_err());
    }

    #[test]
    fn test_decimal_bounds() {
        assert!(Type::decimal(76, 38).validate().is_ok());
        assert!(Type::decimal(77, 0).validate().is_err());
        assert!(Type::decimal(10, 11).validate().is_err());
        assert_eq!(Type::decimal_width(9), 4);
        assert_eq!(Type::decimal_width(18), 8);
        assert_eq!(Type::decimal_width(38), 16);
        assert_eq!(Type::decimal_width(76), 32);
    }

    #[test]
    fn test_enum_lookup() {
        let t = Type::Enum16 {
            items: vec![EnumItem::new("red", 1), EnumItem::new("green", -2)],
        };
        assert_eq!(t.enum_value_of("green"), Some(-2));
        assert_eq!(t.enum_name_of(1), Some("red"));
        assert_eq!(t.enum_value_of("blue"), None);
    }

    #[test]
    fn test_strip_wrappers() {
        let t = Type::low_cardinality(Type::nullable(Type::String));
        assert_eq!(t.strip_wrappers(), &Type::String);
    }
}
