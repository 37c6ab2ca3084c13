//! Recursive-descent parser for ClickHouse type strings.
//!
//! The grammar is small but recursive:
//!
//! ```text
//! type        := name ('(' args ')')?
//! args        := arg (',' arg)*
//! arg         := type | integer | quoted-string | enum-pair | named-field
//! enum-pair   := quoted-string '=' signed-integer
//! named-field := identifier type      (Nested and JSON typed paths)
//! ```
//!
//! Quoted strings use single quotes with `''` doubling as the escape.
//! Whitespace is insignificant outside quoted strings. Argument kinds are
//! dictated by the type name being parsed, so `Tuple(Int32, Array(String))`
//! and `DateTime64(3, 'UTC')` take different paths through the same
//! machinery.

use super::{
    EnumItem,
    NamedField,
    Type,
};
use crate::{
    Error,
    Result,
};

/// Parses a complete type string, requiring the whole input to be consumed.
///
/// Validation of nesting rules happens separately in [`Type::validate`];
/// this function is purely syntactic.
pub fn parse_type_name(input: &str) -> Result<Type> {
    let mut parser = TypeParser::new(input);
    let parsed = parser.parse_type()?;
    parser.skip_whitespace();
    if !parser.at_end() {
        return Err(Error::parse(
            format!("trailing input after type: '{}'", parser.rest()),
            parser.pos,
        ));
    }
    Ok(parsed)
}

struct TypeParser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> TypeParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, bytes: input.as_bytes(), pos: 0 }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos.min(self.input.len())..]
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        self.skip_whitespace();
        match self.bump() {
            Some(b) if b == expected => Ok(()),
            Some(b) => Err(Error::parse(
                format!("expected '{}', found '{}'", expected as char, b as char),
                self.pos - 1,
            )),
            None => Err(Error::parse(
                format!("expected '{}', found end of input", expected as char),
                self.pos,
            )),
        }
    }

    /// Consumes `)` or a `,` separated continuation. Returns true while more
    /// arguments follow.
    fn more_args(&mut self) -> Result<bool> {
        self.skip_whitespace();
        match self.bump() {
            Some(b',') => Ok(true),
            Some(b')') => Ok(false),
            Some(b) => Err(Error::parse(
                format!("expected ',' or ')', found '{}'", b as char),
                self.pos - 1,
            )),
            None => Err(Error::parse(
                "unterminated argument list",
                self.pos,
            )),
        }
    }

    fn identifier(&mut self) -> Result<&'a str> {
        self.skip_whitespace();
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(b) if b.is_ascii_alphanumeric() || b == b'_' || b == b'.'
        ) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(Error::parse("expected identifier", self.pos));
        }
        Ok(&self.input[start..self.pos])
    }

    fn integer(&mut self) -> Result<i64> {
        self.skip_whitespace();
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
        }
        self.input[start..self.pos].parse::<i64>().map_err(|_| {
            Error::parse(
                format!("expected integer, found '{}'", &self.input[start..self.pos]),
                start,
            )
        })
    }

    fn unsigned(&mut self, what: &str, max: i64) -> Result<u64> {
        let start = self.pos;
        let v = self.integer()?;
        if v < 0 || v > max {
            return Err(Error::parse(
                format!("{} must be in 0..={}, got {}", what, max, v),
                start,
            ));
        }
        Ok(v as u64)
    }

    /// Parses a `'...'` literal with `''` doubling.
    fn quoted_string(&mut self) -> Result<String> {
        self.expect(b'\'')?;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(b'\'') => {
                    if self.peek() == Some(b'\'') {
                        self.pos += 1;
                        out.push('\'');
                    } else {
                        return Ok(out);
                    }
                }
                Some(_) => {
                    // Re-take as chars to keep multi-byte UTF-8 intact.
                    self.pos -= 1;
                    let ch = self.input[self.pos..]
                        .chars()
                        .next()
                        .expect("position is on a char boundary");
                    out.push(ch);
                    self.pos += ch.len_utf8();
                }
                None => {
                    return Err(Error::parse(
                        "unterminated quoted string",
                        self.pos,
                    ))
                }
            }
        }
    }

    fn parse_type(&mut self) -> Result<Type> {
        self.skip_whitespace();
        let name_start = self.pos;
        let name = self.identifier()?;

        self.skip_whitespace();
        let has_args = self.peek() == Some(b'(');

        if !has_args {
            return self.simple_type(name, name_start);
        }

        self.pos += 1; // consume '('
        match name {
            "Array" => {
                let item = self.parse_type()?;
                self.expect(b')')?;
                Ok(Type::array(item))
            }
            "Nullable" => {
                let inner = self.parse_type()?;
                self.expect(b')')?;
                Ok(Type::nullable(inner))
            }
            "LowCardinality" => {
                let inner = self.parse_type()?;
                self.expect(b')')?;
                Ok(Type::low_cardinality(inner))
            }
            "FixedString" => {
                let size = self.unsigned("FixedString size", i64::MAX)?;
                self.expect(b')')?;
                Ok(Type::fixed_string(size as usize))
            }
            "Decimal" => {
                let precision = self.unsigned("Decimal precision", 255)?;
                self.expect(b',')?;
                let scale = self.unsigned("Decimal scale", 255)?;
                self.expect(b')')?;
                Ok(Type::decimal(precision as u8, scale as u8))
            }
            "Decimal32" => self.sized_decimal(9),
            "Decimal64" => self.sized_decimal(18),
            "Decimal128" => self.sized_decimal(38),
            "Decimal256" => self.sized_decimal(76),
            "DateTime" => {
                let tz = self.quoted_string()?;
                self.expect(b')')?;
                Ok(Type::datetime(Some(tz)))
            }
            "DateTime64" => {
                let precision = self.unsigned("DateTime64 precision", 255)?;
                self.skip_whitespace();
                let timezone = if self.peek() == Some(b',') {
                    self.pos += 1;
                    Some(self.quoted_string()?)
                } else {
                    None
                };
                self.expect(b')')?;
                Ok(Type::datetime64(precision as u8, timezone))
            }
            "Time64" => {
                let precision = self.unsigned("Time64 precision", 255)?;
                self.expect(b')')?;
                Ok(Type::Time64 { precision: precision as u8 })
            }
            "Enum8" => Ok(Type::Enum8 { items: self.enum_items()? }),
            "Enum16" => Ok(Type::Enum16 { items: self.enum_items()? }),
            "Tuple" => {
                let mut items = Vec::new();
                loop {
                    items.push(self.parse_type()?);
                    if !self.more_args()? {
                        break;
                    }
                }
                Ok(Type::tuple(items))
            }
            "Nested" => Ok(Type::Nested { fields: self.named_fields()? }),
            "Map" => {
                let key = self.parse_type()?;
                self.expect(b',')?;
                let value = self.parse_type()?;
                self.expect(b')')?;
                Ok(Type::map(key, value))
            }
            "Variant" => {
                let mut items = Vec::new();
                loop {
                    items.push(self.parse_type()?);
                    if !self.more_args()? {
                        break;
                    }
                }
                Ok(Type::Variant { item_types: items })
            }
            "JSON" => Ok(Type::Json { typed_paths: self.named_fields()? }),
            "QBit" => {
                let element = self.parse_type()?;
                self.expect(b',')?;
                let bits = self.unsigned("QBit width", i64::MAX)?;
                self.expect(b')')?;
                Ok(Type::QBit {
                    element_type: Box::new(element),
                    bits: bits as usize,
                })
            }
            // SimpleAggregateFunction(fn, T) reads as plain T.
            "SimpleAggregateFunction" => {
                let _function = self.identifier()?;
                self.expect(b',')?;
                let inner = self.parse_type()?;
                self.expect(b')')?;
                Ok(inner)
            }
            "AggregateFunction" => Err(Error::parse(
                "AggregateFunction columns are not supported; finalize the \
                 aggregation with -State combinators or use \
                 SimpleAggregateFunction",
                name_start,
            )),
            other => Err(Error::parse(
                format!("unknown parametric type '{}'", other),
                name_start,
            )),
        }
    }

    fn sized_decimal(&mut self, precision: u8) -> Result<Type> {
        let scale = self.unsigned("Decimal scale", 255)?;
        self.expect(b')')?;
        Ok(Type::decimal(precision, scale as u8))
    }

    fn enum_items(&mut self) -> Result<Vec<EnumItem>> {
        let mut items = Vec::new();
        loop {
            let name = self.quoted_string()?;
            self.expect(b'=')?;
            let start = self.pos;
            let value = self.integer()?;
            if value < i32::MIN as i64 || value > i32::MAX as i64 {
                return Err(Error::parse(
                    format!("enum value {} out of range", value),
                    start,
                ));
            }
            items.push(EnumItem { name, value: value as i32 });
            if !self.more_args()? {
                break;
            }
        }
        Ok(items)
    }

    fn named_fields(&mut self) -> Result<Vec<NamedField>> {
        let mut fields = Vec::new();
        loop {
            let name = self.identifier()?.to_string();
            let field_type = self.parse_type()?;
            fields.push(NamedField { name, field_type });
            if !self.more_args()? {
                break;
            }
        }
        Ok(fields)
    }

    fn simple_type(&mut self, name: &str, name_start: usize) -> Result<Type> {
        match name {
            "Nothing" => Ok(Type::Nothing),
            "Bool" | "Boolean" => Ok(Type::Bool),
            "Int8" => Ok(Type::Int8),
            "Int16" => Ok(Type::Int16),
            "Int32" => Ok(Type::Int32),
            "Int64" => Ok(Type::Int64),
            "Int128" => Ok(Type::Int128),
            "Int256" => Ok(Type::Int256),
            "UInt8" => Ok(Type::UInt8),
            "UInt16" => Ok(Type::UInt16),
            "UInt32" => Ok(Type::UInt32),
            "UInt64" => Ok(Type::UInt64),
            "UInt128" => Ok(Type::UInt128),
            "UInt256" => Ok(Type::UInt256),
            "Float32" => Ok(Type::Float32),
            "Float64" => Ok(Type::Float64),
            "String" => Ok(Type::String),
            "UUID" => Ok(Type::Uuid),
            "IPv4" => Ok(Type::Ipv4),
            "IPv6" => Ok(Type::Ipv6),
            "Date" => Ok(Type::Date),
            "Date32" => Ok(Type::Date32),
            "DateTime" => Ok(Type::datetime(None)),
            "Time" => Ok(Type::Time),
            "JSON" => Ok(Type::Json { typed_paths: Vec::new() }),
            other => Err(Error::parse(
                format!("unknown type '{}'", other),
                name_start,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Type {
        parse_type_name(s).unwrap()
    }

    #[test]
    fn test_parse_simple() {
        assert_eq!(parse("Int32"), Type::Int32);
        assert_eq!(parse("UInt256"), Type::UInt256);
        assert_eq!(parse("String"), Type::String);
        assert_eq!(parse("Bool"), Type::Bool);
        assert_eq!(parse(" DateTime "), Type::datetime(None));
    }

    #[test]
    fn test_parse_parametric() {
        assert_eq!(parse("FixedString(16)"), Type::fixed_string(16));
        assert_eq!(parse("Decimal(18, 6)"), Type::decimal(18, 6));
        assert_eq!(parse("Decimal64(6)"), Type::decimal(18, 6));
        assert_eq!(parse("Decimal256(20)"), Type::decimal(76, 20));
        assert_eq!(
            parse("DateTime('Europe/Amsterdam')"),
            Type::datetime(Some("Europe/Amsterdam".to_string()))
        );
        assert_eq!(parse("DateTime64(3)"), Type::datetime64(3, None));
        assert_eq!(
            parse("DateTime64(3, 'UTC')"),
            Type::datetime64(3, Some("UTC".to_string()))
        );
        assert_eq!(parse("Time64(6)"), Type::Time64 { precision: 6 });
    }

    #[test]
    fn test_parse_deeply_nested() {
        let t = parse("Array(Nullable(Tuple(String, DateTime64(3,'UTC'))))");
        assert_eq!(
            t,
            Type::array(Type::nullable(Type::tuple(vec![
                Type::String,
                Type::datetime64(3, Some("UTC".to_string())),
            ])))
        );
    }

    #[test]
    fn test_parse_enum() {
        let t = parse("Enum8('a' = 1, 'b' = 2)");
        assert_eq!(
            t,
            Type::Enum8 {
                items: vec![EnumItem::new("a", 1), EnumItem::new("b", 2)],
            }
        );
        // Quote doubling inside names.
        let t = parse("Enum8('it''s' = -1)");
        assert_eq!(
            t,
            Type::Enum8 { items: vec![EnumItem::new("it's", -1)] }
        );
    }

    #[test]
    fn test_parse_map_and_variant() {
        assert_eq!(
            parse("Map(String, Array(Int64))"),
            Type::map(Type::String, Type::array(Type::Int64))
        );
        assert_eq!(
            parse("Variant(String, UInt64)"),
            Type::Variant { item_types: vec![Type::String, Type::UInt64] }
        );
    }

    #[test]
    fn test_parse_nested_and_json() {
        let t = parse("Nested(id UInt64, name String)");
        assert_eq!(
            t,
            Type::Nested {
                fields: vec![
                    NamedField::new("id", Type::UInt64),
                    NamedField::new("name", Type::String),
                ],
            }
        );
        assert_eq!(parse("JSON"), Type::Json { typed_paths: vec![] });
        let t = parse("JSON(a.b UInt32, c String)");
        assert_eq!(
            t,
            Type::Json {
                typed_paths: vec![
                    NamedField::new("a.b", Type::UInt32),
                    NamedField::new("c", Type::String),
                ],
            }
        );
    }

    #[test]
    fn test_parse_qbit() {
        assert_eq!(
            parse("QBit(Float32, 16)"),
            Type::QBit { element_type: Box::new(Type::Float32), bits: 16 }
        );
    }

    #[test]
    fn test_simple_aggregate_function_unwraps() {
        assert_eq!(parse("SimpleAggregateFunction(sum, Int64)"), Type::Int64);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_type_name("").is_err());
        assert!(parse_type_name("Array(").is_err());
        assert!(parse_type_name("Array(Int32) junk").is_err());
        assert!(parse_type_name("Whatever").is_err());
        assert!(parse_type_name("AggregateFunction(sum, Int64)").is_err());
        assert!(parse_type_name("Enum8('a' = )").is_err());
        assert!(parse_type_name("DateTime('UTC")
            .is_err());
    }

    #[test]
    fn test_error_positions() {
        match parse_type_name("Array(Bogus)") {
            Err(crate::Error::Parse { position, .. }) => {
                assert_eq!(position, 6)
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_render_parse_round_trip() {
        let cases = [
            "Int8",
            "UInt256",
            "Float64",
            "Bool",
            "String",
            "FixedString(4)",
            "UUID",
            "IPv4",
            "IPv6",
            "Date",
            "Date32",
            "DateTime",
            "DateTime('UTC')",
            "DateTime64(9, 'Europe/Amsterdam')",
            "Time",
            "Time64(3)",
            "Decimal(76, 38)",
            "Enum8('a' = 1, 'b' = 2)",
            "Enum16('x' = -300)",
            "Array(Nullable(Int64))",
            "LowCardinality(Nullable(String))",
            "Tuple(Int32, Array(Nullable(String)))",
            "Nested(id UInt64, tags Array(String))",
            "Map(String, Map(String, UInt8))",
            "Variant(Array(UInt8), String, UInt64)",
            "JSON",
            "JSON(a.b UInt32)",
            "QBit(Float64, 64)",
        ];
        for case in cases {
            let parsed = parse(case);
            assert_eq!(parsed.name(), case, "canonical form of {}", case);
            assert_eq!(
                parse_type_name(&parsed.name()).unwrap(),
                parsed,
                "round trip of {}",
                case
            );
        }
    }
}
