//! `RowBinary` value codecs.
//!
//! One read and one write routine per type family, dispatched by `match` on
//! [`Type`]. All routines are synchronous over already-buffered bytes; a
//! read that runs out of buffer reports
//! [`Error::NotEnoughData`](crate::Error::NotEnoughData) so the caller can
//! refill and retry.
//!
//! Reads and writes are exact inverses for every value that round-trips in
//! the host representation.

mod composite;
mod decimal;
mod enumeration;
mod ip;
mod json;
mod numeric;
mod string;
mod temporal;
mod uuid_codec;

use crate::io::{
    ByteReader,
    ByteWriter,
};
use crate::types::Type;
use crate::value::Value;
use crate::{
    Error,
    Result,
};

/// Options affecting how values are materialised on read.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Return `String` columns as raw [`Value::Bytes`] without UTF-8
    /// validation.
    pub strings_as_bytes: bool,
}

/// Reads one value of the given type from the cursor.
pub fn read_value(
    r: &mut ByteReader<'_>,
    ty: &Type,
    opts: &ReadOptions,
) -> Result<Value> {
    match ty {
        // A Nothing value carries no bytes; it only occurs under Nullable.
        Type::Nothing => Ok(Value::Null),
        Type::Bool
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
        | Type::Float64 => numeric::read(r, ty),
        Type::Decimal { precision, scale } => {
            decimal::read(r, *precision, *scale)
        }
        Type::String | Type::FixedString { .. } => string::read(r, ty, opts),
        Type::Uuid => uuid_codec::read(r),
        Type::Ipv4 | Type::Ipv6 => ip::read(r, ty),
        Type::Date
        | Type::Date32
        | Type::DateTime { .. }
        | Type::DateTime64 { .. }
        | Type::Time
        | Type::Time64 { .. } => temporal::read(r, ty),
        Type::Enum8 { .. } | Type::Enum16 { .. } => enumeration::read(r, ty),
        Type::Array { item_type } => composite::read_array(r, item_type, opts),
        Type::Nullable { nested_type } => {
            composite::read_nullable(r, nested_type, opts)
        }
        Type::LowCardinality { nested_type } => {
            // Row-mode framing is the plain nested value.
            read_value(r, nested_type, opts)
        }
        Type::Tuple { item_types } => composite::read_tuple(r, item_types, opts),
        Type::Nested { fields } => composite::read_nested(r, fields, opts),
        Type::Map { key_type, value_type } => {
            composite::read_map(r, key_type, value_type, opts)
        }
        Type::Variant { item_types } => {
            composite::read_variant(r, item_types, opts)
        }
        Type::Json { .. } => json::read(r, opts),
        Type::QBit { bits, .. } => composite::read_qbit(r, *bits),
    }
}

/// Writes one value as the given type.
pub fn write_value(
    w: &mut ByteWriter,
    ty: &Type,
    value: &Value,
) -> Result<()> {
    match ty {
        Type::Nothing => match value {
            Value::Null => Ok(()),
            other => Err(mismatch(ty, other)),
        },
        Type::Bool
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
        | Type::Float64 => numeric::write(w, ty, value),
        Type::Decimal { precision, scale } => {
            decimal::write(w, *precision, *scale, value)
        }
        Type::String | Type::FixedString { .. } => string::write(w, ty, value),
        Type::Uuid => uuid_codec::write(w, value),
        Type::Ipv4 | Type::Ipv6 => ip::write(w, ty, value),
        Type::Date
        | Type::Date32
        | Type::DateTime { .. }
        | Type::DateTime64 { .. }
        | Type::Time
        | Type::Time64 { .. } => temporal::write(w, ty, value),
        Type::Enum8 { .. } | Type::Enum16 { .. } => {
            enumeration::write(w, ty, value)
        }
        Type::Array { item_type } => {
            composite::write_array(w, item_type, value)
        }
        Type::Nullable { nested_type } => {
            composite::write_nullable(w, nested_type, value)
        }
        Type::LowCardinality { nested_type } => {
            write_value(w, nested_type, value)
        }
        Type::Tuple { item_types } => {
            composite::write_tuple(w, item_types, value)
        }
        Type::Nested { fields } => composite::write_nested(w, fields, value),
        Type::Map { key_type, value_type } => {
            composite::write_map(w, key_type, value_type, value)
        }
        Type::Variant { item_types } => {
            composite::write_variant(w, item_types, value)
        }
        Type::Json { .. } => json::write(w, value),
        Type::QBit { bits, .. } => composite::write_qbit(w, *bits, value),
    }
}

/// The standard shape of a host-value / column-type disagreement.
pub(crate) fn mismatch(ty: &Type, value: &Value) -> Error {
    Error::ValueOutOfRange(format!(
        "cannot encode {:?} as {}",
        value,
        ty.name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{
        DateTime64Value,
        DateTimeValue,
        Decimal,
        Int256,
        JsonNode,
        JsonTypedValue,
        UInt256,
    };
    use std::net::{
        Ipv4Addr,
        Ipv6Addr,
    };
    use uuid::Uuid;

    fn round_trip(type_str: &str, value: Value) {
        let ty = Type::parse(type_str).unwrap();
        let mut w = ByteWriter::new();
        write_value(&mut w, &ty, &value).unwrap();
        let bytes = w.into_bytes();
        let mut r = ByteReader::new(&bytes);
        let back =
            read_value(&mut r, &ty, &ReadOptions::default()).unwrap();
        assert_eq!(back, value, "round trip as {}", type_str);
        assert_eq!(r.remaining(), 0, "trailing bytes for {}", type_str);
    }

    #[test]
    fn test_numeric_round_trips() {
        round_trip("Int8", Value::Int8(-7));
        round_trip("Int16", Value::Int16(-300));
        round_trip("Int32", Value::Int32(i32::MIN));
        round_trip("Int64", Value::Int64(i64::MAX));
        round_trip("Int128", Value::Int128(i128::MIN));
        round_trip("UInt8", Value::UInt8(255));
        round_trip("UInt16", Value::UInt16(65535));
        round_trip("UInt32", Value::UInt32(u32::MAX));
        round_trip("UInt64", Value::UInt64(u64::MAX));
        round_trip("UInt128", Value::UInt128(u128::MAX));
        round_trip("Float32", Value::Float32(1.5));
        round_trip("Float64", Value::Float64(-2.25));
        round_trip("Bool", Value::Bool(true));
        round_trip("Bool", Value::Bool(false));
        round_trip(
            "Int256",
            Value::Int256("-123456789012345678901234567890".parse::<Int256>().unwrap()),
        );
        round_trip(
            "UInt256",
            Value::UInt256("987654321098765432109876543210".parse::<UInt256>().unwrap()),
        );
    }

    #[test]
    fn test_string_round_trips() {
        round_trip("String", Value::String("hello".to_string()));
        round_trip("String", Value::String("".to_string()));
        round_trip("String", Value::String("мир 🦀".to_string()));
        round_trip("FixedString(4)", Value::Bytes(vec![1, 2, 3, 4]));
    }

    #[test]
    fn test_temporal_round_trips() {
        round_trip("Date", Value::Date(19000));
        round_trip("Date32", Value::Date(-25567));
        round_trip("Time", Value::Time(-3600));
        round_trip("Time64(6)", Value::Time64(86_400_000_000));
        round_trip(
            "DateTime",
            Value::DateTime(DateTimeValue {
                seconds: 1_700_000_000,
                timezone: None,
            }),
        );
        round_trip(
            "DateTime('UTC')",
            Value::DateTime(DateTimeValue {
                seconds: 1_700_000_000,
                timezone: Some("UTC".to_string()),
            }),
        );
        round_trip(
            "DateTime64(3, 'UTC')",
            Value::DateTime64(DateTime64Value {
                ticks: 1_700_000_000_123,
                precision: 3,
                timezone: Some("UTC".to_string()),
            }),
        );
    }

    #[test]
    fn test_uuid_ip_round_trips() {
        round_trip(
            "UUID",
            Value::Uuid(
                Uuid::parse_str("6f87f67a-1c3e-4d4a-9f6b-6a52c1b2d3e4")
                    .unwrap(),
            ),
        );
        round_trip("IPv4", Value::Ipv4(Ipv4Addr::new(10, 20, 30, 40)));
        round_trip(
            "IPv6",
            Value::Ipv6("2001:db8::ff00:42:8329".parse::<Ipv6Addr>().unwrap()),
        );
    }

    #[test]
    fn test_uuid_wire_order() {
        // Two little-endian 8-byte halves, high half first.
        let uuid =
            Uuid::parse_str("00112233-4455-6677-8899-aabbccddeeff").unwrap();
        let ty = Type::parse("UUID").unwrap();
        let mut w = ByteWriter::new();
        write_value(&mut w, &ty, &Value::Uuid(uuid)).unwrap();
        assert_eq!(
            w.as_slice(),
            &[
                0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11, 0x00, // high half
                0xff, 0xee, 0xdd, 0xcc, 0xbb, 0xaa, 0x99, 0x88, // low half
            ]
        );
    }

    #[test]
    fn test_enum_round_trip_by_name() {
        round_trip(
            "Enum8('a' = 1, 'b' = 2)",
            Value::String("b".to_string()),
        );
        round_trip(
            "Enum16('x' = -300, 'y' = 500)",
            Value::String("x".to_string()),
        );
    }

    #[test]
    fn test_decimal_round_trips() {
        round_trip("Decimal(9, 2)", Value::Decimal(Decimal::from_i128(-1234, 2)));
        round_trip(
            "Decimal(18, 6)",
            Value::Decimal(Decimal::from_i128(123_456_789_012, 6)),
        );
        round_trip(
            "Decimal(38, 18)",
            Value::Decimal(
                "3.141592653589793238".parse::<Decimal>().unwrap(),
            ),
        );
        round_trip(
            "Decimal(76, 20)",
            Value::Decimal(
                "31415926535897932384626433832795.02884197169399375105"
                    .parse::<Decimal>()
                    .unwrap(),
            ),
        );
    }

    #[test]
    fn test_decimal128_pi_string_form() {
        // Write at scale 18, read back, recover the exact string form.
        let ty = Type::parse("Decimal(38, 18)").unwrap();
        let pi: Decimal = "3.141592653589793238".parse().unwrap();
        let mut w = ByteWriter::new();
        write_value(&mut w, &ty, &Value::Decimal(pi)).unwrap();
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), 16);
        let mut r = ByteReader::new(&bytes);
        let back = read_value(&mut r, &ty, &ReadOptions::default()).unwrap();
        match back {
            Value::Decimal(d) => {
                assert_eq!(d.to_string(), "3.141592653589793238")
            }
            other => panic!("expected decimal, got {:?}", other),
        }

        // Twenty fractional digits still fit a 16-byte decimal.
        let ty = Type::parse("Decimal(38, 20)").unwrap();
        let pi: Decimal = "3.14159265358979323846".parse().unwrap();
        let mut w = ByteWriter::new();
        write_value(&mut w, &ty, &Value::Decimal(pi)).unwrap();
        let bytes = w.into_bytes();
        let mut r = ByteReader::new(&bytes);
        match read_value(&mut r, &ty, &ReadOptions::default()).unwrap() {
            Value::Decimal(d) => {
                assert_eq!(d.to_string(), "3.14159265358979323846")
            }
            other => panic!("expected decimal, got {:?}", other),
        }
    }

    #[test]
    fn test_array_nullable_round_trip() {
        round_trip(
            "Array(Nullable(Int64))",
            Value::Array(vec![
                Value::Int64(1),
                Value::Null,
                Value::Int64(-42),
            ]),
        );
    }

    #[test]
    fn test_composite_round_trips() {
        round_trip(
            "Tuple(String, Array(Nullable(String)))",
            Value::Tuple(vec![
                Value::String("head".to_string()),
                Value::Array(vec![
                    Value::Null,
                    Value::String("tail".to_string()),
                ]),
            ]),
        );
        round_trip(
            "Map(String, UInt32)",
            Value::Map(vec![
                (Value::String("a".to_string()), Value::UInt32(1)),
                (Value::String("b".to_string()), Value::UInt32(2)),
            ]),
        );
        round_trip(
            "LowCardinality(Nullable(String))",
            Value::String("dict".to_string()),
        );
        round_trip(
            "Nested(id UInt64, name String)",
            Value::Array(vec![
                Value::Tuple(vec![
                    Value::UInt64(1),
                    Value::String("one".to_string()),
                ]),
                Value::Tuple(vec![
                    Value::UInt64(2),
                    Value::String("two".to_string()),
                ]),
            ]),
        );
    }

    #[test]
    fn test_variant_round_trips() {
        round_trip(
            "Variant(String, UInt64)",
            Value::Variant(1, Box::new(Value::UInt64(9))),
        );
        round_trip("Variant(String, UInt64)", Value::Null);
    }

    #[test]
    fn test_qbit_round_trip() {
        round_trip(
            "QBit(Float32, 16)",
            Value::Array(vec![
                Value::Bytes(vec![0xAB, 0xCD]),
                Value::Bytes(vec![0x01, 0x02]),
            ]),
        );
    }

    #[test]
    fn test_json_round_trip() {
        round_trip(
            "JSON(a.b UInt32)",
            Value::Json(JsonNode {
                typed: vec![JsonTypedValue {
                    path: "a.b".to_string(),
                    path_type: Type::UInt32,
                    value: Value::UInt32(7),
                }],
                dynamic: vec![(
                    "a.c".to_string(),
                    "\"hello\"".to_string(),
                )],
            }),
        );
    }

    #[test]
    fn test_map_duplicate_keys_keep_last() {
        // Two entries for "k"; the reader must keep the later value.
        let ty = Type::parse("Map(String, UInt8)").unwrap();
        let mut w = ByteWriter::new();
        w.write_varint(2);
        w.write_string("k");
        w.put_u8(1);
        w.write_string("k");
        w.put_u8(9);
        let bytes = w.into_bytes();
        let mut r = ByteReader::new(&bytes);
        let read = read_value(&mut r, &ty, &ReadOptions::default()).unwrap();
        assert_eq!(
            read,
            Value::Map(vec![(
                Value::String("k".to_string()),
                Value::UInt8(9)
            )])
        );
    }

    #[test]
    fn test_strings_as_bytes_option() {
        let ty = Type::parse("String").unwrap();
        let mut w = ByteWriter::new();
        write_value(&mut w, &ty, &Value::Bytes(vec![0xFF, 0xFE])).unwrap();
        let bytes = w.into_bytes();

        // Raw mode returns the bytes untouched.
        let opts = ReadOptions { strings_as_bytes: true };
        let mut r = ByteReader::new(&bytes);
        assert_eq!(
            read_value(&mut r, &ty, &opts).unwrap(),
            Value::Bytes(vec![0xFF, 0xFE])
        );

        // Validating mode rejects the invalid UTF-8.
        let mut r = ByteReader::new(&bytes);
        assert!(matches!(
            read_value(&mut r, &ty, &ReadOptions::default()),
            Err(Error::Utf8(_))
        ));
    }

    #[test]
    fn test_nullable_round_trips() {
        round_trip("Nullable(Int64)", Value::Null);
        round_trip("Nullable(Int64)", Value::Int64(5));
        round_trip("Nullable(String)", Value::String("x".to_string()));
    }

    #[test]
    fn test_lossy_writes_rejected() {
        let ty = Type::parse("UInt8").unwrap();
        let mut w = ByteWriter::new();
        assert!(matches!(
            write_value(&mut w, &ty, &Value::Int64(256)),
            Err(Error::ValueOutOfRange(_))
        ));
        let ty = Type::parse("Date").unwrap();
        assert!(matches!(
            write_value(&mut w, &ty, &Value::Date(-1)),
            Err(Error::ValueOutOfRange(_))
        ));
        // Scaling 1.005 into Decimal(9, 2) would drop a non-zero digit.
        let ty = Type::parse("Decimal(9, 2)").unwrap();
        let d: Decimal = "1.005".parse().unwrap();
        assert!(matches!(
            write_value(&mut w, &ty, &Value::Decimal(d)),
            Err(Error::ValueOutOfRange(_))
        ));
    }
}
