//! Property tests: `read(write(v)) == v` over generated type/value pairs,
//! and `parse(render(t)) == t` over generated types.

use clickhouse_http_client::codec::{
    read_value,
    write_value,
    ReadOptions,
};
use clickhouse_http_client::io::{
    ByteReader,
    ByteWriter,
};
use clickhouse_http_client::{
    Type,
    Value,
};
use proptest::prelude::*;

fn leaf_type() -> impl Strategy<Value = Type> {
    prop_oneof![
        Just(Type::Bool),
        Just(Type::Int8),
        Just(Type::Int32),
        Just(Type::Int64),
        Just(Type::UInt16),
        Just(Type::UInt64),
        Just(Type::Float64),
        Just(Type::String),
        Just(Type::Date),
        Just(Type::Uuid),
    ]
}

/// Leaf types plus one level of container nesting, which exercises the
/// recursive codecs without exploding the search space.
fn full_type() -> impl Strategy<Value = Type> {
    leaf_type().prop_flat_map(|leaf| {
        prop_oneof![
            Just(leaf.clone()),
            Just(Type::array(leaf.clone())),
            Just(Type::array(Type::nullable(leaf.clone()))),
            Just(Type::nullable(leaf.clone())),
            Just(Type::map(Type::String, leaf.clone())),
            Just(Type::tuple(vec![Type::Int64, leaf])),
        ]
    })
}

fn value_for(ty: &Type) -> BoxedStrategy<Value> {
    match ty {
        Type::Bool => any::<bool>().prop_map(Value::Bool).boxed(),
        Type::Int8 => any::<i8>().prop_map(Value::Int8).boxed(),
        Type::Int32 => any::<i32>().prop_map(Value::Int32).boxed(),
        Type::Int64 => any::<i64>().prop_map(Value::Int64).boxed(),
        Type::UInt16 => any::<u16>().prop_map(Value::UInt16).boxed(),
        Type::UInt64 => any::<u64>().prop_map(Value::UInt64).boxed(),
        Type::Float64 => any::<f64>()
            .prop_filter("NaN breaks equality", |v| !v.is_nan())
            .prop_map(Value::Float64)
            .boxed(),
        Type::String => any::<String>().prop_map(Value::String).boxed(),
        Type::Date => (0..=u16::MAX as i32).prop_map(Value::Date).boxed(),
        Type::Uuid => any::<[u8; 16]>()
            .prop_map(|b| Value::Uuid(uuid::Uuid::from_bytes(b)))
            .boxed(),
        Type::Nullable { nested_type } => {
            prop_oneof![Just(Value::Null), value_for(nested_type)].boxed()
        }
        Type::Array { item_type } => {
            prop::collection::vec(value_for(item_type), 0..4)
                .prop_map(Value::Array)
                .boxed()
        }
        // Unique keys: the reader collapses duplicates (last wins), which
        // would break byte-equality of the round trip.
        Type::Map { key_type: _, value_type } => {
            prop::collection::hash_map(
                any::<String>(),
                value_for(value_type),
                0..4,
            )
            .prop_map(|m| {
                Value::Map(
                    m.into_iter()
                        .map(|(k, v)| (Value::String(k), v))
                        .collect(),
                )
            })
            .boxed()
        }
        Type::Tuple { item_types } => item_types
            .iter()
            .map(value_for)
            .collect::<Vec<_>>()
            .prop_map(Value::Tuple)
            .boxed(),
        other => panic!("no value strategy for {}", other.name()),
    }
}

fn typed_value() -> impl Strategy<Value = (Type, Value)> {
    full_type().prop_flat_map(|ty| {
        let values = value_for(&ty);
        (Just(ty), values)
    })
}

proptest! {
    #[test]
    fn codec_round_trip((ty, value) in typed_value()) {
        let mut w = ByteWriter::new();
        write_value(&mut w, &ty, &value).unwrap();
        let bytes = w.into_bytes();

        let mut r = ByteReader::new(&bytes);
        let back = read_value(&mut r, &ty, &ReadOptions::default()).unwrap();
        prop_assert_eq!(back, value);
        prop_assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn type_string_round_trip(ty in full_type()) {
        let rendered = ty.name();
        let parsed = Type::parse(&rendered).unwrap();
        prop_assert_eq!(&*parsed, &ty);
    }

    #[test]
    fn truncated_input_asks_for_refill((ty, value) in typed_value()) {
        let mut w = ByteWriter::new();
        write_value(&mut w, &ty, &value).unwrap();
        let bytes = w.into_bytes();

        // Every strict prefix must fail with the refill sentinel: that is
        // what lets the row cursor retry a row after the next chunk.
        for cut in 0..bytes.len() {
            let mut r = ByteReader::new(&bytes[..cut]);
            let result = read_value(&mut r, &ty, &ReadOptions::default());
            prop_assert!(
                matches!(
                    result,
                    Err(clickhouse_http_client::Error::NotEnoughData)
                ),
                "prefix of len {} decoded to {:?}",
                cut,
                result
            );
        }
    }
}
