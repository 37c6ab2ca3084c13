//! Codecs for container types: Array, Nullable, Tuple, Nested, Map,
//! Variant and QBit.

use super::{
    mismatch,
    read_value,
    write_value,
    ReadOptions,
};
use crate::io::{
    ByteReader,
    ByteWriter,
};
use crate::types::{
    NamedField,
    Type,
};
use crate::value::Value;
use crate::{
    Error,
    Result,
};

/// Discriminator byte marking a NULL variant value.
const VARIANT_NULL: u8 = 255;

pub(super) fn read_array(
    r: &mut ByteReader<'_>,
    item_type: &Type,
    opts: &ReadOptions,
) -> Result<Value> {
    let len = r.read_length()?;
    let mut items = Vec::with_capacity(len.min(1024));
    for _ in 0..len {
        items.push(read_value(r, item_type, opts)?);
    }
    Ok(Value::Array(items))
}

pub(super) fn write_array(
    w: &mut ByteWriter,
    item_type: &Type,
    value: &Value,
) -> Result<()> {
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(mismatch(
                &Type::Array { item_type: Box::new(item_type.clone()) },
                other,
            ))
        }
    };
    w.write_varint(items.len() as u64);
    for item in items {
        write_value(w, item_type, item)?;
    }
    Ok(())
}

pub(super) fn read_nullable(
    r: &mut ByteReader<'_>,
    nested_type: &Type,
    opts: &ReadOptions,
) -> Result<Value> {
    match r.read_u8()? {
        1 => Ok(Value::Null),
        0 => read_value(r, nested_type, opts),
        other => Err(Error::Protocol(format!(
            "invalid null flag {}",
            other
        ))),
    }
}

pub(super) fn write_nullable(
    w: &mut ByteWriter,
    nested_type: &Type,
    value: &Value,
) -> Result<()> {
    if value.is_null() {
        w.put_u8(1);
        Ok(())
    } else {
        w.put_u8(0);
        write_value(w, nested_type, value)
    }
}

pub(super) fn read_tuple(
    r: &mut ByteReader<'_>,
    item_types: &[Type],
    opts: &ReadOptions,
) -> Result<Value> {
    let mut items = Vec::with_capacity(item_types.len());
    for item_type in item_types {
        items.push(read_value(r, item_type, opts)?);
    }
    Ok(Value::Tuple(items))
}

pub(super) fn write_tuple(
    w: &mut ByteWriter,
    item_types: &[Type],
    value: &Value,
) -> Result<()> {
    let items = match value {
        Value::Tuple(items) if items.len() == item_types.len() => items,
        other => {
            return Err(mismatch(
                &Type::Tuple { item_types: item_types.to_vec() },
                other,
            ))
        }
    };
    for (item_type, item) in item_types.iter().zip(items) {
        write_value(w, item_type, item)?;
    }
    Ok(())
}

/// Nested is framed as `Array(Tuple(fields...))` on the wire.
pub(super) fn read_nested(
    r: &mut ByteReader<'_>,
    fields: &[NamedField],
    opts: &ReadOptions,
) -> Result<Value> {
    let item_types: Vec<Type> =
        fields.iter().map(|f| f.field_type.clone()).collect();
    let len = r.read_length()?;
    let mut rows = Vec::with_capacity(len.min(1024));
    for _ in 0..len {
        rows.push(read_tuple(r, &item_types, opts)?);
    }
    Ok(Value::Array(rows))
}

pub(super) fn write_nested(
    w: &mut ByteWriter,
    fields: &[NamedField],
    value: &Value,
) -> Result<()> {
    let item_types: Vec<Type> =
        fields.iter().map(|f| f.field_type.clone()).collect();
    let rows = match value {
        Value::Array(rows) => rows,
        other => {
            return Err(mismatch(
                &Type::Nested { fields: fields.to_vec() },
                other,
            ))
        }
    };
    w.write_varint(rows.len() as u64);
    for row in rows {
        write_tuple(w, &item_types, row)?;
    }
    Ok(())
}

pub(super) fn read_map(
    r: &mut ByteReader<'_>,
    key_type: &Type,
    value_type: &Type,
    opts: &ReadOptions,
) -> Result<Value> {
    let len = r.read_length()?;
    let mut pairs: Vec<(Value, Value)> = Vec::with_capacity(len.min(1024));
    for _ in 0..len {
        let key = read_value(r, key_type, opts)?;
        let value = read_value(r, value_type, opts)?;
        // Duplicate keys keep the last value.
        match pairs.iter().position(|(k, _)| *k == key) {
            Some(index) => pairs[index].1 = value,
            None => pairs.push((key, value)),
        }
    }
    Ok(Value::Map(pairs))
}

pub(super) fn write_map(
    w: &mut ByteWriter,
    key_type: &Type,
    value_type: &Type,
    value: &Value,
) -> Result<()> {
    let pairs = match value {
        Value::Map(pairs) => pairs,
        other => {
            return Err(mismatch(
                &Type::map(key_type.clone(), value_type.clone()),
                other,
            ))
        }
    };
    w.write_varint(pairs.len() as u64);
    for (key, val) in pairs {
        write_value(w, key_type, key)?;
        write_value(w, value_type, val)?;
    }
    Ok(())
}

pub(super) fn read_variant(
    r: &mut ByteReader<'_>,
    item_types: &[Type],
    opts: &ReadOptions,
) -> Result<Value> {
    let discriminator = r.read_u8()?;
    if discriminator == VARIANT_NULL {
        return Ok(Value::Null);
    }
    let item_type =
        item_types.get(discriminator as usize).ok_or_else(|| {
            Error::Protocol(format!(
                "variant discriminator {} out of range ({} alternatives)",
                discriminator,
                item_types.len()
            ))
        })?;
    let inner = read_value(r, item_type, opts)?;
    Ok(Value::Variant(discriminator, Box::new(inner)))
}

pub(super) fn write_variant(
    w: &mut ByteWriter,
    item_types: &[Type],
    value: &Value,
) -> Result<()> {
    match value {
        Value::Null => {
            w.put_u8(VARIANT_NULL);
            Ok(())
        }
        Value::Variant(discriminator, inner) => {
            let item_type = item_types
                .get(*discriminator as usize)
                .ok_or_else(|| {
                    Error::ValueOutOfRange(format!(
                        "variant discriminator {} out of range ({} alternatives)",
                        discriminator,
                        item_types.len()
                    ))
                })?;
            w.put_u8(*discriminator);
            write_value(w, item_type, inner)
        }
        other => Err(mismatch(
            &Type::Variant { item_types: item_types.to_vec() },
            other,
        )),
    }
}

/// QBit: a length-prefixed array of fixed-width bit-group elements, each
/// `ceil(bits / 8)` bytes.
pub(super) fn read_qbit(r: &mut ByteReader<'_>, bits: usize) -> Result<Value> {
    let width = bits.div_ceil(8);
    let len = r.read_length()?;
    let mut items = Vec::with_capacity(len.min(1024));
    for _ in 0..len {
        items.push(Value::Bytes(r.read_bytes(width)?.to_vec()));
    }
    Ok(Value::Array(items))
}

pub(super) fn write_qbit(
    w: &mut ByteWriter,
    bits: usize,
    value: &Value,
) -> Result<()> {
    let width = bits.div_ceil(8);
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(Error::ValueOutOfRange(format!(
                "cannot encode {:?} as QBit",
                other
            )))
        }
    };
    w.write_varint(items.len() as u64);
    for item in items {
        match item {
            Value::Bytes(bytes) if bytes.len() == width => {
                w.put_slice(bytes);
            }
            other => {
                return Err(Error::ValueOutOfRange(format!(
                    "QBit element must be {} raw bytes, got {:?}",
                    width, other
                )))
            }
        }
    }
    Ok(())
}
