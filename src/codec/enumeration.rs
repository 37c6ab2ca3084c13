//! Enum8 and Enum16 codecs.
//!
//! The wire value is the tag-width signed integer. Reads surface the
//! declared variant name as a string; a tag the type does not declare is
//! stream corruption.

use super::mismatch;
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

pub(super) fn read(r: &mut ByteReader<'_>, ty: &Type) -> Result<Value> {
    let tag = match ty {
        Type::Enum8 { .. } => r.read_i8()? as i32,
        Type::Enum16 { .. } => r.read_i16()? as i32,
        _ => unreachable!("enum codec dispatched for {}", ty.name()),
    };
    match ty.enum_name_of(tag) {
        Some(name) => Ok(Value::String(name.to_string())),
        None => Err(Error::Protocol(format!(
            "undeclared enum tag {} for {}",
            tag,
            ty.name()
        ))),
    }
}

pub(super) fn write(
    w: &mut ByteWriter,
    ty: &Type,
    value: &Value,
) -> Result<()> {
    let tag = match value {
        Value::String(name) => {
            ty.enum_value_of(name).ok_or_else(|| {
                Error::ValueOutOfRange(format!(
                    "'{}' is not a variant of {}",
                    name,
                    ty.name()
                ))
            })?
        }
        other => {
            let tag = other
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .ok_or_else(|| mismatch(ty, other))?;
            if ty.enum_name_of(tag).is_none() {
                return Err(Error::ValueOutOfRange(format!(
                    "{} is not a declared value of {}",
                    tag,
                    ty.name()
                )));
            }
            tag
        }
    };
    match ty {
        Type::Enum8 { .. } => w.write_i8(tag as i8),
        Type::Enum16 { .. } => w.write_i16(tag as i16),
        _ => unreachable!("enum codec dispatched for {}", ty.name()),
    }
    Ok(())
}
