//! Integer, float and boolean codecs.
//!
//! Fixed-width little-endian values. Writes accept any integer host variant
//! that fits the column width; a value that does not fit is a
//! [`Error::ValueOutOfRange`], never a silent truncation.

use super::mismatch;
use crate::io::{
    ByteReader,
    ByteWriter,
};
use crate::types::Type;
use crate::value::{
    Int256,
    UInt256,
    Value,
};
use crate::{
    Error,
    Result,
};

pub(super) fn read(r: &mut ByteReader<'_>, ty: &Type) -> Result<Value> {
    Ok(match ty {
        Type::Bool => Value::Bool(r.read_u8()? != 0),
        Type::Int8 => Value::Int8(r.read_i8()?),
        Type::Int16 => Value::Int16(r.read_i16()?),
        Type::Int32 => Value::Int32(r.read_i32()?),
        Type::Int64 => Value::Int64(r.read_i64()?),
        Type::Int128 => Value::Int128(r.read_i128()?),
        Type::Int256 => {
            let mut bytes = [0u8; 32];
            bytes.copy_from_slice(r.read_bytes(32)?);
            Value::Int256(Int256(bytes))
        }
        Type::UInt8 => Value::UInt8(r.read_u8()?),
        Type::UInt16 => Value::UInt16(r.read_u16()?),
        Type::UInt32 => Value::UInt32(r.read_u32()?),
        Type::UInt64 => Value::UInt64(r.read_u64()?),
        Type::UInt128 => Value::UInt128(r.read_u128()?),
        Type::UInt256 => {
            let mut bytes = [0u8; 32];
            bytes.copy_from_slice(r.read_bytes(32)?);
            Value::UInt256(UInt256(bytes))
        }
        Type::Float32 => Value::Float32(r.read_f32()?),
        Type::Float64 => Value::Float64(r.read_f64()?),
        _ => unreachable!("numeric codec dispatched for {}", ty.name()),
    })
}

pub(super) fn write(
    w: &mut ByteWriter,
    ty: &Type,
    value: &Value,
) -> Result<()> {
    match ty {
        Type::Bool => match value {
            Value::Bool(b) => {
                w.put_u8(*b as u8);
                Ok(())
            }
            other => Err(mismatch(ty, other)),
        },
        Type::Int8 => w_signed(w, ty, value, 1),
        Type::Int16 => w_signed(w, ty, value, 2),
        Type::Int32 => w_signed(w, ty, value, 4),
        Type::Int64 => w_signed(w, ty, value, 8),
        Type::Int128 => w_signed(w, ty, value, 16),
        Type::Int256 => match value {
            Value::Int256(v) => {
                w.put_slice(&v.0);
                Ok(())
            }
            other => {
                let v = signed_of(other).ok_or_else(|| mismatch(ty, other))?;
                w.put_slice(&Int256::from(v).0);
                Ok(())
            }
        },
        Type::UInt8 => w_unsigned(w, ty, value, 1),
        Type::UInt16 => w_unsigned(w, ty, value, 2),
        Type::UInt32 => w_unsigned(w, ty, value, 4),
        Type::UInt64 => w_unsigned(w, ty, value, 8),
        Type::UInt128 => w_unsigned(w, ty, value, 16),
        Type::UInt256 => match value {
            Value::UInt256(v) => {
                w.put_slice(&v.0);
                Ok(())
            }
            other => {
                let v = unsigned_of(other).ok_or_else(|| mismatch(ty, other))?;
                w.put_slice(&UInt256::from(v).0);
                Ok(())
            }
        },
        Type::Float32 => match value {
            Value::Float32(v) => {
                w.write_f32(*v);
                Ok(())
            }
            other => Err(mismatch(ty, other)),
        },
        Type::Float64 => match value {
            Value::Float64(v) => {
                w.write_f64(*v);
                Ok(())
            }
            Value::Float32(v) => {
                w.write_f64(*v as f64);
                Ok(())
            }
            other => Err(mismatch(ty, other)),
        },
        _ => unreachable!("numeric codec dispatched for {}", ty.name()),
    }
}

/// The i128 reading of any signed or unsigned integer variant.
fn signed_of(value: &Value) -> Option<i128> {
    match value {
        Value::Int8(v) => Some(*v as i128),
        Value::Int16(v) => Some(*v as i128),
        Value::Int32(v) => Some(*v as i128),
        Value::Int64(v) => Some(*v as i128),
        Value::Int128(v) => Some(*v),
        Value::UInt8(v) => Some(*v as i128),
        Value::UInt16(v) => Some(*v as i128),
        Value::UInt32(v) => Some(*v as i128),
        Value::UInt64(v) => Some(*v as i128),
        Value::UInt128(v) => i128::try_from(*v).ok(),
        _ => None,
    }
}

/// The u128 reading of any non-negative integer variant.
fn unsigned_of(value: &Value) -> Option<u128> {
    match value {
        Value::UInt8(v) => Some(*v as u128),
        Value::UInt16(v) => Some(*v as u128),
        Value::UInt32(v) => Some(*v as u128),
        Value::UInt64(v) => Some(*v as u128),
        Value::UInt128(v) => Some(*v),
        Value::Int8(v) => u128::try_from(*v).ok(),
        Value::Int16(v) => u128::try_from(*v).ok(),
        Value::Int32(v) => u128::try_from(*v).ok(),
        Value::Int64(v) => u128::try_from(*v).ok(),
        Value::Int128(v) => u128::try_from(*v).ok(),
        _ => None,
    }
}

fn w_signed(
    w: &mut ByteWriter,
    ty: &Type,
    value: &Value,
    width: usize,
) -> Result<()> {
    let v = signed_of(value).ok_or_else(|| mismatch(ty, value))?;
    let bytes = v.to_le_bytes();
    let fill = if v < 0 { 0xFF } else { 0x00 };
    if bytes[width..].iter().any(|&b| b != fill)
        || (bytes[width - 1] & 0x80 != 0) != (v < 0)
    {
        return Err(Error::ValueOutOfRange(format!(
            "{} does not fit {}",
            v,
            ty.name()
        )));
    }
    w.put_slice(&bytes[..width]);
    Ok(())
}

fn w_unsigned(
    w: &mut ByteWriter,
    ty: &Type,
    value: &Value,
    width: usize,
) -> Result<()> {
    let v = unsigned_of(value).ok_or_else(|| mismatch(ty, value))?;
    let bytes = v.to_le_bytes();
    if bytes[width..].iter().any(|&b| b != 0) {
        return Err(Error::ValueOutOfRange(format!(
            "{} does not fit {}",
            v,
            ty.name()
        )));
    }
    w.put_slice(&bytes[..width]);
    Ok(())
}
