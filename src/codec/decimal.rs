//! Decimal codecs.
//!
//! A `Decimal(P, S)` value travels as its unscaled integer in two's
//! complement, little-endian, at the width derived from the precision:
//! 4, 8, 16 or 32 bytes. Host values are re-scaled to the column scale
//! before writing; losing non-zero digits is an error.

use super::mismatch;
use crate::io::{
    ByteReader,
    ByteWriter,
};
use crate::types::Type;
use crate::value::{
    fits_in_bytes,
    sign_extend_bytes,
    Decimal,
    Value,
};
use crate::{
    Error,
    Result,
};

pub(super) fn read(
    r: &mut ByteReader<'_>,
    precision: u8,
    scale: u8,
) -> Result<Value> {
    let width = Type::decimal_width(precision);
    let bytes = r.read_bytes(width)?;
    let raw = sign_extend_bytes(bytes, true);
    Ok(Value::Decimal(Decimal::from_raw(raw, scale)))
}

pub(super) fn write(
    w: &mut ByteWriter,
    precision: u8,
    scale: u8,
    value: &Value,
) -> Result<()> {
    let ty = Type::decimal(precision, scale);
    let decimal = match value {
        Value::Decimal(d) => *d,
        // The parsed-from-string form, and integers as unscaled wholes.
        Value::String(s) => s.parse::<Decimal>()?,
        Value::Int8(v) => Decimal::from_i128(*v as i128, 0),
        Value::Int16(v) => Decimal::from_i128(*v as i128, 0),
        Value::Int32(v) => Decimal::from_i128(*v as i128, 0),
        Value::Int64(v) => Decimal::from_i128(*v as i128, 0),
        Value::Int128(v) => Decimal::from_i128(*v, 0),
        Value::UInt8(v) => Decimal::from_i128(*v as i128, 0),
        Value::UInt16(v) => Decimal::from_i128(*v as i128, 0),
        Value::UInt32(v) => Decimal::from_i128(*v as i128, 0),
        Value::UInt64(v) => Decimal::from_i128(*v as i128, 0),
        other => return Err(mismatch(&ty, other)),
    };

    let rescaled = decimal.rescale(scale)?;
    let width = Type::decimal_width(precision);
    if !fits_in_bytes(rescaled.raw(), width) {
        return Err(Error::ValueOutOfRange(format!(
            "{} does not fit {}",
            rescaled,
            ty.name()
        )));
    }
    w.put_slice(&rescaled.raw()[..width]);
    Ok(())
}
