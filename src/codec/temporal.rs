//! Date, time and timestamp codecs.
//!
//! The codec never applies zone transformations: the stored instant goes on
//! the wire verbatim, and reads tag the value with the zone declared by the
//! column type (or leave it unspecified when the type declares none).

use super::mismatch;
use crate::io::{
    ByteReader,
    ByteWriter,
};
use crate::types::Type;
use crate::value::{
    DateTime64Value,
    DateTimeValue,
    Value,
};
use crate::{
    Error,
    Result,
};

pub(super) fn read(r: &mut ByteReader<'_>, ty: &Type) -> Result<Value> {
    Ok(match ty {
        Type::Date => Value::Date(r.read_u16()? as i32),
        Type::Date32 => Value::Date(r.read_i32()?),
        Type::Time => Value::Time(r.read_i32()?),
        Type::Time64 { .. } => Value::Time64(r.read_i64()?),
        Type::DateTime { timezone } => Value::DateTime(DateTimeValue {
            seconds: r.read_u32()? as i64,
            timezone: timezone.clone(),
        }),
        Type::DateTime64 { precision, timezone } => {
            Value::DateTime64(DateTime64Value {
                ticks: r.read_i64()?,
                precision: *precision,
                timezone: timezone.clone(),
            })
        }
        _ => unreachable!("temporal codec dispatched for {}", ty.name()),
    })
}

pub(super) fn write(
    w: &mut ByteWriter,
    ty: &Type,
    value: &Value,
) -> Result<()> {
    match ty {
        Type::Date => match value {
            Value::Date(days) => {
                if *days < 0 || *days > u16::MAX as i32 {
                    return Err(Error::ValueOutOfRange(format!(
                        "day {} does not fit Date",
                        days
                    )));
                }
                w.write_u16(*days as u16);
                Ok(())
            }
            other => Err(mismatch(ty, other)),
        },
        Type::Date32 => match value {
            Value::Date(days) => {
                w.write_i32(*days);
                Ok(())
            }
            other => Err(mismatch(ty, other)),
        },
        Type::Time => match value {
            Value::Time(seconds) => {
                w.write_i32(*seconds);
                Ok(())
            }
            other => Err(mismatch(ty, other)),
        },
        Type::Time64 { .. } => match value {
            Value::Time64(ticks) => {
                w.write_i64(*ticks);
                Ok(())
            }
            other => Err(mismatch(ty, other)),
        },
        Type::DateTime { .. } => match value {
            Value::DateTime(v) => {
                if v.seconds < 0 || v.seconds > u32::MAX as i64 {
                    return Err(Error::ValueOutOfRange(format!(
                        "timestamp {} does not fit DateTime",
                        v.seconds
                    )));
                }
                w.write_u32(v.seconds as u32);
                Ok(())
            }
            other => Err(mismatch(ty, other)),
        },
        Type::DateTime64 { precision, .. } => match value {
            Value::DateTime64(v) => {
                let ticks = rescale_ticks(v.ticks, v.precision, *precision)?;
                w.write_i64(ticks);
                Ok(())
            }
            Value::DateTime(v) => {
                let ticks = rescale_ticks(v.seconds, 0, *precision)?;
                w.write_i64(ticks);
                Ok(())
            }
            other => Err(mismatch(ty, other)),
        },
        _ => unreachable!("temporal codec dispatched for {}", ty.name()),
    }
}

/// Moves a tick count between precisions, rejecting overflow and any
/// truncation of non-zero sub-second digits.
pub(crate) fn rescale_ticks(ticks: i64, from: u8, to: u8) -> Result<i64> {
    if from == to {
        return Ok(ticks);
    }
    if to > from {
        let factor = 10i64.pow((to - from) as u32);
        ticks.checked_mul(factor).ok_or_else(|| {
            Error::ValueOutOfRange(format!(
                "{} ticks at precision {} overflow precision {}",
                ticks, from, to
            ))
        })
    } else {
        let factor = 10i64.pow((from - to) as u32);
        if ticks % factor != 0 {
            return Err(Error::ValueOutOfRange(format!(
                "{} ticks at precision {} truncate at precision {}",
                ticks, from, to
            )));
        }
        Ok(ticks / factor)
    }
}
