//! String and FixedString codecs.

use super::{
    mismatch,
    ReadOptions,
};
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

pub(super) fn read(
    r: &mut ByteReader<'_>,
    ty: &Type,
    opts: &ReadOptions,
) -> Result<Value> {
    match ty {
        Type::String => {
            let bytes = r.read_str_bytes()?;
            if opts.strings_as_bytes {
                Ok(Value::Bytes(bytes.to_vec()))
            } else {
                Ok(Value::String(std::str::from_utf8(bytes)?.to_string()))
            }
        }
        // FixedString is returned as raw bytes: the padding is part of the
        // value and stripping it would not round-trip.
        Type::FixedString { size } => {
            Ok(Value::Bytes(r.read_bytes(*size)?.to_vec()))
        }
        _ => unreachable!("string codec dispatched for {}", ty.name()),
    }
}

pub(super) fn write(
    w: &mut ByteWriter,
    ty: &Type,
    value: &Value,
) -> Result<()> {
    let bytes: &[u8] = match value {
        Value::String(s) => s.as_bytes(),
        Value::Bytes(b) => b,
        other => return Err(mismatch(ty, other)),
    };
    match ty {
        Type::String => {
            w.write_str_bytes(bytes);
            Ok(())
        }
        Type::FixedString { size } => {
            if bytes.len() > *size {
                return Err(Error::ValueOutOfRange(format!(
                    "{} bytes do not fit FixedString({})",
                    bytes.len(),
                    size
                )));
            }
            w.put_slice(bytes);
            for _ in bytes.len()..*size {
                w.put_u8(0);
            }
            Ok(())
        }
        _ => unreachable!("string codec dispatched for {}", ty.name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_string_pads_short_values() {
        let ty = Type::fixed_string(4);
        let mut w = ByteWriter::new();
        write(&mut w, &ty, &Value::String("ab".to_string())).unwrap();
        assert_eq!(w.as_slice(), b"ab\0\0");
    }

    #[test]
    fn test_fixed_string_overflow_rejected() {
        let ty = Type::fixed_string(2);
        let mut w = ByteWriter::new();
        assert!(write(&mut w, &ty, &Value::String("abc".to_string())).is_err());
    }
}
