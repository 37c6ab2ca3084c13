//! UUID codec.
//!
//! The wire order is two little-endian 8-byte halves, high half first: the
//! canonical big-endian UUID bytes with each half reversed.

use super::mismatch;
use crate::io::{
    ByteReader,
    ByteWriter,
};
use crate::types::Type;
use crate::value::Value;
use crate::Result;
use uuid::Uuid;

pub(super) fn read(r: &mut ByteReader<'_>) -> Result<Value> {
    let wire = r.read_bytes(16)?;
    let mut bytes = [0u8; 16];
    for i in 0..8 {
        bytes[i] = wire[7 - i];
        bytes[8 + i] = wire[15 - i];
    }
    Ok(Value::Uuid(Uuid::from_bytes(bytes)))
}

pub(super) fn write(w: &mut ByteWriter, value: &Value) -> Result<()> {
    let uuid = match value {
        Value::Uuid(u) => *u,
        other => return Err(mismatch(&Type::Uuid, other)),
    };
    let bytes = uuid.as_bytes();
    let mut wire = [0u8; 16];
    for i in 0..8 {
        wire[i] = bytes[7 - i];
        wire[8 + i] = bytes[15 - i];
    }
    w.put_slice(&wire);
    Ok(())
}
