//! JSON column codec.
//!
//! A JSON value travels in two sections: the typed paths (a LEB128 count,
//! then per path its name, its inline type string and its binary value),
//! followed by the shared-data section of dynamically-typed paths kept as
//! rendered strings.

use super::{
    read_value,
    write_value,
    ReadOptions,
};
use crate::io::{
    ByteReader,
    ByteWriter,
};
use crate::types::Type;
use crate::value::{
    JsonNode,
    JsonTypedValue,
    Value,
};
use crate::{
    Error,
    Result,
};

pub(super) fn read(
    r: &mut ByteReader<'_>,
    opts: &ReadOptions,
) -> Result<Value> {
    let typed_count = r.read_length()?;
    let mut typed = Vec::with_capacity(typed_count.min(1024));
    for _ in 0..typed_count {
        let path = r.read_string()?;
        let type_name = r.read_string()?;
        let path_type = Type::parse(&type_name)?;
        let value = read_value(r, &path_type, opts)?;
        typed.push(JsonTypedValue {
            path,
            path_type: (*path_type).clone(),
            value,
        });
    }

    let dynamic_count = r.read_length()?;
    let mut dynamic = Vec::with_capacity(dynamic_count.min(1024));
    for _ in 0..dynamic_count {
        let path = r.read_string()?;
        let rendered = r.read_string()?;
        dynamic.push((path, rendered));
    }

    Ok(Value::Json(JsonNode { typed, dynamic }))
}

pub(super) fn write(w: &mut ByteWriter, value: &Value) -> Result<()> {
    let node = match value {
        Value::Json(node) => node,
        other => {
            return Err(Error::ValueOutOfRange(format!(
                "cannot encode {:?} as JSON",
                other
            )))
        }
    };

    w.write_varint(node.typed.len() as u64);
    for entry in &node.typed {
        w.write_string(&entry.path);
        w.write_string(&entry.path_type.name());
        write_value(w, &entry.path_type, &entry.value)?;
    }

    w.write_varint(node.dynamic.len() as u64);
    for (path, rendered) in &node.dynamic {
        w.write_string(path);
        w.write_string(rendered);
    }
    Ok(())
}
