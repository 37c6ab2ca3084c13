//! IPv4 and IPv6 codecs.
//!
//! IPv4 travels as a little-endian UInt32; IPv6 as its 16 bytes in network
//! order.

use super::mismatch;
use crate::io::{
    ByteReader,
    ByteWriter,
};
use crate::types::Type;
use crate::value::Value;
use crate::Result;
use std::net::{
    Ipv4Addr,
    Ipv6Addr,
};

pub(super) fn read(r: &mut ByteReader<'_>, ty: &Type) -> Result<Value> {
    match ty {
        Type::Ipv4 => Ok(Value::Ipv4(Ipv4Addr::from(r.read_u32()?))),
        Type::Ipv6 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(r.read_bytes(16)?);
            Ok(Value::Ipv6(Ipv6Addr::from(octets)))
        }
        _ => unreachable!("ip codec dispatched for {}", ty.name()),
    }
}

pub(super) fn write(
    w: &mut ByteWriter,
    ty: &Type,
    value: &Value,
) -> Result<()> {
    match (ty, value) {
        (Type::Ipv4, Value::Ipv4(addr)) => {
            w.write_u32(u32::from(*addr));
            Ok(())
        }
        (Type::Ipv6, Value::Ipv6(addr)) => {
            w.put_slice(&addr.octets());
            Ok(())
        }
        (_, other) => Err(mismatch(ty, other)),
    }
}
