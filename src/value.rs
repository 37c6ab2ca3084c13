//! Host-side representation of ClickHouse values.
//!
//! [`Value`] is an owned tagged union covering every type the binary codec
//! can read or write. Wide integers ([`Int256`], [`UInt256`]) and
//! [`Decimal`] keep their wire representation: 32 little-endian bytes of
//! two's-complement, so reads and writes never round-trip through a lossy
//! host type.

use crate::types::Type;
use crate::{
    Error,
    Result,
};
use std::fmt;
use std::net::{
    Ipv4Addr,
    Ipv6Addr,
};
use std::str::FromStr;
use uuid::Uuid;

/// Days from 0001-01-01 (CE day 1) to 1970-01-01, chrono's
/// `num_days_from_ce` value for the Unix epoch.
pub(crate) const EPOCH_DAYS_CE: i32 = 719_163;

/// A signed 256-bit integer in wire order: 32 little-endian bytes of
/// two's-complement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Int256(pub [u8; 32]);

/// An unsigned 256-bit integer in wire order: 32 little-endian bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UInt256(pub [u8; 32]);

impl From<i128> for Int256 {
    fn from(v: i128) -> Self {
        Int256(sign_extend_i128(v))
    }
}

impl From<u128> for UInt256 {
    fn from(v: u128) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..16].copy_from_slice(&v.to_le_bytes());
        UInt256(bytes)
    }
}

impl fmt::Display for Int256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let limbs = limbs_from_le_bytes(&self.0);
        if limbs_is_negative(&limbs) {
            write!(f, "-{}", magnitude_to_string(&limbs_negate(&limbs)))
        } else {
            f.write_str(&magnitude_to_string(&limbs))
        }
    }
}

impl fmt::Display for UInt256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&magnitude_to_string(&limbs_from_le_bytes(&self.0)))
    }
}

impl FromStr for Int256 {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (negative, digits) = split_sign(s)?;
        let limbs = magnitude_from_digits(digits)?;
        limbs_into_signed(limbs, negative)
            .map(|l| Int256(limbs_to_le_bytes(&l)))
            .ok_or_else(|| {
                Error::ValueOutOfRange(format!("'{}' exceeds Int256", s))
            })
    }
}

impl FromStr for UInt256 {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (negative, digits) = split_sign(s)?;
        if negative {
            return Err(Error::ValueOutOfRange(format!(
                "'{}' is negative, UInt256 expected",
                s
            )));
        }
        let limbs = magnitude_from_digits(digits)?;
        Ok(UInt256(limbs_to_le_bytes(&limbs)))
    }
}

/// A fixed-point decimal: a 256-bit two's-complement unscaled integer plus a
/// decimal scale. `1234` at scale 2 is the number `12.34`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    raw: [u8; 32],
    scale: u8,
}

impl Decimal {
    /// Builds a decimal from a wire-order unscaled integer and a scale.
    pub fn from_raw(raw: [u8; 32], scale: u8) -> Self {
        Self { raw, scale }
    }

    /// Builds a decimal from an `i128` unscaled integer and a scale.
    pub fn from_i128(unscaled: i128, scale: u8) -> Self {
        Self { raw: sign_extend_i128(unscaled), scale }
    }

    /// The unscaled integer in wire order (32 little-endian bytes).
    pub fn raw(&self) -> &[u8; 32] {
        &self.raw
    }

    /// The number of digits after the decimal point.
    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// The unscaled integer as an `i128`, if it fits.
    pub fn unscaled_i128(&self) -> Option<i128> {
        if !fits_in_bytes(&self.raw, 16) {
            return None;
        }
        let mut lo = [0u8; 16];
        lo.copy_from_slice(&self.raw[..16]);
        Some(i128::from_le_bytes(lo))
    }

    /// Re-scales the unscaled integer to a new scale.
    ///
    /// Scaling up multiplies by a power of ten and fails on 256-bit
    /// overflow; scaling down divides and fails if any non-zero digit would
    /// be truncated.
    pub fn rescale(&self, new_scale: u8) -> Result<Decimal> {
        if new_scale == self.scale {
            return Ok(*self);
        }
        let limbs = limbs_from_le_bytes(&self.raw);
        let negative = limbs_is_negative(&limbs);
        let mut magnitude =
            if negative { limbs_negate(&limbs) } else { limbs };

        if new_scale > self.scale {
            for _ in 0..(new_scale - self.scale) {
                magnitude = limbs_mul_u64(&magnitude, 10).ok_or_else(|| {
                    Error::ValueOutOfRange(format!(
                        "rescaling {} to scale {} overflows",
                        self, new_scale
                    ))
                })?;
            }
        } else {
            for _ in 0..(self.scale - new_scale) {
                let (q, r) = limbs_divmod_u64(&magnitude, 10);
                if r != 0 {
                    return Err(Error::ValueOutOfRange(format!(
                        "rescaling {} to scale {} truncates non-zero digits",
                        self, new_scale
                    )));
                }
                magnitude = q;
            }
        }

        let signed =
            limbs_into_signed(magnitude, negative).ok_or_else(|| {
                Error::ValueOutOfRange(format!(
                    "rescaling {} to scale {} overflows",
                    self, new_scale
                ))
            })?;
        Ok(Decimal { raw: limbs_to_le_bytes(&signed), scale: new_scale })
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let limbs = limbs_from_le_bytes(&self.raw);
        let negative = limbs_is_negative(&limbs);
        let magnitude =
            if negative { limbs_negate(&limbs) } else { limbs };
        let mut digits = magnitude_to_string(&magnitude);

        let scale = self.scale as usize;
        if scale > 0 {
            if digits.len() <= scale {
                let pad = scale + 1 - digits.len();
                digits = "0".repeat(pad) + &digits;
            }
            digits.insert(digits.len() - scale, '.');
        }
        if negative {
            write!(f, "-{}", digits)
        } else {
            f.write_str(&digits)
        }
    }
}

impl FromStr for Decimal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (negative, rest) = split_sign(s)?;
        let (int_part, frac_part) = match rest.split_once('.') {
            Some((i, f)) => (i, f),
            None => (rest, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(Error::ValueOutOfRange(format!(
                "'{}' is not a decimal number",
                s
            )));
        }
        if frac_part.len() > 76 {
            return Err(Error::ValueOutOfRange(format!(
                "'{}' has more than 76 fractional digits",
                s
            )));
        }
        let mut limbs = [0u64; 4];
        for digit in int_part.chars().chain(frac_part.chars()) {
            let d = digit.to_digit(10).ok_or_else(|| {
                Error::ValueOutOfRange(format!(
                    "'{}' is not a decimal number",
                    s
                ))
            })?;
            limbs = limbs_mul_u64(&limbs, 10)
                .and_then(|l| limbs_add_u64(&l, d as u64))
                .ok_or_else(|| {
                    Error::ValueOutOfRange(format!("'{}' exceeds 256 bits", s))
                })?;
        }
        let signed = limbs_into_signed(limbs, negative).ok_or_else(|| {
            Error::ValueOutOfRange(format!("'{}' exceeds 256 bits", s))
        })?;
        Ok(Decimal {
            raw: limbs_to_le_bytes(&signed),
            scale: frac_part.len() as u8,
        })
    }
}

/// A `DateTime` host value: Unix seconds plus the column's zone id, `None`
/// when the column type declared no zone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DateTimeValue {
    /// Seconds since the Unix epoch.
    pub seconds: i64,
    /// IANA zone id from the column type, or `None` for "zone unspecified".
    pub timezone: Option<String>,
}

/// A `DateTime64` host value: ticks at `10^precision` per second plus the
/// column's zone id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DateTime64Value {
    /// Ticks since the Unix epoch at `10^precision` per second.
    pub ticks: i64,
    /// Number of sub-second decimal digits.
    pub precision: u8,
    /// IANA zone id from the column type, or `None` for "zone unspecified".
    pub timezone: Option<String>,
}

/// One typed path inside a JSON value.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonTypedValue {
    /// Dotted path, e.g. `a.b`.
    pub path: String,
    /// The wire type the value is encoded with.
    pub path_type: Type,
    /// The decoded value.
    pub value: Value,
}

/// A JSON column value: declared typed paths plus the shared-data section of
/// dynamically-typed paths kept in their string form.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JsonNode {
    /// Values of the declared typed paths, in declaration order.
    pub typed: Vec<JsonTypedValue>,
    /// Dynamic `(path, rendered value)` pairs from the shared-data section.
    pub dynamic: Vec<(String, String)>,
}

/// Host representation of any ClickHouse value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integers.
    Int8(i8),
    /// Signed 16-bit integer.
    Int16(i16),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Signed 128-bit integer.
    Int128(i128),
    /// Signed 256-bit integer.
    Int256(Int256),
    /// Unsigned 8-bit integer.
    UInt8(u8),
    /// Unsigned 16-bit integer.
    UInt16(u16),
    /// Unsigned 32-bit integer.
    UInt32(u32),
    /// Unsigned 64-bit integer.
    UInt64(u64),
    /// Unsigned 128-bit integer.
    UInt128(u128),
    /// Unsigned 256-bit integer.
    UInt256(UInt256),
    /// 32-bit float.
    Float32(f32),
    /// 64-bit float.
    Float64(f64),
    /// Fixed-point decimal.
    Decimal(Decimal),
    /// UTF-8 string.
    String(String),
    /// Raw bytes, produced for `String` columns when UTF-8 validation is
    /// disabled and for `FixedString` columns.
    Bytes(Vec<u8>),
    /// UUID.
    Uuid(Uuid),
    /// IPv4 address.
    Ipv4(Ipv4Addr),
    /// IPv6 address.
    Ipv6(Ipv6Addr),
    /// Days since 1970-01-01.
    Date(i32),
    /// Seconds of time-of-day.
    Time(i32),
    /// Ticks of time-of-day; the tick unit comes from the column type.
    Time64(i64),
    /// Seconds since epoch with optional zone id.
    DateTime(DateTimeValue),
    /// Sub-second timestamp with optional zone id.
    DateTime64(DateTime64Value),
    /// Array of values.
    Array(Vec<Value>),
    /// Tuple of values.
    Tuple(Vec<Value>),
    /// Key-value pairs in wire order.
    Map(Vec<(Value, Value)>),
    /// A variant alternative: the declared-type index and the inner value.
    Variant(u8, Box<Value>),
    /// A JSON column value.
    Json(JsonNode),
}

impl Value {
    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Widens any signed or unsigned integer variant that fits into `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int8(v) => Some(*v as i64),
            Value::Int16(v) => Some(*v as i64),
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            Value::Int128(v) => i64::try_from(*v).ok(),
            Value::UInt8(v) => Some(*v as i64),
            Value::UInt16(v) => Some(*v as i64),
            Value::UInt32(v) => Some(*v as i64),
            Value::UInt64(v) => i64::try_from(*v).ok(),
            Value::UInt128(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Widens any unsigned integer variant into `u64`.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt8(v) => Some(*v as u64),
            Value::UInt16(v) => Some(*v as u64),
            Value::UInt32(v) => Some(*v as u64),
            Value::UInt64(v) => Some(*v),
            Value::UInt128(v) => u64::try_from(*v).ok(),
            Value::Int8(v) => u64::try_from(*v).ok(),
            Value::Int16(v) => u64::try_from(*v).ok(),
            Value::Int32(v) => u64::try_from(*v).ok(),
            Value::Int64(v) => u64::try_from(*v).ok(),
            Value::Int128(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Returns the float value of either float variant.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string slice of a [`Value::String`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the bool of a [`Value::Bool`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Infers the ClickHouse type this value would be encoded as when no
    /// explicit type is available.
    ///
    /// Ambiguous hosts (`Null`, decimals, variants, JSON, empty arrays)
    /// return [`Error::ValueOutOfRange`]: the caller must supply an explicit
    /// type or pre-convert, mirroring the parameter-formatting rules.
    pub fn infer_type(&self) -> Result<Type> {
        let ambiguous = |what: &str| {
            Err(Error::ValueOutOfRange(format!(
                "cannot infer a ClickHouse type for {}; supply an explicit type",
                what
            )))
        };
        match self {
            Value::Null => ambiguous("NULL"),
            Value::Bool(_) => Ok(Type::Bool),
            Value::Int8(_) => Ok(Type::Int8),
            Value::Int16(_) => Ok(Type::Int16),
            Value::Int32(_) => Ok(Type::Int32),
            Value::Int64(_) => Ok(Type::Int64),
            Value::Int128(_) => Ok(Type::Int128),
            Value::Int256(_) => Ok(Type::Int256),
            Value::UInt8(_) => Ok(Type::UInt8),
            Value::UInt16(_) => Ok(Type::UInt16),
            Value::UInt32(_) => Ok(Type::UInt32),
            Value::UInt64(_) => Ok(Type::UInt64),
            Value::UInt128(_) => Ok(Type::UInt128),
            Value::UInt256(_) => Ok(Type::UInt256),
            Value::Float32(_) => Ok(Type::Float32),
            Value::Float64(_) => Ok(Type::Float64),
            Value::Decimal(_) => ambiguous("a decimal (width is unknown)"),
            Value::String(_) | Value::Bytes(_) => Ok(Type::String),
            Value::Uuid(_) => Ok(Type::Uuid),
            Value::Ipv4(_) => Ok(Type::Ipv4),
            Value::Ipv6(_) => Ok(Type::Ipv6),
            Value::Date(_) => Ok(Type::Date),
            Value::Time(_) => Ok(Type::Time),
            Value::Time64(_) => ambiguous("Time64 (precision is unknown)"),
            Value::DateTime(v) => {
                Ok(Type::DateTime { timezone: v.timezone.clone() })
            }
            Value::DateTime64(v) => Ok(Type::DateTime64 {
                precision: v.precision,
                timezone: v.timezone.clone(),
            }),
            Value::Array(items) => {
                let mut element: Option<Type> = None;
                let mut has_null = false;
                for item in items {
                    if item.is_null() {
                        has_null = true;
                    } else if element.is_none() {
                        element = Some(item.infer_type()?);
                    }
                }
                let element = match element {
                    Some(e) => e,
                    None => return ambiguous("an array with no typed element"),
                };
                if has_null {
                    Ok(Type::array(Type::nullable(element)))
                } else {
                    Ok(Type::array(element))
                }
            }
            Value::Tuple(items) => {
                let mut types = Vec::with_capacity(items.len());
                for item in items {
                    types.push(item.infer_type()?);
                }
                Ok(Type::tuple(types))
            }
            Value::Map(pairs) => match pairs.first() {
                Some((k, v)) => {
                    Ok(Type::map(k.infer_type()?, v.infer_type()?))
                }
                None => ambiguous("an empty map"),
            },
            Value::Variant(..) => ambiguous("a variant"),
            Value::Json(_) => ambiguous("a JSON value"),
        }
    }
}

macro_rules! impl_value_from {
    ($($from:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$from> for Value {
                fn from(v: $from) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_value_from! {
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    i128 => Int128,
    Int256 => Int256,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    u128 => UInt128,
    UInt256 => UInt256,
    f32 => Float32,
    f64 => Float64,
    Decimal => Decimal,
    String => String,
    Uuid => Uuid,
    Ipv4Addr => Ipv4,
    Ipv6Addr => Ipv6,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<chrono::NaiveDate> for Value {
    fn from(v: chrono::NaiveDate) -> Self {
        use chrono::Datelike;
        Value::Date(v.num_days_from_ce() - EPOCH_DAYS_CE)
    }
}

/// A naive timestamp becomes an unspecified-zone `DateTime`: its wall-clock
/// reading is taken verbatim.
impl From<chrono::NaiveDateTime> for Value {
    fn from(v: chrono::NaiveDateTime) -> Self {
        Value::DateTime(DateTimeValue {
            seconds: v.and_utc().timestamp(),
            timezone: None,
        })
    }
}

impl From<chrono::DateTime<chrono::Utc>> for Value {
    fn from(v: chrono::DateTime<chrono::Utc>) -> Self {
        Value::DateTime(DateTimeValue {
            seconds: v.timestamp(),
            timezone: Some("UTC".to_string()),
        })
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

// 256-bit two's-complement helpers over [u64; 4] little-endian limbs. The
// wire format and the host types above share this representation.

pub(crate) fn limbs_from_le_bytes(bytes: &[u8; 32]) -> [u64; 4] {
    let mut limbs = [0u64; 4];
    for (i, limb) in limbs.iter_mut().enumerate() {
        let mut chunk = [0u8; 8];
        chunk.copy_from_slice(&bytes[i * 8..(i + 1) * 8]);
        *limb = u64::from_le_bytes(chunk);
    }
    limbs
}

pub(crate) fn limbs_to_le_bytes(limbs: &[u64; 4]) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    for (i, limb) in limbs.iter().enumerate() {
        bytes[i * 8..(i + 1) * 8].copy_from_slice(&limb.to_le_bytes());
    }
    bytes
}

pub(crate) fn limbs_is_negative(limbs: &[u64; 4]) -> bool {
    limbs[3] & (1 << 63) != 0
}

pub(crate) fn limbs_is_zero(limbs: &[u64; 4]) -> bool {
    limbs.iter().all(|&l| l == 0)
}

pub(crate) fn limbs_negate(limbs: &[u64; 4]) -> [u64; 4] {
    let mut out = [0u64; 4];
    let mut carry = 1u64;
    for i in 0..4 {
        let (v, c) = (!limbs[i]).overflowing_add(carry);
        out[i] = v;
        carry = c as u64;
    }
    out
}

/// Unsigned multiply by a small factor; `None` on 256-bit overflow.
pub(crate) fn limbs_mul_u64(limbs: &[u64; 4], m: u64) -> Option<[u64; 4]> {
    let mut out = [0u64; 4];
    let mut carry = 0u128;
    for i in 0..4 {
        let product = limbs[i] as u128 * m as u128 + carry;
        out[i] = product as u64;
        carry = product >> 64;
    }
    if carry != 0 {
        None
    } else {
        Some(out)
    }
}

/// Unsigned add of a small addend; `None` on 256-bit overflow.
pub(crate) fn limbs_add_u64(limbs: &[u64; 4], a: u64) -> Option<[u64; 4]> {
    let mut out = *limbs;
    let mut carry = a;
    for limb in out.iter_mut() {
        if carry == 0 {
            break;
        }
        let (v, c) = limb.overflowing_add(carry);
        *limb = v;
        carry = c as u64;
    }
    if carry != 0 {
        None
    } else {
        Some(out)
    }
}

/// Unsigned division by a small divisor, returning quotient and remainder.
pub(crate) fn limbs_divmod_u64(limbs: &[u64; 4], d: u64) -> ([u64; 4], u64) {
    let mut quotient = [0u64; 4];
    let mut remainder = 0u128;
    for i in (0..4).rev() {
        let acc = (remainder << 64) | limbs[i] as u128;
        quotient[i] = (acc / d as u128) as u64;
        remainder = acc % d as u128;
    }
    (quotient, remainder as u64)
}

/// Interprets an unsigned magnitude as a signed 256-bit value, negating if
/// requested. `None` when the magnitude does not fit the signed range.
pub(crate) fn limbs_into_signed(
    magnitude: [u64; 4],
    negative: bool,
) -> Option<[u64; 4]> {
    if !negative {
        if limbs_is_negative(&magnitude) {
            return None;
        }
        return Some(magnitude);
    }
    if limbs_is_zero(&magnitude) {
        return Some(magnitude);
    }
    if limbs_is_negative(&magnitude) {
        // Only -2^255 survives negation into the signed range.
        let min = [0u64, 0, 0, 1 << 63];
        if magnitude == min {
            return Some(min);
        }
        return None;
    }
    Some(limbs_negate(&magnitude))
}

fn magnitude_to_string(limbs: &[u64; 4]) -> String {
    if limbs_is_zero(limbs) {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    let mut current = *limbs;
    while !limbs_is_zero(&current) {
        let (q, r) = limbs_divmod_u64(&current, 10);
        digits.push(b'0' + r as u8);
        current = q;
    }
    digits.reverse();
    String::from_utf8(digits).expect("digits are ASCII")
}

fn magnitude_from_digits(digits: &str) -> Result<[u64; 4]> {
    if digits.is_empty() {
        return Err(Error::ValueOutOfRange(
            "empty integer literal".to_string(),
        ));
    }
    let mut limbs = [0u64; 4];
    for ch in digits.chars() {
        let d = ch.to_digit(10).ok_or_else(|| {
            Error::ValueOutOfRange(format!(
                "'{}' is not an integer literal",
                digits
            ))
        })?;
        limbs = limbs_mul_u64(&limbs, 10)
            .and_then(|l| limbs_add_u64(&l, d as u64))
            .ok_or_else(|| {
                Error::ValueOutOfRange(format!(
                    "'{}' exceeds 256 bits",
                    digits
                ))
            })?;
    }
    Ok(limbs)
}

fn split_sign(s: &str) -> Result<(bool, &str)> {
    let s = s.trim();
    if let Some(rest) = s.strip_prefix('-') {
        Ok((true, rest))
    } else if let Some(rest) = s.strip_prefix('+') {
        Ok((false, rest))
    } else if s.is_empty() {
        Err(Error::ValueOutOfRange("empty numeric literal".to_string()))
    } else {
        Ok((false, s))
    }
}

fn sign_extend_i128(v: i128) -> [u8; 32] {
    let mut bytes = if v < 0 { [0xFFu8; 32] } else { [0u8; 32] };
    bytes[..16].copy_from_slice(&v.to_le_bytes());
    bytes
}

/// True when the 32-byte two's-complement value fits in its first `n` bytes,
/// i.e. the remaining bytes are pure sign extension.
pub(crate) fn fits_in_bytes(raw: &[u8; 32], n: usize) -> bool {
    if n >= 32 {
        return true;
    }
    let sign = if raw[n - 1] & 0x80 != 0 { 0xFFu8 } else { 0x00 };
    raw[n..].iter().all(|&b| b == sign)
}

/// Sign-extends the first `n` bytes of a little-endian two's-complement
/// value to the full 32-byte form.
pub(crate) fn sign_extend_bytes(src: &[u8], signed: bool) -> [u8; 32] {
    let fill = if signed && !src.is_empty() && src[src.len() - 1] & 0x80 != 0
    {
        0xFFu8
    } else {
        0x00
    };
    let mut out = [fill; 32];
    out[..src.len()].copy_from_slice(src);
    out
}
