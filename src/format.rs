//! Textual formatting of parameter values.
//!
//! Bound parameters travel in the URL as `param_<name>=<literal>`, and the
//! literal's shape depends on the target type. Two modes exist: the
//! top-level parameter mode leaves strings bare (ClickHouse's `param_`
//! decoder quotes them implicitly), and the "quoted" mode used inside
//! arrays, tuples and maps wraps them in single quotes.
//!
//! Zone-aware timestamps follow the host value's zone kind: UTC and
//! zone-tagged values convert their instant into the declared column zone
//! before rendering, unspecified-zone values render verbatim as wall-clock
//! time. Zone math is resolved through the IANA database.

use crate::types::Type;
use crate::value::{
    DateTime64Value,
    DateTimeValue,
    Value,
    EPOCH_DAYS_CE,
};
use crate::{
    Error,
    Result,
};
use chrono::{
    Datelike,
    NaiveDate,
    TimeZone,
    Utc,
};
use chrono_tz::Tz;
use std::fmt::Write;

/// Formats a parameter value for the URL, using the given target type when
/// one is known (explicit parameter type or SQL hint), and host-type
/// inference otherwise.
pub fn format_parameter(value: &Value, ty: Option<&Type>) -> Result<String> {
    let mut out = String::new();
    format_value(value, ty, false, &mut out)?;
    Ok(out)
}

fn format_value(
    value: &Value,
    ty: Option<&Type>,
    quoted: bool,
    out: &mut String,
) -> Result<()> {
    // Unwrap type-level wrappers first: LowCardinality formats as its inner
    // type, Nullable formats as `null` or its inner type.
    if let Some(t) = ty {
        match t {
            Type::LowCardinality { nested_type } => {
                return format_value(value, Some(nested_type), quoted, out)
            }
            Type::Nullable { nested_type } => {
                if value.is_null() {
                    out.push_str("null");
                    return Ok(());
                }
                return format_value(value, Some(nested_type), quoted, out);
            }
            _ => {}
        }
    }
    if value.is_null() {
        out.push_str("null");
        return Ok(());
    }

    match value {
        Value::Bool(b) => {
            out.push_str(if *b { "true" } else { "false" });
            Ok(())
        }
        Value::Int8(v) => write_plain(out, v),
        Value::Int16(v) => write_plain(out, v),
        Value::Int32(v) => write_plain(out, v),
        Value::Int64(v) => write_plain(out, v),
        Value::Int128(v) => write_plain(out, v),
        Value::Int256(v) => write_plain(out, v),
        Value::UInt8(v) => write_plain(out, v),
        Value::UInt16(v) => write_plain(out, v),
        Value::UInt32(v) => write_plain(out, v),
        Value::UInt64(v) => write_plain(out, v),
        Value::UInt128(v) => write_plain(out, v),
        Value::UInt256(v) => write_plain(out, v),
        Value::Float32(v) => write_float(out, *v as f64, *v),
        Value::Float64(v) => write_float(out, *v, *v as f32),
        Value::Decimal(d) => write_plain(out, d),
        Value::String(s) => {
            write_escaped(out, s, quoted);
            Ok(())
        }
        Value::Bytes(b) => {
            write_escaped(out, &String::from_utf8_lossy(b), quoted);
            Ok(())
        }
        Value::Uuid(u) => {
            write_escaped(out, &u.to_string(), quoted);
            Ok(())
        }
        Value::Ipv4(a) => {
            write_escaped(out, &a.to_string(), quoted);
            Ok(())
        }
        Value::Ipv6(a) => {
            write_escaped(out, &a.to_string(), quoted);
            Ok(())
        }
        Value::Date(days) => {
            let date = NaiveDate::from_num_days_from_ce_opt(
                days + EPOCH_DAYS_CE,
            )
            .ok_or_else(|| {
                Error::ValueOutOfRange(format!("day {} out of range", days))
            })?;
            write_escaped(
                out,
                &format!(
                    "{:04}-{:02}-{:02}",
                    date.year(),
                    date.month(),
                    date.day()
                ),
                quoted,
            );
            Ok(())
        }
        Value::Time(seconds) => {
            write_escaped(out, &render_time(*seconds as i64, 0, 0), quoted);
            Ok(())
        }
        Value::Time64(ticks) => {
            let precision = match ty {
                Some(Type::Time64 { precision }) => *precision,
                _ => {
                    return Err(Error::ValueOutOfRange(
                        "Time64 needs a declared precision to format"
                            .to_string(),
                    ))
                }
            };
            let unit = 10i64.pow(precision as u32);
            write_escaped(
                out,
                &render_time(
                    ticks.div_euclid(unit),
                    ticks.rem_euclid(unit) as u64,
                    precision,
                ),
                quoted,
            );
            Ok(())
        }
        Value::DateTime(v) => {
            let rendered = render_datetime(v, column_zone(ty))?;
            write_escaped(out, &rendered, quoted);
            Ok(())
        }
        Value::DateTime64(v) => {
            let rendered = render_datetime64(v, column_zone(ty))?;
            write_escaped(out, &rendered, quoted);
            Ok(())
        }
        Value::Array(items) => {
            let item_type = match ty {
                Some(Type::Array { item_type }) => Some(item_type.as_ref()),
                _ => None,
            };
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                format_value(item, item_type, true, out)?;
            }
            out.push(']');
            Ok(())
        }
        Value::Tuple(items) => {
            let item_types = match ty {
                Some(Type::Tuple { item_types })
                    if item_types.len() == items.len() =>
                {
                    Some(item_types)
                }
                _ => None,
            };
            out.push('(');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let item_type = item_types.map(|ts| &ts[i]);
                format_value(item, item_type, true, out)?;
            }
            out.push(')');
            Ok(())
        }
        Value::Map(pairs) => {
            let kv_types = match ty {
                Some(Type::Map { key_type, value_type }) => {
                    Some((key_type.as_ref(), value_type.as_ref()))
                }
                _ => None,
            };
            out.push('{');
            for (i, (k, v)) in pairs.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                format_value(k, kv_types.map(|t| t.0), true, out)?;
                out.push(':');
                format_value(v, kv_types.map(|t| t.1), true, out)?;
            }
            out.push('}');
            Ok(())
        }
        Value::Variant(_, inner) => format_value(inner, None, quoted, out),
        Value::Null => unreachable!("handled above"),
        Value::Json(_) => Err(Error::ValueOutOfRange(
            "JSON values cannot be bound as text parameters".to_string(),
        )),
    }
}

fn write_plain<T: std::fmt::Display>(
    out: &mut String,
    value: T,
) -> Result<()> {
    let _ = write!(out, "{}", value);
    Ok(())
}

/// Renders floats with `Infinity`/`-Infinity`/`NaN` preserved. The value's
/// own width drives the digits (`f32` reps must not widen to `f64` noise).
fn write_float(out: &mut String, wide: f64, narrow: f32) -> Result<()> {
    if wide.is_nan() {
        out.push_str("NaN");
    } else if wide.is_infinite() {
        out.push_str(if wide > 0.0 { "Infinity" } else { "-Infinity" });
    } else if narrow as f64 == wide {
        let _ = write!(out, "{}", narrow);
    } else {
        let _ = write!(out, "{}", wide);
    }
    Ok(())
}

/// Single-pass escape of backslash, quote, newline and tab.
fn write_escaped(out: &mut String, s: &str, quoted: bool) {
    if quoted {
        out.push('\'');
    }
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    if quoted {
        out.push('\'');
    }
}

fn column_zone(ty: Option<&Type>) -> Option<&str> {
    match ty {
        Some(Type::DateTime { timezone })
        | Some(Type::DateTime64 { timezone, .. }) => timezone.as_deref(),
        _ => None,
    }
}

fn resolve_zone(name: &str) -> Result<Tz> {
    name.parse::<Tz>().map_err(|_| {
        Error::ValueOutOfRange(format!("unknown timezone '{}'", name))
    })
}

/// The wall-clock reading of an instant: converted into the column zone for
/// zone-tagged host values, verbatim for unspecified-zone values.
fn wall_clock(
    seconds: i64,
    host_zone: Option<&str>,
    column_zone: Option<&str>,
) -> Result<chrono::NaiveDateTime> {
    let utc = Utc
        .timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| {
            Error::ValueOutOfRange(format!(
                "timestamp {} out of range",
                seconds
            ))
        })?;
    match host_zone {
        // Unspecified zone: the seconds already are the wall clock.
        None => Ok(utc.naive_utc()),
        Some(host) => {
            let target = column_zone.unwrap_or(host);
            let zone = resolve_zone(target)?;
            Ok(utc.with_timezone(&zone).naive_local())
        }
    }
}

/// `YYYY-MM-DDTHH:MM:SS`, seconds precision.
fn render_datetime(
    v: &DateTimeValue,
    column_zone: Option<&str>,
) -> Result<String> {
    let wall = wall_clock(v.seconds, v.timezone.as_deref(), column_zone)?;
    Ok(wall.format("%Y-%m-%dT%H:%M:%S").to_string())
}

/// `YYYY-MM-DD HH:MM:SS.fffffff`, exactly 7 fractional digits with extra
/// precision truncated.
fn render_datetime64(
    v: &DateTime64Value,
    column_zone: Option<&str>,
) -> Result<String> {
    let unit = 10i64.pow(v.precision as u32);
    let seconds = v.ticks.div_euclid(unit);
    let sub = v.ticks.rem_euclid(unit) as u64;
    let frac7 = if v.precision <= 7 {
        sub * 10u64.pow((7 - v.precision) as u32)
    } else {
        sub / 10u64.pow((v.precision - 7) as u32)
    };
    let wall = wall_clock(seconds, v.timezone.as_deref(), column_zone)?;
    Ok(format!(
        "{}.{:07}",
        wall.format("%Y-%m-%d %H:%M:%S"),
        frac7
    ))
}

fn render_time(seconds: i64, sub: u64, precision: u8) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    let abs = seconds.abs();
    let mut rendered = format!(
        "{}{:02}:{:02}:{:02}",
        sign,
        abs / 3600,
        (abs / 60) % 60,
        abs % 60
    );
    if precision > 0 {
        let _ = write!(
            rendered,
            ".{:0width$}",
            sub,
            width = precision as usize
        );
    }
    rendered
}
