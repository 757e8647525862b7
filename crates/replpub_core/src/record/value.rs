//! Field values and conversion between field descriptors.

use crate::error::{PublisherError, PublisherResult};
use crate::record::format::{DataType, FieldDesc};

/// Largest power of ten representable in an `i128`.
const MAX_POW10: u32 = 38;

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean value.
    Boolean(bool),
    /// Exact numeric: `units * 10^scale`.
    Exact {
        /// Unscaled integer value.
        units: i128,
        /// Decimal exponent.
        scale: i8,
    },
    /// Approximate numeric.
    Approx(f64),
    /// Text bytes (trailing blanks of `CHAR` fields included).
    Text(Vec<u8>),
    /// Days since 1970-01-01.
    Date(i32),
    /// Date plus time of day in 1/10000 s.
    Timestamp {
        /// Days since 1970-01-01.
        date: i32,
        /// Time of day in 1/10000 s.
        time: u32,
    },
    /// Blob identifier.
    Blob(u64),
}

impl Value {
    /// Creates an integer value with zero scale.
    #[must_use]
    pub fn int(value: i64) -> Self {
        Self::Exact {
            units: i128::from(value),
            scale: 0,
        }
    }

    /// Creates a text value.
    #[must_use]
    pub fn text(value: &str) -> Self {
        Self::Text(value.as_bytes().to_vec())
    }

    /// Returns an exact number rounded to an `i64`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Exact { units, scale } => {
                let units = rescale(units, scale, 0).ok()?;
                i64::try_from(units).ok()
            }
            _ => None,
        }
    }

    /// Returns the text with trailing blanks removed, if this is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(bytes) => std::str::from_utf8(trim_blanks(bytes)).ok(),
            _ => None,
        }
    }
}

/// Decodes the value stored in `slot` according to `desc`.
pub fn decode(desc: &FieldDesc, slot: &[u8]) -> PublisherResult<Value> {
    let expected = desc.data_type().storage_len();
    if slot.len() != expected {
        return Err(PublisherError::invalid_format(format!(
            "field slot is {} bytes, expected {expected}",
            slot.len()
        )));
    }

    let value = match desc.data_type() {
        DataType::Unknown => {
            return Err(PublisherError::invalid_format("cannot decode unknown field"))
        }
        DataType::Boolean => Value::Boolean(slot[0] != 0),
        DataType::SmallInt => exact(i16::from_le_bytes(array(slot)).into(), desc),
        DataType::Integer => exact(i32::from_le_bytes(array(slot)).into(), desc),
        DataType::BigInt => exact(i64::from_le_bytes(array(slot)).into(), desc),
        DataType::Float => Value::Approx(f32::from_le_bytes(array(slot)).into()),
        DataType::Double => Value::Approx(f64::from_le_bytes(array(slot))),
        DataType::Char(_) => Value::Text(slot.to_vec()),
        DataType::VarChar(max) => {
            let len = u16::from_le_bytes([slot[0], slot[1]]);
            if len > max {
                return Err(PublisherError::invalid_format(format!(
                    "varchar length {len} exceeds declared {max}"
                )));
            }
            Value::Text(slot[2..2 + len as usize].to_vec())
        }
        DataType::Date => Value::Date(i32::from_le_bytes(array(slot))),
        DataType::Timestamp => Value::Timestamp {
            date: i32::from_le_bytes(array(&slot[..4])),
            time: u32::from_le_bytes(array(&slot[4..])),
        },
        DataType::Blob => Value::Blob(u64::from_le_bytes(array(slot))),
    };

    Ok(value)
}

/// Encodes `value` into `slot`, converting it to the type described by
/// `desc`.
pub fn encode(desc: &FieldDesc, value: &Value, slot: &mut [u8]) -> PublisherResult<()> {
    let data_type = desc.data_type();
    if slot.len() != data_type.storage_len() {
        return Err(PublisherError::invalid_format(format!(
            "field slot is {} bytes, expected {}",
            slot.len(),
            data_type.storage_len()
        )));
    }

    match data_type {
        DataType::Unknown => Err(PublisherError::invalid_format("cannot encode unknown field")),
        DataType::Boolean => match value {
            Value::Boolean(b) => {
                slot[0] = u8::from(*b);
                Ok(())
            }
            other => Err(incompatible(other, data_type)),
        },
        DataType::SmallInt => {
            let units = to_units(value, desc.scale())?;
            let v = i16::try_from(units).map_err(|_| out_of_range(data_type))?;
            slot.copy_from_slice(&v.to_le_bytes());
            Ok(())
        }
        DataType::Integer => {
            let units = to_units(value, desc.scale())?;
            let v = i32::try_from(units).map_err(|_| out_of_range(data_type))?;
            slot.copy_from_slice(&v.to_le_bytes());
            Ok(())
        }
        DataType::BigInt => {
            let units = to_units(value, desc.scale())?;
            let v = i64::try_from(units).map_err(|_| out_of_range(data_type))?;
            slot.copy_from_slice(&v.to_le_bytes());
            Ok(())
        }
        DataType::Float => {
            let v = to_f64(value)? as f32;
            slot.copy_from_slice(&v.to_le_bytes());
            Ok(())
        }
        DataType::Double => {
            let v = to_f64(value)?;
            slot.copy_from_slice(&v.to_le_bytes());
            Ok(())
        }
        DataType::Char(len) => {
            let text = to_text(value)?;
            let text = fit_text(&text, len as usize)?;
            slot.fill(b' ');
            slot[..text.len()].copy_from_slice(text);
            Ok(())
        }
        DataType::VarChar(max) => {
            let text = to_text(value)?;
            let text = fit_text(&text, max as usize)?;
            slot.fill(0);
            slot[..2].copy_from_slice(&(text.len() as u16).to_le_bytes());
            slot[2..2 + text.len()].copy_from_slice(text);
            Ok(())
        }
        DataType::Date => {
            let date = match *value {
                Value::Date(date) | Value::Timestamp { date, .. } => date,
                ref other => return Err(incompatible(other, data_type)),
            };
            slot.copy_from_slice(&date.to_le_bytes());
            Ok(())
        }
        DataType::Timestamp => {
            let (date, time) = match *value {
                Value::Date(date) => (date, 0),
                Value::Timestamp { date, time } => (date, time),
                ref other => return Err(incompatible(other, data_type)),
            };
            slot[..4].copy_from_slice(&date.to_le_bytes());
            slot[4..].copy_from_slice(&time.to_le_bytes());
            Ok(())
        }
        DataType::Blob => match value {
            Value::Blob(id) => {
                slot.copy_from_slice(&id.to_le_bytes());
                Ok(())
            }
            other => Err(incompatible(other, data_type)),
        },
    }
}

/// Moves a value stored under `from` into `to`, converting as needed.
///
/// Identical descriptors copy the bytes verbatim.
pub fn move_value(
    from: &FieldDesc,
    source: &[u8],
    to: &FieldDesc,
    target: &mut [u8],
) -> PublisherResult<()> {
    if from.data_type() == to.data_type() && from.scale() == to.scale() {
        if source.len() != target.len() {
            return Err(PublisherError::invalid_format("mismatched slot sizes"));
        }
        target.copy_from_slice(source);
        return Ok(());
    }

    let value = decode(from, source)?;
    encode(to, &value, target)
}

fn exact(units: i128, desc: &FieldDesc) -> Value {
    Value::Exact {
        units,
        scale: desc.scale(),
    }
}

fn array<const N: usize>(slot: &[u8]) -> [u8; N] {
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(&slot[..N]);
    bytes
}

fn pow10(exp: u32) -> PublisherResult<i128> {
    if exp > MAX_POW10 {
        return Err(PublisherError::conversion("numeric value is out of range"));
    }
    Ok(10i128.pow(exp))
}

/// Re-expresses `units * 10^from` as units at scale `to`, rounding half away
/// from zero when digits are dropped.
fn rescale(units: i128, from: i8, to: i8) -> PublisherResult<i128> {
    let diff = i32::from(from) - i32::from(to);
    if diff >= 0 {
        units
            .checked_mul(pow10(diff.unsigned_abs())?)
            .ok_or_else(|| PublisherError::conversion("numeric value is out of range"))
    } else {
        let divisor = pow10(diff.unsigned_abs())?;
        let quotient = units / divisor;
        let remainder = units % divisor;
        let remainder = remainder.unsigned_abs();
        if remainder >= divisor.unsigned_abs() - remainder {
            Ok(quotient + units.signum())
        } else {
            Ok(quotient)
        }
    }
}

fn to_units(value: &Value, scale: i8) -> PublisherResult<i128> {
    match value {
        Value::Exact { units, scale: from } => rescale(*units, *from, scale),
        Value::Approx(f) => {
            let scaled = f * 10f64.powi(-i32::from(scale));
            if !scaled.is_finite() || scaled.abs() >= 1e38 {
                return Err(PublisherError::conversion("numeric value is out of range"));
            }
            Ok(scaled.round() as i128)
        }
        Value::Text(bytes) => {
            let (units, from) = parse_decimal(bytes)?;
            rescale(units, from, scale)
        }
        other => Err(PublisherError::conversion(format!(
            "cannot convert {} to an exact numeric",
            kind(other)
        ))),
    }
}

fn to_f64(value: &Value) -> PublisherResult<f64> {
    match value {
        Value::Exact { units, scale } => Ok(*units as f64 * 10f64.powi(i32::from(*scale))),
        Value::Approx(f) => Ok(*f),
        Value::Text(bytes) => std::str::from_utf8(trim_blanks(bytes))
            .ok()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .ok_or_else(|| PublisherError::conversion("conversion error from string")),
        other => Err(PublisherError::conversion(format!(
            "cannot convert {} to an approximate numeric",
            kind(other)
        ))),
    }
}

fn to_text(value: &Value) -> PublisherResult<Vec<u8>> {
    let text = match value {
        Value::Text(bytes) => return Ok(bytes.clone()),
        Value::Exact { units, scale } => format_decimal(*units, *scale),
        Value::Approx(f) => f.to_string(),
        Value::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        other => {
            return Err(PublisherError::conversion(format!(
                "cannot convert {} to text",
                kind(other)
            )))
        }
    };
    Ok(text.into_bytes())
}

/// Fits text into `len` bytes; only trailing blanks may be cut.
fn fit_text(text: &[u8], len: usize) -> PublisherResult<&[u8]> {
    if text.len() <= len {
        return Ok(text);
    }
    let trimmed = trim_blanks(text);
    if trimmed.len() <= len {
        return Ok(&text[..len]);
    }
    Err(PublisherError::conversion(format!(
        "string right truncation: expected length {len}, actual {}",
        trimmed.len()
    )))
}

fn trim_blanks(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|&b| b != b' ')
        .map_or(0, |pos| pos + 1);
    &bytes[..end]
}

fn format_decimal(units: i128, scale: i8) -> String {
    if scale >= 0 {
        let mut s = units.to_string();
        s.extend(std::iter::repeat('0').take(scale as usize));
        return s;
    }

    let digits = units.unsigned_abs().to_string();
    let frac = scale.unsigned_abs() as usize;
    let padded = format!("{digits:0>width$}", width = frac + 1);
    let (int_part, frac_part) = padded.split_at(padded.len() - frac);
    let sign = if units < 0 { "-" } else { "" };
    format!("{sign}{int_part}.{frac_part}")
}

fn parse_decimal(bytes: &[u8]) -> PublisherResult<(i128, i8)> {
    let bad = || PublisherError::conversion("conversion error from string");
    let text = std::str::from_utf8(bytes).map_err(|_| bad())?.trim();

    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(bad());
    }
    if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    let scale = i8::try_from(frac_part.len()).map_err(|_| bad())?;

    let mut units: i128 = 0;
    for b in int_part.bytes().chain(frac_part.bytes()) {
        units = units
            .checked_mul(10)
            .and_then(|u| u.checked_add(i128::from(b - b'0')))
            .ok_or_else(|| PublisherError::conversion("numeric value is out of range"))?;
    }

    Ok((if negative { -units } else { units }, -scale))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Boolean(_) => "boolean",
        Value::Exact { .. } => "exact numeric",
        Value::Approx(_) => "approximate numeric",
        Value::Text(_) => "text",
        Value::Date(_) => "date",
        Value::Timestamp { .. } => "timestamp",
        Value::Blob(_) => "blob",
    }
}

fn incompatible(value: &Value, target: DataType) -> PublisherError {
    PublisherError::conversion(format!("cannot convert {} to {target:?}", kind(value)))
}

fn out_of_range(target: DataType) -> PublisherError {
    PublisherError::conversion(format!("numeric value is out of range for {target:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(data_type: DataType) -> FieldDesc {
        FieldDesc::new(data_type)
    }

    fn roundtrip(d: &FieldDesc, value: &Value) -> Value {
        let mut slot = vec![0u8; d.data_type().storage_len()];
        encode(d, value, &mut slot).unwrap();
        decode(d, &slot).unwrap()
    }

    #[test]
    fn integer_widening() {
        let from = desc(DataType::SmallInt);
        let to = desc(DataType::BigInt);
        let source = (-1234i16).to_le_bytes();
        let mut target = [0u8; 8];

        move_value(&from, &source, &to, &mut target).unwrap();
        assert_eq!(i64::from_le_bytes(target), -1234);
    }

    #[test]
    fn integer_narrowing_overflows() {
        let d = desc(DataType::SmallInt);
        let mut slot = [0u8; 2];
        let err = encode(&d, &Value::int(70_000), &mut slot).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn rescaling_rounds_half_away_from_zero() {
        let d = desc(DataType::Integer).with_scale(-1);
        let value = Value::Exact {
            units: -125,
            scale: -2,
        };
        assert_eq!(
            roundtrip(&d, &value),
            Value::Exact {
                units: -13,
                scale: -1
            }
        );
    }

    #[test]
    fn numbers_to_text_and_back() {
        let text = desc(DataType::VarChar(16));
        let stored = roundtrip(
            &text,
            &Value::Exact {
                units: -505,
                scale: -2,
            },
        );
        assert_eq!(stored.as_str(), Some("-5.05"));

        let numeric = desc(DataType::BigInt).with_scale(-2);
        let back = roundtrip(&numeric, &stored);
        assert_eq!(
            back,
            Value::Exact {
                units: -505,
                scale: -2
            }
        );
    }

    #[test]
    fn char_is_blank_padded() {
        let d = desc(DataType::Char(5));
        let mut slot = [0u8; 5];
        encode(&d, &Value::text("ab"), &mut slot).unwrap();
        assert_eq!(&slot, b"ab   ");
    }

    #[test]
    fn char_to_shorter_varchar_drops_trailing_blanks() {
        let from = desc(DataType::Char(6));
        let to = desc(DataType::VarChar(3));
        let mut target = [0u8; 5];
        move_value(&from, b"abc   ", &to, &mut target).unwrap();
        assert_eq!(decode(&to, &target).unwrap().as_str(), Some("abc"));
    }

    #[test]
    fn text_truncation_is_an_error() {
        let d = desc(DataType::VarChar(2));
        let mut slot = [0u8; 4];
        let err = encode(&d, &Value::text("abc"), &mut slot).unwrap_err();
        assert!(err.to_string().contains("truncation"));
    }

    #[test]
    fn date_and_timestamp_interconvert() {
        let ts = desc(DataType::Timestamp);
        assert_eq!(
            roundtrip(&ts, &Value::Date(19000)),
            Value::Timestamp {
                date: 19000,
                time: 0
            }
        );

        let date = desc(DataType::Date);
        let value = Value::Timestamp {
            date: 19001,
            time: 5000,
        };
        assert_eq!(roundtrip(&date, &value), Value::Date(19001));
    }

    #[test]
    fn blob_to_integer_is_rejected() {
        let d = desc(DataType::Integer);
        let mut slot = [0u8; 4];
        assert!(encode(&d, &Value::Blob(7), &mut slot).is_err());
    }

    #[test]
    fn format_decimal_pads_fraction() {
        assert_eq!(format_decimal(5, -3), "0.005");
        assert_eq!(format_decimal(-5, -1), "-0.5");
        assert_eq!(format_decimal(12, 2), "1200");
    }

    #[test]
    fn parse_decimal_rejects_garbage() {
        assert!(parse_decimal(b"12a").is_err());
        assert!(parse_decimal(b".").is_err());
        assert_eq!(parse_decimal(b" -1.50 ").unwrap(), (-150, -2));
    }

    #[test]
    fn rescale_rounds_full_precision_fractions() {
        let almost_one = 10i128.pow(38) - 1;
        assert_eq!(rescale(almost_one, -38, 0).unwrap(), 1);
        assert_eq!(rescale(-almost_one, -38, 0).unwrap(), -1);

        let half = 5 * 10i128.pow(37);
        assert_eq!(rescale(half, -38, 0).unwrap(), 1);
        assert_eq!(rescale(half - 1, -38, 0).unwrap(), 0);
        assert_eq!(rescale(-(half - 1), -38, 0).unwrap(), 0);
    }

    #[test]
    fn long_text_fraction_moves_to_integer() {
        let from = desc(DataType::VarChar(40));
        let to = desc(DataType::Integer);
        let mut source = vec![0u8; from.data_type().storage_len()];
        let text = format!("0.{}", "9".repeat(38));
        encode(&from, &Value::text(&text), &mut source).unwrap();
        let mut target = [0u8; 4];

        move_value(&from, &source, &to, &mut target).unwrap();
        assert_eq!(i32::from_le_bytes(target), 1);
        let exact = Value::Exact {
            units: 10i128.pow(38) - 1,
            scale: -38,
        };
        assert_eq!(exact.as_i64(), Some(1));
    }
}
