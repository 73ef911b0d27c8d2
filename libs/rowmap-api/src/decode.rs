use crate::error::DecodeError;
use crate::value::Value;

/// Single-value decode capability: "decode one column value into me".
///
/// Cursors call this once per bound slot per row. Implement it on your own
/// type (and mark the type `#[db(decode)]` when it also derives `Scan`) to
/// take full control over conversion; such types are never field-mapped.
pub trait Decode {
    fn decode(&mut self, value: Value) -> Result<(), DecodeError>;
}

/// Slot bound to columns that have no destination field (lenient mode).
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl Decode for Discard {
    fn decode(&mut self, _value: Value) -> Result<(), DecodeError> {
        Ok(())
    }
}

macro_rules! decode_int {
    ($($ty:ty),* $(,)?) => {$(
        impl Decode for $ty {
            fn decode(&mut self, value: Value) -> Result<(), DecodeError> {
                *self = match value {
                    Value::Int64(v) => <$ty>::try_from(v)?,
                    Value::UInt64(v) => <$ty>::try_from(v)?,
                    Value::Bool(v) => <$ty>::from(v),
                    Value::Text(s) => s.trim().parse::<$ty>().map_err(|e| {
                        DecodeError::format(format!("parsing {s:?} as {}: {e}", stringify!($ty)))
                    })?,
                    Value::Null => return Err(DecodeError::null(stringify!($ty))),
                    other => {
                        return Err(DecodeError::mismatch(other.type_name(), stringify!($ty)))
                    }
                };
                Ok(())
            }
        }
    )*};
}

decode_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! decode_float {
    ($($ty:ty),* $(,)?) => {$(
        impl Decode for $ty {
            fn decode(&mut self, value: Value) -> Result<(), DecodeError> {
                let (converted, finite_source) = match value {
                    Value::Float64(v) => (v as $ty, v.is_finite()),
                    Value::Int64(v) => (v as $ty, true),
                    Value::UInt64(v) => (v as $ty, true),
                    Value::Text(s) => {
                        let text = s.trim();
                        let parsed = text.parse::<$ty>().map_err(|e| {
                            DecodeError::format(format!("parsing {s:?} as {}: {e}", stringify!($ty)))
                        })?;
                        let literal = text.trim_start_matches(['+', '-']).to_ascii_lowercase();
                        (parsed, !(literal.starts_with("inf") || literal.starts_with("nan")))
                    }
                    Value::Null => return Err(DecodeError::null(stringify!($ty))),
                    other => {
                        return Err(DecodeError::mismatch(other.type_name(), stringify!($ty)))
                    }
                };
                // Finite input that overflows the target is out of range, not infinity.
                if finite_source && !converted.is_finite() {
                    return Err(DecodeError::range(format!(
                        "value out of range for {}",
                        stringify!($ty)
                    )));
                }
                *self = converted;
                Ok(())
            }
        }
    )*};
}

decode_float!(f32, f64);

impl Decode for bool {
    fn decode(&mut self, value: Value) -> Result<(), DecodeError> {
        *self = match value {
            Value::Bool(v) => v,
            Value::Int64(0) | Value::UInt64(0) => false,
            Value::Int64(1) | Value::UInt64(1) => true,
            Value::Int64(v) => return Err(DecodeError::range(format!("{v} is not a valid bool"))),
            Value::UInt64(v) => return Err(DecodeError::range(format!("{v} is not a valid bool"))),
            Value::Text(s) => match s.trim() {
                "1" | "t" | "T" | "true" | "TRUE" | "True" => true,
                "0" | "f" | "F" | "false" | "FALSE" | "False" => false,
                other => return Err(DecodeError::format(format!("parsing {other:?} as bool"))),
            },
            Value::Null => return Err(DecodeError::null("bool")),
            other => return Err(DecodeError::mismatch(other.type_name(), "bool")),
        };
        Ok(())
    }
}

impl Decode for String {
    fn decode(&mut self, value: Value) -> Result<(), DecodeError> {
        *self = match value {
            Value::Text(s) => s,
            Value::Bytes(b) => String::from_utf8(b)?,
            Value::Int64(v) => v.to_string(),
            Value::UInt64(v) => v.to_string(),
            Value::Float64(v) => v.to_string(),
            Value::Bool(v) => v.to_string(),
            Value::Null => return Err(DecodeError::null("String")),
        };
        Ok(())
    }
}

impl Decode for Vec<u8> {
    fn decode(&mut self, value: Value) -> Result<(), DecodeError> {
        *self = match value {
            Value::Bytes(b) => b,
            Value::Text(s) => s.into_bytes(),
            Value::Null => return Err(DecodeError::null("Vec<u8>")),
            other => return Err(DecodeError::mismatch(other.type_name(), "Vec<u8>")),
        };
        Ok(())
    }
}

/// Raw capture: keeps the cell exactly as the cursor produced it.
impl Decode for Value {
    fn decode(&mut self, value: Value) -> Result<(), DecodeError> {
        *self = value;
        Ok(())
    }
}

/// JSON / JSONB columns arrive as text or bytes and are parsed here.
impl Decode for serde_json::Value {
    fn decode(&mut self, value: Value) -> Result<(), DecodeError> {
        *self = match value {
            Value::Text(s) => serde_json::from_str(&s)?,
            Value::Bytes(b) => serde_json::from_slice(&b)?,
            Value::Null => serde_json::Value::Null,
            Value::Bool(v) => serde_json::Value::Bool(v),
            Value::Int64(v) => v.into(),
            Value::UInt64(v) => v.into(),
            Value::Float64(v) => serde_json::Number::from_f64(v)
                .map(serde_json::Value::Number)
                .ok_or_else(|| DecodeError::range(format!("{v} is not representable in JSON")))?,
        };
        Ok(())
    }
}

impl<T: Decode + Default> Decode for Option<T> {
    fn decode(&mut self, value: Value) -> Result<(), DecodeError> {
        if value.is_null() {
            *self = None;
            return Ok(());
        }
        let mut inner = T::default();
        inner.decode(value)?;
        *self = Some(inner);
        Ok(())
    }
}
