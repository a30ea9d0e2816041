use crate::{Error, Result, Value, truncate_long};
use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};
use std::{any, borrow::Cow, str::FromStr};
use time::{Date, PrimitiveDateTime, Time, macros::format_description};

/// Conversion between native Rust types and the dynamically typed [`Value`].
///
/// `as_value` is used when binding parameters and extracting entity fields,
/// `try_from_value` when decoding row columns into entity fields. Decoding is
/// lenient: drivers with a loose type system (SQLite) hand back integers for
/// booleans and text for decimals or timestamps, those are accepted and parsed.
///
/// ```rust
/// use keel_core::{AsValue, Value};
/// let v = 42i32.as_value();
/// assert_eq!(v, Value::Int64(Some(42)));
/// let n: i32 = AsValue::try_from_value(v).unwrap();
/// assert_eq!(n, 42);
/// ```
pub trait AsValue {
    /// The typed NULL for this type.
    fn as_empty_value() -> Value;
    fn as_value(self) -> Value;
    fn try_from_value(value: Value) -> Result<Self>
    where
        Self: Sized;
}

impl<T: AsValue> From<T> for Value {
    fn from(value: T) -> Self {
        value.as_value()
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Varchar(Some(value.into()))
    }
}

fn conversion_error<T>(value: &Value) -> Error {
    Error::msg(format!(
        "Cannot convert {:?} to {}",
        value,
        any::type_name::<T>()
    ))
}

macro_rules! impl_as_value_integer {
    ($($source:ty),+ $(,)?) => {
        $(
            impl AsValue for $source {
                fn as_empty_value() -> Value {
                    Value::Int64(None)
                }
                fn as_value(self) -> Value {
                    Value::Int64(Some(self as i64))
                }
                fn try_from_value(value: Value) -> Result<Self> {
                    let v = match value {
                        Value::Int64(Some(v)) => v,
                        Value::Boolean(Some(v)) => v as i64,
                        Value::Decimal(Some(ref v)) if v.fract().is_zero() => v
                            .to_i64()
                            .ok_or_else(|| conversion_error::<Self>(&value))?,
                        Value::Varchar(Some(ref v)) => v.trim().parse::<i64>().map_err(|e| {
                            Error::new(e).context(format!(
                                "Cannot parse `{}` as {}",
                                truncate_long!(v),
                                any::type_name::<Self>()
                            ))
                        })?,
                        _ => return Err(conversion_error::<Self>(&value)),
                    };
                    <$source>::try_from(v).map_err(|_| {
                        Error::msg(format!(
                            "Value {v}: i64 is out of range for {}",
                            any::type_name::<Self>(),
                        ))
                    })
                }
            }
        )+
    };
}
impl_as_value_integer!(i8, i16, i32, i64, u8, u16, u32);

/// Values above `i64::MAX` travel as decimals.
impl AsValue for u64 {
    fn as_empty_value() -> Value {
        Value::Int64(None)
    }
    fn as_value(self) -> Value {
        match i64::try_from(self) {
            Ok(v) => Value::Int64(Some(v)),
            Err(..) => Value::Decimal(Some(Decimal::from(self))),
        }
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Decimal(Some(ref v)) if v.fract().is_zero() => {
                v.to_u64().ok_or_else(|| conversion_error::<Self>(&value))
            }
            Value::Varchar(Some(ref v)) => v.trim().parse::<u64>().map_err(|e| {
                Error::new(e).context(format!(
                    "Cannot parse `{}` as u64",
                    truncate_long!(v)
                ))
            }),
            _ => u64::try_from(i64::try_from_value(value)?)
                .map_err(|e| Error::new(e).context("Negative value for u64")),
        }
    }
}

impl AsValue for bool {
    fn as_empty_value() -> Value {
        Value::Boolean(None)
    }
    fn as_value(self) -> Value {
        Value::Boolean(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Boolean(Some(v)) => Ok(v),
            Value::Int64(Some(v)) => Ok(v != 0),
            Value::Varchar(Some(ref v)) => match v.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(conversion_error::<Self>(&value)),
            },
            _ => Err(conversion_error::<Self>(&value)),
        }
    }
}

impl AsValue for f64 {
    fn as_empty_value() -> Value {
        Value::Float64(None)
    }
    fn as_value(self) -> Value {
        Value::Float64(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float64(Some(v)) => Ok(v),
            Value::Int64(Some(v)) => Ok(v as f64),
            Value::Decimal(Some(ref v)) => v.to_f64().ok_or_else(|| conversion_error::<Self>(&value)),
            Value::Varchar(Some(ref v)) => v
                .trim()
                .parse::<f64>()
                .map_err(|e| Error::new(e).context(conversion_error::<Self>(&value))),
            _ => Err(conversion_error::<Self>(&value)),
        }
    }
}

impl AsValue for f32 {
    fn as_empty_value() -> Value {
        Value::Float64(None)
    }
    fn as_value(self) -> Value {
        Value::Float64(Some(self as f64))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        f64::try_from_value(value).map(|v| v as f32)
    }
}

impl AsValue for Decimal {
    fn as_empty_value() -> Value {
        Value::Decimal(None)
    }
    fn as_value(self) -> Value {
        Value::Decimal(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Decimal(Some(v)) => Ok(v),
            Value::Int64(Some(v)) => Ok(Decimal::new(v, 0)),
            Value::Float64(Some(v)) => {
                Decimal::from_f64(v).ok_or_else(|| conversion_error::<Self>(&value))
            }
            Value::Varchar(Some(ref v)) => Decimal::from_str(v.trim()).map_err(|e| {
                Error::new(e).context(format!("Cannot parse `{}` as Decimal", truncate_long!(v)))
            }),
            _ => Err(conversion_error::<Self>(&value)),
        }
    }
}

impl AsValue for String {
    fn as_empty_value() -> Value {
        Value::Varchar(None)
    }
    fn as_value(self) -> Value {
        Value::Varchar(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Varchar(Some(v)) => Ok(v),
            Value::Blob(Some(v)) => String::from_utf8(v.into_vec())
                .map_err(|e| Error::new(e).context("Blob is not valid UTF-8 text")),
            _ => Err(conversion_error::<Self>(&value)),
        }
    }
}

impl<'a> AsValue for Cow<'a, str> {
    fn as_empty_value() -> Value {
        Value::Varchar(None)
    }
    fn as_value(self) -> Value {
        Value::Varchar(Some(self.into()))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        String::try_from_value(value).map(Into::into)
    }
}

impl AsValue for Vec<u8> {
    fn as_empty_value() -> Value {
        Value::Blob(None)
    }
    fn as_value(self) -> Value {
        Value::Blob(Some(self.into_boxed_slice()))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Blob(Some(v)) => Ok(v.into_vec()),
            Value::Varchar(Some(v)) => Ok(v.into_bytes()),
            _ => Err(conversion_error::<Self>(&value)),
        }
    }
}

fn parse_date(input: &str) -> Result<Date> {
    Date::parse(input.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|e| Error::new(e).context(format!("Cannot parse `{}` as Date", input)))
}

fn parse_timestamp(input: &str) -> Result<PrimitiveDateTime> {
    let input = input.trim();
    PrimitiveDateTime::parse(
        input,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]"),
    )
    .or_else(|_| {
        PrimitiveDateTime::parse(
            input,
            format_description!(
                "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
            ),
        )
    })
    .or_else(|_| parse_date(input).map(|v| v.with_time(Time::MIDNIGHT)))
    .map_err(|e| e.context(format!("Cannot parse `{}` as PrimitiveDateTime", input)))
}

impl AsValue for Date {
    fn as_empty_value() -> Value {
        Value::Date(None)
    }
    fn as_value(self) -> Value {
        Value::Date(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Date(Some(v)) => Ok(v),
            Value::Timestamp(Some(v)) => Ok(v.date()),
            Value::Varchar(Some(ref v)) => parse_timestamp(v).map(|v| v.date()),
            _ => Err(conversion_error::<Self>(&value)),
        }
    }
}

impl AsValue for PrimitiveDateTime {
    fn as_empty_value() -> Value {
        Value::Timestamp(None)
    }
    fn as_value(self) -> Value {
        Value::Timestamp(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Timestamp(Some(v)) => Ok(v),
            Value::Date(Some(v)) => Ok(v.with_time(Time::MIDNIGHT)),
            Value::Varchar(Some(ref v)) => parse_timestamp(v),
            _ => Err(conversion_error::<Self>(&value)),
        }
    }
}

impl<T: AsValue> AsValue for Option<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        match self {
            Some(v) => v.as_value(),
            None => T::as_empty_value(),
        }
    }
    fn try_from_value(value: Value) -> Result<Self> {
        Ok(if value.is_null() {
            None
        } else {
            Some(<T as AsValue>::try_from_value(value)?)
        })
    }
}

impl<T: AsValue> AsValue for Box<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        (*self).as_value()
    }
    fn try_from_value(value: Value) -> Result<Self> {
        Ok(Self::new(<T as AsValue>::try_from_value(value)?))
    }
}
