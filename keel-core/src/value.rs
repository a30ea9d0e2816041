use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::fmt::{self, Display};
use time::{Date, PrimitiveDateTime, macros::format_description};

/// Dynamically typed SQL value.
///
/// Every variant but `Null` carries an `Option`, `None` being a typed NULL. Statement
/// parameters and decoded row columns both travel as `Value`.
#[derive(Default, Debug, Clone, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Boolean(Option<bool>),
    Int64(Option<i64>),
    Float64(Option<f64>),
    Decimal(Option<Decimal>),
    Varchar(Option<String>),
    Blob(Option<Box<[u8]>>),
    Date(Option<Date>),
    Timestamp(Option<PrimitiveDateTime>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(
            self,
            Value::Null
                | Value::Boolean(None)
                | Value::Int64(None)
                | Value::Float64(None)
                | Value::Decimal(None)
                | Value::Varchar(None)
                | Value::Blob(None)
                | Value::Date(None)
                | Value::Timestamp(None)
        )
    }

    pub fn same_type(&self, other: &Self) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other)
    }
}

pub fn format_date(value: &Date) -> String {
    value
        .format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| value.to_string())
}

pub fn format_timestamp(value: &PrimitiveDateTime) -> String {
    let result = if value.nanosecond() == 0 {
        value.format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
    } else {
        value.format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"
        ))
    };
    result.unwrap_or_else(|_| value.to_string())
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("NULL");
        }
        match self {
            Value::Boolean(Some(v)) => write!(f, "{}", v),
            Value::Int64(Some(v)) => write!(f, "{}", v),
            Value::Float64(Some(v)) => write!(f, "{}", v),
            Value::Decimal(Some(v)) => write!(f, "{}", v),
            Value::Varchar(Some(v)) => write!(f, "'{}'", v),
            Value::Blob(Some(v)) => write!(f, "<{} bytes>", v.len()),
            Value::Date(Some(v)) => write!(f, "'{}'", format_date(v)),
            Value::Timestamp(Some(v)) => write!(f, "'{}'", format_timestamp(v)),
            _ => f.write_str("NULL"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Boolean(Some(v)) => serializer.serialize_bool(*v),
            Value::Int64(Some(v)) => serializer.serialize_i64(*v),
            Value::Float64(Some(v)) => serializer.serialize_f64(*v),
            Value::Decimal(Some(v)) => serializer.collect_str(v),
            Value::Varchar(Some(v)) => serializer.serialize_str(v),
            Value::Blob(Some(v)) => serializer.serialize_bytes(v),
            Value::Date(Some(v)) => serializer.serialize_str(&format_date(v)),
            Value::Timestamp(Some(v)) => serializer.serialize_str(&format_timestamp(v)),
            _ => serializer.serialize_unit(),
        }
    }
}
