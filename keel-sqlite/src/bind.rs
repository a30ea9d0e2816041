use crate::error_message_from_ptr;
use keel_core::{Error, Result, Value, format_date, format_timestamp, truncate_long};
use libsqlite3_sys::*;
use rust_decimal::prelude::ToPrimitive;
use std::{
    ffi::{CStr, c_int},
    os::raw::{c_char, c_void},
};

/// Binds `params` positionally to the placeholders of `statement`.
pub(crate) fn bind_params(statement: *mut sqlite3_stmt, params: &[Value]) -> Result<()> {
    unsafe {
        let expected = sqlite3_bind_parameter_count(statement) as usize;
        if expected != params.len() {
            let error = Error::msg(format!(
                "The query expects {} parameters but {} were provided:\n{}",
                expected,
                params.len(),
                truncate_long!(CStr::from_ptr(sqlite3_sql(statement)).to_string_lossy())
            ));
            log::error!("{:#}", error);
            return Err(error);
        }
        sqlite3_clear_bindings(statement);
    }
    for (i, value) in params.iter().enumerate() {
        bind_index(statement, value, i as c_int + 1)?;
    }
    Ok(())
}

fn bind_text(statement: *mut sqlite3_stmt, index: c_int, v: &str) -> c_int {
    unsafe {
        sqlite3_bind_text(
            statement,
            index,
            v.as_ptr() as *const c_char,
            v.len() as c_int,
            SQLITE_TRANSIENT(),
        )
    }
}

fn bind_index(statement: *mut sqlite3_stmt, value: &Value, index: c_int) -> Result<()> {
    unsafe {
        let rc = match value {
            Value::Null
            | Value::Boolean(None)
            | Value::Int64(None)
            | Value::Float64(None)
            | Value::Decimal(None)
            | Value::Varchar(None)
            | Value::Blob(None)
            | Value::Date(None)
            | Value::Timestamp(None) => sqlite3_bind_null(statement, index),
            Value::Boolean(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
            Value::Int64(Some(v)) => sqlite3_bind_int64(statement, index, *v),
            Value::Float64(Some(v)) => sqlite3_bind_double(statement, index, *v),
            Value::Decimal(Some(v)) => sqlite3_bind_double(
                statement,
                index,
                v.to_f64().ok_or_else(|| {
                    Error::msg(format!("Cannot convert the Decimal value `{}` to f64", v))
                })?,
            ),
            Value::Varchar(Some(v)) => bind_text(statement, index, v),
            Value::Blob(Some(v)) => sqlite3_bind_blob(
                statement,
                index,
                v.as_ptr() as *const c_void,
                v.len() as c_int,
                SQLITE_TRANSIENT(),
            ),
            Value::Date(Some(v)) => bind_text(statement, index, &format_date(v)),
            Value::Timestamp(Some(v)) => bind_text(statement, index, &format_timestamp(v)),
        };
        if rc != SQLITE_OK {
            let db = sqlite3_db_handle(statement);
            let query = sqlite3_sql(statement);
            let error = Error::msg(error_message_from_ptr(&sqlite3_errmsg(db)).to_string())
                .context(format!(
                    "Cannot bind parameter {} to query:\n{}",
                    index,
                    truncate_long!(CStr::from_ptr(query).to_string_lossy())
                ));
            log::error!("{:#}", error);
            return Err(error);
        }
        Ok(())
    }
}
