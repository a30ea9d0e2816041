use crate::{
    CBox,
    bind::bind_params,
    error_message_from_ptr,
    extract::{extract_name, extract_value},
};
use keel_core::{
    Connection, Context, Error, Result, RowLabeled, RowsAffected, Value, truncate_long,
};
use libsqlite3_sys::{
    SQLITE_DONE, SQLITE_OK, SQLITE_ROW, sqlite3, sqlite3_busy_timeout, sqlite3_close,
    sqlite3_column_count, sqlite3_db_handle, sqlite3_errmsg, sqlite3_finalize,
    sqlite3_last_insert_rowid, sqlite3_open_v2, sqlite3_prepare_v2, sqlite3_step, sqlite3_stmt,
    sqlite3_total_changes,
};
use std::{
    ffi::{CString, c_char, c_int},
    ptr,
    sync::Arc,
    time::Duration,
};

pub struct SqliteConnection {
    pub(crate) connection: CBox<*mut sqlite3>,
}

impl SqliteConnection {
    pub fn open(path: &str, flags: c_int, busy_timeout: Duration) -> Result<Self> {
        let context = || format!("Cannot open the sqlite database `{}`", path);
        let c_path = CString::new(path).with_context(context)?;
        unsafe {
            let mut connection = CBox::new(ptr::null_mut(), |p| {
                sqlite3_close(p);
            });
            let rc = sqlite3_open_v2(c_path.as_ptr(), &mut *connection, flags, ptr::null());
            if rc != SQLITE_OK {
                let message = if connection.is_null() {
                    "Out of memory".to_string()
                } else {
                    error_message_from_ptr(&sqlite3_errmsg(*connection)).to_string()
                };
                let error = Error::msg(message).context(context());
                log::error!("{:#}", error);
                return Err(error);
            }
            sqlite3_busy_timeout(
                *connection,
                busy_timeout.as_millis().min(c_int::MAX as u128) as c_int,
            );
            Ok(Self { connection })
        }
    }

    /// Prepares the first statement of `sql`, returns it with the text left
    /// after it. The statement is null when `sql` holds only whitespace or
    /// comments.
    fn prepare<'s>(&mut self, sql: &'s str) -> Result<(CBox<*mut sqlite3_stmt>, &'s str)> {
        unsafe {
            let mut statement = CBox::new(ptr::null_mut(), |p| {
                sqlite3_finalize(p);
            });
            let mut tail: *const c_char = ptr::null();
            let start = sql.as_ptr() as *const c_char;
            let rc = sqlite3_prepare_v2(
                *self.connection,
                start,
                sql.len() as c_int,
                &mut *statement,
                &mut tail,
            );
            if rc != SQLITE_OK {
                let error =
                    Error::msg(error_message_from_ptr(&sqlite3_errmsg(*self.connection)).to_string())
                        .context(format!(
                            "While preparing the query:\n{}",
                            truncate_long!(sql)
                        ));
                log::error!("{:#}", error);
                return Err(error);
            }
            let consumed = if tail.is_null() {
                sql.len()
            } else {
                tail.offset_from(start) as usize
            };
            Ok((statement, sql.get(consumed..).unwrap_or_default()))
        }
    }
}

fn is_insert(sql: &str) -> bool {
    let keyword = sql
        .trim_start()
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default();
    keyword.eq_ignore_ascii_case("insert") || keyword.eq_ignore_ascii_case("replace")
}

/// Steps `statement` to completion, calling `on_row` for every row.
fn step(
    statement: *mut sqlite3_stmt,
    mut on_row: impl FnMut(*mut sqlite3_stmt) -> Result<()>,
) -> Result<()> {
    unsafe {
        loop {
            match sqlite3_step(statement) {
                SQLITE_DONE => return Ok(()),
                SQLITE_ROW => on_row(statement)?,
                _ => {
                    let error = Error::msg(
                        error_message_from_ptr(&sqlite3_errmsg(sqlite3_db_handle(statement)))
                            .to_string(),
                    );
                    log::error!("{}", error);
                    return Err(error);
                }
            }
        }
    }
}

impl Connection for SqliteConnection {
    /// Runs every statement in `sql`, `params` bind to the first one. The
    /// last affected id is only reported for a statement that inserted rows.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<RowsAffected> {
        let before = unsafe { sqlite3_total_changes(*self.connection) };
        let mut last_affected_id = None;
        let mut rest = sql;
        let mut params = params;
        loop {
            let (statement, remaining) = self.prepare(rest)?;
            if statement.is_null() {
                break;
            }
            let text = &rest[..rest.len() - remaining.len()];
            bind_params(*statement, params)?;
            let changes = unsafe { sqlite3_total_changes(*self.connection) };
            step(*statement, |_| Ok(()))?;
            if is_insert(text) && unsafe { sqlite3_total_changes(*self.connection) } > changes {
                last_affected_id = Some(unsafe { sqlite3_last_insert_rowid(*self.connection) });
            }
            params = &[];
            rest = remaining;
            if rest.trim().is_empty() {
                break;
            }
        }
        let changes = unsafe { sqlite3_total_changes(*self.connection) } - before;
        Ok(RowsAffected {
            rows_affected: changes.max(0) as u64,
            last_affected_id,
        })
    }

    fn fetch(&mut self, sql: &str, params: &[Value]) -> Result<Vec<RowLabeled>> {
        let (statement, remaining) = self.prepare(sql)?;
        if statement.is_null() || !remaining.trim().is_empty() {
            let error = Error::msg(format!(
                "Expected exactly one statement in the query:\n{}",
                truncate_long!(sql)
            ));
            log::error!("{:#}", error);
            return Err(error);
        }
        bind_params(*statement, params)?;
        let count = unsafe { sqlite3_column_count(*statement) };
        let labels = (0..count)
            .map(|i| extract_name(*statement, i))
            .collect::<Result<Arc<[_]>>>()?;
        let mut rows = Vec::new();
        step(*statement, |statement| {
            rows.push(RowLabeled::new(
                labels.clone(),
                (0..count)
                    .map(|i| extract_value(statement, i))
                    .collect::<Result<_>>()?,
            ));
            Ok(())
        })?;
        Ok(rows)
    }
}
