use crate::{SqliteConnection, sql_writer::SqliteSqlWriter};
use keel_core::{Connection, DbConf, Driver, Error, Result, SqlWriter};
use libsqlite3_sys::{SQLITE_OPEN_CREATE, SQLITE_OPEN_READONLY, SQLITE_OPEN_READWRITE};
use std::{ffi::c_int, time::Duration};

/// Opens connections to one database file.
#[derive(Debug)]
pub struct SqliteDriver {
    path: String,
    flags: c_int,
    busy_timeout: Duration,
    writer: SqliteSqlWriter,
}

impl SqliteDriver {
    pub const NAME: &'static str = "sqlite";

    /// `mode` selects how the file is opened: `ro`, `rw`, or `rwc` (default)
    /// which creates it when missing.
    pub fn new(conf: &DbConf) -> Result<Self> {
        if conf.scheme != Self::NAME {
            let error = Error::msg(format!(
                "Expected sqlite connection url to start with `{}://`, found `{}`",
                Self::NAME,
                conf.url
            ));
            log::error!("{:#}", error);
            return Err(error);
        }
        let flags = match conf.option("mode").unwrap_or("rwc") {
            "ro" => SQLITE_OPEN_READONLY,
            "rw" => SQLITE_OPEN_READWRITE,
            "rwc" => SQLITE_OPEN_READWRITE | SQLITE_OPEN_CREATE,
            mode => {
                let error = Error::msg(format!(
                    "Unknown sqlite open mode `{}`, expected one of `ro`, `rw`, `rwc`",
                    mode
                ));
                log::error!("{:#}", error);
                return Err(error);
            }
        };
        Ok(Self {
            path: conf.location.clone(),
            flags,
            busy_timeout: conf.busy_timeout,
            writer: SqliteSqlWriter {},
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Driver for SqliteDriver {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn connect(&self) -> Result<Box<dyn Connection>> {
        Ok(Box::new(SqliteConnection::open(
            &self.path,
            self.flags,
            self.busy_timeout,
        )?))
    }

    fn sql_writer(&self) -> &dyn SqlWriter {
        &self.writer
    }
}
