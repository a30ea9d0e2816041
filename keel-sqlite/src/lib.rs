mod bind;
mod cbox;
mod connection;
mod driver;
mod extract;
mod sql_writer;

use keel_core::{Datasource, DbConf, Result};
use std::{ffi::CStr, ptr};

pub(crate) use cbox::*;
pub use connection::*;
pub use driver::*;
pub use sql_writer::*;

/// Parses `url` (`sqlite://<path>?mode=rwc&max_open=4&...`) and opens a
/// datasource on it.
pub fn open(url: &str) -> Result<Datasource> {
    let conf = DbConf::from_url(url)?;
    Datasource::new(Box::new(SqliteDriver::new(&conf)?), &conf)
}

pub(crate) fn error_message_from_ptr(ptr: &'_ *const std::ffi::c_char) -> &'_ str {
    unsafe {
        if *ptr != ptr::null() {
            CStr::from_ptr(*ptr)
                .to_str()
                .unwrap_or("Unknown error (the error message was not a valid C string)")
        } else {
            "Unknown error (could not extract the error message)"
        }
    }
}
