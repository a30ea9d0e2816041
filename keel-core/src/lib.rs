mod as_value;
mod config;
mod cursor;
mod dao;
mod driver;
mod entity;
mod matcher;
mod modifier;
mod order;
mod pool;
mod sql_writer;
mod statement;
mod trace;
mod unit_of_work;
mod util;
mod value;

pub use ::anyhow::Context;
pub use as_value::*;
pub use config::*;
pub use cursor::*;
pub use dao::*;
pub use driver::*;
pub use entity::*;
pub use matcher::*;
pub use modifier::*;
pub use order::*;
pub use pool::*;
pub use sql_writer::*;
pub use statement::*;
pub use trace::*;
pub use unit_of_work::*;
pub use util::*;
pub use value::*;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
