#![allow(dead_code)]

use keel_core::{
    AsValue, Connection, DbConf, Driver, EntityDescriptor, Error, GenericSqlWriter, Result,
    RowLabeled, RowNames, RowsAffected, SqlWriter, Value,
};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

/// What the mock connections saw, shared with the test.
#[derive(Default)]
pub struct Journal {
    pub statements: Mutex<Vec<(usize, String, Vec<Value>)>>,
    pub connected: AtomicUsize,
    pub closed: AtomicUsize,
    /// Statements containing this text fail.
    pub fail_on: Mutex<Option<String>>,
    /// Rows served to every fetch, sliced by a trailing `limit n offset m`.
    pub rows: Mutex<Vec<RowLabeled>>,
}

impl Journal {
    pub fn sql(&self) -> Vec<String> {
        self.statements
            .lock()
            .unwrap()
            .iter()
            .map(|(_, sql, _)| sql.clone())
            .collect()
    }

    pub fn fail_on(&self, text: &str) {
        *self.fail_on.lock().unwrap() = Some(text.into());
    }

    pub fn set_rows(&self, labels: &[&str], rows: Vec<Vec<Value>>) {
        let labels: RowNames = labels.iter().map(|v| v.to_string()).collect();
        *self.rows.lock().unwrap() = rows
            .into_iter()
            .map(|v| RowLabeled::new(labels.clone(), v.into()))
            .collect();
    }

    pub fn fetches(&self) -> usize {
        self.sql().iter().filter(|v| v.starts_with("select")).count()
    }
}

pub struct MockDriver {
    pub journal: Arc<Journal>,
}

impl Driver for MockDriver {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn connect(&self) -> Result<Box<dyn Connection>> {
        let id = self.journal.connected.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            id,
            journal: self.journal.clone(),
        }))
    }

    fn sql_writer(&self) -> &dyn SqlWriter {
        const WRITER: GenericSqlWriter = GenericSqlWriter::new();
        &WRITER
    }
}

pub struct MockConnection {
    pub id: usize,
    journal: Arc<Journal>,
}

impl MockConnection {
    fn record(&self, sql: &str, params: &[Value]) -> Result<()> {
        self.journal
            .statements
            .lock()
            .unwrap()
            .push((self.id, sql.to_string(), params.to_vec()));
        match &*self.journal.fail_on.lock().unwrap() {
            Some(text) if sql.contains(text.as_str()) => {
                Err(Error::msg(format!("mock failure on `{}`", sql)))
            }
            _ => Ok(()),
        }
    }
}

impl Connection for MockConnection {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<RowsAffected> {
        self.record(sql, params)?;
        Ok(RowsAffected {
            rows_affected: 1,
            last_affected_id: Some(41 + self.journal.statements.lock().unwrap().len() as i64),
        })
    }

    fn fetch(&mut self, sql: &str, params: &[Value]) -> Result<Vec<RowLabeled>> {
        self.record(sql, params)?;
        let rows = self.journal.rows.lock().unwrap().clone();
        if sql.starts_with("select count(*)") {
            let labels: RowNames = vec!["count(*)".to_string()].into();
            return Ok(vec![RowLabeled::new(
                labels,
                vec![(rows.len() as i64).as_value()].into(),
            )]);
        }
        let (limit, offset) = match sql.rsplit_once(" limit ") {
            Some((_, window)) => {
                let mut parts = window.split(" offset ");
                let limit: usize = parts.next().unwrap().parse().unwrap();
                let offset: usize = parts.next().unwrap().parse().unwrap();
                (limit, offset)
            }
            None => (usize::MAX, 0),
        };
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.journal.closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn conf(max_open: usize) -> DbConf {
    DbConf::from_url(&format!("mock://memory?max_open={}&timeout=50ms", max_open)).unwrap()
}

pub fn mock(max_open: usize) -> (keel_core::Datasource, Arc<Journal>) {
    let journal = Arc::new(Journal::default());
    let datasource = keel_core::Datasource::new(
        Box::new(MockDriver {
            journal: journal.clone(),
        }),
        &conf(max_open),
    )
    .unwrap();
    (datasource, journal)
}

#[derive(Default, Debug, Clone, PartialEq)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author: Option<String>,
    pub pages: u32,
}

const BOOK_FIELDS: EntityDescriptor<Book> = EntityDescriptor {
    table: "book",
    columns: &["id", "title", "author", "pages"],
    auto_column: "id",
    sharding: None,
    instance: Book::default,
    extract: |v| {
        vec![
            v.id.as_value(),
            v.title.clone().as_value(),
            v.author.clone().as_value(),
            v.pages.as_value(),
        ]
    },
    assign: |v, column, value| {
        match column {
            "id" => v.id = AsValue::try_from_value(value)?,
            "title" => v.title = AsValue::try_from_value(value)?,
            "author" => v.author = AsValue::try_from_value(value)?,
            "pages" => v.pages = AsValue::try_from_value(value)?,
            _ => return Err(Error::msg(format!("Unknown column `{}`", column))),
        }
        Ok(())
    },
};

pub static BOOK: EntityDescriptor<Book> = BOOK_FIELDS;

fn shard_by_year(table: &str, key: &Value) -> Result<String> {
    Ok(format!("{}_{}", table, i64::try_from_value(key.clone())?))
}

/// Same shape as `book`, split by year.
pub static LOAN: EntityDescriptor<Book> = EntityDescriptor {
    table: "loan",
    sharding: Some(&shard_by_year),
    ..BOOK_FIELDS
};

/// Rows for `book`, ids from 1.
pub fn books(n: usize) -> Vec<Vec<Value>> {
    (1..=n as i64)
        .map(|i| {
            vec![
                i.as_value(),
                format!("Book {}", i).as_value(),
                Value::Varchar(None),
                (100 + i).as_value(),
            ]
        })
        .collect()
}
