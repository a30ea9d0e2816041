use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

impl Order {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: Direction::Desc,
        }
    }
}

/// Row window of a select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub limit: u64,
    pub offset: u64,
}

/// 1-based page index and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    pub page: u64,
    pub size: u64,
}

impl Pager {
    pub fn new(page: u64, size: u64) -> Self {
        Self { page, size }
    }

    pub fn limit(&self) -> Result<Limit> {
        if self.page == 0 || self.size == 0 {
            let error = Error::msg(format!(
                "Invalid pager (page {}, size {}): both must be at least 1",
                self.page, self.size
            ));
            log::error!("{:#}", error);
            return Err(error);
        }
        let Some(offset) = (self.page - 1).checked_mul(self.size) else {
            let error = Error::msg(format!(
                "Invalid pager (page {}, size {}): the offset overflows",
                self.page, self.size
            ));
            log::error!("{:#}", error);
            return Err(error);
        };
        Ok(Limit {
            limit: self.size,
            offset,
        })
    }
}
