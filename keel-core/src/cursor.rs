use crate::{Error, Limit, Result};
use std::ops::ControlFlow;

/// Page size and row budget of a batched iteration.
///
/// Pages are requested with an increasing offset, the last one is shrunk to
/// what is left of the budget. Iteration ends when the budget is delivered,
/// when a page comes back shorter than requested, or when the handler breaks.
/// A `total_limit` of 0 means no budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batching {
    pub batch_size: u64,
    pub total_limit: u64,
}

impl Batching {
    pub fn new(batch_size: u64, total_limit: u64) -> Self {
        Self {
            batch_size,
            total_limit,
        }
    }

    pub fn check(&self) -> Result<()> {
        if self.batch_size == 0 {
            let error = Error::msg("The batch size must be at least 1");
            log::error!("{:#}", error);
            return Err(error);
        }
        Ok(())
    }

    /// Window of the next page once `delivered` rows went to the handler,
    /// `None` when the budget is exhausted.
    pub fn next_window(&self, delivered: u64) -> Option<Limit> {
        let limit = if self.total_limit == 0 {
            self.batch_size
        } else {
            self.batch_size
                .min(self.total_limit.saturating_sub(delivered))
        };
        (limit > 0).then_some(Limit {
            limit,
            offset: delivered,
        })
    }

    /// Drives the iteration, returns the number of rows delivered.
    ///
    /// `fetch` is called once per page with its window. An error from `fetch`
    /// stops everything, rows already handed to `handler` stay delivered.
    pub fn run<R>(
        &self,
        mut fetch: impl FnMut(Limit) -> Result<Vec<R>>,
        mut handler: impl FnMut(Vec<R>) -> ControlFlow<()>,
    ) -> Result<u64> {
        self.check()?;
        let mut delivered = 0;
        while let Some(window) = self.next_window(delivered) {
            let page = fetch(window)?;
            let len = page.len() as u64;
            if len == 0 {
                break;
            }
            delivered += len;
            if handler(page).is_break() {
                log::debug!("Batched iteration stopped by the handler after {} rows", delivered);
                break;
            }
            if len < window.limit {
                break;
            }
        }
        Ok(delivered)
    }
}
