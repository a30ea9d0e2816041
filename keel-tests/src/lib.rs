mod batched;
mod raw;
mod recording;
#[cfg(not(feature = "disable-sharding"))]
mod sharding;
mod transaction;
mod user;

use crate::{
    batched::batched, raw::raw, transaction::transaction, user::users,
};
use keel::Datasource;
use log::LevelFilter;
use std::{env, sync::Arc};

pub use recording::*;
pub use user::{USER_PROFILE, UserProfile};

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// Runs every scenario against `datasource`. The statements are also recorded
/// to check how many round trips the batched cursor makes.
pub fn execute_tests(datasource: &Datasource) {
    let sink = Arc::new(RecordingSink::default());
    let datasource = datasource.clone().with_trace_sink(sink.clone());
    users(&datasource);
    batched(&datasource, &sink);
    transaction(&datasource);
    raw(&datasource);
    #[cfg(not(feature = "disable-sharding"))]
    sharding::sharding(&datasource);
}

#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        $($code)+
        log::set_max_level(level);
    }};
}
