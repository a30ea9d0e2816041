use crate::{Value, truncate_long};
use std::time::Duration;

/// Receives every statement executed through a unit of work.
///
/// `before` gets the full statement, `after` only the fingerprint so slow
/// statements can be correlated without logging the SQL twice.
pub trait TraceSink: Send + Sync {
    /// When false the unit of work skips fingerprinting altogether.
    fn enabled(&self) -> bool {
        true
    }
    fn before(&self, trace_id: &str, sql: &str, params: &str, fingerprint: &str);
    fn after(&self, trace_id: &str, fingerprint: &str, elapsed: Duration);
}

/// Writes through the `log` facade at info level.
#[derive(Default, Debug, Clone, Copy)]
pub struct LogTraceSink;

impl TraceSink for LogTraceSink {
    fn before(&self, trace_id: &str, sql: &str, params: &str, fingerprint: &str) {
        log::info!(
            "[{}] exec sql {}: {} args {}",
            trace_id,
            fingerprint,
            truncate_long!(sql),
            truncate_long!(params)
        );
    }

    fn after(&self, trace_id: &str, fingerprint: &str, elapsed: Duration) {
        log::info!(
            "[{}] sql {} took {}ms",
            trace_id,
            fingerprint,
            elapsed.as_millis()
        );
    }
}

#[derive(Default, Debug, Clone, Copy)]
pub struct NoopTraceSink;

impl TraceSink for NoopTraceSink {
    fn enabled(&self) -> bool {
        false
    }
    fn before(&self, _trace_id: &str, _sql: &str, _params: &str, _fingerprint: &str) {}
    fn after(&self, _trace_id: &str, _fingerprint: &str, _elapsed: Duration) {}
}

/// Serialized parameters and the uppercase hex MD5 of the SQL text followed by
/// them. When the parameters cannot be serialized only the SQL is hashed.
pub fn fingerprint(sql: &str, params: &[Value]) -> (String, String) {
    let mut context = md5::Context::new();
    context.consume(sql.as_bytes());
    let params = match serde_json::to_string(params) {
        Ok(json) => {
            context.consume(json.as_bytes());
            json
        }
        Err(e) => {
            log::error!("Could not serialize the parameters of `{}`: {}", truncate_long!(sql), e);
            String::new()
        }
    };
    (params, format!("{:X}", context.compute()))
}
