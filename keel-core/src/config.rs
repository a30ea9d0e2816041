use crate::{Context, Error, Result};
use std::{borrow::Cow, time::Duration};
use url::form_urlencoded;

/// Connection descriptor for a datasource.
///
/// Parsed from a URL of the form
/// `<driver>://<location>?max_open=8&timeout=1s&busy_timeout=2s&log_sql=true&...`.
/// The pool keys are consumed here, any other key is left in `options` for the
/// driver.
#[derive(Debug, Clone, PartialEq)]
pub struct DbConf {
    pub url: String,
    pub scheme: String,
    /// Driver specific location (file path, host and database, ...).
    pub location: String,
    pub options: Vec<(String, String)>,
    /// Maximum number of physical connections held by the pool.
    pub max_open: usize,
    /// How long an acquire waits for a connection to be released.
    pub acquire_timeout: Duration,
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,
    /// Trace every statement through the log facade.
    pub log_sql: bool,
}

impl DbConf {
    pub const DEFAULT_MAX_OPEN: usize = 8;
    pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(1);
    pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(2);

    pub fn from_url(url: &str) -> Result<Self> {
        let context = || format!("Error while decoding connection URL: `{}`", url);
        let Some((scheme, rest)) = url.split_once("://") else {
            let error = Error::msg("Expected the connection url to start with `<driver>://`")
                .context(context());
            log::error!("{:#}", error);
            return Err(error);
        };
        let (location, query) = rest.split_once('?').unwrap_or((rest, ""));
        let location = urlencoding::decode(location).with_context(context)?;
        let mut result = Self {
            url: url.to_string(),
            scheme: scheme.to_string(),
            location: location.into_owned(),
            options: Vec::new(),
            max_open: Self::DEFAULT_MAX_OPEN,
            acquire_timeout: Self::DEFAULT_ACQUIRE_TIMEOUT,
            busy_timeout: Self::DEFAULT_BUSY_TIMEOUT,
            log_sql: false,
        };
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "max_open" => {
                    result.max_open = value.parse().with_context(context)?;
                    if result.max_open == 0 {
                        return Err(Error::msg("`max_open` must be at least 1").context(context()));
                    }
                }
                "timeout" => result.acquire_timeout = parse_duration(&value).with_context(context)?,
                "busy_timeout" => {
                    result.busy_timeout = parse_duration(&value).with_context(context)?
                }
                "log_sql" => result.log_sql = parse_bool(&value).with_context(context)?,
                _ => result.options.push((key.into_owned(), value.into_owned())),
            }
        }
        Ok(result)
    }

    pub fn with_max_open(mut self, max_open: usize) -> Self {
        self.max_open = max_open.max(1);
        self
    }

    pub fn with_log_sql(mut self, log_sql: bool) -> Self {
        self.log_sql = log_sql;
        self
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// `250ms`, `2s`, `1m`, a bare number is seconds.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (amount, unit) = value.split_at(split);
    let amount: u64 = amount
        .parse()
        .with_context(|| format!("Invalid duration `{}`", value))?;
    Ok(match unit {
        "ms" => Duration::from_millis(amount),
        "" | "s" => Duration::from_secs(amount),
        "m" => match amount.checked_mul(60) {
            Some(seconds) => Duration::from_secs(seconds),
            None => {
                return Err(Error::msg(format!("Duration `{}` is too long", value)));
            }
        },
        _ => {
            return Err(Error::msg(format!(
                "Invalid duration unit `{}` in `{}`",
                unit, value
            )));
        }
    })
}

fn parse_bool(value: &Cow<'_, str>) -> Result<bool> {
    match value.as_ref() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(Error::msg(format!("Invalid boolean `{}`", value))),
    }
}
