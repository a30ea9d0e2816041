#[cfg(test)]
mod tests {
    use keel_core::{DbConf, parse_duration};
    use std::time::Duration;

    #[test]
    fn defaults() {
        let conf = DbConf::from_url("sqlite://data/app.sqlite").unwrap();
        assert_eq!(conf.scheme, "sqlite");
        assert_eq!(conf.location, "data/app.sqlite");
        assert_eq!(conf.max_open, DbConf::DEFAULT_MAX_OPEN);
        assert_eq!(conf.acquire_timeout, DbConf::DEFAULT_ACQUIRE_TIMEOUT);
        assert_eq!(conf.busy_timeout, DbConf::DEFAULT_BUSY_TIMEOUT);
        assert!(!conf.log_sql);
        assert!(conf.options.is_empty());
    }

    #[test]
    fn pool_keys_and_driver_options() {
        let conf = DbConf::from_url(
            "sqlite:///tmp/my%20db.sqlite?mode=ro&max_open=3&timeout=250ms&busy_timeout=1m&log_sql=yes&mode=rw",
        )
        .unwrap();
        assert_eq!(conf.location, "/tmp/my db.sqlite");
        assert_eq!(conf.max_open, 3);
        assert_eq!(conf.acquire_timeout, Duration::from_millis(250));
        assert_eq!(conf.busy_timeout, Duration::from_secs(60));
        assert!(conf.log_sql);
        assert_eq!(conf.option("mode"), Some("rw"), "The last occurrence wins");
        assert_eq!(conf.option("cache"), None);
        assert_eq!(conf.options.len(), 2);

        let conf = conf.with_max_open(0).with_log_sql(false);
        assert_eq!(conf.max_open, 1);
        assert!(!conf.log_sql);
    }

    #[test]
    fn wrong_urls() {
        assert!(DbConf::from_url("no scheme here").is_err());
        assert!(DbConf::from_url("sqlite:/one/slash").is_err());
        assert!(DbConf::from_url("sqlite://x?max_open=0").is_err());
        assert!(DbConf::from_url("sqlite://x?max_open=many").is_err());
        assert!(DbConf::from_url("sqlite://x?timeout=soon").is_err());
        assert!(DbConf::from_url("sqlite://x?log_sql=perhaps").is_err());
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("15").unwrap(), Duration::from_secs(15));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration(" 40ms ").unwrap(), Duration::from_millis(40));
        assert_eq!(parse_duration("3m").unwrap(), Duration::from_secs(180));
        assert!(parse_duration("1h").is_err());
        assert!(parse_duration("ms").is_err());
        assert!(parse_duration("-1s").is_err());
        assert!(parse_duration(&format!("{}m", u64::MAX)).is_err());
        assert_eq!(
            parse_duration(&format!("{}ms", u64::MAX)).unwrap(),
            Duration::from_millis(u64::MAX)
        );
    }
}
