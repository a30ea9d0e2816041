#[cfg(test)]
mod tests {
    use keel_tests::{execute_tests, init_logs};

    #[test]
    fn sqlite() {
        init_logs();
        let dir = tempfile::tempdir().expect("Could not create a temporary directory");
        let path = dir.path().join("tests.sqlite");
        assert!(!path.exists(), "Database file should not exist before test");
        let datasource = keel_sqlite::open(&format!(
            "sqlite://{}?mode=rwc&max_open=4&timeout=2s",
            path.display()
        ))
        .expect("Could not open the database");
        assert!(
            path.exists(),
            "Database file should be created after connection"
        );
        execute_tests(&datasource);
        datasource.shutdown();
        assert_eq!(datasource.pool().open_count(), 0);
    }
}
