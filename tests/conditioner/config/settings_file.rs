use std::env;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use conditioner::conditioner::config::{
    config_path, ensure_default, read, ConditionerConfig, OsFilesystem, CONFIG_ENV,
};
use serial_test::serial;
use tempfile::TempDir;

struct EnvGuard {
    key: &'static str,
    previous: Option<String>,
}

impl EnvGuard {
    fn set_path(key: &'static str, value: &Path) -> Self {
        let previous = env::var(key).ok();
        env::set_var(key, value);
        Self { key, previous }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        if let Some(prev) = self.previous.as_ref() {
            env::set_var(self.key, prev);
        } else {
            env::remove_var(self.key);
        }
    }
}

#[test]
#[serial]
fn first_run_writes_default_settings() {
    let temp = TempDir::new().expect("tempdir");
    let settings = temp.path().join("conditioner.json");
    let _env = EnvGuard::set_path(CONFIG_ENV, &settings);

    let path = config_path();
    assert_eq!(path, settings);
    assert!(ensure_default(&OsFilesystem, &path).expect("ensure"));

    let raw = fs::read_to_string(&path).expect("settings written");
    assert_eq!(raw, "{\n\t\"prepend-whoami\": false,\n\t\"allow-list\": []\n}");
    let mode = fs::metadata(&path).expect("metadata").permissions().mode();
    assert_eq!(mode & 0o777, 0o644);
    assert_eq!(
        read(&OsFilesystem, &path).expect("read"),
        ConditionerConfig::default()
    );
}

#[test]
#[serial]
fn operator_settings_are_preserved() {
    let temp = TempDir::new().expect("tempdir");
    let settings = temp.path().join("conditioner.json");
    fs::write(
        &settings,
        r#"{"prepend-whoami": true, "allow-list": ["Maintenance", "Ready"]}"#,
    )
    .expect("seed settings");
    let _env = EnvGuard::set_path(CONFIG_ENV, &settings);

    let path = config_path();
    assert!(!ensure_default(&OsFilesystem, &path).expect("ensure"));
    let config = read(&OsFilesystem, &path).expect("read");
    assert!(config.prepend_whoami);
    assert_eq!(config.allow_list, vec!["Maintenance", "Ready"]);
}

#[test]
#[serial]
fn malformed_settings_name_the_file() {
    let temp = TempDir::new().expect("tempdir");
    let settings = temp.path().join("conditioner.json");
    fs::write(&settings, "{not json").expect("seed settings");

    let err = read(&OsFilesystem, &settings).expect_err("invalid json");
    assert!(err
        .to_string()
        .starts_with(&format!("failed to parse settings file '{}'", settings.display())));
}
