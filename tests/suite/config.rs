//! Config file loading feeding the scheduler and prompt

use std::time::Duration;

use updraft_config::{ConfigError, UpdraftConfig};
use updraft_engine::{ConsentPrompt, ExecutionMode, ReleaseInfo, SchedulerSettings};

fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
fn full_config_drives_settings_and_prompt() {
    let (_dir, path) = write_config(
        r#"
        [updater]
        check_interval_secs = 7200
        consent_timeout_secs = 600

        [notification]
        title = "Acme Updater"
        product_name = "Acme"

        [gateway]
        check_command = "acme-update check"
        download_command = "acme-update download"
        install_command = "acme-update install"
        "#,
    );
    let config = UpdraftConfig::load_from(&path).unwrap();

    let settings = SchedulerSettings::from_config(&config.updater);
    assert_eq!(settings.mode, ExecutionMode::Production);
    assert_eq!(settings.interval, Duration::from_secs(7200));
    assert_eq!(settings.consent_timeout, Some(Duration::from_secs(600)));

    let prompt = ConsentPrompt::from_config(&config.notification);
    assert_eq!(prompt.title, "Acme Updater");
    assert_eq!(
        prompt.body(&ReleaseInfo::new("3.1.0").unwrap()),
        "Version 3.1.0 of Acme is now available. Would you like to update?"
    );

    let gateway = config.gateway.unwrap();
    assert_eq!(gateway.command_timeout(), Duration::from_secs(600));
}

#[test]
fn empty_file_uses_daily_production_defaults() {
    let (_dir, path) = write_config("");
    let config = UpdraftConfig::load_from(&path).unwrap();
    assert_eq!(
        SchedulerSettings::from_config(&config.updater),
        SchedulerSettings::default()
    );
    assert_eq!(
        SchedulerSettings::default().interval,
        Duration::from_secs(24 * 60 * 60)
    );
}

#[test]
fn env_mode_override_disables_checks() {
    let (_dir, path) = write_config("[updater]\nmode = \"production\"\n");
    let config = UpdraftConfig::load_from(&path)
        .unwrap()
        .with_mode_override(Some("test"));
    assert!(config.updater.mode.suppresses_update_checks());
}

#[test]
fn errors_name_the_offending_file() {
    let (_dir, path) = write_config("[updater\n");
    let err = UpdraftConfig::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert_eq!(err.path(), Some(path.as_path()));

    let (_dir, path) = write_config("[updater]\ncheck_interval_secs = 0\n");
    let err = UpdraftConfig::load_from(&path).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Invalid {
            field: "updater.check_interval_secs",
            ..
        }
    ));
}
