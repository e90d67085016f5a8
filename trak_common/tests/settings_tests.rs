//! Settings Store persistence tests.
//!
//! First-boot seeding, reopen persistence, partial-seed recovery and
//! write-failure propagation against the file and memory backends.

use std::fs;
use tempfile::TempDir;
use trak_common::config::{ConfigLoader, ServiceConfig};
use trak_common::settings::{
    FileBackend, MachineSettings, MemoryBackend, SETTINGS, SettingKey, SettingType, SettingValue,
    SettingsError, SettingsStore,
};

fn open_file_store(dir: &TempDir) -> SettingsStore {
    let backend = FileBackend::open(dir.path().join("settings.toml")).unwrap();
    SettingsStore::open(backend).unwrap()
}

#[test]
fn test_first_boot_writes_complete_table() {
    let dir = TempDir::new().unwrap();
    let _store = open_file_store(&dir);

    let content = fs::read_to_string(dir.path().join("settings.toml")).unwrap();
    assert!(content.contains("seeded = true"));
    for def in SETTINGS.iter() {
        assert!(
            content.contains(&format!("\"{}\"", def.key)),
            "{} missing from persisted document",
            def.key
        );
    }
}

#[test]
fn test_values_survive_reopen_with_exact_types() {
    let dir = TempDir::new().unwrap();
    {
        let mut store = open_file_store(&dir);
        store
            .set(SettingKey::STEPS_PER_MM_X, SettingType::Float, SettingValue::Float(80.125))
            .unwrap();
        store
            .set(SettingKey::STATUS_REPORT_MASK, SettingType::Short, SettingValue::Short(-3))
            .unwrap();
        store
            .set(SettingKey::SOFT_LIMITS, SettingType::Bool, SettingValue::Bool(true))
            .unwrap();
        store
            .set(SettingKey::SPINDLE_MAX_RPM, SettingType::Int, SettingValue::Int(24_000))
            .unwrap();
    }

    let store = open_file_store(&dir);
    assert_eq!(
        store.get(SettingKey::STEPS_PER_MM_X, SettingType::Float).unwrap(),
        SettingValue::Float(80.125)
    );
    assert_eq!(
        store.get(SettingKey::STATUS_REPORT_MASK, SettingType::Short).unwrap(),
        SettingValue::Short(-3)
    );
    assert!(store.flag(SettingKey::SOFT_LIMITS).unwrap());
    assert_eq!(store.int(SettingKey::SPINDLE_MAX_RPM).unwrap(), 24_000);
}

#[test]
fn test_reopen_does_not_reseed() {
    let dir = TempDir::new().unwrap();
    {
        let mut store = open_file_store(&dir);
        store.parse_and_set(SettingKey::MAX_TRAVEL_Z, "42").unwrap();
    }
    let store = open_file_store(&dir);
    assert_eq!(store.float(SettingKey::MAX_TRAVEL_Z).unwrap(), 42.0);
}

#[test]
fn test_partial_seed_is_not_marked_seeded() {
    // Ten writes succeed, the eleventh fails mid-seed.
    let result = SettingsStore::open(MemoryBackend::failing_after(10));
    assert!(matches!(result, Err(SettingsError::ConfigWriteError(_))));
}

#[test]
fn test_interrupted_file_seed_is_completed_on_next_boot() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("settings.toml");
    fs::write(
        &path,
        "version = 1\nseeded = false\n\n[settings]\n\"$0\" = 10\n\"$100\" = 80.0\n",
    )
    .unwrap();

    let store = SettingsStore::open(FileBackend::open(&path).unwrap()).unwrap();
    assert!(store.is_seeded());
    // Unseeded documents are reseeded in full.
    assert_eq!(store.float(SettingKey::STEPS_PER_MM_X).unwrap(), 250.0);
    assert_eq!(store.float(SettingKey::MAX_TRAVEL_Z).unwrap(), 200.0);
}

#[test]
fn test_write_failure_after_seed_is_config_write_error() {
    let mut store = SettingsStore::open(MemoryBackend::failing_after(SETTINGS.len() + 1)).unwrap();
    let err = store
        .set(SettingKey::HOMING_FEED, SettingType::Float, SettingValue::Float(30.0))
        .unwrap_err();
    assert!(matches!(err, SettingsError::ConfigWriteError(_)));
    assert_eq!(store.float(SettingKey::HOMING_FEED).unwrap(), 25.0);
}

#[test]
fn test_reset_defaults_restores_table() {
    let mut store = SettingsStore::open(MemoryBackend::new()).unwrap();
    store.parse_and_set(SettingKey::STEPS_PER_MM_Z, "0").unwrap();
    assert!(MachineSettings::load(&store).unwrap().validate_motion().is_err());

    store.reset_defaults().unwrap();
    let settings = MachineSettings::load(&store).unwrap();
    assert!(settings.validate_motion().is_ok());
}

#[test]
fn test_unknown_key_from_text() {
    assert!(matches!(
        "$99".parse::<SettingKey>(),
        Err(SettingsError::UnknownKey(_))
    ));
}

#[test]
fn test_service_config_points_store_at_file() {
    let dir = TempDir::new().unwrap();
    let settings_path = dir.path().join("state").join("grbl.toml");
    let config_path = dir.path().join("trak.toml");
    fs::write(
        &config_path,
        format!("[settings]\npath = {:?}\n", settings_path.display().to_string()),
    )
    .unwrap();

    let config = ServiceConfig::load(&config_path).unwrap();
    config.validate().unwrap();
    let store = SettingsStore::open(FileBackend::open(&config.settings.path).unwrap()).unwrap();
    assert!(store.is_seeded());
    assert!(settings_path.exists());
}
