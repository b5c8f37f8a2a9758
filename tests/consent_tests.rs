use mister_api_site::{
    consent::{CONSENT_DATE_KEY, CONSENT_KEY, ConsentStore},
    integrations::{IntegrationMap, IntegrationToggle, TagManager},
    models::{ConsentCategory, ConsentPreferences, ConsentState, ConsentUpdate},
    storage::{DurableStorage, DurableStorageState, FileStorage, MemoryStorage, StorageError},
};
use std::io;
use std::sync::{Arc, Mutex};

// --- Test Doubles ---

#[derive(Default)]
struct RecordingTagManager {
    updates: Mutex<Vec<ConsentUpdate>>,
}

impl RecordingTagManager {
    fn updates(&self) -> Vec<ConsentUpdate> {
        self.updates.lock().unwrap().clone()
    }

    fn last(&self) -> Option<ConsentUpdate> {
        self.updates().last().copied()
    }
}

impl TagManager for RecordingTagManager {
    fn update_consent(&self, update: ConsentUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}

#[derive(Default)]
struct RecordingToggle {
    calls: Mutex<Vec<bool>>,
}

impl IntegrationToggle for RecordingToggle {
    fn enable(&self) {
        self.calls.lock().unwrap().push(true);
    }
    fn disable(&self) {
        self.calls.lock().unwrap().push(false);
    }
}

/// Memory storage that fails chosen operations on chosen keys.
#[derive(Default)]
struct FailingStorage {
    inner: MemoryStorage,
    fail_get: Option<&'static str>,
    fail_set: Option<&'static str>,
    fail_remove: Option<&'static str>,
}

fn injected(op: &str, key: &str) -> StorageError {
    StorageError::Io(io::Error::other(format!("injected {op} failure on {key}")))
}

impl DurableStorage for FailingStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.fail_get == Some(key) {
            return Err(injected("get", key));
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_set == Some(key) {
            return Err(injected("set", key));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        if self.fail_remove == Some(key) {
            return Err(injected("remove", key));
        }
        self.inner.remove(key)
    }
}

fn analytics_only() -> ConsentPreferences {
    ConsentPreferences {
        necessary: true,
        analytics: true,
        marketing: false,
        preferences: false,
    }
}

fn store_with(storage: DurableStorageState) -> (ConsentStore, Arc<RecordingTagManager>) {
    let tag_manager = Arc::new(RecordingTagManager::default());
    let store = ConsentStore::new(
        storage,
        IntegrationMap::with_tag_manager(tag_manager.clone()),
    );
    (store, tag_manager)
}

// --- Tests ---

#[test]
fn test_nothing_allowed_before_a_choice() {
    let (store, tag_manager) = store_with(Arc::new(MemoryStorage::new()));
    assert!(!store.has_consented());
    for category in [
        ConsentCategory::Necessary,
        ConsentCategory::Analytics,
        ConsentCategory::Marketing,
        ConsentCategory::Preferences,
    ] {
        assert!(!store.is_allowed(category));
    }
    assert!(tag_manager.updates().is_empty());
}

#[test]
fn test_save_then_load_in_fresh_session() {
    let storage = Arc::new(MemoryStorage::new());
    let (mut first, tag_manager) = store_with(storage.clone());

    let saved = first.save(analytics_only()).unwrap().clone();
    assert_eq!(
        tag_manager.last(),
        Some(ConsentUpdate {
            analytics_storage: ConsentState::Granted,
            ad_storage: ConsentState::Granted,
        })
    );

    let (mut second, second_tags) = store_with(storage);
    let loaded = second.load().cloned();

    assert_eq!(loaded, Some(saved));
    assert!(second.is_allowed(ConsentCategory::Analytics));
    assert!(!second.is_allowed(ConsentCategory::Marketing));
    assert!(!second.is_allowed(ConsentCategory::Preferences));
    assert!(second.is_allowed(ConsentCategory::Necessary));
    // Loading re-applies the stored choice.
    assert_eq!(second_tags.last(), Some(ConsentUpdate::uniform(true)));
}

#[test]
fn test_persisted_layout() {
    let storage = Arc::new(MemoryStorage::new());
    let (mut store, _) = store_with(storage.clone());
    store.save(analytics_only()).unwrap();

    let raw = storage.get(CONSENT_KEY).unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(
        value,
        serde_json::json!({
            "necessary": true,
            "analytics": true,
            "marketing": false,
            "preferences": false
        })
    );

    let date = storage.get(CONSENT_DATE_KEY).unwrap().unwrap();
    assert!(date.ends_with('Z'));
    assert!(chrono::DateTime::parse_from_rfc3339(&date).is_ok());
}

#[test]
fn test_necessary_cannot_be_switched_off() {
    let (mut store, _) = store_with(Arc::new(MemoryStorage::new()));
    let record = store
        .save(ConsentPreferences {
            necessary: false,
            ..ConsentPreferences::default()
        })
        .unwrap();
    assert!(record.preferences.necessary);
    assert!(store.is_allowed(ConsentCategory::Necessary));
}

#[test]
fn test_save_overwrites_wholesale() {
    let (mut store, tag_manager) = store_with(Arc::new(MemoryStorage::new()));
    store.accept_all().unwrap();
    assert!(store.is_allowed(ConsentCategory::Marketing));

    store.accept_necessary_only().unwrap();
    assert!(!store.is_allowed(ConsentCategory::Marketing));
    assert!(!store.is_allowed(ConsentCategory::Analytics));
    assert_eq!(tag_manager.last(), Some(ConsentUpdate::uniform(false)));
}

#[test]
fn test_reset_clears_everything() {
    let storage = Arc::new(MemoryStorage::new());
    let (mut store, tag_manager) = store_with(storage.clone());
    store.accept_all().unwrap();

    store.reset().unwrap();

    for category in [
        ConsentCategory::Necessary,
        ConsentCategory::Analytics,
        ConsentCategory::Marketing,
        ConsentCategory::Preferences,
    ] {
        assert!(!store.is_allowed(category));
    }
    assert!(store.record().is_none());
    assert!(storage.get(CONSENT_KEY).unwrap().is_none());
    assert!(storage.get(CONSENT_DATE_KEY).unwrap().is_none());
    assert!(storage.is_empty());
    assert_eq!(tag_manager.last(), Some(ConsentUpdate::uniform(false)));

    // A fresh session sees no consent either.
    let (mut fresh, _) = store_with(storage);
    assert!(fresh.load().is_none());
}

#[test]
fn test_reset_disables_even_without_prior_save() {
    let (mut store, tag_manager) = store_with(Arc::new(MemoryStorage::new()));
    store.reset().unwrap();
    assert_eq!(tag_manager.updates(), vec![ConsentUpdate::uniform(false)]);
}

#[test]
fn test_truncated_data_loads_as_unset() {
    let storage = Arc::new(MemoryStorage::new());
    storage
        .set(CONSENT_KEY, r#"{"necessary":true,"analyt"#)
        .unwrap();
    storage
        .set(CONSENT_DATE_KEY, "2026-10-16T09:00:00.000Z")
        .unwrap();

    let (mut store, tag_manager) = store_with(storage);
    assert!(store.load().is_none());
    assert!(!store.has_consented());
    assert!(!store.is_allowed(ConsentCategory::Analytics));
    assert!(tag_manager.updates().is_empty());
}

#[test]
fn test_bad_timestamp_loads_as_unset() {
    let storage = Arc::new(MemoryStorage::new());
    storage
        .set(CONSENT_KEY, &serde_json::to_string(&analytics_only()).unwrap())
        .unwrap();
    storage.set(CONSENT_DATE_KEY, "yesterday").unwrap();

    let (mut store, _) = store_with(storage.clone());
    assert!(store.load().is_none());

    storage.remove(CONSENT_DATE_KEY).unwrap();
    assert!(store.load().is_none());
}

#[test]
fn test_capability_map_dispatch() {
    let marketing = Arc::new(RecordingToggle::default());
    let preferences = Arc::new(RecordingToggle::default());
    let integrations = IntegrationMap::default()
        .register(ConsentCategory::Marketing, marketing.clone())
        .register(ConsentCategory::Preferences, preferences.clone());

    let mut store = ConsentStore::new(Arc::new(MemoryStorage::new()), integrations);
    store
        .save(ConsentPreferences {
            marketing: true,
            ..ConsentPreferences::default()
        })
        .unwrap();

    assert_eq!(*marketing.calls.lock().unwrap(), vec![true]);
    assert_eq!(*preferences.calls.lock().unwrap(), vec![false]);

    store.reset().unwrap();
    assert_eq!(*marketing.calls.lock().unwrap(), vec![true, false]);
    assert_eq!(*preferences.calls.lock().unwrap(), vec![false, false]);
}

#[test]
fn test_open_over_file_storage_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("consent.json");

    let (mut first, _) = store_with(Arc::new(FileStorage::new(&path)));
    first.save(analytics_only()).unwrap();

    let tag_manager = Arc::new(RecordingTagManager::default());
    let reopened = ConsentStore::open(
        Arc::new(FileStorage::new(&path)),
        IntegrationMap::with_tag_manager(tag_manager.clone()),
    );
    assert!(reopened.is_allowed(ConsentCategory::Analytics));
    assert!(!reopened.is_allowed(ConsentCategory::Marketing));
    assert_eq!(tag_manager.last(), Some(ConsentUpdate::uniform(true)));
}

// --- Failure Paths ---

#[test]
fn test_load_read_failure_is_unset() {
    let storage = Arc::new(FailingStorage {
        fail_get: Some(CONSENT_KEY),
        ..FailingStorage::default()
    });
    storage
        .inner
        .set(CONSENT_KEY, &serde_json::to_string(&analytics_only()).unwrap())
        .unwrap();
    storage
        .inner
        .set(CONSENT_DATE_KEY, "2026-10-16T09:00:00.000Z")
        .unwrap();

    let (mut store, tag_manager) = store_with(storage);
    assert!(store.load().is_none());
    assert!(!store.is_allowed(ConsentCategory::Analytics));
    assert!(tag_manager.updates().is_empty());
}

#[test]
fn test_flags_without_date_load_as_unset() {
    let storage = Arc::new(MemoryStorage::new());
    storage
        .set(CONSENT_KEY, &serde_json::to_string(&ConsentPreferences::all_granted()).unwrap())
        .unwrap();

    let (mut store, tag_manager) = store_with(storage);
    assert!(store.load().is_none());
    assert!(!store.has_consented());
    assert!(tag_manager.updates().is_empty());
}

#[test]
fn test_save_failing_on_date_write_changes_nothing_in_memory() {
    let storage = Arc::new(FailingStorage {
        fail_set: Some(CONSENT_DATE_KEY),
        ..FailingStorage::default()
    });
    let (mut store, tag_manager) = store_with(storage.clone());

    assert!(store.save(analytics_only()).is_err());
    assert!(store.record().is_none());
    assert!(!store.is_allowed(ConsentCategory::Analytics));
    assert!(tag_manager.updates().is_empty());

    // The first write is not rolled back; a later load treats it as unset.
    assert!(storage.inner.get(CONSENT_KEY).unwrap().is_some());
    assert!(storage.inner.get(CONSENT_DATE_KEY).unwrap().is_none());
    assert!(store.load().is_none());
}

#[test]
fn test_reset_failure_still_clears_memory_and_integrations() {
    let storage = Arc::new(FailingStorage {
        fail_remove: Some(CONSENT_KEY),
        ..FailingStorage::default()
    });
    let (mut store, tag_manager) = store_with(storage.clone());
    store.accept_all().unwrap();

    assert!(store.reset().is_err());
    assert!(store.record().is_none());
    assert!(!store.is_allowed(ConsentCategory::Analytics));
    assert_eq!(tag_manager.last(), Some(ConsentUpdate::uniform(false)));

    // The second removal still ran.
    assert!(storage.inner.get(CONSENT_DATE_KEY).unwrap().is_none());
    assert!(storage.inner.get(CONSENT_KEY).unwrap().is_some());
}

#[test]
fn test_logged_integrations_drive_a_store() {
    let mut store = ConsentStore::new(Arc::new(MemoryStorage::new()), IntegrationMap::logged());
    store.accept_all().unwrap();
    assert!(store.is_allowed(ConsentCategory::Analytics));
    store.reset().unwrap();
    assert!(!store.has_consented());
}
